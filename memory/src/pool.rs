use std::collections::HashMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use parking_lot::Mutex;
use anyhow::Result;

use neurop_core::GpuContext;
use neurop_core::types::{AbstractBuffer, BufferKind};
use core_types::BufferId;

/// thread-safe pool of GPU buffers
pub struct BufferPool {
    ctx: GpuContext,
    usage: BufferKind,
    next_id: AtomicU64,
    entries: Mutex<HashMap<BufferId, Arc<AbstractBuffer>>>,
}

impl BufferPool {
    pub fn new(ctx: GpuContext, usage: BufferKind) -> Self {
        Self {
            ctx,
            usage,
            next_id: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a buffer of `size_bytes`, returning its unique ID
    pub fn create_buffer(&self, size_bytes: usize) -> Result<BufferId> {
        let raw = self.ctx.create_buffer(size_bytes as u64, self.usage);
        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.entries.lock().insert(id, Arc::new(raw));
        Ok(id)
    }

    /// Retrieve a clonable handle to the buffer for a given ID
    pub fn get(&self, id: BufferId) -> Option<Arc<AbstractBuffer>> {
        self.entries.lock().get(&id).cloned()
    }

    /// Explicitly release a buffer by its ID
    pub fn release_buffer(&self, id: BufferId) {
        self.entries.lock().remove(&id);
    }

    pub fn usage(&self) -> BufferKind {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn buffer_pool_allocation() {
        let Ok(ctx) = block_on(GpuContext::new()) else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };
        let usage = BufferKind::Main;
        let pool = BufferPool::new(ctx, usage);

        let id = pool.create_buffer(1024).expect("Failed to allocate buffer");
        let buf = pool.get(id).expect("Buffer should be allocated");
        assert_eq!(buf.size(), 1024);
        assert_eq!(pool.usage(), usage);

        pool.release_buffer(id);
        assert!(pool.get(id).is_none(), "Buffer should be released");
    }
}
