mod pool;

use anyhow::{Result, anyhow};
use bytemuck::{Pod, cast_slice};
use core_types::BufferId;
use pool::BufferPool;
use std::sync::Arc;
use neurop_core::{GpuContext, types::AbstractBuffer, types::BufferKind};

/// Manages three buffer pools on **one** GPU device:
/// - `main_pool`         : STORAGE buffers that hold tensor data
/// - `staging_upload`    : MAP_WRITE + COPY_SRC  (host → device)
/// - `staging_download`  : MAP_READ  + COPY_DST  (device → host)
pub struct MemoryManager {
    ctx:              GpuContext,
    main_pool:        BufferPool,
    staging_upload:   BufferPool,
    staging_download: BufferPool,
}

impl MemoryManager {
    pub fn new(ctx: GpuContext) -> Self {
        let main_pool        = BufferPool::new(ctx.clone(), BufferKind::Main);
        let staging_upload   = BufferPool::new(ctx.clone(), BufferKind::Upload);
        let staging_download = BufferPool::new(ctx.clone(), BufferKind::Download);

        Self { ctx, main_pool, staging_upload, staging_download }
    }

    /// Raw allocation in the main storage pool
    pub fn allocate_raw(&self, size_bytes: usize) -> Result<BufferId> {
        self.main_pool.create_buffer(size_bytes)
    }

    /// Raw deallocation
    pub fn release(&self, id: BufferId) {
        self.main_pool.release_buffer(id);
    }

    /// Raw upload: host → device.
    pub fn write_to_buffer<T: Pod>(&self, dest_id: BufferId, data: &[T]) -> Result<()> {
        let bytes = cast_slice(data);

        // 1) stage on the upload pool
        let sid = self.staging_upload.create_buffer(bytes.len())?;
        {
            let buf = self
                .staging_upload
                .get(sid)
                .ok_or_else(|| anyhow!("staging buffer vanished: {}", sid))?;
            self.ctx.write_buffer(&buf, bytes)?;
        }

        // 2) copy staging → main_pool[dest_id]
        let dst = self
            .main_pool
            .get(dest_id)
            .ok_or_else(|| anyhow!("unknown destination buffer: {}", dest_id))?;
        let src = self.staging_upload.get(sid).unwrap();
        self.ctx.copy_buffer_to_buffer(&src, &dst, bytes.len() as u64);

        // 3) cleanup staging
        self.staging_upload.release_buffer(sid);

        Ok(())
    }

    /// Raw download: device → host into a `Vec<T>`
    pub fn download_raw<T: Pod>(&self, id: BufferId) -> Result<Vec<T>> {
        let bytes = self.download_bytes(id)?;
        Ok(cast_slice::<u8, T>(&bytes).to_vec())
    }

    /// Download the raw bytes of a buffer, dtype-erased.
    pub fn download_bytes(&self, id: BufferId) -> Result<Vec<u8>> {
        // 1) copy main → staging_download
        let src_buf = self
            .main_pool
            .get(id)
            .ok_or_else(|| anyhow!("unknown buffer: {}", id))?;
        let size = src_buf.size();
        let sid = self.staging_download.create_buffer(size as usize)?;
        {
            let dst_buf = self.staging_download.get(sid).unwrap();
            self.ctx.copy_buffer_to_buffer(&src_buf, &dst_buf, size);
        }

        // 2) read the whole staging buffer
        let dst_buf = self.staging_download.get(sid).unwrap();
        let bytes = self.ctx.read_buffer(&dst_buf)?;

        // 3) cleanup staging
        self.staging_download.release_buffer(sid);

        Ok(bytes)
    }

    /// Get a handle on a buffer in the main pool.
    pub fn get_ref(&self, id: BufferId) -> Option<Arc<AbstractBuffer>> {
        self.main_pool.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn allocate_and_free() {
        let Ok(ctx) = block_on(GpuContext::new()) else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };
        let mm = MemoryManager::new(ctx);
        let id = mm.allocate_raw(256).unwrap();
        assert!(mm.get_ref(id).is_some());
        mm.release(id);
        assert!(mm.get_ref(id).is_none());
    }

    #[test]
    fn upload_download_roundtrip() {
        let Ok(ctx) = block_on(GpuContext::new()) else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };
        let mm = MemoryManager::new(ctx);
        let data = vec![10u32, 20, 30, 40];

        let id = mm.allocate_raw(data.len() * std::mem::size_of::<u32>()).unwrap();
        mm.write_to_buffer(id, &data).unwrap();
        let back: Vec<u32> = mm.download_raw(id).unwrap();
        assert_eq!(data, back);
        mm.release(id);
    }
}
