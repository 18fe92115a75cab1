use std::{
    collections::HashMap,
    sync::Arc,
};
use parking_lot::Mutex;

use neurop_core::{GpuContext, types::AbstractBindGroupLayout, types::AbstractComputePipeline};

/// Signature of a specialized kernel: shader source + binding counts
#[derive(Clone, PartialEq, Eq, Hash)]
struct KernelKey {
    src:   Arc<str>,
    ent:   Arc<str>,
    n_in:  usize,
    n_out: usize,
}

struct PipelineBundle {
    pipeline: Arc<AbstractComputePipeline>,
    layout:   Arc<AbstractBindGroupLayout>,
}

/// Compiles WGSL kernels on first use and caches pipeline + layout per key,
/// so repeated invocations of one operation reuse the compiled pipeline.
pub struct KernelManager {
    ctx:   GpuContext,
    cache: Mutex<HashMap<KernelKey, Arc<PipelineBundle>>>,
}

impl KernelManager {
    pub fn new(ctx: GpuContext) -> Self {
        Self { ctx, cache: Mutex::new(HashMap::new()) }
    }

    pub fn get(
        &self,
        src: &str,
        entry: &str,
        n_in: usize,
        n_out: usize,
    ) -> (Arc<AbstractComputePipeline>, Arc<AbstractBindGroupLayout>) {
        let key = KernelKey {
            src: Arc::from(src),
            ent: Arc::from(entry),
            n_in,
            n_out,
        };

        // cache lookup
        if let Some(b) = self.cache.lock().get(&key) {
            return (b.pipeline.clone(), b.layout.clone());
        }

        // create layout + pipeline via GpuContext
        let layout   = self.ctx.create_storage_layout(n_in, n_out);
        let pipeline = self.ctx.create_compute_pipeline(src, entry, &layout);

        let bundle = Arc::new(PipelineBundle { pipeline: pipeline.clone(), layout: layout.clone() });
        self.cache.lock().insert(key, bundle);

        (pipeline, layout)
    }
}
