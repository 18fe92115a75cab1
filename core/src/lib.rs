pub mod types;

use anyhow::{Context, Result};
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, CommandEncoder, CommandEncoderDescriptor, ComputePassDescriptor,
    ComputePipelineDescriptor, Device, Instance, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PollType, Queue, ShaderModule, ShaderModuleDescriptor,
    ShaderSource, ShaderStages,
};

use types::{AbstractBindGroupLayout, AbstractBuffer, AbstractComputePipeline, BufferKind};

/// Handle on the GPU device and queue shared by every subsystem.
///
/// Construction fails cleanly when no adapter is present, so callers can fall
/// back to host-only execution.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<Device>,
    pub queue:  Arc<Queue>,
}

impl GpuContext {
    /* ------------------------------------------------------------------ */
    /* Construction                                                       */
    /* ------------------------------------------------------------------ */
    pub async fn new() -> Result<Self> {
        let instance = Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|e| anyhow::anyhow!("No suitable adapter found: {}", e))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /* ------------------------------------------------------------------ */
    /* Buffers                                                            */
    /* ------------------------------------------------------------------ */

    /// Allocate an uninitialised GPU buffer. Storage buffers come back
    /// zero-filled per the WebGPU contract.
    pub fn create_buffer(&self, size: u64, usage: BufferKind) -> AbstractBuffer {
        AbstractBuffer(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: usage.into(),
            mapped_at_creation: false,
        }))
    }

    /// Blocking write: map-write, copy `data`, unmap.
    pub fn write_buffer(&self, buffer: &AbstractBuffer, data: &[u8]) -> Result<()> {
        let wgpu_buffer = buffer.raw();
        let slice = wgpu_buffer.slice(..);
        slice.map_async(wgpu::MapMode::Write, |_| ());
        self.device.poll(PollType::Wait).context("device poll failed")?;
        slice.get_mapped_range_mut()[..data.len()].copy_from_slice(data);
        wgpu_buffer.unmap();
        Ok(())
    }

    /// Blocking read: map-read entire buffer, return Vec<u8>.
    pub fn read_buffer(&self, buffer: &AbstractBuffer) -> Result<Vec<u8>> {
        let wgpu_buffer = buffer.raw();
        let slice = wgpu_buffer.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| ());
        self.device.poll(PollType::Wait).context("device poll failed")?;
        let data = slice.get_mapped_range().to_vec();
        wgpu_buffer.unmap();
        Ok(data)
    }

    /* ------------------------------------------------------------------ */
    /* Encoder helpers                                                    */
    /* ------------------------------------------------------------------ */
    fn create_encoder(&self, label: &str) -> CommandEncoder {
        self.device
            .create_command_encoder(&CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit_encoder(&self, encoder: CommandEncoder) {
        self.queue.submit(Some(encoder.finish()));
    }

    pub fn copy_buffer_to_buffer(&self, src: &AbstractBuffer, dst: &AbstractBuffer, size: u64) {
        let mut enc = self.create_encoder("copy-b2b");
        enc.copy_buffer_to_buffer(src.raw(), 0, dst.raw(), 0, size);
        self.submit_encoder(enc);
    }

    /* ------------------------------------------------------------------ */
    /* Shaders                                                            */
    /* ------------------------------------------------------------------ */

    /// Storage-buffer layout for a compute shader: `n_in` read-only bindings
    /// followed by `n_out` read-write bindings, in declaration order.
    pub fn create_storage_layout(&self, n_in: usize, n_out: usize) -> Arc<AbstractBindGroupLayout> {
        let total = n_in + n_out;
        let mut entries: Vec<BindGroupLayoutEntry> = Vec::with_capacity(total);

        for i in 0..n_in {
            entries.push(BindGroupLayoutEntry {
                binding: i as u32,
                visibility: ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        for i in 0..n_out {
            entries.push(BindGroupLayoutEntry {
                binding: (n_in + i) as u32,
                visibility: ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let bgl = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("storage-layout"),
            entries: &entries,
        });
        Arc::new(AbstractBindGroupLayout(bgl))
    }

    /// Compile a WGSL compute pipeline from source.
    pub fn create_compute_pipeline(
        &self,
        src: &str,
        entry: &str,
        layout: &AbstractBindGroupLayout,
    ) -> Arc<AbstractComputePipeline> {
        let module: ShaderModule = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("wgsl-module"),
            source: ShaderSource::Wgsl(src.into()),
        });
        let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("compute-pl-layout"),
            bind_group_layouts: &[&layout.0],
            push_constant_ranges: &[],
        });
        let pipeline = self.device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("compute-pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(entry),
            compilation_options: PipelineCompilationOptions::default(),
            cache: None,
        });
        Arc::new(AbstractComputePipeline(pipeline))
    }

    /* ------------------------------------------------------------------ */
    /* Dispatch                                                           */
    /* ------------------------------------------------------------------ */

    fn create_storage_bind_group(
        &self,
        layout: &AbstractBindGroupLayout,
        inputs: &[&AbstractBuffer],
        outputs: &[&AbstractBuffer],
    ) -> BindGroup {
        let mut entries: Vec<BindGroupEntry> = Vec::with_capacity(inputs.len() + outputs.len());
        for (i, b) in inputs.iter().enumerate() {
            entries.push(BindGroupEntry {
                binding: i as u32,
                resource: b.0.as_entire_binding(),
            });
        }
        let off = inputs.len();
        for (i, b) in outputs.iter().enumerate() {
            entries.push(BindGroupEntry {
                binding: (off + i) as u32,
                resource: b.0.as_entire_binding(),
            });
        }
        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("storage-bg"),
            layout: &layout.0,
            entries: &entries,
        })
    }

    /// One-dimensional dispatch over `total_elems` work items.
    pub fn dispatch_compute_1d(
        &self,
        pipeline: &AbstractComputePipeline,
        layout: &AbstractBindGroupLayout,
        inputs: &[&AbstractBuffer],
        outputs: &[&AbstractBuffer],
        total_elems: u32,
        workgroup_size: u32,
    ) {
        let bg = self.create_storage_bind_group(layout, inputs, outputs);
        let (x, _, _) = self.dispatch_size_1d(total_elems, workgroup_size);

        let mut enc = self.create_encoder("dispatch-1d");
        {
            let mut pass = enc.begin_compute_pass(&ComputePassDescriptor::default());
            pass.set_pipeline(&pipeline.0);
            pass.set_bind_group(0, &bg, &[]);
            pass.dispatch_workgroups(x, 1, 1);
        }
        self.submit_encoder(enc);
    }

    /// Helper: compute `(x,1,1)` for 1-D dispatch with `workgroup_size`.
    pub fn dispatch_size_1d(&self, total: u32, workgroup_size: u32) -> (u32, u32, u32) {
        (total.div_ceil(workgroup_size), 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn gpu_context_creation() {
        // Hosts without an adapter simply skip this test.
        let Ok(ctx) = block_on(GpuContext::new()) else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };
        let limits = ctx.device.limits();
        assert!(limits.max_compute_invocations_per_workgroup > 0);
    }

    #[test]
    fn dispatch_size_rounds_up() {
        let Ok(ctx) = block_on(GpuContext::new()) else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };
        assert_eq!(ctx.dispatch_size_1d(1, 64), (1, 1, 1));
        assert_eq!(ctx.dispatch_size_1d(64, 64), (1, 1, 1));
        assert_eq!(ctx.dispatch_size_1d(65, 64), (2, 1, 1));
    }
}
