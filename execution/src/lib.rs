mod kernel_manager;

use core_types::{Backend, BufferId, HostBufferMut, HostBufferRef, TypedShape};
use memory::MemoryManager;
use neurop_core::GpuContext;
use neurop_core::types::AbstractBuffer;
use neurop_ops::{
    GpuExecution, GpuKernelSource, LaunchExtent, OpDescriptor, OpError, OpRegistry, TensorAny,
};
use std::sync::Arc;
use tracing::{debug, warn};

use kernel_manager::KernelManager;

fn exec_err(op: &str) -> impl Fn(anyhow::Error) -> OpError + '_ {
    move |source| OpError::Execution { op: op.to_string(), source }
}

/// GPU half of the engine: device context, memory pools, pipeline cache.
struct GpuRuntime {
    ctx:     GpuContext,
    memory:  MemoryManager,
    kernels: KernelManager,
}

/// Eager executor for registered operations.
///
/// Owns its [`OpRegistry`], so two engines never share operation state. The
/// host path needs no GPU at all; engines built with [`with_gpu`] can run
/// native WGSL kernels and the explicit host-fallback staging path.
///
/// [`with_gpu`]: ExecutionEngine::with_gpu
pub struct ExecutionEngine {
    registry: OpRegistry,
    gpu:      Option<GpuRuntime>,
}

impl ExecutionEngine {
    /// Engine without a GPU runtime; GPU-backend requests fail cleanly.
    pub fn host_only(registry: OpRegistry) -> Self {
        Self { registry, gpu: None }
    }

    pub fn with_gpu(registry: OpRegistry, ctx: GpuContext) -> Self {
        Self {
            registry,
            gpu: Some(GpuRuntime {
                memory:  MemoryManager::new(ctx.clone()),
                kernels: KernelManager::new(ctx.clone()),
                ctx,
            }),
        }
    }

    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    /// Register an operation on this engine's registry.
    pub fn register(&mut self, desc: OpDescriptor) -> Result<(), OpError> {
        self.registry.register(desc)
    }

    /// The GPU memory manager, when a GPU runtime is configured.
    pub fn memory(&self) -> Option<&MemoryManager> {
        self.gpu.as_ref().map(|g| &g.memory)
    }

    /// Eagerly invoke a registered operation on the requested backend.
    ///
    /// Output tensors are allocated from the resolver's declared signatures
    /// and come back host-resident for CPU requests, device-resident for GPU
    /// requests (including the host-fallback path).
    pub fn invoke(
        &self,
        name: &str,
        inputs: &[TensorAny],
        backend: Backend,
    ) -> Result<Vec<TensorAny>, OpError> {
        let desc = self.registry.get(name)?;
        let in_sigs: Vec<TypedShape> = inputs.iter().map(|t| t.sig()).collect();
        let out_sigs = desc.resolve(&in_sigs)?;
        if out_sigs.is_empty() {
            return Err(OpError::ShapeResolver {
                op: name.to_string(),
                message: "resolver declared zero outputs".to_string(),
            });
        }
        debug!(op = name, %backend, outputs = out_sigs.len(), "dispatching");

        match backend {
            Backend::Cpu => self.run_host(desc, inputs, &in_sigs, &out_sigs, false),
            // the capability check comes before any GPU-runtime concern, so
            // an unsupported op fails the same way on every engine
            Backend::Gpu => match desc.gpu() {
                GpuExecution::Unsupported => Err(OpError::UnsupportedBackend {
                    op: name.to_string(),
                    backend,
                }),
                GpuExecution::Native(kernel) => {
                    self.run_gpu_native(desc, kernel, inputs, &in_sigs, &out_sigs)
                }
                GpuExecution::HostFallback => {
                    warn!(op = name, "no GPU kernel; staging through host memory");
                    self.run_host(desc, inputs, &in_sigs, &out_sigs, true)
                }
            },
        }
    }

    /* ------------------------------------------------------------------ */
    /* Host path                                                          */
    /* ------------------------------------------------------------------ */

    /// Run the host kernel. With `stage_back`, results are uploaded to
    /// device memory afterwards (the explicit GPU fallback).
    fn run_host(
        &self,
        desc: &OpDescriptor,
        inputs: &[TensorAny],
        in_sigs: &[TypedShape],
        out_sigs: &[TypedShape],
        stage_back: bool,
    ) -> Result<Vec<TensorAny>, OpError> {
        let op = desc.name();

        // materialise host bytes for every input, downloading device-resident ones
        let staged: Vec<Option<Vec<u8>>> = inputs
            .iter()
            .zip(in_sigs)
            .map(|(t, sig)| match t.buffer_id() {
                None => Ok(None),
                Some(id) => {
                    let mm = self.require_memory(op)?;
                    let bytes = mm.download_bytes(id).map_err(exec_err(op))?;
                    Ok(Some(bytes[..sig.size_in_bytes()].to_vec()))
                }
            })
            .collect::<Result<_, OpError>>()?;

        let in_views: Vec<HostBufferRef<'_>> = inputs
            .iter()
            .zip(&staged)
            .zip(in_sigs)
            .map(|((t, staged), sig)| {
                let bytes = match staged {
                    Some(b) => &b[..],
                    None => t.bytes().unwrap(),
                };
                HostBufferRef::new(sig.clone(), bytes)
            })
            .collect();

        // outputs sized exactly as the resolver declared
        let mut out_bufs: Vec<Vec<u8>> = out_sigs
            .iter()
            .map(|sig| vec![0u8; sig.size_in_bytes()])
            .collect();
        let mut out_views: Vec<HostBufferMut<'_>> = out_bufs
            .iter_mut()
            .zip(out_sigs)
            .map(|(bytes, sig)| HostBufferMut::new(sig.clone(), bytes))
            .collect();

        desc.host_kernel().compute(&mut out_views, &in_views);
        drop(out_views);

        let mut outputs = Vec::with_capacity(out_sigs.len());
        for (bytes, sig) in out_bufs.into_iter().zip(out_sigs) {
            let mut t = TensorAny::from_host_bytes(bytes, sig);
            if stage_back {
                let mm = self.require_memory(op)?;
                t = t.to_device(mm).map_err(exec_err(op))?;
            }
            outputs.push(t);
        }
        Ok(outputs)
    }

    /* ------------------------------------------------------------------ */
    /* Native GPU path                                                    */
    /* ------------------------------------------------------------------ */

    fn run_gpu_native(
        &self,
        desc: &OpDescriptor,
        kernel: &GpuKernelSource,
        inputs: &[TensorAny],
        in_sigs: &[TypedShape],
        out_sigs: &[TypedShape],
    ) -> Result<Vec<TensorAny>, OpError> {
        let op = desc.name();
        let rt = self
            .gpu
            .as_ref()
            .ok_or_else(|| OpError::GpuUnavailable { op: op.to_string() })?;

        // device-resident inputs bind directly; host inputs get a transient upload
        let mut temp_ids: Vec<BufferId> = Vec::new();
        let mut in_ids: Vec<BufferId> = Vec::with_capacity(inputs.len());
        for t in inputs {
            match t.buffer_id() {
                Some(id) => in_ids.push(id),
                None => {
                    let bytes = t.bytes().unwrap();
                    let id = rt.memory.allocate_raw(bytes.len()).map_err(exec_err(op))?;
                    rt.memory.write_to_buffer(id, bytes).map_err(exec_err(op))?;
                    in_ids.push(id);
                    temp_ids.push(id);
                }
            }
        }

        // outputs: zero-filled storage buffers per declared signature
        let mut out_tensors = Vec::with_capacity(out_sigs.len());
        for sig in out_sigs {
            out_tensors.push(TensorAny::empty_device(&rt.memory, sig).map_err(exec_err(op))?);
        }
        let out_ids: Vec<BufferId> = out_tensors.iter().map(|t| t.buffer_id().unwrap()).collect();

        let (pipeline, layout) =
            rt.kernels
                .get(&kernel.wgsl, &kernel.entry_point, in_ids.len(), out_ids.len());

        let total = match kernel.extent {
            LaunchExtent::FirstOutput => out_sigs[0].elem_count(),
            LaunchExtent::MaxInputOutput => in_sigs
                .iter()
                .chain(out_sigs)
                .map(|sig| sig.elem_count())
                .max()
                .unwrap_or(0),
        } as u32;

        {
            let resolve = |ids: &[BufferId]| -> Result<Vec<Arc<AbstractBuffer>>, OpError> {
                ids.iter()
                    .map(|&id| {
                        rt.memory.get_ref(id).ok_or_else(|| {
                            exec_err(op)(anyhow::anyhow!("missing buffer: {id}"))
                        })
                    })
                    .collect()
            };
            let in_bufs = resolve(&in_ids)?;
            let out_bufs = resolve(&out_ids)?;
            let in_refs: Vec<&AbstractBuffer> = in_bufs.iter().map(|a| a.as_ref()).collect();
            let out_refs: Vec<&AbstractBuffer> = out_bufs.iter().map(|a| a.as_ref()).collect();

            rt.ctx.dispatch_compute_1d(
                &pipeline,
                &layout,
                &in_refs,
                &out_refs,
                total,
                kernel.workgroup_size,
            );
        }

        // submitted work holds its own references; drop the transient uploads
        for id in temp_ids {
            rt.memory.release(id);
        }

        Ok(out_tensors)
    }

    fn require_memory(&self, op: &str) -> Result<&MemoryManager, OpError> {
        self.gpu
            .as_ref()
            .map(|g| &g.memory)
            .ok_or_else(|| OpError::GpuUnavailable { op: op.to_string() })
    }
}

/* ------------------------------------------------------------------------- */
/*                                  Tests                                    */
/* ------------------------------------------------------------------------- */
