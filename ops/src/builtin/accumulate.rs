//! Accumulation kernels: an event-driven scatter-accumulate and an atomic
//! index-count accumulate. These are the two compute entry points the
//! native extension modules expose.

use core_types::{DataType, HostBufferMut, HostBufferRef};

use crate::op::{GpuKernelSource, LaunchExtent, OpDescriptor};
use crate::register_op;
use crate::shape::ShapeResolver;

pub const EVENT_NAME: &str = "event_accumulate";
pub const ATOMIC_NAME: &str = "atomic_accumulate";

/* ------------------------------------------------------------------------- */
/* event_accumulate                                                          */
/* ------------------------------------------------------------------------- */

// inputs: events u32[n], targets u32[n], values f32[n], init f32[m]
// output: f32[m] = init, plus values[i] added at targets[i] wherever
//         events[i] fired
fn event_resolver() -> ShapeResolver {
    ShapeResolver::infer(|ins| {
        let [events, targets, values, init] = ins else {
            return Err(format!(
                "expected 4 inputs (events, targets, values, init), got {}",
                ins.len()
            ));
        };
        if events.dims != targets.dims || events.dims != values.dims {
            return Err("events, targets and values must share one shape".to_string());
        }
        if events.dtype != DataType::U32 || targets.dtype != DataType::U32 {
            return Err("events and targets must be u32".to_string());
        }
        if values.dtype != DataType::F32 || init.dtype != DataType::F32 {
            return Err("values and init must be f32".to_string());
        }
        Ok(vec![init.clone()])
    })
}

fn event_host_kernel(outputs: &mut [HostBufferMut<'_>], inputs: &[HostBufferRef<'_>]) {
    let events  = inputs[0].slice::<u32>();
    let targets = inputs[1].slice::<u32>();
    let values  = inputs[2].slice::<f32>();
    let init    = inputs[3].slice::<f32>();
    let out = outputs[0].slice_mut::<f32>();

    out.copy_from_slice(init);
    // out-of-range targets are dropped, like the GPU scatter kernels do
    for ((&event, &target), &value) in events.iter().zip(targets).zip(values) {
        if event != 0 {
            if let Some(slot) = out.get_mut(target as usize) {
                *slot += value;
            }
        }
    }
}

/// "event_accumulate": scatter-accumulate driven by per-element events.
/// No dedicated GPU kernel; GPU requests stage through the host kernel.
pub fn event_accumulate() -> OpDescriptor {
    OpDescriptor::new(EVENT_NAME, event_resolver(), event_host_kernel).with_host_fallback()
}

register_op!(crate::builtin::accumulate::event_accumulate);

/* ------------------------------------------------------------------------- */
/* atomic_accumulate                                                         */
/* ------------------------------------------------------------------------- */

// inputs: indices u32[n], init u32[m]
// output: u32[m] = init, plus the count of occurrences of each index
fn atomic_resolver() -> ShapeResolver {
    ShapeResolver::infer(|ins| {
        let [indices, init] = ins else {
            return Err(format!("expected 2 inputs (indices, init), got {}", ins.len()));
        };
        if indices.dtype != DataType::U32 || init.dtype != DataType::U32 {
            return Err("indices and init must be u32".to_string());
        }
        Ok(vec![init.clone()])
    })
}

fn atomic_host_kernel(outputs: &mut [HostBufferMut<'_>], inputs: &[HostBufferRef<'_>]) {
    let indices = inputs[0].slice::<u32>();
    let init    = inputs[1].slice::<u32>();
    let out = outputs[0].slice_mut::<u32>();

    out.copy_from_slice(init);
    for &idx in indices {
        if let Some(slot) = out.get_mut(idx as usize) {
            *slot += 1;
        }
    }
}

// The output buffer starts zero-filled, so both the initial counts and the
// scatter increments fold in through atomics alone; thread order cannot
// change the result. The dispatch must cover max(n, m) threads.
const ATOMIC_WGSL: &str = r#"
    @group(0) @binding(0) var<storage, read>  IDX: array<u32>;
    @group(0) @binding(1) var<storage, read>  INIT: array<u32>;
    @group(0) @binding(2) var<storage, read_write> OUT: array<atomic<u32>>;
    @compute @workgroup_size(64)
    fn atomic_accumulate_kernel(@builtin(global_invocation_id) gid: vec3<u32>) {
        let i = gid.x;
        if (i < arrayLength(&INIT)) {
            atomicAdd(&OUT[i], INIT[i]);
        }
        if (i < arrayLength(&IDX)) {
            let t = IDX[i];
            if (t < arrayLength(&OUT)) {
                atomicAdd(&OUT[t], 1u);
            }
        }
    }
"#;

/// "atomic_accumulate": per-index occurrence counting on top of initial
/// counts, atomically on GPU, a plain loop on host.
pub fn atomic_accumulate() -> OpDescriptor {
    OpDescriptor::new(ATOMIC_NAME, atomic_resolver(), atomic_host_kernel).with_gpu_kernel(
        GpuKernelSource::new(ATOMIC_WGSL, "atomic_accumulate_kernel")
            .with_extent(LaunchExtent::MaxInputOutput),
    )
}

register_op!(crate::builtin::accumulate::atomic_accumulate);

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::cast_slice;
    use core_types::TypedShape;

    #[test]
    fn event_host_kernel_accumulates_fired_events_only() {
        let n = TypedShape::of::<u32>(&[4]);
        let nf = TypedShape::of::<f32>(&[4]);
        let m = TypedShape::of::<f32>(&[3]);

        let events: Vec<u32> = vec![1, 0, 1, 1];
        let targets: Vec<u32> = vec![0, 1, 2, 0];
        let values: Vec<f32> = vec![0.5, 100.0, 2.0, 1.5];
        let init: Vec<f32> = vec![1.0, 2.0, 3.0];
        let mut out = vec![0u8; m.size_in_bytes()];

        let desc = event_accumulate();
        desc.host_kernel().compute(
            &mut [HostBufferMut::new(m.clone(), &mut out)],
            &[
                HostBufferRef::new(n.clone(), cast_slice(&events)),
                HostBufferRef::new(n.clone(), cast_slice(&targets)),
                HostBufferRef::new(nf, cast_slice(&values)),
                HostBufferRef::new(m.clone(), cast_slice(&init)),
            ],
        );
        let got: &[f32] = cast_slice(&out);
        // target 0 gets 0.5 + 1.5, target 1's event did not fire
        assert_eq!(got, &[3.0, 2.0, 5.0]);
    }

    #[test]
    fn event_host_kernel_drops_out_of_range_targets() {
        let n = TypedShape::of::<u32>(&[2]);
        let nf = TypedShape::of::<f32>(&[2]);
        let m = TypedShape::of::<f32>(&[2]);

        let events: Vec<u32> = vec![1, 1];
        let targets: Vec<u32> = vec![1, 7]; // 7 is past the output
        let values: Vec<f32> = vec![2.0, 99.0];
        let init: Vec<f32> = vec![0.0, 1.0];
        let mut out = vec![0u8; m.size_in_bytes()];

        event_accumulate().host_kernel().compute(
            &mut [HostBufferMut::new(m.clone(), &mut out)],
            &[
                HostBufferRef::new(n.clone(), cast_slice(&events)),
                HostBufferRef::new(n, cast_slice(&targets)),
                HostBufferRef::new(nf, cast_slice(&values)),
                HostBufferRef::new(m.clone(), cast_slice(&init)),
            ],
        );
        let got: &[f32] = cast_slice(&out);
        assert_eq!(got, &[0.0, 3.0]);
    }

    #[test]
    fn event_resolver_requires_matching_event_shapes() {
        let desc = event_accumulate();
        let err = desc
            .resolve(&[
                TypedShape::of::<u32>(&[4]),
                TypedShape::of::<u32>(&[5]),
                TypedShape::of::<f32>(&[4]),
                TypedShape::of::<f32>(&[3]),
            ])
            .unwrap_err();
        assert!(err.to_string().contains(EVENT_NAME));
    }

    #[test]
    fn atomic_host_kernel_counts_occurrences() {
        let n = TypedShape::of::<u32>(&[5]);
        let m = TypedShape::of::<u32>(&[3]);

        let indices: Vec<u32> = vec![0, 2, 2, 1, 2];
        let init: Vec<u32> = vec![10, 0, 0];
        let mut out = vec![0u8; m.size_in_bytes()];

        let desc = atomic_accumulate();
        desc.host_kernel().compute(
            &mut [HostBufferMut::new(m.clone(), &mut out)],
            &[
                HostBufferRef::new(n, cast_slice(&indices)),
                HostBufferRef::new(m.clone(), cast_slice(&init)),
            ],
        );
        let got: &[u32] = cast_slice(&out);
        assert_eq!(got, &[11, 1, 3]);
    }

    #[test]
    fn atomic_host_kernel_drops_out_of_range_indices() {
        let n = TypedShape::of::<u32>(&[3]);
        let m = TypedShape::of::<u32>(&[2]);

        let indices: Vec<u32> = vec![0, 9, 1]; // 9 is past the output
        let init: Vec<u32> = vec![0, 5];
        let mut out = vec![0u8; m.size_in_bytes()];

        atomic_accumulate().host_kernel().compute(
            &mut [HostBufferMut::new(m.clone(), &mut out)],
            &[
                HostBufferRef::new(n, cast_slice(&indices)),
                HostBufferRef::new(m.clone(), cast_slice(&init)),
            ],
        );
        let got: &[u32] = cast_slice(&out);
        assert_eq!(got, &[1, 6]);
    }

    #[test]
    fn atomic_gpu_kernel_declares_scatter_extent() {
        let desc = atomic_accumulate();
        match desc.gpu() {
            crate::op::GpuExecution::Native(k) => {
                assert_eq!(k.extent, LaunchExtent::MaxInputOutput);
                assert_eq!(k.entry_point, "atomic_accumulate_kernel");
            }
            _ => panic!("atomic_accumulate should carry a native GPU kernel"),
        }
    }
}
