use core_types::{DataType, HostBufferMut, HostBufferRef};

use crate::op::{GpuKernelSource, OpDescriptor};
use crate::register_op;
use crate::shape::ShapeResolver;

pub const NAME: &str = "add";

fn resolver() -> ShapeResolver {
    ShapeResolver::infer(|ins| match ins {
        [a, b] if a.dtype != DataType::F32 || b.dtype != DataType::F32 => {
            Err(format!("add is f32-only, got {a} and {b}"))
        }
        [a, b] if a == b => Ok(vec![a.clone()]),
        [a, b] => Err(format!("mismatched operand signatures {a} and {b}")),
        _ => Err(format!("expected 2 inputs, got {}", ins.len())),
    })
}

fn host_kernel(outputs: &mut [HostBufferMut<'_>], inputs: &[HostBufferRef<'_>]) {
    let a = inputs[0].slice::<f32>();
    let b = inputs[1].slice::<f32>();
    let out = outputs[0].slice_mut::<f32>();
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b)) {
        *o = x + y;
    }
}

const WGSL: &str = r#"
    @group(0) @binding(0) var<storage, read>  A: array<f32>;
    @group(0) @binding(1) var<storage, read>  B: array<f32>;
    @group(0) @binding(2) var<storage, read_write> C: array<f32>;
    @compute @workgroup_size(64)
    fn add_kernel(@builtin(global_invocation_id) gid: vec3<u32>) {
        let i = gid.x;
        if (i < arrayLength(&C)) {
            C[i] = A[i] + B[i];
        }
    }
"#;

/// "add": elementwise f32 addition, native on both backends.
pub fn descriptor() -> OpDescriptor {
    OpDescriptor::new(NAME, resolver(), host_kernel)
        .with_gpu_kernel(GpuKernelSource::new(WGSL, "add_kernel"))
}

register_op!(crate::builtin::add::descriptor);

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::cast_slice;
    use core_types::TypedShape;

    #[test]
    fn host_kernel_adds_elementwise() {
        let sig = TypedShape::of::<f32>(&[4]);
        let a: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let b: Vec<f32> = vec![5.0, 6.0, 7.0, 8.0];
        let mut out = vec![0u8; sig.size_in_bytes()];

        let desc = descriptor();
        desc.host_kernel().compute(
            &mut [HostBufferMut::new(sig.clone(), &mut out)],
            &[
                HostBufferRef::new(sig.clone(), cast_slice(&a)),
                HostBufferRef::new(sig.clone(), cast_slice(&b)),
            ],
        );
        let got: &[f32] = cast_slice(&out);
        assert_eq!(got, &[6.0, 8.0, 10.0, 12.0]);
    }

    #[test]
    fn resolver_rejects_shape_mismatch() {
        let desc = descriptor();
        let err = desc
            .resolve(&[TypedShape::of::<f32>(&[4]), TypedShape::of::<f32>(&[2, 2])])
            .unwrap_err();
        assert!(err.to_string().contains("add"));
    }
}
