use core_types::TypedShape;

use crate::types::OpError;

pub type ResolveFn = dyn Fn(&[TypedShape]) -> Result<Vec<TypedShape>, String> + Send + Sync;

/// Output shape/type resolution for an operation.
///
/// Resolvers see input *signatures* only, never values — resolution may run
/// before any data exists. Static forms cover operations whose output
/// signatures never depend on the inputs; the callback form covers
/// shape-dependent outputs.
pub enum ShapeResolver {
    /// One output with a fixed signature.
    Static(TypedShape),
    /// Several outputs, all fixed.
    StaticMulti(Vec<TypedShape>),
    /// Callback from input signatures to output signatures.
    Infer(Box<ResolveFn>),
}

impl ShapeResolver {
    /// Callback resolver from a plain closure.
    pub fn infer<F>(f: F) -> Self
    where
        F: Fn(&[TypedShape]) -> Result<Vec<TypedShape>, String> + Send + Sync + 'static,
    {
        ShapeResolver::Infer(Box::new(f))
    }

    /// Single output mirroring the signature of input `idx`.
    pub fn same_as_input(idx: usize) -> Self {
        Self::infer(move |ins| {
            ins.get(idx).cloned().map(|sig| vec![sig]).ok_or_else(|| {
                format!("resolver expected at least {} inputs, got {}", idx + 1, ins.len())
            })
        })
    }

    /// Run the resolver; a callback failure becomes a configuration error
    /// attributed to `op`.
    pub fn resolve(&self, op: &str, inputs: &[TypedShape]) -> Result<Vec<TypedShape>, OpError> {
        match self {
            ShapeResolver::Static(sig) => Ok(vec![sig.clone()]),
            ShapeResolver::StaticMulti(sigs) => Ok(sigs.clone()),
            ShapeResolver::Infer(f) => f(inputs).map_err(|message| OpError::ShapeResolver {
                op: op.to_string(),
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::DataType;

    #[test]
    fn static_resolver_ignores_inputs() {
        let r = ShapeResolver::Static(TypedShape::of::<f32>(&[3, 3]));
        for ins in [
            vec![],
            vec![TypedShape::of::<u32>(&[1])],
            vec![TypedShape::of::<f32>(&[9, 9]), TypedShape::of::<i32>(&[2])],
        ] {
            let outs = r.resolve("op", &ins).unwrap();
            assert_eq!(outs, vec![TypedShape::of::<f32>(&[3, 3])]);
        }
    }

    #[test]
    fn static_multi_resolver_preserves_order() {
        let sigs = vec![TypedShape::of::<f32>(&[2]), TypedShape::of::<u32>(&[4, 1])];
        let r = ShapeResolver::StaticMulti(sigs.clone());
        assert_eq!(r.resolve("op", &[]).unwrap(), sigs);
    }

    #[test]
    fn same_as_input_mirrors_signature() {
        let r = ShapeResolver::same_as_input(1);
        let ins = vec![TypedShape::of::<u32>(&[7]), TypedShape::of::<f32>(&[1, 2])];
        assert_eq!(r.resolve("op", &ins).unwrap(), vec![ins[1].clone()]);

        // too few inputs is attributed to the named operation
        let err = r.resolve("shifted", &ins[..1]).unwrap_err();
        match err {
            OpError::ShapeResolver { op, .. } => assert_eq!(op, "shifted"),
            other => panic!("expected ShapeResolver error, got {other:?}"),
        }
    }

    #[test]
    fn infer_can_change_dtype() {
        let r = ShapeResolver::infer(|ins| {
            Ok(vec![TypedShape::new(DataType::U32, &ins[0].dims)])
        });
        let outs = r
            .resolve("op", &[TypedShape::of::<f32>(&[5, 5])])
            .unwrap();
        assert_eq!(outs, vec![TypedShape::of::<u32>(&[5, 5])]);
    }
}
