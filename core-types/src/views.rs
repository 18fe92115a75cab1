use bytemuck::{cast_slice, cast_slice_mut};

use crate::{DataType, Element, TypedShape};

/// Read-only view over one host-resident input buffer.
///
/// Kernels receive these in the order the inputs were passed; the signature
/// carried here is the one the shape resolver saw.
pub struct HostBufferRef<'a> {
    sig:   TypedShape,
    bytes: &'a [u8],
}

impl<'a> HostBufferRef<'a> {
    pub fn new(sig: TypedShape, bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len(), sig.size_in_bytes());
        Self { sig, bytes }
    }

    pub fn dtype(&self) -> DataType {
        self.sig.dtype
    }

    pub fn dims(&self) -> &[usize] {
        &self.sig.dims
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.sig.elem_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed flat view of the buffer.
    ///
    /// Panics if `T` disagrees with the buffer's dtype; matching the declared
    /// signature is part of the kernel contract.
    pub fn slice<T: Element>(&self) -> &[T] {
        assert_eq!(
            T::DTYPE,
            self.sig.dtype,
            "kernel read a {:?} buffer as {:?}",
            self.sig.dtype,
            T::DTYPE,
        );
        cast_slice(self.bytes)
    }
}

/// Mutable view over one host-resident output buffer.
///
/// The engine allocates these from the resolver's declared signatures;
/// kernels write them in place and return nothing.
pub struct HostBufferMut<'a> {
    sig:   TypedShape,
    bytes: &'a mut [u8],
}

impl<'a> HostBufferMut<'a> {
    pub fn new(sig: TypedShape, bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len(), sig.size_in_bytes());
        Self { sig, bytes }
    }

    pub fn dtype(&self) -> DataType {
        self.sig.dtype
    }

    pub fn dims(&self) -> &[usize] {
        &self.sig.dims
    }

    pub fn len(&self) -> usize {
        self.sig.elem_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed flat view; panics on dtype mismatch (kernel contract).
    pub fn slice_mut<T: Element>(&mut self) -> &mut [T] {
        assert_eq!(
            T::DTYPE,
            self.sig.dtype,
            "kernel wrote a {:?} buffer as {:?}",
            self.sig.dtype,
            T::DTYPE,
        );
        cast_slice_mut(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_view_casts_to_declared_dtype() {
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let bytes = cast_slice(&data);
        let view = HostBufferRef::new(TypedShape::of::<f32>(&[2, 2]), bytes);
        assert_eq!(view.len(), 4);
        assert_eq!(view.dims(), &[2, 2]);
        assert_eq!(view.slice::<f32>(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    #[should_panic]
    fn ref_view_rejects_wrong_dtype() {
        let data: Vec<u32> = vec![1, 2];
        let bytes = cast_slice(&data);
        let view = HostBufferRef::new(TypedShape::of::<u32>(&[2]), bytes);
        let _ = view.slice::<f32>();
    }

    #[test]
    fn mut_view_writes_in_place() {
        let mut bytes = vec![0u8; 3 * 4];
        {
            let mut view = HostBufferMut::new(TypedShape::of::<u32>(&[3]), &mut bytes);
            let out = view.slice_mut::<u32>();
            out.copy_from_slice(&[7, 8, 9]);
        }
        let back: &[u32] = cast_slice(&bytes);
        assert_eq!(back, &[7, 8, 9]);
    }
}
