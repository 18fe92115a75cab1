mod utils;

use anyhow::{Result, bail};
use bytemuck::{Zeroable, cast_slice};
use core_types::{Backend, BufferId, DataType, Element, MAX_DIMS, TypedShape, ViewDescriptor};
use memory::MemoryManager;
use std::marker::PhantomData;
use utils::compute_strides;

/// Where a tensor's bytes currently live.
#[derive(Debug)]
enum Storage {
    Host(Vec<u8>),
    Device(BufferId),
}

/// Typed tensor handle: a view descriptor plus host- or device-resident
/// storage. Host tensors need no GPU at all; device tensors are backed by a
/// buffer in a [`MemoryManager`] main pool.
#[derive(Debug)]
pub struct Tensor<T: Element> {
    storage: Storage,
    view:    ViewDescriptor,
    dtype:   DataType,
    _marker: PhantomData<T>,
}

fn make_view(shape: &[usize]) -> ViewDescriptor {
    assert!(shape.len() <= MAX_DIMS, "tensor rank exceeds MAX_DIMS");
    let mut vd = ViewDescriptor::zeroed();
    vd.ndim = shape.len() as u32;
    let strides = compute_strides(shape);
    for (i, &d) in shape.iter().enumerate() {
        vd.shape[i]   = d as u32;
        vd.strides[i] = strides[i] as u32;
    }
    vd
}

impl<T: Element> Tensor<T> {
    /* --------------------------------------------------------------------- */
    /* Host constructors                                                     */
    /* --------------------------------------------------------------------- */

    /// Zero-filled host tensor.
    pub fn zeros(shape: &[usize]) -> Self {
        let bytes = shape.iter().product::<usize>() * T::DTYPE.size_in_bytes();
        Tensor {
            storage: Storage::Host(vec![0u8; bytes]),
            view:    make_view(shape),
            dtype:   T::DTYPE,
            _marker: PhantomData,
        }
    }

    /// Host tensor over a copy of `data`.
    pub fn from_vec(data: &[T], shape: &[usize]) -> Self {
        let elem_count = shape.iter().product::<usize>();
        assert_eq!(data.len(), elem_count, "data length does not match shape");
        Tensor {
            storage: Storage::Host(cast_slice(data).to_vec()),
            view:    make_view(shape),
            dtype:   T::DTYPE,
            _marker: PhantomData,
        }
    }

    /// Host tensor adopting already-materialised bytes. The byte length must
    /// match the signature exactly.
    pub fn from_host_bytes(bytes: Vec<u8>, sig: &TypedShape) -> Self {
        assert_eq!(sig.dtype, T::DTYPE);
        assert_eq!(bytes.len(), sig.size_in_bytes());
        Tensor {
            storage: Storage::Host(bytes),
            view:    make_view(&sig.dims),
            dtype:   T::DTYPE,
            _marker: PhantomData,
        }
    }

    /* --------------------------------------------------------------------- */
    /* Device constructors                                                   */
    /* --------------------------------------------------------------------- */

    /// Allocate an uninitialised (zero-filled) device tensor.
    pub fn empty_device(mgr: &MemoryManager, shape: &[usize]) -> Result<Self> {
        let bytes = shape.iter().product::<usize>() * T::DTYPE.size_in_bytes();
        let buf_id = mgr.allocate_raw(bytes)?;
        Ok(Tensor {
            storage: Storage::Device(buf_id),
            view:    make_view(shape),
            dtype:   T::DTYPE,
            _marker: PhantomData,
        })
    }

    /// Upload a host slice straight into a fresh device tensor.
    pub fn from_vec_device(mgr: &MemoryManager, data: &[T], shape: &[usize]) -> Result<Self> {
        let elem_count = shape.iter().product::<usize>();
        assert_eq!(data.len(), elem_count, "data length does not match shape");
        let bytes = elem_count * T::DTYPE.size_in_bytes();
        let buf_id = mgr.allocate_raw(bytes)?;
        mgr.write_to_buffer(buf_id, data)?;
        Ok(Tensor {
            storage: Storage::Device(buf_id),
            view:    make_view(shape),
            dtype:   T::DTYPE,
            _marker: PhantomData,
        })
    }

    /// Wrap an existing device buffer under the given signature.
    pub fn from_device_buffer(buf_id: BufferId, sig: &TypedShape) -> Self {
        assert_eq!(sig.dtype, T::DTYPE);
        Tensor {
            storage: Storage::Device(buf_id),
            view:    make_view(&sig.dims),
            dtype:   T::DTYPE,
            _marker: PhantomData,
        }
    }

    /* --------------------------------------------------------------------- */
    /* Staging                                                               */
    /* --------------------------------------------------------------------- */

    /// Move the tensor to device memory. Host bytes are uploaded; a tensor
    /// already on device is returned unchanged.
    pub fn to_device(mut self, mgr: &MemoryManager) -> Result<Self> {
        if let Storage::Host(bytes) = &self.storage {
            let buf_id = mgr.allocate_raw(bytes.len())?;
            mgr.write_to_buffer(buf_id, bytes)?;
            self.storage = Storage::Device(buf_id);
        }
        Ok(self)
    }

    /// Move the tensor to host memory, releasing the device buffer.
    pub fn to_host(mut self, mgr: &MemoryManager) -> Result<Self> {
        if let Storage::Device(buf_id) = self.storage {
            let bytes = mgr.download_bytes(buf_id)?;
            mgr.release(buf_id);
            let logical = self.elem_count() * self.dtype.size_in_bytes();
            self.storage = Storage::Host(bytes[..logical].to_vec());
        }
        Ok(self)
    }

    /// Copy out a host-resident tensor. Errors if the data lives on device.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        match &self.storage {
            Storage::Host(bytes) => Ok(cast_slice(bytes).to_vec()),
            Storage::Device(id) => bail!("tensor is device-resident ({id}); download it first"),
        }
    }

    /// Copy out the data regardless of residency.
    pub fn download(&self, mgr: &MemoryManager) -> Result<Vec<T>> {
        match &self.storage {
            Storage::Host(bytes) => Ok(cast_slice(bytes).to_vec()),
            Storage::Device(id) => {
                let bytes = mgr.download_bytes(*id)?;
                // the pool may round sizes up; trim to the logical extent
                let logical = self.elem_count() * self.dtype.size_in_bytes();
                Ok(cast_slice(&bytes[..logical]).to_vec())
            }
        }
    }

    /* --------------------------------------------------------------------- */
    /* Accessors                                                             */
    /* --------------------------------------------------------------------- */

    /// The view descriptor (shape, strides, offset)
    pub fn view(&self) -> &ViewDescriptor {
        &self.view
    }

    /// The tensor's DataType
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Where the bytes live right now
    pub fn backend(&self) -> Backend {
        match self.storage {
            Storage::Host(_) => Backend::Cpu,
            Storage::Device(_) => Backend::Gpu,
        }
    }

    /// The backing BufferId, for device-resident tensors
    pub fn buffer_id(&self) -> Option<BufferId> {
        match self.storage {
            Storage::Device(id) => Some(id),
            Storage::Host(_) => None,
        }
    }

    /// The backing bytes, for host-resident tensors
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            Storage::Host(b) => Some(b),
            Storage::Device(_) => None,
        }
    }

    /// Mutable backing bytes, for host-resident tensors
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            Storage::Host(b) => Some(b),
            Storage::Device(_) => None,
        }
    }

    /// Shape as owned dims
    pub fn shape(&self) -> Vec<usize> {
        (0..self.view.ndim as usize)
            .map(|i| self.view.shape[i] as usize)
            .collect()
    }

    pub fn elem_count(&self) -> usize {
        self.shape().iter().product()
    }

    /// Shape/type signature, as fed to shape resolvers
    pub fn sig(&self) -> TypedShape {
        TypedShape::new(self.dtype, &self.shape())
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;
    use core_types::MAX_DIMS;
    use neurop_core::GpuContext;
    use pollster::block_on;

    #[test]
    fn host_tensor_view_and_dtype() {
        let shape = [2, 3, 4];
        let t: Tensor<f32> = Tensor::zeros(&shape);

        assert_eq!(t.dtype(), DataType::F32);
        assert_eq!(t.backend(), Backend::Cpu);
        assert_eq!(t.shape(), vec![2, 3, 4]);

        // shape padded to MAX_DIMS
        let mut expect_shape = [0u32; MAX_DIMS];
        for i in 0..shape.len() {
            expect_shape[i] = shape[i] as u32;
        }
        assert_eq!(t.view().shape, expect_shape);

        // strides for [2,3,4] row-major = [12,4,1]
        let mut expect_strides = [0u32; MAX_DIMS];
        expect_strides[..3].copy_from_slice(&[12, 4, 1]);
        assert_eq!(t.view().strides, expect_strides);
    }

    #[test]
    fn host_from_vec_roundtrip() {
        let data = vec![1u32, 2, 3, 4];
        let t = Tensor::from_vec(&data, &[2, 2]);
        assert_eq!(t.to_vec().unwrap(), data);
        assert_eq!(t.dtype(), DataType::U32);
        assert_eq!(t.sig(), TypedShape::of::<u32>(&[2, 2]));

        // debug formatting is part of the test-facing surface
        assert!(format!("{t:?}").contains("Host"));
    }

    #[test]
    fn device_staging_roundtrip() {
        let Ok(ctx) = block_on(GpuContext::new()) else {
            eprintln!("no GPU adapter available, skipping");
            return;
        };
        let mm = MemoryManager::new(ctx);

        let data = vec![1.5f32, 2.5, 3.5, 4.5];
        let t = Tensor::from_vec(&data, &[4]).to_device(&mm).unwrap();
        assert_eq!(t.backend(), Backend::Gpu);
        assert!(t.buffer_id().is_some());
        assert_eq!(t.download(&mm).unwrap(), data);

        let back = t.to_host(&mm).unwrap();
        assert_eq!(back.backend(), Backend::Cpu);
        assert_eq!(back.to_vec().unwrap(), data);
    }
}
