/// Dynamically-typed tensor: wraps `Tensor<T>` for each supported T
#[derive(From, Debug)]
pub enum TensorAny {
    F32(Tensor<f32>),
    I32(Tensor<i32>),
    U32(Tensor<u32>),
}

impl TensorAny {
    pub fn dtype(&self) -> DataType {
        match self {
            TensorAny::F32(t) => t.dtype(),
            TensorAny::I32(t) => t.dtype(),
            TensorAny::U32(t) => t.dtype(),
        }
    }

    /// Shape/type signature, as fed to shape resolvers
    pub fn sig(&self) -> TypedShape {
        match self {
            TensorAny::F32(t) => t.sig(),
            TensorAny::I32(t) => t.sig(),
            TensorAny::U32(t) => t.sig(),
        }
    }

    /// Where the bytes live right now
    pub fn backend(&self) -> Backend {
        match self {
            TensorAny::F32(t) => t.backend(),
            TensorAny::I32(t) => t.backend(),
            TensorAny::U32(t) => t.backend(),
        }
    }

    /// The backing BufferId, for device-resident tensors
    pub fn buffer_id(&self) -> Option<BufferId> {
        match self {
            TensorAny::F32(t) => t.buffer_id(),
            TensorAny::I32(t) => t.buffer_id(),
            TensorAny::U32(t) => t.buffer_id(),
        }
    }

    /// The backing bytes, for host-resident tensors
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            TensorAny::F32(t) => t.bytes(),
            TensorAny::I32(t) => t.bytes(),
            TensorAny::U32(t) => t.bytes(),
        }
    }

    /// Zero-filled host tensor matching `sig`
    pub fn zeros(sig: &TypedShape) -> Self {
        match sig.dtype {
            DataType::F32 => Tensor::<f32>::zeros(&sig.dims).into(),
            DataType::I32 => Tensor::<i32>::zeros(&sig.dims).into(),
            DataType::U32 => Tensor::<u32>::zeros(&sig.dims).into(),
        }
    }

    /// Host tensor adopting already-materialised bytes
    pub fn from_host_bytes(bytes: Vec<u8>, sig: &TypedShape) -> Self {
        match sig.dtype {
            DataType::F32 => Tensor::<f32>::from_host_bytes(bytes, sig).into(),
            DataType::I32 => Tensor::<i32>::from_host_bytes(bytes, sig).into(),
            DataType::U32 => Tensor::<u32>::from_host_bytes(bytes, sig).into(),
        }
    }

    /// Zero-filled device tensor matching `sig`
    pub fn empty_device(mgr: &MemoryManager, sig: &TypedShape) -> Result<Self> {
        Ok(match sig.dtype {
            DataType::F32 => Tensor::<f32>::empty_device(mgr, &sig.dims)?.into(),
            DataType::I32 => Tensor::<i32>::empty_device(mgr, &sig.dims)?.into(),
            DataType::U32 => Tensor::<u32>::empty_device(mgr, &sig.dims)?.into(),
        })
    }

    /// Move to device memory (no-op when already there)
    pub fn to_device(self, mgr: &MemoryManager) -> Result<Self> {
        Ok(match self {
            TensorAny::F32(t) => t.to_device(mgr)?.into(),
            TensorAny::I32(t) => t.to_device(mgr)?.into(),
            TensorAny::U32(t) => t.to_device(mgr)?.into(),
        })
    }

    /// Move to host memory (no-op when already there)
    pub fn to_host(self, mgr: &MemoryManager) -> Result<Self> {
        Ok(match self {
            TensorAny::F32(t) => t.to_host(mgr)?.into(),
            TensorAny::I32(t) => t.to_host(mgr)?.into(),
            TensorAny::U32(t) => t.to_host(mgr)?.into(),
        })
    }
}