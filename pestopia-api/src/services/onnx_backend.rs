//! ONNX Runtime inference backend
//!
//! The classifier weights are exported to ONNX (single input `[1, 3, 224, 224]`,
//! single output `[1, num_classes]`). The session is guarded by a mutex because
//! ONNX Runtime needs exclusive access to run it.

use std::sync::Mutex;

use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::Session;
use ort::value::TensorRef;
use tracing::debug;

use super::classifier_service::{BackendError, Device, InferenceBackend};
use super::image_preprocessor::ImageTensor;

/// ONNX Runtime session wrapper
pub struct OnnxBackend {
    session: Mutex<Session>,
}

impl OnnxBackend {
    /// Build a session from an in-memory model blob
    ///
    /// `Auto` and `Cuda` register the CUDA execution provider with a CPU
    /// fallback; ONNX Runtime silently uses CPU when CUDA is not present.
    pub fn from_bytes(model: &[u8], device: Device) -> Result<Self, BackendError> {
        let builder = Session::builder()
            .map_err(|e| BackendError(format!("failed to create session builder: {}", e)))?;

        let builder = match device {
            Device::Cpu => {
                debug!("Creating classifier session with CPU execution provider");
                builder.with_execution_providers([CPUExecutionProvider::default().build()])
            }
            Device::Cuda(id) => {
                debug!(device_id = id, "Creating classifier session with CUDA execution provider");
                builder.with_execution_providers([
                    CUDAExecutionProvider::default().with_device_id(id).build(),
                    CPUExecutionProvider::default().build(),
                ])
            }
            Device::Auto => {
                debug!("Creating classifier session with CUDA execution provider and CPU fallback");
                builder.with_execution_providers([
                    CUDAExecutionProvider::default().build(),
                    CPUExecutionProvider::default().build(),
                ])
            }
        }
        .map_err(|e| BackendError(format!("failed to register execution provider: {}", e)))?;

        let session = builder
            .commit_from_memory(model)
            .map_err(|e| BackendError(format!("failed to load ONNX model: {}", e)))?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, BackendError> {
        let input_dims: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let input_data = input
            .as_slice()
            .ok_or_else(|| BackendError("input tensor is not contiguous in memory".to_string()))?;

        let input_tensor = TensorRef::from_array_view((input_dims, input_data))
            .map_err(|e| BackendError(format!("failed to convert input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| BackendError("failed to acquire session lock".to_string()))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| BackendError(format!("forward pass failed: {}", e)))?;

        let (_shape, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| BackendError(format!("failed to extract output tensor as f32: {}", e)))?;

        Ok(scores.to_vec())
    }
}
