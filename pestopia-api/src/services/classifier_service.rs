//! Classifier service
//!
//! Owns the inference backend, the compute device and the class labels for the
//! whole process lifetime.
//!
//! State machine: `Uninitialized → Loading → {Ready | Unavailable}`. Loading
//! runs at most once; both outcomes are terminal. A failed load is never
//! retried from inside the service, so every later `classify` call fails fast
//! with [`ClassifierError::ModelUnavailable`] until the process is restarted.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::Array4;
use pestopia_common::ClassLabels;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::image_preprocessor::{ImageTensor, INPUT_SIZE};
use super::onnx_backend::OnnxBackend;
use super::weight_store::WeightStore;

/// Classifier errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Model never loaded or failed to load
    #[error("Model is not loaded: {0}")]
    ModelUnavailable(String),

    /// Backend failed while running a loaded model
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Error raised by an inference backend
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// A loaded model able to score one preprocessed image
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier for logs (e.g. "onnx")
    fn name(&self) -> &str;

    /// Run the model on a `[1, 3, H, W]` tensor, returning one raw score per class
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, BackendError>;
}

/// Lifecycle state reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierState {
    Uninitialized,
    Loading,
    Ready,
    Unavailable,
}

/// Compute device placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// CUDA when the runtime has it, CPU otherwise
    Auto,
    Cpu,
    Cuda(i32),
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:") {
                Some(id) => id
                    .parse::<i32>()
                    .ok()
                    .filter(|id| *id >= 0)
                    .map(Device::Cuda)
                    .ok_or_else(|| format!("Invalid CUDA device id in '{}'", s)),
                None => Err(format!(
                    "Unknown device: {}. Use auto, cpu, cuda or cuda:<id>",
                    s
                )),
            },
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

enum LoadOutcome {
    Ready(Box<dyn InferenceBackend>),
    Unavailable(String),
}

/// Process-wide classifier
pub struct ClassifierService {
    labels: ClassLabels,
    device: Device,
    loading: AtomicBool,
    outcome: OnceCell<LoadOutcome>,
}

impl ClassifierService {
    pub fn new(labels: ClassLabels, device: Device) -> Self {
        Self {
            labels,
            device,
            loading: AtomicBool::new(false),
            outcome: OnceCell::new(),
        }
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn state(&self) -> ClassifierState {
        match self.outcome.get() {
            Some(LoadOutcome::Ready(_)) => ClassifierState::Ready,
            Some(LoadOutcome::Unavailable(_)) => ClassifierState::Unavailable,
            None if self.loading.load(Ordering::SeqCst) => ClassifierState::Loading,
            None => ClassifierState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ClassifierState::Ready
    }

    /// Why the classifier cannot serve, if it cannot
    pub fn unavailable_reason(&self) -> Option<String> {
        match self.outcome.get() {
            Some(LoadOutcome::Ready(_)) => None,
            Some(LoadOutcome::Unavailable(reason)) => Some(reason.clone()),
            None => Some("classifier has not finished loading".to_string()),
        }
    }

    /// Load ONNX weights from the weight store
    pub async fn initialize(&self, store: &WeightStore) -> ClassifierState {
        info!(source = ?store.source(), "Fetching classifier weights");
        self.initialize_with(|device| async move {
            let bytes = store.fetch().await.map_err(|e| e.to_string())?;
            let backend = OnnxBackend::from_bytes(&bytes, device).map_err(|e| e.to_string())?;
            Ok(Box::new(backend) as Box<dyn InferenceBackend>)
        })
        .await
    }

    /// Load the backend with a caller-supplied loader
    ///
    /// The loader runs at most once per service. After it returns, a warm-up
    /// pass checks that the model emits exactly one score per label; a
    /// mismatch makes the service Unavailable just like a load failure.
    pub async fn initialize_with<F, Fut>(&self, load: F) -> ClassifierState
    where
        F: FnOnce(Device) -> Fut,
        Fut: Future<Output = Result<Box<dyn InferenceBackend>, String>>,
    {
        let device = self.device;
        self.outcome
            .get_or_init(|| async move {
                self.loading.store(true, Ordering::SeqCst);
                info!(device = %device, classes = self.labels.len(), "Loading classifier");

                let outcome = match load(device).await {
                    Ok(backend) => match self.warm_up(backend.as_ref()) {
                        Ok(()) => {
                            info!(backend = backend.name(), device = %device, "Classifier ready");
                            LoadOutcome::Ready(backend)
                        }
                        Err(reason) => {
                            error!("Classifier unavailable: {}", reason);
                            LoadOutcome::Unavailable(reason)
                        }
                    },
                    Err(reason) => {
                        error!("Classifier unavailable: {}", reason);
                        LoadOutcome::Unavailable(reason)
                    }
                };

                self.loading.store(false, Ordering::SeqCst);
                outcome
            })
            .await;

        self.state()
    }

    fn warm_up(&self, backend: &dyn InferenceBackend) -> Result<(), String> {
        let size = INPUT_SIZE as usize;
        let probe = Array4::<f32>::zeros((1, 3, size, size));
        let scores = backend
            .forward(&probe)
            .map_err(|e| format!("warm-up inference failed: {}", e))?;

        if scores.len() != self.labels.len() {
            return Err(format!(
                "model output has {} classes but {} labels are configured",
                scores.len(),
                self.labels.len()
            ));
        }
        Ok(())
    }

    /// Raw (unnormalized) class scores for one preprocessed image
    ///
    /// Blocks for the duration of inference; call from a blocking task.
    pub fn classify(&self, input: &ImageTensor) -> Result<Vec<f32>, ClassifierError> {
        match self.outcome.get() {
            Some(LoadOutcome::Ready(backend)) => backend
                .forward(input)
                .map_err(|e| ClassifierError::Inference(e.to_string())),
            Some(LoadOutcome::Unavailable(reason)) => {
                Err(ClassifierError::ModelUnavailable(reason.clone()))
            }
            None => Err(ClassifierError::ModelUnavailable(
                "classifier has not finished loading".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct FixedScores(Vec<f32>);

    impl InferenceBackend for FixedScores {
        fn name(&self) -> &str {
            "fixed"
        }

        fn forward(&self, _input: &ImageTensor) -> Result<Vec<f32>, BackendError> {
            Ok(self.0.clone())
        }
    }

    fn labels(n: usize) -> ClassLabels {
        ClassLabels::new((0..n).map(|i| format!("pest-{}", i)).collect()).unwrap()
    }

    fn probe() -> ImageTensor {
        Array4::zeros((1, 3, 224, 224))
    }

    #[tokio::test]
    async fn test_starts_uninitialized_and_refuses_to_classify() {
        let service = ClassifierService::new(labels(4), Device::Cpu);
        assert_eq!(service.state(), ClassifierState::Uninitialized);
        assert!(matches!(
            service.classify(&probe()),
            Err(ClassifierError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_load_becomes_ready() {
        let service = ClassifierService::new(labels(4), Device::Cpu);
        let state = service
            .initialize_with(|_| async {
                Ok(Box::new(FixedScores(vec![0.1, 0.2, 0.3, 0.4])) as Box<dyn InferenceBackend>)
            })
            .await;

        assert_eq!(state, ClassifierState::Ready);
        assert!(service.is_ready());
        assert_eq!(service.unavailable_reason(), None);
        assert_eq!(service.classify(&probe()).unwrap(), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[tokio::test]
    async fn test_load_failure_is_terminal_and_never_retried() {
        let service = ClassifierService::new(labels(4), Device::Cpu);
        let attempts = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let attempts = attempts.clone();
            let state = service
                .initialize_with(move |_| async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<Box<dyn InferenceBackend>, _>("weight file not found".to_string())
                })
                .await;
            assert_eq!(state, ClassifierState::Unavailable);
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        for _ in 0..3 {
            match service.classify(&probe()) {
                Err(ClassifierError::ModelUnavailable(reason)) => {
                    assert!(reason.contains("weight file not found"))
                }
                other => panic!("expected ModelUnavailable, got {:?}", other.map(|v| v.len())),
            }
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_service_ignores_later_loaders() {
        let service = ClassifierService::new(labels(2), Device::Cpu);
        service
            .initialize_with(|_| async {
                Ok(Box::new(FixedScores(vec![1.0, 2.0])) as Box<dyn InferenceBackend>)
            })
            .await;

        let state = service
            .initialize_with(|_| async { Err::<Box<dyn InferenceBackend>, _>("boom".to_string()) })
            .await;

        assert_eq!(state, ClassifierState::Ready);
        assert_eq!(service.classify(&probe()).unwrap(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_output_shape_mismatch_makes_service_unavailable() {
        let service = ClassifierService::new(labels(132), Device::Cpu);
        let state = service
            .initialize_with(|_| async {
                Ok(Box::new(FixedScores(vec![0.0; 1000])) as Box<dyn InferenceBackend>)
            })
            .await;

        assert_eq!(state, ClassifierState::Unavailable);
        let reason = service.unavailable_reason().unwrap();
        assert!(reason.contains("1000"), "reason should mention model width: {}", reason);
    }

    #[tokio::test]
    async fn test_loader_receives_configured_device() {
        let service = ClassifierService::new(labels(1), Device::Cuda(1));
        let state = service
            .initialize_with(|device| async move {
                assert_eq!(device, Device::Cuda(1));
                Ok(Box::new(FixedScores(vec![0.5])) as Box<dyn InferenceBackend>)
            })
            .await;
        assert_eq!(state, ClassifierState::Ready);
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("auto".parse::<Device>().unwrap(), Device::Auto);
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("cuda:-1".parse::<Device>().is_err());
        assert!("tpu".parse::<Device>().is_err());
        assert_eq!(Device::Cuda(3).to_string(), "cuda:3");
    }
}
