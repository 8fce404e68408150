//! Services for pestopia-api
//!
//! Image pipeline: preprocessor → classifier → ranking.
//! Advisory pipeline: generator → structured extractor, with the pesticide
//! lookup table as fallback.

pub mod classification_pipeline;
pub mod classifier_service;
pub mod image_preprocessor;
pub mod onnx_backend;
pub mod pesticide_lookup;
pub mod ranking_selector;
pub mod recommendation_generator;
pub mod structured_extractor;
pub mod text_generation;
pub mod weight_store;

pub use classification_pipeline::{classify_image, ClassificationError};
pub use classifier_service::{
    BackendError, ClassifierError, ClassifierService, ClassifierState, Device, InferenceBackend,
};
pub use image_preprocessor::{preprocess, ImageTensor, PreprocessError, INPUT_SIZE};
pub use onnx_backend::OnnxBackend;
pub use pesticide_lookup::{display_name, LookupError, PesticideLookup, NOT_AVAILABLE};
pub use ranking_selector::{rank, softmax, RankedPrediction, Ranking, RankingError, TOP_K};
pub use recommendation_generator::{build_prompt, RecommendationGenerator};
pub use structured_extractor::{extract_recommendation, Extraction, ParseIssue, Section};
pub use text_generation::{ChatCompletionsClient, GenerationError, TextGenerator};
pub use weight_store::{WeightSource, WeightStore, WeightStoreError};
