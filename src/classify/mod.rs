//! Classification module
//!
//! This module consolidates:
//! - Canvas to input tensor conversion (tensor.rs)
//! - The frozen classifier and its ONNX backend (engine.rs)
//! - Background execution of forward passes (worker.rs)

pub mod engine;
pub mod tensor;
pub mod worker;

pub use engine::{ClassifierEngine, GestureModel, OnnxModel};
pub use tensor::{InputTensor, TensorBuilder};
pub use worker::InferenceWorker;
