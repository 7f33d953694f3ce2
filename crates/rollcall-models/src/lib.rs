//! rollcall-models — ONNX-backed face detection and verification.
//!
//! Implements the capability traits from `rollcall-core` with CPU
//! inference via ONNX Runtime: a single-shot detector that emits
//! normalized bounding boxes, and an embedding-based verifier that
//! compares two face crops by cosine distance.

pub mod detector;
pub mod verifier;

pub use detector::{OnnxDetector, OnnxDetectorError};
pub use verifier::{OnnxVerifier, OnnxVerifierError};

use std::path::PathBuf;

/// Default directory for ONNX model files.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}
