//! Embedding-based face verifier via ONNX Runtime.
//!
//! Compares two face crops by embedding each through an ArcFace-style
//! model and measuring cosine distance. Inputs are resized whole:
//! a pre-cropped probe is treated as already-a-face, never re-detected.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::types::{FaceVerifier, Verification, VerifierError};
use std::path::Path;
use thiserror::Error;

const VERIFIER_INPUT_SIZE: usize = 112;
const VERIFIER_SCALE: f32 = 127.5;

/// Default cosine-distance threshold for a positive match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.40;

#[derive(Error, Debug)]
pub enum OnnxVerifierError {
    #[error("model file not found: {0} — place the embedding ONNX file in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct OnnxVerifier {
    session: Session,
    /// Cosine-distance threshold; at or below means matched.
    match_threshold: f32,
}

impl OnnxVerifier {
    /// Load the embedding ONNX model from the given path.
    pub fn load(model_path: &str, match_threshold: f32) -> Result<Self, OnnxVerifierError> {
        if !Path::new(model_path).exists() {
            return Err(OnnxVerifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, match_threshold, "loaded face verifier model");

        Ok(Self {
            session,
            match_threshold,
        })
    }

    /// Extract an L2-normalized embedding for one face image.
    fn embed(&mut self, face: &RgbImage) -> Result<Vec<f32>, OnnxVerifierError> {
        let input = preprocess(face);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OnnxVerifierError::InferenceFailed(format!("embedding: {e}")))?;

        if raw.is_empty() {
            return Err(OnnxVerifierError::InferenceFailed(
                "empty embedding output".to_string(),
            ));
        }

        let mut values = raw.to_vec();
        l2_normalize(&mut values);
        Ok(values)
    }

    /// Compare two face images, reporting match and cosine distance.
    pub fn compare(
        &mut self,
        probe: &RgbImage,
        reference: &RgbImage,
    ) -> Result<Verification, OnnxVerifierError> {
        let probe_embedding = self.embed(probe)?;
        let reference_embedding = self.embed(reference)?;

        let distance = 1.0 - cosine_similarity(&probe_embedding, &reference_embedding);
        Ok(Verification {
            matched: distance <= self.match_threshold,
            distance,
        })
    }
}

impl FaceVerifier for OnnxVerifier {
    fn verify(
        &mut self,
        probe: &RgbImage,
        reference: &RgbImage,
    ) -> Result<Verification, VerifierError> {
        self.compare(probe, reference)
            .map_err(|e| VerifierError::Inference(e.to_string()))
    }
}

/// Preprocess a face crop into a 112×112 NCHW float tensor normalized to
/// [-1, 1].
fn preprocess(face: &RgbImage) -> Array4<f32> {
    let size = VERIFIER_INPUT_SIZE as u32;
    let resized = image::imageops::resize(face, size, size, FilterType::Triangle);

    let mut tensor =
        Array4::<f32>::zeros((1, 3, VERIFIER_INPUT_SIZE, VERIFIER_INPUT_SIZE));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                pixel[c] as f32 / VERIFIER_SCALE - 1.0;
        }
    }
    tensor
}

fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity in [-1, 1]. Higher means more similar.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = [1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn test_preprocess_shape() {
        let face = RgbImage::from_pixel(224, 224, image::Rgb([128, 128, 128]));
        let tensor = preprocess(&face);
        assert_eq!(
            tensor.shape(),
            &[1, 3, VERIFIER_INPUT_SIZE, VERIFIER_INPUT_SIZE]
        );
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let black = RgbImage::from_pixel(112, 112, image::Rgb([0, 0, 0]));
        let white = RgbImage::from_pixel(112, 112, image::Rgb([255, 255, 255]));
        assert!((preprocess(&black)[[0, 0, 0, 0]] + 1.0).abs() < 1e-6);
        assert!((preprocess(&white)[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_distance_of_identical_embeddings_is_zero() {
        let mut a = vec![0.3, -0.2, 0.9];
        let mut b = a.clone();
        l2_normalize(&mut a);
        l2_normalize(&mut b);
        let distance = 1.0 - cosine_similarity(&a, &b);
        assert!(distance.abs() < 1e-6);
        assert!(distance <= DEFAULT_MATCH_THRESHOLD);
    }
}
