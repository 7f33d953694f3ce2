use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounding box for a detected face, normalized to [0, 1] relative to the
/// frame dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Relative area, used to pick the most prominent face per frame.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Verifier judgement for one probe/reference pair.
#[derive(Debug, Clone, Copy)]
pub struct Verification {
    pub matched: bool,
    /// Distance in the verifier's metric; lower means more similar.
    pub distance: f32,
}

#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("frame acquisition failed: {0}")]
    Acquisition(String),
    #[error("frame source disconnected")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("face detection failed: {0}")]
    Inference(String),
}

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("face verification failed: {0}")]
    Inference(String),
}

/// Produces frames for the session loop. A failure here is fatal: camera
/// disconnect is unrecoverable without operator action.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbImage, FrameSourceError>;
}

/// Face detection capability. Boxes are normalized to [0, 1]; order is
/// unspecified.
pub trait FaceDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Face verification capability. The probe is a pre-cropped face;
/// implementations must treat it as already-a-face and never hard-fail
/// on re-localization.
pub trait FaceVerifier {
    fn verify(
        &mut self,
        probe: &RgbImage,
        reference: &RgbImage,
    ) -> Result<Verification, VerifierError>;
}
