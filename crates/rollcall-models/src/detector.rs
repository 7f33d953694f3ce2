//! Single-shot face detector via ONNX Runtime.
//!
//! Targets UltraFace-style models (e.g. version-RFB-320): one `scores`
//! tensor `[1, N, 2]` and one `boxes` tensor `[1, N, 4]` holding corner
//! coordinates already normalized to [0, 1], which is the box space the
//! session's locator expects.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::types::{BoundingBox, DetectorError, FaceDetector};
use std::path::Path;
use thiserror::Error;

const DETECTOR_INPUT_WIDTH: usize = 320;
const DETECTOR_INPUT_HEIGHT: usize = 240;
const DETECTOR_MEAN: f32 = 127.0;
const DETECTOR_STD: f32 = 128.0;
const DETECTOR_NMS_THRESHOLD: f32 = 0.4;

/// Default score threshold for keeping a detection.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Error, Debug)]
pub enum OnnxDetectorError {
    #[error("model file not found: {0} — place the detector ONNX file in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Output tensor indices: (scores_idx, boxes_idx).
type OutputIndices = (usize, usize);

pub struct OnnxDetector {
    session: Session,
    confidence_threshold: f32,
    /// Discovered by name at load time; falls back to positional order.
    output_indices: OutputIndices,
}

impl OnnxDetector {
    /// Load the detector ONNX model from the given path.
    pub fn load(model_path: &str, confidence_threshold: f32) -> Result<Self, OnnxDetectorError> {
        if !Path::new(model_path).exists() {
            return Err(OnnxDetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded face detector model"
        );

        if output_names.len() < 2 {
            return Err(OnnxDetectorError::InferenceFailed(format!(
                "detector model requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "detector output tensor mapping");

        Ok(Self {
            session,
            confidence_threshold,
            output_indices,
        })
    }

    /// Detect faces, returning boxes normalized to [0, 1].
    pub fn detect_faces(
        &mut self,
        frame: &RgbImage,
    ) -> Result<Vec<BoundingBox>, OnnxDetectorError> {
        let input = preprocess(frame);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (scores_idx, boxes_idx) = self.output_indices;
        let (_, scores) = outputs[scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| OnnxDetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| OnnxDetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let detections = decode_predictions(scores, boxes, self.confidence_threshold);
        Ok(nms(detections, DETECTOR_NMS_THRESHOLD))
    }
}

impl FaceDetector for OnnxDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        self.detect_faces(frame)
            .map_err(|e| DetectorError::Inference(e.to_string()))
    }
}

/// Preprocess an RGB frame into a NCHW float tensor.
///
/// The model sees a fixed 320×240 view; its outputs are relative to that
/// view, so they denormalize cleanly against the original frame.
fn preprocess(frame: &RgbImage) -> Array4<f32> {
    let resized = imageops::resize(
        frame,
        DETECTOR_INPUT_WIDTH as u32,
        DETECTOR_INPUT_HEIGHT as u32,
        FilterType::Triangle,
    );

    let mut tensor =
        Array4::<f32>::zeros((1, 3, DETECTOR_INPUT_HEIGHT, DETECTOR_INPUT_WIDTH));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 - DETECTOR_MEAN) / DETECTOR_STD;
        }
    }
    tensor
}

/// Discover output tensor ordering by name ("scores"/"boxes"), falling
/// back to positional order when the names are not recognized.
fn discover_output_indices(names: &[String]) -> OutputIndices {
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");
    match (scores, boxes) {
        (Some(s), Some(b)) => (s, b),
        _ => {
            tracing::info!(
                ?names,
                "detector output names not recognized, using positional mapping [0]=scores, [1]=boxes"
            );
            (0, 1)
        }
    }
}

/// Decode `scores [1, N, 2]` and `boxes [1, N, 4]` (normalized corner
/// form) into bounding boxes above the confidence threshold.
fn decode_predictions(scores: &[f32], boxes: &[f32], threshold: f32) -> Vec<BoundingBox> {
    let num_anchors = scores.len() / 2;
    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        // [background, face] per anchor.
        let confidence = scores[idx * 2 + 1];
        if confidence <= threshold {
            continue;
        }

        let off = idx * 4;
        if off + 3 >= boxes.len() {
            continue;
        }
        let x1 = boxes[off].clamp(0.0, 1.0);
        let y1 = boxes[off + 1].clamp(0.0, 1.0);
        let x2 = boxes[off + 2].clamp(0.0, 1.0);
        let y2 = boxes[off + 3].clamp(0.0, 1.0);

        let width = x2 - x1;
        let height = y2 - y1;
        if width <= 0.0 || height <= 0.0 {
            continue;
        }

        detections.push(BoundingBox {
            x: x1,
            y: y1,
            width,
            height,
            confidence,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection-over-Union between two normalized boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter_w = (x2 - x1).max(0.0);
    let inter_h = (y2 - y1).max(0.0);
    let inter_area = inter_w * inter_h;

    let union_area = a.area() + b.area() - inter_area;
    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_bbox(0.1, 0.1, 0.5, 0.5, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_bbox(0.0, 0.0, 0.2, 0.2, 1.0);
        let b = make_bbox(0.5, 0.5, 0.2, 0.2, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = make_bbox(0.0, 0.0, 0.2, 0.2, 1.0);
        let b = make_bbox(0.1, 0.0, 0.2, 0.2, 1.0);
        // Overlap 0.1x0.2 = 0.02; union 0.04 + 0.04 - 0.02 = 0.06.
        let expected = 0.02 / 0.06;
        assert!((iou(&a, &b) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            make_bbox(0.0, 0.0, 0.5, 0.5, 0.9),
            make_bbox(0.02, 0.02, 0.5, 0.5, 0.8),
            make_bbox(0.7, 0.7, 0.2, 0.2, 0.7),
        ];
        let result = nms(detections, 0.4);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_decode_filters_by_confidence() {
        // Two anchors: one background-dominant, one face at 0.95.
        let scores = vec![0.9, 0.1, 0.05, 0.95];
        let boxes = vec![0.0, 0.0, 0.1, 0.1, 0.2, 0.2, 0.6, 0.7];
        let dets = decode_predictions(&scores, &boxes, 0.7);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].x - 0.2).abs() < 1e-6);
        assert!((dets[0].width - 0.4).abs() < 1e-6);
        assert!((dets[0].height - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_clamps_to_unit_square() {
        let scores = vec![0.0, 0.99];
        let boxes = vec![-0.1, -0.2, 1.3, 1.1];
        let dets = decode_predictions(&scores, &boxes, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].x, 0.0);
        assert_eq!(dets[0].y, 0.0);
        assert!((dets[0].width - 1.0).abs() < 1e-6);
        assert!((dets[0].height - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_drops_inverted_boxes() {
        let scores = vec![0.0, 0.99];
        let boxes = vec![0.6, 0.6, 0.4, 0.7]; // x2 < x1
        assert!(decode_predictions(&scores, &boxes, 0.5).is_empty());
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = ["boxes", "scores"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (1, 0));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = ["428", "429"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (0, 1));
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let frame = RgbImage::from_pixel(640, 480, image::Rgb([127, 127, 127]));
        let tensor = preprocess(&frame);
        assert_eq!(
            tensor.shape(),
            &[1, 3, DETECTOR_INPUT_HEIGHT, DETECTOR_INPUT_WIDTH]
        );
        // Pixel 127 normalizes to 0.0.
        assert!(tensor[[0, 0, 0, 0]].abs() < 1e-6);
    }
}
