use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Runtime configuration. Precedence: defaults < config file <
/// `ROLLCALL_*` environment variables < CLI flags (applied by the caller).
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory of reference images; filename stems are identity names.
    pub gallery_dir: PathBuf,
    /// Directory receiving the per-day attendance CSVs.
    pub ledger_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine-distance threshold for a positive verification.
    pub match_threshold: f32,
    /// Score threshold for keeping a face detection.
    pub confidence_threshold: f32,
}

/// File-level overrides; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    camera_device: Option<String>,
    gallery_dir: Option<PathBuf>,
    ledger_dir: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    match_threshold: Option<f32>,
    confidence_threshold: Option<f32>,
}

impl Config {
    /// Load configuration. `file` comes from the CLI flag; when absent,
    /// `ROLLCALL_CONFIG` names the file; when neither is set, no file is
    /// read.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::defaults();

        let file = file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ROLLCALL_CONFIG").ok().map(PathBuf::from));
        if let Some(path) = file {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            let overrides: FileConfig =
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            config.apply_file(overrides);
            tracing::info!(path = %path.display(), "config file applied");
        }

        config.apply_env();
        Ok(config)
    }

    fn defaults() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        Self {
            camera_device: "/dev/video0".to_string(),
            gallery_dir: data_dir.join("faces"),
            ledger_dir: data_dir.join("attendance"),
            model_dir: rollcall_models::default_model_dir(),
            match_threshold: rollcall_models::verifier::DEFAULT_MATCH_THRESHOLD,
            confidence_threshold: rollcall_models::detector::DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    fn apply_file(&mut self, overrides: FileConfig) {
        if let Some(v) = overrides.camera_device {
            self.camera_device = v;
        }
        if let Some(v) = overrides.gallery_dir {
            self.gallery_dir = v;
        }
        if let Some(v) = overrides.ledger_dir {
            self.ledger_dir = v;
        }
        if let Some(v) = overrides.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = overrides.match_threshold {
            self.match_threshold = v;
        }
        if let Some(v) = overrides.confidence_threshold {
            self.confidence_threshold = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Ok(v) = std::env::var("ROLLCALL_GALLERY_DIR") {
            self.gallery_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ROLLCALL_LEDGER_DIR") {
            self.ledger_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ROLLCALL_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        self.match_threshold = env_f32("ROLLCALL_MATCH_THRESHOLD", self.match_threshold);
        self.confidence_threshold =
            env_f32("ROLLCALL_CONFIDENCE_THRESHOLD", self.confidence_threshold);
    }

    /// Path to the face detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("version-RFB-320.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face embedding model.
    pub fn verifier_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_overrides_apply() {
        let overrides: FileConfig = toml::from_str(
            r#"
            camera_device = "/dev/video7"
            match_threshold = 0.55
            "#,
        )
        .unwrap();

        let mut config = Config::defaults();
        config.apply_file(overrides);
        assert_eq!(config.camera_device, "/dev/video7");
        assert!((config.match_threshold - 0.55).abs() < 1e-6);
        // Untouched fields keep their defaults.
        assert!((config.confidence_threshold
            - rollcall_models::detector::DEFAULT_CONFIDENCE_THRESHOLD)
            .abs()
            < 1e-6);
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let parsed: Result<FileConfig, _> = toml::from_str("no_such_key = 1");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_model_paths_join_model_dir() {
        let mut config = Config::defaults();
        config.model_dir = PathBuf::from("/opt/models");
        assert_eq!(config.detector_model_path(), "/opt/models/version-RFB-320.onnx");
        assert_eq!(config.verifier_model_path(), "/opt/models/w600k_r50.onnx");
    }
}
