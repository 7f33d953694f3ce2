//! Gallery store — the set of known identities and their reference images.
//!
//! A gallery is a flat directory of image files; the filename stem is the
//! identity's display name. Enrollment writes a new reference image and
//! the caller reloads to observe it; a returned snapshot never
//! auto-refreshes.

use image::RgbImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Recognized reference image extensions (case-insensitive).
const GALLERY_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("gallery directory unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid identity name: {0:?}")]
    InvalidName(String),
    #[error("identity already enrolled: {0}")]
    DuplicateName(String),
    #[error("failed to persist reference image: {0}")]
    Image(#[from] image::ImageError),
}

/// A named person with one reference face image.
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub path: PathBuf,
    pub reference: RgbImage,
}

/// Snapshot of all known identities, keyed by name.
pub struct Gallery {
    root: PathBuf,
    identities: HashMap<String, Identity>,
}

impl Gallery {
    /// Scan `dir` for reference images. Non-image extensions are skipped
    /// silently; unreadable images are skipped with a warning. The
    /// directory is created if absent, and an empty directory yields an
    /// empty gallery.
    pub fn load(dir: &Path) -> Result<Self, GalleryError> {
        std::fs::create_dir_all(dir)?;

        let mut identities = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !GALLERY_EXTENSIONS.iter().any(|k| k.eq_ignore_ascii_case(ext)) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let reference = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable reference image"
                    );
                    continue;
                }
            };
            identities.insert(
                stem.to_string(),
                Identity {
                    name: stem.to_string(),
                    path: path.clone(),
                    reference,
                },
            );
        }

        tracing::info!(
            dir = %dir.display(),
            identities = identities.len(),
            "gallery loaded"
        );
        Ok(Self {
            root: dir.to_path_buf(),
            identities,
        })
    }

    /// Persist `face` as `<name>.jpg` under the gallery directory.
    ///
    /// The name must be non-empty and filesystem-safe; a name that is
    /// already enrolled (or whose file already exists on disk) is
    /// rejected rather than overwritten, so an operator typo cannot
    /// destroy an existing reference image.
    pub fn enroll(&self, name: &str, face: &RgbImage) -> Result<Identity, GalleryError> {
        let name = name.trim();
        if !is_safe_name(name) {
            return Err(GalleryError::InvalidName(name.to_string()));
        }
        if self.identities.contains_key(name) {
            return Err(GalleryError::DuplicateName(name.to_string()));
        }

        let path = self.root.join(format!("{name}.jpg"));
        if path.exists() {
            return Err(GalleryError::DuplicateName(name.to_string()));
        }

        face.save(&path)?;
        tracing::info!(name, path = %path.display(), "reference image saved");

        Ok(Identity {
            name: name.to_string(),
            path,
            reference: face.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.identities.contains_key(name)
    }

    /// Iterate identities in unspecified order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    /// Names sorted for stable listing output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.identities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A name is usable as a filename stem: non-empty, no path separators,
/// no control characters, not a directory traversal token.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name
            .chars()
            .any(|c| c.is_control() || matches!(c, '/' | '\\'))
}
