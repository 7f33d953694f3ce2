//! rollcall-core — the attendance session engine.
//!
//! Owns the gallery of known identities, the per-day attendance ledger,
//! the face locator and identity matcher, and the session state machine
//! that ties them together. Camera capture and ONNX inference live in
//! sibling crates behind the capability traits defined in [`types`].

pub mod gallery;
pub mod ledger;
pub mod locator;
pub mod matcher;
pub mod session;
pub mod types;

pub use gallery::{Gallery, GalleryError, Identity};
pub use ledger::{Ledger, LedgerError};
pub use matcher::MatchedIdentity;
pub use session::{
    FrameAnnotator, FrameOutcome, MarkedSet, Session, SessionCommand, SessionError,
    SessionSummary,
};
pub use types::{
    BoundingBox, DetectorError, FaceDetector, FaceVerifier, FrameSource, FrameSourceError,
    Verification, VerifierError,
};
