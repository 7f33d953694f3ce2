//! Session controller — turns a stream of frames into idempotent
//! attendance events.
//!
//! Per frame: locate the most prominent face, try to match it against the
//! not-yet-marked gallery identities, append a ledger row on the first
//! match, and report the outcome to the annotator. Operator commands
//! (enroll the current unknown face, quit) arrive through a non-blocking
//! queue drained once per frame cycle, so the loop never stalls waiting
//! for input.
//!
//! Known limitation, by design: the marked set lives only in this
//! process. Restarting on the same day re-marks and re-appends people
//! already in the ledger; the file is append-only and never read back.

use crate::gallery::Gallery;
use crate::ledger::Ledger;
use crate::locator;
use crate::matcher::{self, MatchedIdentity};
use crate::types::{FaceDetector, FaceVerifier, FrameSource};
use image::RgbImage;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Names already credited with attendance in this run. Grows
/// monotonically; never shrinks during a run.
#[derive(Debug, Default)]
pub struct MarkedSet(HashSet<String>);

impl MarkedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: String) -> bool {
        self.0.insert(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Operator command consumed between frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Persist the most recent unknown face under the given name.
    Enroll { name: String },
    Quit,
}

/// Per-frame result reported to the annotator.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No usable face this frame.
    Scanning,
    /// A gallery identity was verified this frame.
    Matched { name: String, distance: f32 },
    /// A face was found but no unmarked identity matched it.
    Unknown,
}

/// Rendering collaborator: shown every frame's outcome and the running
/// present count. On-screen drawing is outside this crate; the CLI ships
/// a console implementation.
pub trait FrameAnnotator {
    fn annotate(&mut self, outcome: &FrameOutcome, present: usize);
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Frame acquisition failed — the only error that ends the loop.
    #[error("frame source failed: {0}")]
    Frame(#[from] crate::types::FrameSourceError),
}

/// What the session did, reported once at quit.
#[derive(Debug)]
pub struct SessionSummary {
    pub present: usize,
    pub frames: u64,
    pub ledger_path: PathBuf,
}

enum Flow {
    Continue,
    Quit,
}

/// The session state machine. Owns all mutable session state (gallery
/// snapshot, marked set, ledger handle, pending enrollment crop) and the
/// four capabilities it drives.
pub struct Session<S, D, V, A> {
    frames: S,
    detector: D,
    verifier: V,
    annotator: A,
    commands: mpsc::Receiver<SessionCommand>,
    gallery: Gallery,
    marked: MarkedSet,
    ledger: Ledger,
    /// Most recent unknown crop, retained as the enrollment candidate.
    pending_face: Option<RgbImage>,
    frames_seen: u64,
}

impl<S, D, V, A> Session<S, D, V, A>
where
    S: FrameSource,
    D: FaceDetector,
    V: FaceVerifier,
    A: FrameAnnotator,
{
    pub fn new(
        frames: S,
        detector: D,
        verifier: V,
        annotator: A,
        gallery: Gallery,
        ledger: Ledger,
        commands: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        Self {
            frames,
            detector,
            verifier,
            annotator,
            commands,
            gallery,
            marked: MarkedSet::new(),
            ledger,
            pending_face: None,
            frames_seen: 0,
        }
    }

    /// Run until the operator quits or the frame source fails.
    pub fn run(mut self) -> Result<SessionSummary, SessionError> {
        tracing::info!(
            identities = self.gallery.len(),
            ledger = %self.ledger.path().display(),
            "session started"
        );

        loop {
            let frame = self.frames.next_frame()?;
            self.frames_seen += 1;

            let outcome = self.process_frame(&frame);
            self.annotator.annotate(&outcome, self.marked.len());

            if let Flow::Quit = self.drain_commands() {
                let summary = self.finish();
                tracing::info!(present = summary.present, frames = summary.frames, "session ended");
                return Ok(summary);
            }
        }
    }

    fn finish(self) -> SessionSummary {
        SessionSummary {
            present: self.marked.len(),
            frames: self.frames_seen,
            ledger_path: self.ledger.path().to_path_buf(),
        }
    }

    fn process_frame(&mut self, frame: &RgbImage) -> FrameOutcome {
        let detections = match self.detector.detect(frame) {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(error = %err, "detector failed; skipping frame");
                return FrameOutcome::Scanning;
            }
        };

        let Some(bbox) = locator::largest_face(&detections) else {
            return FrameOutcome::Scanning;
        };
        let Some(face) = locator::crop_face(frame, bbox) else {
            // Degenerate crop from rounding at the frame edge.
            return FrameOutcome::Scanning;
        };

        if self.marked.len() == self.gallery.len() {
            // Everyone is already credited; skip the verifier sweep.
            self.pending_face = Some(face);
            return FrameOutcome::Unknown;
        }

        match matcher::match_identity(&mut self.verifier, &face, &self.gallery, &self.marked) {
            Some(matched) => self.mark_present(matched),
            None => {
                self.pending_face = Some(face);
                FrameOutcome::Unknown
            }
        }
    }

    /// Append the ledger row, then record the name as marked. On append
    /// failure the name stays unmarked so the next sighting retries;
    /// there is no separate retry path.
    fn mark_present(&mut self, matched: MatchedIdentity) -> FrameOutcome {
        let time = chrono::Local::now().time();
        match self.ledger.append(&matched.name, time) {
            Ok(()) => {
                self.marked.insert(matched.name.clone());
                tracing::info!(
                    name = %matched.name,
                    time = %time.format("%H:%M:%S"),
                    distance = matched.distance,
                    "marked present"
                );
            }
            Err(err) => {
                tracing::error!(name = %matched.name, error = %err, "ledger append failed");
            }
        }
        FrameOutcome::Matched {
            name: matched.name,
            distance: matched.distance,
        }
    }

    fn drain_commands(&mut self) -> Flow {
        loop {
            match self.commands.try_recv() {
                Ok(SessionCommand::Quit) => return Flow::Quit,
                Ok(SessionCommand::Enroll { name }) => self.enroll(&name),
                Err(mpsc::error::TryRecvError::Empty) => return Flow::Continue,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    tracing::info!("command channel closed; ending session");
                    return Flow::Quit;
                }
            }
        }
    }

    fn enroll(&mut self, name: &str) {
        let Some(face) = self.pending_face.take() else {
            tracing::warn!(name, "no unknown face to enroll");
            return;
        };

        match self.gallery.enroll(name, &face) {
            Ok(identity) => {
                tracing::info!(name = %identity.name, path = %identity.path.display(), "face enrolled");
                let root = self.gallery.root().to_path_buf();
                match Gallery::load(&root) {
                    Ok(reloaded) => self.gallery = reloaded,
                    Err(err) => {
                        tracing::error!(error = %err, "gallery reload failed; keeping previous snapshot");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(name, error = %err, "enrollment rejected");
                // Keep the crop so the operator can retry with another name.
                self.pending_face = Some(face);
            }
        }
    }
}
