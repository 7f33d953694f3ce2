//! Identity matcher — compares a cropped face against the gallery,
//! skipping identities already marked present.
//!
//! First-match policy: candidates are tried in the gallery's (unspecified)
//! iteration order and the sweep stops at the first verified match. A
//! verifier failure for one candidate is logged and treated as
//! not-matched for that candidate only; it never aborts the sweep.

use crate::gallery::{Gallery, Identity};
use crate::session::MarkedSet;
use crate::types::{FaceVerifier, VerifierError};
use image::RgbImage;

/// A gallery identity confirmed by the verifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedIdentity {
    pub name: String,
    pub distance: f32,
}

/// Outcome of verifying one gallery candidate.
enum CandidateOutcome {
    Matched { distance: f32 },
    NotMatched { distance: f32 },
    Failed(VerifierError),
}

fn check_candidate<V: FaceVerifier + ?Sized>(
    verifier: &mut V,
    face: &RgbImage,
    candidate: &Identity,
) -> CandidateOutcome {
    match verifier.verify(face, &candidate.reference) {
        Ok(v) if v.matched => CandidateOutcome::Matched {
            distance: v.distance,
        },
        Ok(v) => CandidateOutcome::NotMatched {
            distance: v.distance,
        },
        Err(err) => CandidateOutcome::Failed(err),
    }
}

/// Find the first not-yet-marked identity the verifier confirms for
/// `face`. Returns `None` when no candidate matches or none remain.
pub fn match_identity<V: FaceVerifier + ?Sized>(
    verifier: &mut V,
    face: &RgbImage,
    gallery: &Gallery,
    marked: &MarkedSet,
) -> Option<MatchedIdentity> {
    for candidate in gallery.identities() {
        if marked.contains(&candidate.name) {
            continue;
        }

        match check_candidate(verifier, face, candidate) {
            CandidateOutcome::Matched { distance } => {
                tracing::debug!(name = %candidate.name, distance, "candidate verified");
                return Some(MatchedIdentity {
                    name: candidate.name.clone(),
                    distance,
                });
            }
            CandidateOutcome::NotMatched { distance } => {
                tracing::trace!(name = %candidate.name, distance, "candidate rejected");
            }
            CandidateOutcome::Failed(err) => {
                tracing::warn!(
                    name = %candidate.name,
                    error = %err,
                    "verifier failed for candidate; continuing"
                );
            }
        }
    }
    None
}
