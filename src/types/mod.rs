//! Core types for kycgate

mod status;
mod session;
mod image;
mod challenge;
mod outcome;

pub use status::{KycStatus, Override};
pub use session::{Embedding, Session, SessionPatch, SocialImage};
pub use image::{Image, ImageFormat};
pub use challenge::{ChallengeKind, StepOutcome};
pub use outcome::{
    AdminOutcome, DocumentOutcome, ExtractedText, FrameOutcome, ProfileCheck, SessionSummary,
    SocialOutcome, StartOutcome, Verdict,
};
