//! kycgate: session state machine and decision pipeline for KYC
//!
//! start → frames → document upload → verify → optional social cross-check

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod types;

pub use config::KycConfig;
pub use error::{KycError, Result};

// =============================================================================
// DECISION THRESHOLDS
// =============================================================================

/// Cosine distance below which two faces are the same person (strict)
pub const MATCH_THRESHOLD: f64 = 0.33;

/// Best liveness score must be strictly above this to pass
pub const LIVENESS_PASS_THRESHOLD: f64 = 0.8;

/// Added to vector norms before normalisation
pub const NORM_EPSILON: f64 = 1e-8;

/// Social match score when no usable comparison exists (best case)
pub const DEFAULT_SOCIAL_MATCH: f64 = 1.0;

// =============================================================================
// CHALLENGES
// =============================================================================

/// Default challenge pool
pub const DEFAULT_CHALLENGES: [&str; 6] = [
    "blink",
    "turn_left",
    "turn_right",
    "smile",
    "raise_eyebrows",
    "touch_nose",
];

/// Challenges drawn per session
pub const DEFAULT_CHALLENGE_COUNT: usize = 3;

/// Next action once every challenge is done
pub const TERMINAL_ACTION: &str = "upload_id";

// =============================================================================
// EXTERNAL FETCH
// =============================================================================

/// Timeout for social profile and avatar fetches (seconds)
pub const FETCH_TIMEOUT_SECS: u64 = 5;

/// Largest profile page or avatar read from the network
pub const MAX_FETCH_BYTES: usize = 8 * 1024 * 1024;

/// Social status written by every social call
pub const SOCIAL_STATUS_OK: &str = "ok";

// =============================================================================
// HTTP BOUNDARY
// =============================================================================

/// Largest accepted request body; base64 document photos run to several MB
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
