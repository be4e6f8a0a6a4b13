//! Challenge labels and step results

use serde::{Deserialize, Serialize};

/// Physical action a subject performs on camera.
///
/// Labels outside the built-in set are carried as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    Blink,
    TurnLeft,
    TurnRight,
    Smile,
    RaiseEyebrows,
    TouchNose,
    Custom(String),
}

impl ChallengeKind {
    /// Parse a wire label
    pub fn from_label(label: &str) -> Self {
        match label {
            "blink" => Self::Blink,
            "turn_left" => Self::TurnLeft,
            "turn_right" => Self::TurnRight,
            "smile" => Self::Smile,
            "raise_eyebrows" => Self::RaiseEyebrows,
            "touch_nose" => Self::TouchNose,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Wire label
    pub fn label(&self) -> &str {
        match self {
            Self::Blink => "blink",
            Self::TurnLeft => "turn_left",
            Self::TurnRight => "turn_right",
            Self::Smile => "smile",
            Self::RaiseEyebrows => "raise_eyebrows",
            Self::TouchNose => "touch_nose",
            Self::Custom(label) => label,
        }
    }
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of evaluating one challenge step against a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Passed,
    Failed,
    /// Not enough signal in the frame to decide
    Inconclusive,
}

impl StepOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, StepOutcome::Passed)
    }
}
