//! Session status definitions

use serde::{Deserialize, Serialize};

/// Verification status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    /// Not yet decided
    #[default]
    Pending,
    /// Verified, or approved by an admin
    Passed,
    /// Rejected by the pipeline or an admin
    Failed,
}

impl KycStatus {
    /// Passed and failed are terminal for the pipeline (admins may still rewrite them)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, KycStatus::Pending)
    }
}

impl std::fmt::Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KycStatus::Pending => "pending",
            KycStatus::Passed => "passed",
            KycStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Human-review decision that bypasses the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    Approve,
    Reject { reason: String },
}

impl Override {
    /// Status the override forces
    pub fn status(&self) -> KycStatus {
        match self {
            Override::Approve => KycStatus::Passed,
            Override::Reject { .. } => KycStatus::Failed,
        }
    }
}
