//! Stage results returned across the boundary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{KycStatus, Session, SocialImage};

/// A freshly started session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOutcome {
    pub session_id: String,
    pub challenge_sequence: Vec<String>,
}

/// Result of scoring one live frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutcome {
    pub liveness_score: f64,
    pub challenge_passed: bool,
    pub next_action: String,
}

/// Text pulled off an identity document.
///
/// Only `raw_text` is filled today; the structured fields are reserved and
/// always serialised as explicit nulls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub raw_text: String,
    pub full_name: Option<String>,
    pub dob: Option<String>,
    pub id_number: Option<String>,
    pub expiration: Option<String>,
    pub nationality: Option<String>,
}

impl ExtractedText {
    /// Payload with raw text and every reserved field empty
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            raw_text: text.into(),
            ..Default::default()
        }
    }
}

/// Result of a document upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub extracted_text: ExtractedText,
    /// Base64 of the cropped face region, when one was found
    pub id_face_base64: Option<String>,
}

/// Final decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Cosine distance between live and document faces
    pub match_score: f64,
    pub liveness_score_final: f64,
    pub kyc_passed: bool,
}

/// Aggregate social score written by both social calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialOutcome {
    pub social_match_score: f64,
    pub social_risk_score: f64,
    pub social_status: String,
}

/// Social profile cross-check result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCheck {
    #[serde(flatten)]
    pub score: SocialOutcome,
    pub profile_url: String,
    /// Display name from the page, or the profile url when none was found
    pub username: String,
    pub pfp_url: Option<String>,
}

/// Confirmation of an admin override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOutcome {
    pub status: KycStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: KycStatus,
    pub challenge_sequence: Vec<String>,
    pub challenge_index: usize,
    pub next_action: String,
    pub frames_scored: usize,
    pub has_live_embedding: bool,
    pub has_id_embedding: bool,
    pub match_score: Option<f64>,
    pub liveness_score: Option<f64>,
    pub social_match_score: Option<f64>,
    pub social_risk_score: Option<f64>,
    pub social_status: Option<String>,
    pub social_profile_url: Option<String>,
    pub social_images: Vec<SocialImage>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn from_session(session: &Session, next_action: String) -> Self {
        Self {
            session_id: session.id.clone(),
            status: session.status,
            challenge_sequence: session.challenge_sequence.clone(),
            challenge_index: session.challenge_index,
            next_action,
            frames_scored: session.liveness_scores.len(),
            has_live_embedding: session.live_embedding.is_some(),
            has_id_embedding: session.id_face_embedding.is_some(),
            match_score: session.match_score,
            liveness_score: session.liveness_score,
            social_match_score: session.social_match_score,
            social_risk_score: session.social_risk_score,
            social_status: session.social_status.clone(),
            social_profile_url: session.social_profile_url.clone(),
            social_images: session.social_images.clone(),
            failure_reason: session.failure_reason.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_text_fields_serialise_as_null() {
        let text = ExtractedText::raw("JANE DOE 1990");
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["raw_text"], "JANE DOE 1990");
        for field in ["full_name", "dob", "id_number", "expiration", "nationality"] {
            assert!(json.get(field).is_some(), "{} must be present", field);
            assert!(json[field].is_null());
        }
    }

    #[test]
    fn test_profile_check_flattens_score() {
        let check = ProfileCheck {
            score: SocialOutcome {
                social_match_score: 1.0,
                social_risk_score: 0.0,
                social_status: "ok".into(),
            },
            profile_url: "https://example.com/u".into(),
            username: "u".into(),
            pfp_url: None,
        };
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["social_match_score"], 1.0);
        assert_eq!(json["social_status"], "ok");
        assert!(json["pfp_url"].is_null());
    }

    #[test]
    fn test_approve_outcome_omits_reason() {
        let outcome = AdminOutcome {
            status: KycStatus::Passed,
            reason: None,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"passed"}"#);
    }
}
