//! Session entity and its shallow-merge patch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ExtractedText, KycStatus};

/// Face embedding vector
pub type Embedding = Vec<f32>;

/// One accepted social image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialImage {
    pub id: String,
    pub name: String,
}

/// State of one verification session
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque id, fixed at creation
    pub id: String,
    pub status: KycStatus,
    /// Order the client must perform challenges in
    pub challenge_sequence: Vec<String>,
    /// Cursor into `challenge_sequence`, never past its end
    pub challenge_index: usize,
    /// One score per submitted frame, append-only
    pub liveness_scores: Vec<f64>,
    /// Most recent usable frame embedding
    pub live_embedding: Option<Embedding>,
    pub id_face_embedding: Option<Embedding>,
    pub ocr_text: Option<ExtractedText>,
    /// Distance persisted by verify
    pub match_score: Option<f64>,
    /// Best liveness score persisted by verify
    pub liveness_score: Option<f64>,
    pub social_match_score: Option<f64>,
    pub social_risk_score: Option<f64>,
    pub social_status: Option<String>,
    pub social_profile_url: Option<String>,
    /// Append-only
    pub social_images: Vec<SocialImage>,
    /// Set only by admin rejection
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session: pending, empty score lists, cursor at 0
    pub fn new(id: impl Into<String>, challenge_sequence: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: KycStatus::Pending,
            challenge_sequence,
            challenge_index: 0,
            liveness_scores: Vec::new(),
            live_embedding: None,
            id_face_embedding: None,
            ocr_text: None,
            match_score: None,
            liveness_score: None,
            social_match_score: None,
            social_risk_score: None,
            social_status: None,
            social_profile_url: None,
            social_images: Vec::new(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Every challenge has been verified
    pub fn challenges_done(&self) -> bool {
        self.challenge_index >= self.challenge_sequence.len()
    }

    /// Best liveness score seen, 0 when no frame was scored
    pub fn best_liveness(&self) -> f64 {
        self.liveness_scores
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// Apply a shallow merge: every provided field overwrites.
    ///
    /// List fields are overwritten too; callers append before patching.
    pub fn apply(&mut self, patch: SessionPatch) {
        let SessionPatch {
            status,
            challenge_index,
            liveness_scores,
            live_embedding,
            id_face_embedding,
            ocr_text,
            match_score,
            liveness_score,
            social_match_score,
            social_risk_score,
            social_status,
            social_profile_url,
            social_images,
            failure_reason,
        } = patch;

        if let Some(v) = status {
            self.status = v;
        }
        if let Some(v) = challenge_index {
            self.challenge_index = v.min(self.challenge_sequence.len());
        }
        if let Some(v) = liveness_scores {
            self.liveness_scores = v;
        }
        if let Some(v) = live_embedding {
            self.live_embedding = Some(v);
        }
        if let Some(v) = id_face_embedding {
            self.id_face_embedding = Some(v);
        }
        if let Some(v) = ocr_text {
            self.ocr_text = Some(v);
        }
        if let Some(v) = match_score {
            self.match_score = Some(v);
        }
        if let Some(v) = liveness_score {
            self.liveness_score = Some(v);
        }
        if let Some(v) = social_match_score {
            self.social_match_score = Some(v);
        }
        if let Some(v) = social_risk_score {
            self.social_risk_score = Some(v);
        }
        if let Some(v) = social_status {
            self.social_status = Some(v);
        }
        if let Some(v) = social_profile_url {
            self.social_profile_url = Some(v);
        }
        if let Some(v) = social_images {
            self.social_images = v;
        }
        if let Some(v) = failure_reason {
            self.failure_reason = Some(v);
        }
        self.updated_at = Utc::now();
    }
}

/// Fields to overwrite in one store update; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<KycStatus>,
    pub challenge_index: Option<usize>,
    pub liveness_scores: Option<Vec<f64>>,
    pub live_embedding: Option<Embedding>,
    pub id_face_embedding: Option<Embedding>,
    pub ocr_text: Option<ExtractedText>,
    pub match_score: Option<f64>,
    pub liveness_score: Option<f64>,
    pub social_match_score: Option<f64>,
    pub social_risk_score: Option<f64>,
    pub social_status: Option<String>,
    pub social_profile_url: Option<String>,
    pub social_images: Option<Vec<SocialImage>>,
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq() -> Vec<String> {
        vec!["blink".into(), "smile".into()]
    }

    #[test]
    fn test_new_session_is_pending_at_zero() {
        let s = Session::new("abc", seq());
        assert_eq!(s.status, KycStatus::Pending);
        assert_eq!(s.challenge_index, 0);
        assert!(s.liveness_scores.is_empty());
        assert!(s.social_images.is_empty());
        assert!(!s.challenges_done());
    }

    #[test]
    fn test_best_liveness_empty_is_zero() {
        let mut s = Session::new("abc", seq());
        assert_eq!(s.best_liveness(), 0.0);
        s.liveness_scores = vec![0.2, 0.95, 0.4];
        assert_eq!(s.best_liveness(), 0.95);
    }

    #[test]
    fn test_patch_overwrites_only_provided_fields() {
        let mut s = Session::new("abc", seq());
        s.liveness_scores = vec![0.5];
        s.apply(SessionPatch {
            match_score: Some(0.1),
            ..Default::default()
        });
        assert_eq!(s.match_score, Some(0.1));
        assert_eq!(s.liveness_scores, vec![0.5]);
        assert_eq!(s.status, KycStatus::Pending);
    }

    #[test]
    fn test_patch_clamps_challenge_index() {
        let mut s = Session::new("abc", seq());
        s.apply(SessionPatch {
            challenge_index: Some(10),
            ..Default::default()
        });
        assert_eq!(s.challenge_index, 2);
        assert!(s.challenges_done());
    }
}
