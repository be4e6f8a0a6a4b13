//! Verification Pipeline: drives one session from challenges to verdict
//!
//! Stage order: start → frame* → document → verify. Every stage needs an
//! existing session and either commits one atomic store mutation or fails
//! before touching the session. Inference runs on the blocking pool.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::challenge::ChallengeSequencer;
use crate::core::collaborators::{encode_base64, run_blocking, Collaborators};
use crate::core::similarity;
use crate::core::store::SessionStore;
use crate::error::{KycError, Result};
use crate::types::{
    AdminOutcome, DocumentOutcome, FrameOutcome, Image, KycStatus, Override, SessionSummary,
    StartOutcome, Verdict,
};
use crate::KycConfig;

/// Thresholds for the final decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    /// Distance must be strictly below
    pub match_threshold: f64,
    /// Best liveness must be strictly above
    pub liveness_threshold: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            match_threshold: crate::MATCH_THRESHOLD,
            liveness_threshold: crate::LIVENESS_PASS_THRESHOLD,
        }
    }
}

impl Policy {
    pub fn from_config(config: &KycConfig) -> Self {
        Self {
            match_threshold: config.match_threshold,
            liveness_threshold: config.liveness_threshold,
        }
    }

    /// All three conjuncts must hold; there is no partial credit.
    ///
    /// `liveness_scores` empty counts as a best score of 0.
    pub fn decide(&self, liveness_scores: &[f64], distance: f64, challenges_done: bool) -> Verdict {
        let liveness_score_final = liveness_scores
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.0);
        let kyc_passed = liveness_score_final > self.liveness_threshold
            && similarity::is_match(distance, self.match_threshold)
            && challenges_done;

        Verdict {
            match_score: distance,
            liveness_score_final,
            kyc_passed,
        }
    }
}

/// Session orchestrator
#[derive(Debug)]
pub struct VerificationPipeline {
    store: Arc<SessionStore>,
    collaborators: Collaborators,
    sequencer: ChallengeSequencer,
    config: KycConfig,
    policy: Policy,
}

impl VerificationPipeline {
    pub fn new(store: Arc<SessionStore>, collaborators: Collaborators, config: KycConfig) -> Self {
        let policy = Policy::from_config(&config);
        Self {
            store,
            collaborators,
            sequencer: ChallengeSequencer::new(),
            config,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn config(&self) -> &KycConfig {
        &self.config
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Decode raw bytes through the configured decoder
    pub fn decode(&self, bytes: &[u8]) -> Result<Image> {
        self.collaborators.decoder.decode(bytes)
    }

    /// Create a session with a fresh challenge sequence.
    ///
    /// Falls back to the configured pool and count when either is absent.
    pub async fn start(&self, pool: Option<Vec<String>>, count: Option<usize>) -> Result<StartOutcome> {
        let pool = pool.unwrap_or_else(|| self.config.challenge_pool.clone());
        let count = count.unwrap_or(self.config.challenge_count);
        let challenge_sequence = self.sequencer.generate(&pool, count)?;
        let session_id = self.store.create(challenge_sequence.clone()).await;

        info!(session_id = %session_id, challenges = ?challenge_sequence, "session started");
        Ok(StartOutcome {
            session_id,
            challenge_sequence,
        })
    }

    /// Score one live frame and advance the challenge cursor.
    pub async fn process_frame(&self, id: &str, frame: Image) -> Result<FrameOutcome> {
        self.store.require(id).await?;

        let liveness = Arc::clone(&self.collaborators.liveness);
        let embedder = Arc::clone(&self.collaborators.embedder);
        let (frame, liveness_score, embedding) = run_blocking("frame", move || {
            let score = liveness.predict(&frame)?;
            if !score.is_finite() {
                return Err(KycError::CollaboratorUnavailable(format!(
                    "liveness classifier returned {score}"
                )));
            }
            let embedding = embedder.extract(&frame)?;
            Ok((frame, score, embedding))
        })
        .await?;

        let sequencer = self.sequencer;
        let evaluator = Arc::clone(&self.collaborators.step_evaluator);
        let has_embedding = embedding.is_some();
        let outcome = self
            .store
            .modify(id, |session| {
                let step = sequencer.verify_step(
                    &session.challenge_sequence,
                    session.challenge_index,
                    &frame,
                    evaluator.as_ref(),
                );
                session.liveness_scores.push(liveness_score);
                session.challenge_index = step.index;
                if let Some(embedding) = embedding {
                    session.live_embedding = Some(embedding);
                }
                Ok(FrameOutcome {
                    liveness_score,
                    challenge_passed: step.passed,
                    next_action: step.next_action,
                })
            })
            .await?;

        info!(
            session_id = %id,
            liveness_score,
            challenge_passed = outcome.challenge_passed,
            next_action = %outcome.next_action,
            face = has_embedding,
            "frame processed"
        );
        Ok(outcome)
    }

    /// Extract text and the document face, store its embedding.
    pub async fn upload_document(&self, id: &str, image: Image) -> Result<DocumentOutcome> {
        self.store.require(id).await?;

        let text = Arc::clone(&self.collaborators.text);
        let face_region = Arc::clone(&self.collaborators.face_region);
        let embedder = Arc::clone(&self.collaborators.embedder);
        let (extracted_text, face, embedding) = run_blocking("document", move || {
            let extracted = text.extract(&image)?;
            let face = face_region.extract_face(&image)?;
            let embedding = match &face {
                Some(face) => embedder.extract(face)?,
                None => None,
            };
            Ok((extracted, face, embedding))
        })
        .await?;

        if face.is_some() && embedding.is_none() {
            warn!(session_id = %id, "document face found but no embedding extracted");
        }

        let has_embedding = embedding.is_some();
        let stored_text = extracted_text.clone();
        self.store
            .modify(id, |session| {
                if let Some(embedding) = embedding {
                    session.id_face_embedding = Some(embedding);
                }
                session.ocr_text = Some(stored_text);
                Ok(())
            })
            .await?;

        info!(
            session_id = %id,
            text_len = extracted_text.raw_text.len(),
            face = face.is_some(),
            embedding = has_embedding,
            "document uploaded"
        );
        Ok(DocumentOutcome {
            extracted_text,
            id_face_base64: face.as_ref().map(encode_base64),
        })
    }

    /// Combine stored signals into the final verdict.
    ///
    /// The status moves only out of pending; a session an earlier verify or
    /// an admin already decided keeps its status, while scores are refreshed.
    pub async fn verify(&self, id: &str) -> Result<Verdict> {
        let policy = self.policy;
        let (verdict, status) = self
            .store
            .modify(id, |session| {
                let (Some(live), Some(document)) =
                    (&session.live_embedding, &session.id_face_embedding)
                else {
                    return Err(KycError::MissingPrerequisite);
                };
                let distance = similarity::distance(live, document)?;
                let verdict =
                    policy.decide(&session.liveness_scores, distance, session.challenges_done());

                if !session.status.is_terminal() {
                    session.status = if verdict.kyc_passed {
                        KycStatus::Passed
                    } else {
                        KycStatus::Failed
                    };
                }
                session.match_score = Some(verdict.match_score);
                session.liveness_score = Some(verdict.liveness_score_final);
                Ok((verdict, session.status))
            })
            .await?;

        info!(
            session_id = %id,
            match_score = verdict.match_score,
            liveness = verdict.liveness_score_final,
            kyc_passed = verdict.kyc_passed,
            status = %status,
            "session verified"
        );
        Ok(verdict)
    }

    /// Force the final status, bypassing every pipeline rule.
    pub async fn admin_override(&self, id: &str, decision: Override) -> Result<AdminOutcome> {
        let status = decision.status();
        let reason = match &decision {
            Override::Approve => None,
            Override::Reject { reason } => Some(reason.clone()),
        };

        let previous = self
            .store
            .modify(id, |session| {
                let previous = session.status;
                session.status = status;
                if let Some(reason) = &reason {
                    session.failure_reason = Some(reason.clone());
                }
                Ok(previous)
            })
            .await?;

        warn!(
            session_id = %id,
            from = %previous,
            to = %status,
            reason = reason.as_deref().unwrap_or(""),
            "admin override applied"
        );
        Ok(AdminOutcome { status, reason })
    }

    /// Status lookup by user id.
    ///
    /// Not tied to the session store: every user reads as pending.
    pub fn status(&self, user_id: &str) -> KycStatus {
        debug!(user_id = %user_id, "status lookup");
        KycStatus::Pending
    }

    /// Read-only view of one session
    pub async fn summary(&self, id: &str) -> Result<SessionSummary> {
        let session = self
            .store
            .get(id)
            .await
            .ok_or_else(|| KycError::SessionNotFound(id.to_string()))?;
        let next_action = self
            .sequencer
            .next_action(&session.challenge_sequence, session.challenge_index);
        Ok(SessionSummary::from_session(&session, next_action))
    }
}
