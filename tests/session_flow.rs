//! Integration tests for the session lifecycle
//!
//! start → frames → document → verify, plus admin overrides

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{image, Fakes};
use kycgate::core::{SessionStore, VerificationPipeline};
use kycgate::types::{KycStatus, Override};
use kycgate::{KycConfig, KycError, TERMINAL_ACTION};
use pretty_assertions::assert_eq;

fn pipeline(fakes: Fakes) -> VerificationPipeline {
    VerificationPipeline::new(
        Arc::new(SessionStore::new()),
        fakes.build(),
        KycConfig::default(),
    )
}

fn pool() -> Vec<String> {
    ["a", "b", "c", "d", "e", "f"].iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_start_draws_three_distinct_from_pool() {
    let p = pipeline(Fakes::new());
    let started = p.start(Some(pool()), Some(3)).await.unwrap();

    assert_eq!(started.challenge_sequence.len(), 3);
    let unique: HashSet<_> = started.challenge_sequence.iter().collect();
    assert_eq!(unique.len(), 3);
    assert!(started.challenge_sequence.iter().all(|c| pool().contains(c)));

    let session = p.store().get(&started.session_id).await.unwrap();
    assert_eq!(session.challenge_index, 0);
    assert_eq!(session.status, KycStatus::Pending);
    assert_eq!(session.challenge_sequence, started.challenge_sequence);
}

#[tokio::test]
async fn test_start_rejects_oversized_count() {
    let p = pipeline(Fakes::new());
    let err = p.start(Some(pool()), Some(7)).await.unwrap_err();
    assert!(matches!(err, KycError::InvalidRequest(_)));
    assert_eq!(p.store().len().await, 0);
}

#[tokio::test]
async fn test_three_frames_complete_three_challenges() {
    let p = pipeline(Fakes::new().face("live", vec![1.0, 0.0]));
    let started = p.start(Some(pool()), Some(3)).await.unwrap();
    let id = started.session_id;
    let seq = started.challenge_sequence;

    let mut actions = Vec::new();
    for _ in 0..3 {
        let outcome = p.process_frame(&id, image("live")).await.unwrap();
        assert!(outcome.challenge_passed);
        actions.push(outcome.next_action);
    }
    assert_eq!(actions, vec![seq[1].clone(), seq[2].clone(), TERMINAL_ACTION.to_string()]);

    let session = p.store().get(&id).await.unwrap();
    assert_eq!(session.challenge_index, 3);
    assert_eq!(session.liveness_scores.len(), 3);
    assert_eq!(session.live_embedding, Some(vec![1.0, 0.0]));
}

#[tokio::test]
async fn test_cursor_monotonic_and_bounded() {
    let p = pipeline(Fakes::new());
    let id = p.start(Some(pool()), Some(2)).await.unwrap().session_id;

    let mut last = 0;
    for _ in 0..6 {
        p.process_frame(&id, image("frame")).await.unwrap();
        let index = p.store().get(&id).await.unwrap().challenge_index;
        assert!(index >= last);
        assert!(index <= 2);
        last = index;
    }

    let outcome = p.process_frame(&id, image("frame")).await.unwrap();
    assert!(!outcome.challenge_passed);
    assert_eq!(outcome.next_action, TERMINAL_ACTION);

    let session = p.store().get(&id).await.unwrap();
    assert_eq!(session.challenge_index, 2);
    assert_eq!(session.liveness_scores.len(), 7);
}

#[tokio::test]
async fn test_live_embedding_most_recent_wins() {
    let p = pipeline(
        Fakes::new()
            .face("first", vec![1.0, 0.0])
            .face("second", vec![0.0, 1.0]),
    );
    let id = p.start(None, None).await.unwrap().session_id;

    p.process_frame(&id, image("first")).await.unwrap();
    p.process_frame(&id, image("second")).await.unwrap();
    p.process_frame(&id, image("no-face")).await.unwrap();

    let session = p.store().get(&id).await.unwrap();
    assert_eq!(session.live_embedding, Some(vec![0.0, 1.0]));
}

#[tokio::test]
async fn test_collaborator_failure_leaves_session_untouched() {
    let p = pipeline(Fakes::new());
    let id = p.start(None, None).await.unwrap().session_id;

    let err = p.process_frame(&id, image("broken")).await.unwrap_err();
    assert!(matches!(err, KycError::CollaboratorUnavailable(_)));

    let session = p.store().get(&id).await.unwrap();
    assert_eq!(session.challenge_index, 0);
    assert!(session.liveness_scores.is_empty());
}

#[tokio::test]
async fn test_document_upload_stores_embedding_and_text() {
    let p = pipeline(Fakes::new().face("passport", vec![0.5, 0.5]));
    let id = p.start(None, None).await.unwrap().session_id;

    let outcome = p.upload_document(&id, image("passport")).await.unwrap();
    assert_eq!(outcome.extracted_text.raw_text, "DOC passport");
    assert!(outcome.extracted_text.full_name.is_none());
    assert!(outcome.id_face_base64.is_some());

    let session = p.store().get(&id).await.unwrap();
    assert_eq!(session.id_face_embedding, Some(vec![0.5, 0.5]));
    assert_eq!(session.ocr_text.unwrap().raw_text, "DOC passport");
}

#[tokio::test]
async fn test_verify_prerequisites() {
    let p = pipeline(
        Fakes::new()
            .face("live", vec![1.0, 0.0, 0.0])
            .face("doc", vec![1.0, 0.0, 0.0]),
    );
    let id = p.start(None, None).await.unwrap().session_id;

    assert!(matches!(p.verify(&id).await, Err(KycError::MissingPrerequisite)));
    p.upload_document(&id, image("doc")).await.unwrap();
    assert!(matches!(p.verify(&id).await, Err(KycError::MissingPrerequisite)));

    p.process_frame(&id, image("live")).await.unwrap();
    let verdict = p.verify(&id).await.unwrap();
    assert!(verdict.match_score.abs() < 1e-6);
    // one frame of three challenges
    assert!(!verdict.kyc_passed);

    for _ in 0..3 {
        assert!(p.verify(&id).await.is_ok());
    }
}

#[tokio::test]
async fn test_verify_persists_scores_and_status() {
    let p = pipeline(
        Fakes::new()
            .face("live", vec![1.0, 0.0])
            .face("doc", vec![1.0, 0.05])
            .liveness("live", 0.97),
    );
    let id = p.start(None, None).await.unwrap().session_id;
    for _ in 0..3 {
        p.process_frame(&id, image("live")).await.unwrap();
    }
    p.upload_document(&id, image("doc")).await.unwrap();

    let verdict = p.verify(&id).await.unwrap();
    assert!(verdict.kyc_passed);
    assert_eq!(verdict.liveness_score_final, 0.97);

    let session = p.store().get(&id).await.unwrap();
    assert_eq!(session.status, KycStatus::Passed);
    assert_eq!(session.match_score, Some(verdict.match_score));
    assert_eq!(session.liveness_score, Some(0.97));
}

#[tokio::test]
async fn test_admin_override_is_unconditional_and_idempotent() {
    let p = pipeline(Fakes::new());
    let id = p.start(None, None).await.unwrap().session_id;

    for _ in 0..2 {
        let outcome = p.admin_override(&id, Override::Approve).await.unwrap();
        assert_eq!(outcome.status, KycStatus::Passed);
        assert_eq!(p.store().get(&id).await.unwrap().status, KycStatus::Passed);
    }

    let reject = Override::Reject {
        reason: "document mismatch".into(),
    };
    for _ in 0..2 {
        let outcome = p.admin_override(&id, reject.clone()).await.unwrap();
        assert_eq!(outcome.status, KycStatus::Failed);
        assert_eq!(outcome.reason.as_deref(), Some("document mismatch"));
    }
    let session = p.store().get(&id).await.unwrap();
    assert_eq!(session.status, KycStatus::Failed);
    assert_eq!(session.failure_reason.as_deref(), Some("document mismatch"));
}

#[tokio::test]
async fn test_pipeline_verdict_does_not_undo_admin_decision() {
    let p = pipeline(
        Fakes::new()
            .face("live", vec![1.0, 0.0])
            .face("doc", vec![0.0, 1.0]),
    );
    let id = p.start(None, None).await.unwrap().session_id;
    p.process_frame(&id, image("live")).await.unwrap();
    p.upload_document(&id, image("doc")).await.unwrap();
    p.admin_override(&id, Override::Approve).await.unwrap();

    let verdict = p.verify(&id).await.unwrap();
    assert!(!verdict.kyc_passed);
    assert_eq!(p.store().get(&id).await.unwrap().status, KycStatus::Passed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_frames_on_one_session() {
    let p = Arc::new(pipeline(Fakes::new().face("live", vec![1.0, 0.0])));
    let id = p.start(None, None).await.unwrap().session_id;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let p = Arc::clone(&p);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            p.process_frame(&id, image("live")).await.unwrap()
        }));
    }
    let mut passed = 0;
    for handle in handles {
        if handle.await.unwrap().challenge_passed {
            passed += 1;
        }
    }

    let session = p.store().get(&id).await.unwrap();
    assert_eq!(passed, 3);
    assert_eq!(session.challenge_index, 3);
    assert_eq!(session.liveness_scores.len(), 12);
}

#[tokio::test]
async fn test_summary_reports_progress() {
    let p = pipeline(Fakes::new().face("live", vec![1.0]));
    let started = p.start(None, None).await.unwrap();
    p.process_frame(&started.session_id, image("live")).await.unwrap();

    let summary = p.summary(&started.session_id).await.unwrap();
    assert_eq!(summary.challenge_index, 1);
    assert_eq!(summary.next_action, started.challenge_sequence[1]);
    assert_eq!(summary.frames_scored, 1);
    assert!(summary.has_live_embedding);
    assert!(!summary.has_id_embedding);
}
