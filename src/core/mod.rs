//! Core modules for kycgate

pub mod similarity;
pub mod challenge;
pub mod store;
pub mod collaborators;
pub mod pipeline;
pub mod social;
pub mod api;

pub use challenge::{AlwaysPass, ChallengeSequencer, StepEvaluator, StepResult};
pub use store::SessionStore;
pub use collaborators::{
    Collaborators, EmbeddingExtractor, FaceRegionExtractor, Fetcher, ImageDecoder,
    LivenessClassifier, TextExtractor,
};
pub use pipeline::{Policy, VerificationPipeline};
pub use social::{SocialRiskAggregator, SocialUpload};
pub use api::{create_router, router_with_state, run_server, AppState};
