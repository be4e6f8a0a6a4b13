//! Runtime configuration for the pipeline and HTTP boundary

use std::time::Duration;

use crate::{
    DEFAULT_CHALLENGES, DEFAULT_CHALLENGE_COUNT, FETCH_TIMEOUT_SECS, LIVENESS_PASS_THRESHOLD,
    MATCH_THRESHOLD, MAX_BODY_BYTES, MAX_FETCH_BYTES,
};

/// Pipeline and boundary settings
#[derive(Debug, Clone)]
pub struct KycConfig {
    /// Labels `start` draws from when the caller sends no pool
    pub challenge_pool: Vec<String>,
    /// Challenges per session when the caller sends no count
    pub challenge_count: usize,
    /// Face match threshold (strict `<`)
    pub match_threshold: f64,
    /// Liveness threshold (strict `>`)
    pub liveness_threshold: f64,
    /// Social fetch timeout
    pub fetch_timeout: Duration,
    /// Cap on fetched profile pages and avatars
    pub max_fetch_bytes: usize,
    /// Cap on request bodies at the HTTP boundary
    pub max_body_bytes: usize,
    /// Required `X-API-Key` value; `None` disables the check
    pub api_key: Option<String>,
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            challenge_pool: DEFAULT_CHALLENGES.iter().map(|c| c.to_string()).collect(),
            challenge_count: DEFAULT_CHALLENGE_COUNT,
            match_threshold: MATCH_THRESHOLD,
            liveness_threshold: LIVENESS_PASS_THRESHOLD,
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
            max_fetch_bytes: MAX_FETCH_BYTES,
            max_body_bytes: MAX_BODY_BYTES,
            api_key: None,
        }
    }
}

impl KycConfig {
    /// Set the required API key (empty strings disable the check)
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }
}
