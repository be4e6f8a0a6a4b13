//! Social Risk Aggregator: cross-checks the live face against social images
//!
//! Social signals are supplementary. Anything that goes wrong while scoring
//! an image falls back to the best-case score instead of failing the call;
//! only an unreachable profile page is an error.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::collaborators::{run_blocking, Collaborators};
use crate::core::similarity;
use crate::core::store::SessionStore;
use crate::error::{KycError, Result};
use crate::types::{Embedding, ProfileCheck, SocialImage, SocialOutcome};
use crate::{DEFAULT_SOCIAL_MATCH, SOCIAL_STATUS_OK};

lazy_static! {
    static ref RE_OG_IMAGE: Regex = Regex::new(
        r#"(?i)property\s*=\s*["']og:image["'][^>]*?content\s*=\s*["']([^"']+)["']"#
    ).unwrap();

    static ref RE_OG_TITLE: Regex = Regex::new(
        r#"(?i)property\s*=\s*["']og:title["'][^>]*?content\s*=\s*["']([^"']+)["']"#
    ).unwrap();
}

/// One uploaded social image
#[derive(Debug, Clone)]
pub struct SocialUpload {
    pub name: String,
    pub data: Vec<u8>,
}

/// Worst similarity wins; no usable image means best case.
///
/// Returns `(match_score, risk_score)` with `risk = 1 − min(1, match)`.
pub fn aggregate(similarities: &[f64]) -> (f64, f64) {
    let match_score = similarities
        .iter()
        .copied()
        .reduce(f64::min)
        .unwrap_or(DEFAULT_SOCIAL_MATCH);
    (match_score, risk_from_match(match_score))
}

pub fn risk_from_match(match_score: f64) -> f64 {
    1.0 - match_score.min(1.0)
}

/// Display image and name advertised by a profile page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileMarkup {
    pub image_url: Option<String>,
    pub title: Option<String>,
}

impl ProfileMarkup {
    /// Pull `og:image` / `og:title` out of raw markup; best effort only
    pub fn scrape(html: &str) -> Self {
        let capture = |re: &Regex| {
            re.captures(html)
                .and_then(|c| c.get(1))
                .map(|m| unescape(m.as_str().trim()))
                .filter(|s| !s.is_empty())
        };
        Self {
            image_url: capture(&*RE_OG_IMAGE),
            title: capture(&*RE_OG_TITLE),
        }
    }
}

fn unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Social Risk Aggregator
#[derive(Debug)]
pub struct SocialRiskAggregator {
    store: Arc<SessionStore>,
    collaborators: Collaborators,
}

impl SocialRiskAggregator {
    pub fn new(store: Arc<SessionStore>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    /// Score a batch of uploaded images against the live face.
    ///
    /// Undecodable items are skipped. Every decodable item is recorded,
    /// whether or not a face was found in it.
    pub async fn upload_social_evidence(
        &self,
        id: &str,
        uploads: Vec<SocialUpload>,
    ) -> Result<SocialOutcome> {
        let live = self.live_embedding(id).await?;
        let submitted = uploads.len();

        let decoder = Arc::clone(&self.collaborators.decoder);
        let embedder = Arc::clone(&self.collaborators.embedder);
        let (records, similarities) = run_blocking("social-upload", move || {
            let mut records = Vec::new();
            let mut similarities = Vec::new();
            for upload in uploads {
                let image = match decoder.decode(&upload.data) {
                    Ok(image) => image,
                    Err(e) => {
                        debug!(name = %upload.name, error = %e, "skipping undecodable social image");
                        continue;
                    }
                };
                records.push(SocialImage {
                    id: Uuid::new_v4().to_string(),
                    name: upload.name.clone(),
                });

                let embedding = match embedder.extract(&image) {
                    Ok(embedding) => embedding,
                    Err(e) => {
                        warn!(name = %upload.name, error = %e, "social embedding failed");
                        None
                    }
                };
                if let (Some(live), Some(embedding)) = (&live, embedding) {
                    match similarity::similarity(live, &embedding) {
                        Ok(score) => similarities.push(score),
                        Err(e) => warn!(name = %upload.name, error = %e, "social comparison failed"),
                    }
                }
            }
            Ok((records, similarities))
        })
        .await?;

        let (match_score, risk_score) = aggregate(&similarities);
        let accepted = records.len();
        self.store
            .modify(id, |session| {
                session.social_images.extend(records);
                session.social_match_score = Some(match_score);
                session.social_risk_score = Some(risk_score);
                session.social_status = Some(SOCIAL_STATUS_OK.to_string());
                Ok(())
            })
            .await?;

        info!(
            session_id = %id,
            submitted,
            accepted,
            compared = similarities.len(),
            match_score,
            risk_score,
            "social evidence scored"
        );
        Ok(SocialOutcome {
            social_match_score: match_score,
            social_risk_score: risk_score,
            social_status: SOCIAL_STATUS_OK.to_string(),
        })
    }

    /// Compare the live face with a public profile's display image.
    pub async fn check_social_profile(&self, id: &str, profile_url: &str) -> Result<ProfileCheck> {
        let live = self.live_embedding(id).await?;
        let profile_url = profile_url.trim();
        if !(profile_url.starts_with("http://") || profile_url.starts_with("https://")) {
            return Err(KycError::InvalidRequest(format!(
                "profile url must be http(s): {profile_url}"
            )));
        }

        let page = self
            .collaborators
            .fetcher
            .fetch(profile_url)
            .await
            .map_err(|e| match e {
                KycError::ExternalFetchFailure(_) => e,
                other => KycError::ExternalFetchFailure(other.to_string()),
            })?;
        let markup = ProfileMarkup::scrape(&String::from_utf8_lossy(&page));
        let username = markup
            .title
            .clone()
            .unwrap_or_else(|| profile_url.to_string());

        let match_score = match (&markup.image_url, live) {
            (Some(image_url), Some(live)) => self
                .score_avatar(image_url, live)
                .await
                .unwrap_or(DEFAULT_SOCIAL_MATCH),
            (Some(_), None) => {
                debug!(session_id = %id, "no live embedding, social match defaults");
                DEFAULT_SOCIAL_MATCH
            }
            (None, _) => {
                debug!(session_id = %id, "profile exposes no display image");
                DEFAULT_SOCIAL_MATCH
            }
        };
        let risk_score = risk_from_match(match_score);

        let stored_url = profile_url.to_string();
        self.store
            .modify(id, |session| {
                session.social_profile_url = Some(stored_url);
                session.social_match_score = Some(match_score);
                session.social_risk_score = Some(risk_score);
                session.social_status = Some(SOCIAL_STATUS_OK.to_string());
                Ok(())
            })
            .await?;

        info!(
            session_id = %id,
            profile_url = %profile_url,
            match_score,
            risk_score,
            "social profile checked"
        );
        Ok(ProfileCheck {
            score: SocialOutcome {
                social_match_score: match_score,
                social_risk_score: risk_score,
                social_status: SOCIAL_STATUS_OK.to_string(),
            },
            profile_url: profile_url.to_string(),
            username,
            pfp_url: markup.image_url,
        })
    }

    /// Similarity of the avatar to the live face; `None` on any failure
    async fn score_avatar(&self, image_url: &str, live: Embedding) -> Option<f64> {
        let bytes = match self.collaborators.fetcher.fetch(image_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(image_url = %image_url, error = %e, "avatar fetch failed, failing open");
                return None;
            }
        };

        let decoder = Arc::clone(&self.collaborators.decoder);
        let embedder = Arc::clone(&self.collaborators.embedder);
        let scored = run_blocking("social-check", move || {
            let image = decoder.decode(&bytes)?;
            match embedder.extract(&image)? {
                Some(embedding) => similarity::similarity(&live, &embedding).map(Some),
                None => Ok(None),
            }
        })
        .await;

        match scored {
            Ok(score) => score,
            Err(e) => {
                warn!(image_url = %image_url, error = %e, "avatar scoring failed, failing open");
                None
            }
        }
    }

    async fn live_embedding(&self, id: &str) -> Result<Option<Embedding>> {
        self.store
            .get(id)
            .await
            .map(|session| session.live_embedding)
            .ok_or_else(|| KycError::SessionNotFound(id.to_string()))
    }
}
