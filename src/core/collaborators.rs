//! Capability interfaces the pipeline calls, plus reference implementations
//!
//! The reference set keeps the binary runnable without model files:
//! - [`SniffDecoder`]: accepts PNG/JPEG/GIF/BMP/WebP by magic bytes
//! - [`DigestEmbedder`]: SHA-256 of the pixels as a 32-dim vector
//! - [`FixedLiveness`]: constant anti-spoof score
//! - [`PrintableTextExtractor`]: printable ASCII runs as raw text
//! - [`WholeImageFace`]: the whole image as the face region
//! - [`HttpFetcher`]: reqwest GET with a timeout

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

use crate::core::challenge::{AlwaysPass, StepEvaluator};
use crate::error::{KycError, Result};
use crate::types::{Embedding, ExtractedText, Image, ImageFormat};
use crate::KycConfig;

/// Turns raw bytes into an image; fails on malformed input
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Image>;
}

/// Face embedding; `Ok(None)` when no face is found
pub trait EmbeddingExtractor: Send + Sync {
    fn extract(&self, image: &Image) -> Result<Option<Embedding>>;
}

/// Anti-spoof classifier; higher is more likely a live capture
pub trait LivenessClassifier: Send + Sync {
    fn predict(&self, image: &Image) -> Result<f64>;
}

/// OCR over a document image
pub trait TextExtractor: Send + Sync {
    fn extract(&self, image: &Image) -> Result<ExtractedText>;
}

/// Crops the largest face on a document
pub trait FaceRegionExtractor: Send + Sync {
    fn extract_face(&self, image: &Image) -> Result<Option<Image>>;
}

/// Network fetch used by the social cross-check
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Everything the pipeline needs from the outside
#[derive(Clone)]
pub struct Collaborators {
    pub decoder: Arc<dyn ImageDecoder>,
    pub embedder: Arc<dyn EmbeddingExtractor>,
    pub liveness: Arc<dyn LivenessClassifier>,
    pub text: Arc<dyn TextExtractor>,
    pub face_region: Arc<dyn FaceRegionExtractor>,
    pub fetcher: Arc<dyn Fetcher>,
    pub step_evaluator: Arc<dyn StepEvaluator>,
}

impl Collaborators {
    /// Reference implementations for local runs
    pub fn reference(config: &KycConfig, liveness_score: f64) -> Result<Self> {
        Ok(Self {
            decoder: Arc::new(SniffDecoder),
            embedder: Arc::new(DigestEmbedder),
            liveness: Arc::new(FixedLiveness::new(liveness_score)),
            text: Arc::new(PrintableTextExtractor::default()),
            face_region: Arc::new(WholeImageFace),
            fetcher: Arc::new(HttpFetcher::new(
                config.fetch_timeout,
                config.max_fetch_bytes,
            )?),
            step_evaluator: Arc::new(AlwaysPass),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Run blocking inference off the async workers
pub(crate) async fn run_blocking<T, F>(stage: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| KycError::CollaboratorUnavailable(format!("{stage}: {e}")))?
}

/// Decode a base64 payload, tolerating a `data:<mime>;base64,` prefix
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let body = payload.rsplit(',').next().unwrap_or(payload).trim();
    general_purpose::STANDARD
        .decode(body)
        .map_err(|e| KycError::DecodeFailure(format!("invalid base64: {e}")))
}

/// Base64 of an image, without a data-URL prefix
pub fn encode_base64(image: &Image) -> String {
    general_purpose::STANDARD.encode(&image.data)
}

// =============================================================================
// REFERENCE IMPLEMENTATIONS
// =============================================================================

/// Magic-byte decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct SniffDecoder;

impl SniffDecoder {
    fn sniff(bytes: &[u8]) -> Option<ImageFormat> {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
            [b'B', b'M', ..] if bytes.len() > 26 => Some(ImageFormat::Bmp),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
                Some(ImageFormat::Webp)
            }
            _ => None,
        }
    }
}

impl ImageDecoder for SniffDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Image> {
        if bytes.is_empty() {
            return Err(KycError::DecodeFailure("empty image".into()));
        }
        let format = Self::sniff(bytes)
            .ok_or_else(|| KycError::DecodeFailure("unrecognised image format".into()))?;
        Ok(Image::new(format, bytes.to_vec()))
    }
}

/// Deterministic stand-in embedder: identical bytes give identical vectors
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestEmbedder;

impl EmbeddingExtractor for DigestEmbedder {
    fn extract(&self, image: &Image) -> Result<Option<Embedding>> {
        if image.is_empty() {
            return Ok(None);
        }
        let digest: [u8; 32] = Sha256::digest(&image.data).into();
        Ok(Some(
            digest.iter().map(|&b| (b as f32 / 127.5) - 1.0).collect(),
        ))
    }
}

/// Constant liveness score, clamped to [0, 1]
#[derive(Debug, Clone, Copy)]
pub struct FixedLiveness {
    score: f64,
}

impl FixedLiveness {
    pub fn new(score: f64) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
        }
    }
}

impl LivenessClassifier for FixedLiveness {
    fn predict(&self, _image: &Image) -> Result<f64> {
        Ok(self.score)
    }
}

/// Collects runs of printable ASCII at least `min_run` long
#[derive(Debug, Clone, Copy)]
pub struct PrintableTextExtractor {
    pub min_run: usize,
}

impl Default for PrintableTextExtractor {
    fn default() -> Self {
        Self { min_run: 4 }
    }
}

impl TextExtractor for PrintableTextExtractor {
    fn extract(&self, image: &Image) -> Result<ExtractedText> {
        let mut runs = Vec::new();
        let mut current = String::new();
        for &b in &image.data {
            if b.is_ascii_graphic() || b == b' ' {
                current.push(b as char);
            } else {
                if current.trim().len() >= self.min_run {
                    runs.push(current.trim().to_string());
                }
                current.clear();
            }
        }
        if current.trim().len() >= self.min_run {
            runs.push(current.trim().to_string());
        }
        Ok(ExtractedText::raw(runs.join(" ")))
    }
}

/// Treats the whole document as the face crop
#[derive(Debug, Default, Clone, Copy)]
pub struct WholeImageFace;

impl FaceRegionExtractor for WholeImageFace {
    fn extract_face(&self, image: &Image) -> Result<Option<Image>> {
        Ok((!image.is_empty()).then(|| image.clone()))
    }
}

/// HTTP GET with timeouts and a body cap; non-2xx responses are failures
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| KycError::CollaboratorUnavailable(format!("http client: {e}")))?;
        Ok(Self { client, max_bytes })
    }

    fn too_large(&self, url: &str) -> KycError {
        KycError::ExternalFetchFailure(format!("{url}: body exceeds {} bytes", self.max_bytes))
    }
}

fn fetch_error(e: reqwest::Error) -> KycError {
    if e.is_timeout() {
        KycError::ExternalFetchFailure(format!("request timed out: {e}"))
    } else {
        KycError::ExternalFetchFailure(e.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?;

        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(self.too_large(url));
        }

        // Length headers can lie or be absent; count what actually arrives
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(fetch_error)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
