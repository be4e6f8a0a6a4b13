//! Scripted collaborators shared by the integration tests
//!
//! Images are PNG magic followed by a text tag; fakes key their answers on
//! that tag.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use kycgate::core::collaborators::{SniffDecoder, WholeImageFace};
use kycgate::core::{
    AlwaysPass, Collaborators, EmbeddingExtractor, Fetcher, LivenessClassifier, TextExtractor,
};
use kycgate::types::{Embedding, ExtractedText, Image, ImageFormat};
use kycgate::{KycError, Result};

pub const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Raw PNG-looking bytes carrying `tag`
pub fn png(tag: &str) -> Vec<u8> {
    let mut data = PNG_MAGIC.to_vec();
    data.extend_from_slice(tag.as_bytes());
    data
}

pub fn image(tag: &str) -> Image {
    Image::new(ImageFormat::Png, png(tag))
}

pub fn b64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

fn tag_of(image: &Image) -> String {
    String::from_utf8_lossy(image.data.get(PNG_MAGIC.len()..).unwrap_or_default()).into_owned()
}

/// Embedding per tag; unknown tags have no face
#[derive(Default)]
pub struct ScriptedEmbedder {
    pub faces: HashMap<String, Embedding>,
}

impl EmbeddingExtractor for ScriptedEmbedder {
    fn extract(&self, image: &Image) -> Result<Option<Embedding>> {
        let tag = tag_of(image);
        if tag.starts_with("broken") {
            return Err(KycError::CollaboratorUnavailable("embedder offline".into()));
        }
        Ok(self.faces.get(&tag).cloned())
    }
}

/// Liveness per tag, 0.9 otherwise
#[derive(Default)]
pub struct ScriptedLiveness {
    pub scores: HashMap<String, f64>,
}

impl LivenessClassifier for ScriptedLiveness {
    fn predict(&self, image: &Image) -> Result<f64> {
        Ok(self.scores.get(&tag_of(image)).copied().unwrap_or(0.9))
    }
}

pub struct StaticText;

impl TextExtractor for StaticText {
    fn extract(&self, image: &Image) -> Result<ExtractedText> {
        Ok(ExtractedText::raw(format!("DOC {}", tag_of(image))))
    }
}

/// Canned responses per url; anything else fails like a dead host
#[derive(Default)]
pub struct FakeFetcher {
    pub pages: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| KycError::ExternalFetchFailure(format!("connection refused: {url}")))
    }
}

/// Builder for a collaborator set
#[derive(Default)]
pub struct Fakes {
    pub faces: HashMap<String, Embedding>,
    pub scores: HashMap<String, f64>,
    pub pages: HashMap<String, Vec<u8>>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn face(mut self, tag: &str, embedding: Embedding) -> Self {
        self.faces.insert(tag.to_string(), embedding);
        self
    }

    pub fn liveness(mut self, tag: &str, score: f64) -> Self {
        self.scores.insert(tag.to_string(), score);
        self
    }

    pub fn page(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn build(self) -> Collaborators {
        Collaborators {
            decoder: Arc::new(SniffDecoder),
            embedder: Arc::new(ScriptedEmbedder { faces: self.faces }),
            liveness: Arc::new(ScriptedLiveness {
                scores: self.scores,
            }),
            text: Arc::new(StaticText),
            face_region: Arc::new(WholeImageFace),
            fetcher: Arc::new(FakeFetcher { pages: self.pages }),
            step_evaluator: Arc::new(AlwaysPass),
        }
    }
}

/// Minimal profile page advertising `image_url`
pub fn profile_page(title: &str, image_url: Option<&str>) -> String {
    let image = image_url
        .map(|url| format!(r#"<meta property="og:image" content="{url}" />"#))
        .unwrap_or_default();
    format!(
        r#"<html><head><meta property="og:title" content="{title}" />{image}</head><body></body></html>"#
    )
}
