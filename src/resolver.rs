//! Resource resolver: inline every cross-origin image as a data URI.
//!
//! Each image runs an ordered list of [`ResolutionMethod`]s and stops at the
//! first that succeeds. [`ResolutionMethod::Placeholder`] cannot fail and is
//! always last, so every candidate image ends up with a replacement.

use crate::data_uri;
use crate::dom::{Document, ImageRef, NodeId, MAX_BOX_SIDE};
use crate::readiness::decode_image;
use crate::rendering::raster::{encode, Canvas};
use crate::rendering::{synthetic, ImageEncoding};
use crate::{Error, ExportConfig, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// One tier of the image fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    /// GET through a public CORS relay
    RelayFetch,
    /// Direct CORS fetch, redrawn onto a canvas and exported as PNG
    CanvasRedraw,
    /// Synthetic placeholder sized to the element's box
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// Record of one tier tried for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageResolutionAttempt {
    pub method: ResolutionMethod,
    pub outcome: AttemptOutcome,
}

/// Output of [`ResourceResolver::resolve_all`], applied with
/// [`Document::apply_resolved`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedImages {
    replacements: Vec<(NodeId, String)>,
    attempts: HashMap<NodeId, Vec<ImageResolutionAttempt>>,
}

impl ResolvedImages {
    pub fn replacements(&self) -> &[(NodeId, String)] {
        &self.replacements
    }

    pub fn uri_for(&self, node: NodeId) -> Option<&str> {
        self.replacements
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, uri)| uri.as_str())
    }

    pub fn attempts_for(&self, node: NodeId) -> &[ImageResolutionAttempt] {
        self.attempts.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The tier that produced the replacement for `node`
    pub fn method_for(&self, node: NodeId) -> Option<ResolutionMethod> {
        self.attempts_for(node)
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Success)
            .map(|a| a.method)
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// Build the relay URL for `target`. `{url}` is replaced with the
/// percent-encoded target; templates without it get the target appended.
pub fn relay_url(template: &str, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    if template.contains("{url}") {
        template.replace("{url}", &encoded)
    } else {
        format!("{}{}", template, encoded)
    }
}

/// Scale `(w, h)` down to fit `max` on both sides, keeping the aspect ratio
fn fit_within((w, h): (u32, u32), max: u32) -> (u32, u32) {
    if w <= max && h <= max {
        return (w, h);
    }
    let scale = max as f64 / w.max(h) as f64;
    (((w as f64 * scale).round() as u32).max(1), ((h as f64 * scale).round() as u32).max(1))
}

pub struct ResourceResolver {
    client: reqwest::Client,
    relays: Vec<String>,
    strategies: Vec<ResolutionMethod>,
    caption: String,
}

impl ResourceResolver {
    pub fn new(client: reqwest::Client, relays: Vec<String>, caption: &str) -> Self {
        Self {
            client,
            relays,
            strategies: vec![
                ResolutionMethod::RelayFetch,
                ResolutionMethod::CanvasRedraw,
                ResolutionMethod::Placeholder,
            ],
            caption: caption.to_string(),
        }
    }

    pub fn from_config(config: &ExportConfig, client: reqwest::Client) -> Self {
        Self::new(client, config.relays.clone(), &config.placeholder_caption)
    }

    /// Replace the tier order. A missing placeholder tier is appended so the
    /// chain always terminates.
    pub fn with_strategies(mut self, mut strategies: Vec<ResolutionMethod>) -> Self {
        strategies.dedup();
        strategies.retain(|m| *m != ResolutionMethod::Placeholder);
        strategies.push(ResolutionMethod::Placeholder);
        self.strategies = strategies;
        self
    }

    pub fn strategies(&self) -> &[ResolutionMethod] {
        &self.strategies
    }

    /// Absolute `http(s)` URL for `img` if it must be inlined: not a data
    /// URI, not relative, not same-origin.
    pub fn inline_target(doc: &Document, img: &ImageRef) -> Option<Url> {
        if !img.src.starts_with("http") || data_uri::is_data_uri(&img.src) {
            return None;
        }
        let url = Url::parse(&img.src).ok()?;
        if !matches!(url.scheme(), "http" | "https") || doc.is_same_origin(&url) {
            return None;
        }
        Some(url)
    }

    /// Resolve every cross-origin image concurrently. Never fails.
    pub async fn resolve_all(&self, doc: &Document) -> ResolvedImages {
        let targets: Vec<(ImageRef, Url)> = doc
            .images()
            .into_iter()
            .filter_map(|img| Self::inline_target(doc, &img).map(|url| (img, url)))
            .collect();
        log::info!("resolving {} cross-origin images", targets.len());

        let results = join_all(
            targets
                .iter()
                .map(|(img, url)| async move { (img.node, self.resolve_one(doc, img, url).await) }),
        )
        .await;

        let mut resolved = ResolvedImages::default();
        for (node, (uri, attempts)) in results {
            resolved.replacements.push((node, uri));
            resolved.attempts.insert(node, attempts);
        }
        resolved
    }

    async fn resolve_one(&self, doc: &Document, img: &ImageRef, url: &Url) -> (String, Vec<ImageResolutionAttempt>) {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for method in &self.strategies {
            match self.attempt(*method, doc, img, url).await {
                Ok(uri) => {
                    attempts.push(ImageResolutionAttempt { method: *method, outcome: AttemptOutcome::Success });
                    log::debug!("image {} resolved via {:?}", url, method);
                    return (uri, attempts);
                }
                Err(e) => {
                    attempts.push(ImageResolutionAttempt { method: *method, outcome: AttemptOutcome::Failure });
                    log::debug!("image {}: {:?} failed: {}", url, method, e);
                }
            }
        }
        // unreachable while the placeholder tier is present
        attempts.push(ImageResolutionAttempt { method: ResolutionMethod::Placeholder, outcome: AttemptOutcome::Success });
        (synthetic::placeholder_data_uri(img.width, img.height, &self.caption), attempts)
    }

    async fn attempt(&self, method: ResolutionMethod, doc: &Document, img: &ImageRef, url: &Url) -> Result<String> {
        match method {
            ResolutionMethod::RelayFetch => self.relay_fetch(url).await,
            ResolutionMethod::CanvasRedraw => self.canvas_redraw(doc, url).await,
            ResolutionMethod::Placeholder => {
                log::warn!("using placeholder for {} ({}x{})", url, img.width, img.height);
                Ok(synthetic::placeholder_data_uri(img.width, img.height, &self.caption))
            }
        }
    }

    /// Try each relay in order; the first 2xx body that is a raster image wins.
    async fn relay_fetch(&self, url: &Url) -> Result<String> {
        let mut last = Error::ImageFetchError { via: "relay".into(), reason: "no relays configured".into() };
        for template in &self.relays {
            let relay = relay_url(template, url.as_str());
            match self.fetch_bytes(&relay).await {
                Ok(bytes) => match data_uri::sniff_mime(&bytes) {
                    Some(mime) => return Ok(data_uri::encode(mime, &bytes)),
                    None => {
                        log::debug!("relay {} answered {} with a non-image body", template, url);
                        last = Error::ImageFetchError { via: template.clone(), reason: "body is not a raster image".into() };
                    }
                },
                Err(reason) => {
                    log::debug!("relay {} failed for {}: {}", template, url, reason);
                    last = Error::ImageFetchError { via: template.clone(), reason };
                }
            }
        }
        Err(last)
    }

    /// Direct fetch whose pixels are only readable if the host sends a
    /// matching `Access-Control-Allow-Origin`.
    async fn canvas_redraw(&self, doc: &Document, url: &Url) -> Result<String> {
        let origin = doc
            .base_url()
            .map(|b| b.origin().ascii_serialization())
            .unwrap_or_else(|| "null".to_string());

        let resp = self
            .client
            .get(url.clone())
            .header("Origin", origin.clone())
            .send()
            .await
            .map_err(|e| Error::ImageFetchError { via: "direct".into(), reason: e.to_string() })?;
        if !resp.status().is_success() {
            return Err(Error::ImageFetchError { via: "direct".into(), reason: resp.status().to_string() });
        }

        let allowed = resp
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "*" || v.trim() == origin)
            .unwrap_or(false);
        if !allowed {
            return Err(Error::CanvasTaintError(url.to_string()));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::ImageFetchError { via: "direct".into(), reason: e.to_string() })?;
        let decoded = decode_image(&bytes)?;
        let (w, h) = fit_within(decoded.dimensions(), MAX_BOX_SIDE);
        let mut canvas = Canvas::new(w, h, (0, 0, 0, 0));
        canvas.draw_image(0, 0, w, h, &decoded);
        let png = encode(canvas.as_image(), ImageEncoding::Png, 100)?;
        Ok(data_uri::encode("image/png", &png))
    }

    async fn fetch_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("status {}", resp.status()));
        }
        let bytes = resp.bytes().await.map_err(|e| e.to_string())?;
        if bytes.is_empty() {
            return Err("empty body".into());
        }
        Ok(bytes.to_vec())
    }
}
