//! Readiness barrier: bring every `<img>` to a terminal load state before
//! any slide is rasterized.

use crate::data_uri;
use crate::dom::{Document, NodeId};
use crate::{Error, Result};
use futures::future::join_all;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Terminal load state of one image
#[derive(Debug, Clone)]
pub enum ImageState {
    /// Decoded with a nonzero natural size
    Loaded(Arc<RgbaImage>),
    /// Fetch or decode failed (the browser's `error` event)
    Failed(String),
    /// Did not settle within the per-image timeout
    TimedOut,
}

impl ImageState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ImageState::Loaded(_))
    }
}

/// Load states keyed by `<img>` node
#[derive(Debug, Clone, Default)]
pub struct ImageStates {
    states: HashMap<NodeId, ImageState>,
}

impl ImageStates {
    pub fn get(&self, node: NodeId) -> Option<&ImageState> {
        self.states.get(&node)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn loaded_count(&self) -> usize {
        self.states.values().filter(|s| s.is_loaded()).count()
    }
}

impl FromIterator<(NodeId, ImageState)> for ImageStates {
    fn from_iter<I: IntoIterator<Item = (NodeId, ImageState)>>(iter: I) -> Self {
        Self { states: iter.into_iter().collect() }
    }
}

/// Decode image bytes, rejecting zero-sized results
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::RenderError("image has zero natural size".into()));
    }
    Ok(img)
}

pub struct ReadinessBarrier {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl ReadinessBarrier {
    pub fn new(client: reqwest::Client, timeout_ms: u64) -> Self {
        Self { client, timeout_ms }
    }

    /// Load every image in `doc` concurrently. Each load settles as loaded,
    /// failed or timed out; the barrier itself never fails.
    pub async fn await_all_images_settled(&self, doc: &Document) -> ImageStates {
        let timeout = Duration::from_millis(self.timeout_ms);
        let loads = doc.images().into_iter().map(|img| async move {
            let state = match tokio::time::timeout(timeout, self.load(doc, &img.src)).await {
                Ok(Ok(decoded)) => ImageState::Loaded(Arc::new(decoded)),
                Ok(Err(e)) => {
                    log::debug!("image node {} failed to load: {}", img.node, e);
                    ImageState::Failed(e.to_string())
                }
                Err(_) => {
                    log::warn!("image node {} did not settle within {}ms", img.node, self.timeout_ms);
                    ImageState::TimedOut
                }
            };
            (img.node, state)
        });

        let states: ImageStates = join_all(loads).await.into_iter().collect();
        log::info!("{} of {} images loaded", states.loaded_count(), states.len());
        states
    }

    async fn load(&self, doc: &Document, src: &str) -> Result<RgbaImage> {
        if src.is_empty() {
            return Err(Error::ParseError("image has no src".into()));
        }
        if data_uri::is_data_uri(src) {
            let (_, bytes) = data_uri::decode(src)?;
            return decode_image(&bytes);
        }

        let url = doc
            .resolve_url(src)
            .ok_or_else(|| Error::ParseError(format!("unresolvable image src {}", src)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::ParseError(format!("unsupported image scheme {}", url.scheme())));
        }

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::NetworkError(format!("GET {} failed: {}", url, e)))?;
        if !resp.status().is_success() {
            return Err(Error::NetworkError(format!("GET {} returned {}", url, resp.status())));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::NetworkError(format!("Failed to read {}: {}", url, e)))?;
        decode_image(&bytes)
    }
}
