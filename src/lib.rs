//! RFox Deck Export
//!
//! Captures a fixed, named set of rendered report panels ("slides") from an
//! HTML document and submits them as one batch to a remote presentation
//! assembly service.
//!
//! # Pipeline
//!
//! - **Resolve**: cross-origin `<img>` sources are inlined as data URIs via
//!   CORS relays, a canvas redraw, or a synthetic placeholder
//! - **Wait**: every image is brought to a terminal load state, each bounded
//!   by its own timeout
//! - **Capture**: slides are rasterized one at a time (PNG, then JPEG, then
//!   an error card)
//! - **Submit**: the ordered batch is POSTed once; the response carries the
//!   presentation URL
//!
//! # Example
//!
//! ```no_run
//! use rfdeck::{Document, ExportConfig, SlideDescriptor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExportConfig {
//!     assembly_endpoint: "https://slides.example.com/api/assemble".to_string(),
//!     ..Default::default()
//! };
//! let exporter = rfdeck::new_exporter(config)?;
//!
//! let mut doc = Document::parse_with_base("<html>...</html>", "https://report.example.com/")?;
//! let slides = vec![SlideDescriptor { id: "kpi".into(), title: "KPIs".into() }];
//! let result = exporter.export_all(&mut doc, &slides, "Weekly report").await?;
//! println!("{}", result.presentation_url);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub mod error;
pub use error::{Error, Result};

pub mod assembly;
pub mod capture;
pub mod data_uri;
pub mod dom;
pub mod export;
pub mod readiness;
pub mod rendering;
pub mod resolver;

pub use capture::{CaptureStrategy, CapturedSlide, RenderRequest, SlideCapturer, SlideEncoding, SlideRasterizer};
pub use dom::{Document, NodeId};
pub use export::{ExportState, Exporter};
pub use readiness::{ImageState, ImageStates, ReadinessBarrier};
pub use rendering::{BoxRasterizer, ImageEncoding};
pub use resolver::{AttemptOutcome, ImageResolutionAttempt, ResolutionMethod, ResolvedImages, ResourceResolver};

/// Public CORS relays tried in order by the resolver
pub const DEFAULT_RELAYS: &[&str] = &[
    "https://api.allorigins.win/raw?url={url}",
    "https://corsproxy.io/?{url}",
    "https://api.codetabs.com/v1/proxy?quest={url}",
];

/// Configuration for an export run
///
/// The defaults are conservative: images are inlined before capture, each
/// image gets 10 seconds to settle, and slides without a declared size fall
/// back to a 1280x720 box.
///
/// # Examples
///
/// ```
/// let cfg = rfdeck::ExportConfig::default();
/// assert!(cfg.inline_images);
/// assert_eq!(cfg.image_timeout_ms, 10_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Relay URL templates; `{url}` is replaced with the encoded image URL
    pub relays: Vec<String>,
    /// Presentation assembly endpoint (POST)
    pub assembly_endpoint: String,
    /// Whether to inline cross-origin images before capture
    pub inline_images: bool,
    /// Per-image settle timeout in milliseconds
    pub image_timeout_ms: u64,
    /// Timeout for any single HTTP request in milliseconds
    pub request_timeout_ms: u64,
    /// User agent for relay, image and submission requests
    pub user_agent: String,
    /// Extra headers sent with the submission request
    pub headers: HashMap<String, String>,
    /// Box used for slides that declare no width or height
    pub slide_size: SlideSize,
    /// JPEG quality for the JPEG capture tier (1-100)
    pub jpeg_quality: u8,
    /// Elements carrying this attribute are left out of captures
    pub exclude_attribute: String,
    /// Caption drawn on image placeholders
    pub placeholder_caption: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect(),
            assembly_endpoint: String::new(),
            inline_images: true,
            image_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            user_agent: format!("rfdeck/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
            slide_size: SlideSize::default(),
            jpeg_quality: 92,
            exclude_attribute: "data-export-exclude".to_string(),
            placeholder_caption: "Image from Sheets".to_string(),
        }
    }
}

impl ExportConfig {
    /// Load a JSON config file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigError(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.assembly_endpoint).map_err(|e| {
            Error::ConfigError(format!("assembly_endpoint {:?} is not a URL: {}", self.assembly_endpoint, e))
        })?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::ConfigError(format!("jpeg_quality {} out of range 1-100", self.jpeg_quality)));
        }
        if self.image_timeout_ms == 0 {
            return Err(Error::ConfigError("image_timeout_ms must be positive".into()));
        }
        if self.slide_size.width == 0 || self.slide_size.height == 0 {
            return Err(Error::ConfigError("slide_size must be non-empty".into()));
        }
        if self.slide_size.width > dom::MAX_BOX_SIDE || self.slide_size.height > dom::MAX_BOX_SIDE {
            return Err(Error::ConfigError(format!("slide_size sides must be at most {}px", dom::MAX_BOX_SIDE)));
        }
        Ok(())
    }
}

/// Slide dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SlideSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A slide to capture: the element `id` and the title attached to its image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDescriptor {
    pub id: String,
    pub title: String,
}

impl SlideDescriptor {
    /// Parse a JSON array of `{ "id", "title" }` objects
    pub fn list_from_json(raw: &str) -> Result<Vec<Self>> {
        serde_json::from_str(raw).map_err(|e| Error::ParseError(format!("invalid slide list: {}", e)))
    }
}

/// The unit submitted to the assembly service. Never empty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBatch {
    slides: Vec<CapturedSlide>,
    presentation_title: String,
}

impl ExportBatch {
    pub fn new(presentation_title: &str, slides: Vec<CapturedSlide>) -> Result<Self> {
        if slides.is_empty() {
            return Err(Error::EmptyBatchError);
        }
        Ok(Self { slides, presentation_title: presentation_title.to_string() })
    }

    pub fn slides(&self) -> &[CapturedSlide] {
        &self.slides
    }

    pub fn presentation_title(&self) -> &str {
        &self.presentation_title
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// Successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub presentation_url: String,
}

/// Create an exporter with the built-in box rasterizer
pub fn new_exporter(config: ExportConfig) -> Result<Exporter> {
    Exporter::new(config)
}
