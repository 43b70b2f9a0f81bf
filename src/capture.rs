//! Slide capture: one raster image per enumerated slide.
//!
//! The capture chain is an ordered list of [`CaptureStrategy`]s. The default
//! is PNG, then JPEG, then a synthetic error card, so any slide whose root
//! element exists always yields a [`CapturedSlide`].

use crate::dom::{Document, NodeId};
use crate::readiness::ImageStates;
use crate::rendering::layout::slide_box;
use crate::rendering::paint::{Rgba, WHITE};
use crate::rendering::{synthetic, ImageEncoding};
use crate::{data_uri, Error, ExportConfig, Result, SlideDescriptor};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Everything a rasterizer needs to draw one slide subtree
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub document: &'a Document,
    pub root: NodeId,
    pub images: &'a ImageStates,
    pub slide_id: &'a str,
    pub width: u32,
    pub height: u32,
    pub background: Rgba,
    /// Attribute that drops an element (and its subtree) from the capture
    pub exclude_attribute: &'a str,
}

/// Converts a slide subtree into encoded image bytes.
///
/// Implementations report failures as errors; a panic is also caught and
/// treated as a failed tier.
pub trait SlideRasterizer: Send + Sync {
    fn rasterize(&self, req: &RenderRequest<'_>, encoding: ImageEncoding) -> Result<Vec<u8>>;
}

/// How the image of a captured slide was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideEncoding {
    Png,
    Jpeg,
    SyntheticError,
}

/// One captured slide. Only `title` and `imageData` go over the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedSlide {
    pub image_data: String,
    pub title: String,
    #[serde(skip)]
    pub encoding: SlideEncoding,
}

/// One tier of the slide capture chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    Raster(ImageEncoding),
    ErrorCard,
}

pub struct SlideCapturer<'r> {
    rasterizer: &'r dyn SlideRasterizer,
    strategies: Vec<CaptureStrategy>,
    fallback_size: (u32, u32),
    exclude_attribute: String,
}

impl<'r> SlideCapturer<'r> {
    pub fn new(rasterizer: &'r dyn SlideRasterizer, config: &ExportConfig) -> Self {
        Self {
            rasterizer,
            strategies: vec![
                CaptureStrategy::Raster(ImageEncoding::Png),
                CaptureStrategy::Raster(ImageEncoding::Jpeg),
                CaptureStrategy::ErrorCard,
            ],
            fallback_size: (config.slide_size.width, config.slide_size.height),
            exclude_attribute: config.exclude_attribute.clone(),
        }
    }

    /// Replace the tier order; the error card is kept as the final tier.
    pub fn with_strategies(mut self, mut strategies: Vec<CaptureStrategy>) -> Self {
        strategies.retain(|s| *s != CaptureStrategy::ErrorCard);
        strategies.push(CaptureStrategy::ErrorCard);
        self.strategies = strategies;
        self
    }

    /// Capture `descriptor`, or `None` when its element is not in the
    /// document.
    pub fn capture_slide(&self, doc: &Document, images: &ImageStates, descriptor: &SlideDescriptor) -> Option<CapturedSlide> {
        let root = match doc.get_element_by_id(&descriptor.id) {
            Some(root) => root,
            None => {
                log::warn!("slide element #{} not found, skipping", descriptor.id);
                return None;
            }
        };

        let (width, height) = slide_box(doc, root, self.fallback_size, &self.exclude_attribute);
        let req = RenderRequest {
            document: doc,
            root,
            images,
            slide_id: &descriptor.id,
            width,
            height,
            background: WHITE,
            exclude_attribute: &self.exclude_attribute,
        };

        for strategy in &self.strategies {
            match self.run(strategy, &req, &descriptor.title) {
                Ok(slide) => {
                    log::debug!("captured #{} as {:?} ({}x{})", descriptor.id, slide.encoding, width, height);
                    return Some(slide);
                }
                Err(e) => log::warn!("capture of #{} via {:?} failed: {}", descriptor.id, strategy, e),
            }
        }

        // unreachable while the error card tier is present
        Some(self.error_card(width, height, &descriptor.title))
    }

    fn run(&self, strategy: &CaptureStrategy, req: &RenderRequest<'_>, title: &str) -> Result<CapturedSlide> {
        match strategy {
            CaptureStrategy::Raster(encoding) => {
                let bytes = catch_unwind(AssertUnwindSafe(|| self.rasterizer.rasterize(req, *encoding)))
                    .map_err(|_| Error::SlideCaptureError(format!("rasterizer panicked for {:?}", encoding)))?
                    .map_err(|e| Error::SlideCaptureError(e.to_string()))?;
                if bytes.is_empty() {
                    return Err(Error::SlideCaptureError(format!("empty {:?} output", encoding)));
                }
                Ok(CapturedSlide {
                    image_data: data_uri::encode(encoding.mime(), &bytes),
                    title: title.to_string(),
                    encoding: match encoding {
                        ImageEncoding::Png => SlideEncoding::Png,
                        ImageEncoding::Jpeg => SlideEncoding::Jpeg,
                    },
                })
            }
            CaptureStrategy::ErrorCard => Ok(self.error_card(req.width, req.height, title)),
        }
    }

    fn error_card(&self, width: u32, height: u32, title: &str) -> CapturedSlide {
        CapturedSlide {
            image_data: synthetic::error_card_data_uri(width, height, title),
            title: title.to_string(),
            encoding: SlideEncoding::SyntheticError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::BoxRasterizer;

    struct Failing;

    impl SlideRasterizer for Failing {
        fn rasterize(&self, _req: &RenderRequest<'_>, _encoding: ImageEncoding) -> Result<Vec<u8>> {
            Err(Error::RenderError("boom".into()))
        }
    }

    struct PngPanics;

    impl SlideRasterizer for PngPanics {
        fn rasterize(&self, req: &RenderRequest<'_>, encoding: ImageEncoding) -> Result<Vec<u8>> {
            if encoding == ImageEncoding::Png {
                panic!("png encoder blew up");
            }
            BoxRasterizer::default().rasterize(req, encoding)
        }
    }

    const HTML: &str = r#"<html><body><div id="s1" style="width:200px;height:100px"><h2>Sales</h2></div></body></html>"#;

    fn descriptor(id: &str, title: &str) -> SlideDescriptor {
        SlideDescriptor { id: id.into(), title: title.into() }
    }

    #[test]
    fn png_is_first_choice() {
        let doc = Document::parse(HTML);
        let r = BoxRasterizer::default();
        let capturer = SlideCapturer::new(&r, &ExportConfig::default());
        let slide = capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("s1", "Sales")).unwrap();
        assert_eq!(slide.encoding, SlideEncoding::Png);
        assert!(slide.image_data.starts_with("data:image/png;base64,"));
        let (_, bytes) = data_uri::decode(&slide.image_data).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (200, 100));
    }

    #[test]
    fn absent_element_is_skipped() {
        let doc = Document::parse(HTML);
        let r = BoxRasterizer::default();
        let capturer = SlideCapturer::new(&r, &ExportConfig::default());
        assert!(capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("missing", "X")).is_none());
    }

    #[test]
    fn panicking_png_falls_back_to_jpeg() {
        let doc = Document::parse(HTML);
        let r = PngPanics;
        let capturer = SlideCapturer::new(&r, &ExportConfig::default());
        let slide = capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("s1", "Sales")).unwrap();
        assert_eq!(slide.encoding, SlideEncoding::Jpeg);
        assert!(slide.image_data.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn total_failure_yields_error_card() {
        let doc = Document::parse(HTML);
        let r = Failing;
        let capturer = SlideCapturer::new(&r, &ExportConfig::default());
        let slide = capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("s1", "Sales")).unwrap();
        assert_eq!(slide.encoding, SlideEncoding::SyntheticError);
        assert_eq!(slide.title, "Sales");
        let (mime, bytes) = data_uri::decode(&slide.image_data).unwrap();
        assert_eq!(mime, "image/png");
        let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (200, 100));
        assert!(img.pixels().any(|p| p.0 == [220, 53, 69, 255]));
    }

    #[test]
    fn oversized_slide_is_captured_within_bounds() {
        let doc = Document::parse(
            r#"<html><body><div id="wide" style="width:5000000000px;height:12px"><p>x</p></div></body></html>"#,
        );
        let r = BoxRasterizer::default();
        let capturer = SlideCapturer::new(&r, &ExportConfig::default());
        let slide = capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("wide", "Wide")).unwrap();
        assert_eq!(slide.encoding, SlideEncoding::Png);
        let (_, bytes) = data_uri::decode(&slide.image_data).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (crate::dom::MAX_BOX_SIDE, 12));

        // the error card tier gets the same bounded box
        let r = Failing;
        let capturer = SlideCapturer::new(&r, &ExportConfig::default());
        let slide = capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("wide", "Wide")).unwrap();
        assert_eq!(slide.encoding, SlideEncoding::SyntheticError);
        let (_, bytes) = data_uri::decode(&slide.image_data).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (crate::dom::MAX_BOX_SIDE, 12));
    }

    #[test]
    fn custom_order_keeps_error_card_last() {
        let doc = Document::parse(HTML);
        let r = BoxRasterizer::default();
        let capturer = SlideCapturer::new(&r, &ExportConfig::default())
            .with_strategies(vec![CaptureStrategy::ErrorCard, CaptureStrategy::Raster(ImageEncoding::Jpeg)]);
        let slide = capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("s1", "Sales")).unwrap();
        assert_eq!(slide.encoding, SlideEncoding::Jpeg);

        let r = Failing;
        let capturer = SlideCapturer::new(&r, &ExportConfig::default())
            .with_strategies(vec![CaptureStrategy::ErrorCard, CaptureStrategy::Raster(ImageEncoding::Jpeg)]);
        let slide = capturer.capture_slide(&doc, &ImageStates::default(), &descriptor("s1", "Sales")).unwrap();
        assert_eq!(slide.encoding, SlideEncoding::SyntheticError);
    }

    #[test]
    fn serializes_only_wire_fields() {
        let slide = CapturedSlide {
            image_data: "data:image/png;base64,AA==".into(),
            title: "T".into(),
            encoding: SlideEncoding::Png,
        };
        let v = serde_json::to_value(&slide).unwrap();
        assert_eq!(v, serde_json::json!({ "imageData": "data:image/png;base64,AA==", "title": "T" }));
    }
}
