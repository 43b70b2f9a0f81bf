//! Built-in box renderer: layout -> display list -> raster -> encoded bytes.

pub mod layout;
pub mod paint;
pub mod raster;
pub mod synthetic;

use crate::capture::{RenderRequest, SlideRasterizer};
use crate::Result;

/// Output encoding of a rasterized slide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Png,
    Jpeg,
}

impl ImageEncoding {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }
}

/// Default [`SlideRasterizer`]: stacks headings, text runs and images of
/// the slide subtree onto a solid background.
#[derive(Debug, Clone)]
pub struct BoxRasterizer {
    pub jpeg_quality: u8,
}

impl Default for BoxRasterizer {
    fn default() -> Self {
        Self { jpeg_quality: 92 }
    }
}

impl BoxRasterizer {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    /// Render the request without encoding it
    pub fn render(&self, req: &RenderRequest<'_>) -> image::RgbaImage {
        let nodes = layout::layout_slide(req.document, req.root, req.width, req.exclude_attribute);
        let commands = paint::display_list(&nodes, req.width, req.height, req.background);
        raster::rasterize(&commands, req.width, req.height, req.images)
    }
}

impl SlideRasterizer for BoxRasterizer {
    fn rasterize(&self, req: &RenderRequest<'_>, encoding: ImageEncoding) -> Result<Vec<u8>> {
        let img = self.render(req);
        raster::encode(&img, encoding, self.jpeg_quality)
    }
}
