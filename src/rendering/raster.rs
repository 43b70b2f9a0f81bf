/// Software rasterizer for paint commands

use crate::dom::clamp_box;
use crate::readiness::{ImageState, ImageStates};
use crate::rendering::paint::{PaintCommand, Rgba as Color};
use crate::rendering::ImageEncoding;
use crate::{Error, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Pixel, Rgba, RgbaImage};

use super::layout::GLYPH;

const BROKEN_FILL: Color = (241, 243, 245, 255);
const BROKEN_BORDER: Color = (206, 212, 218, 255);

fn px(c: Color) -> Rgba<u8> {
    Rgba([c.0, c.1, c.2, c.3])
}

/// An RGBA drawing surface with clipping on every primitive
pub struct Canvas {
    img: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let (width, height) = clamp_box(width, height);
        Self { img: RgbaImage::from_pixel(width, height, px(background)) }
    }

    pub fn width(&self) -> u32 {
        self.img.width()
    }

    pub fn height(&self) -> u32 {
        self.img.height()
    }

    fn blend_at(&mut self, x: i64, y: i64, c: Rgba<u8>) {
        if x < 0 || y < 0 || x >= self.img.width() as i64 || y >= self.img.height() as i64 {
            return;
        }
        let p = self.img.get_pixel_mut(x as u32, y as u32);
        if c[3] == 255 {
            *p = c;
        } else {
            p.blend(&c);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Color) {
        let c = px(color);
        let x0 = (x as i64).max(0);
        let y0 = (y as i64).max(0);
        let x1 = (x as i64 + width as i64).min(self.img.width() as i64);
        let y1 = (y as i64 + height as i64).min(self.img.height() as i64);
        for yy in y0..y1 {
            for xx in x0..x1 {
                self.blend_at(xx, yy, c);
            }
        }
    }

    pub fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, thickness: u32, color: Color) {
        let t = thickness.min(width / 2).min(height / 2).max(1);
        self.fill_rect(x, y, width, t, color);
        self.fill_rect(x, y + height as i32 - t as i32, width, t, color);
        self.fill_rect(x, y, t, height, color);
        self.fill_rect(x + width as i32 - t as i32, y, t, height, color);
    }

    /// Fill the whole surface with a top-to-bottom gradient
    pub fn vertical_gradient(&mut self, top: Color, bottom: Color) {
        let h = self.img.height().max(2) - 1;
        for (_, y, p) in self.img.enumerate_pixels_mut() {
            let t = y as f32 / h as f32;
            let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            *p = Rgba([
                lerp(top.0, bottom.0),
                lerp(top.1, bottom.1),
                lerp(top.2, bottom.2),
                lerp(top.3, bottom.3),
            ]);
        }
    }

    /// Draw `text` with 8x8 bitmap glyphs. Characters outside basic Latin
    /// render as `?`.
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, scale: u32, color: Color) {
        let c = px(color);
        let scale = scale.max(1) as i64;
        let fallback = BASIC_FONTS.get('?').unwrap_or([0; 8]);
        for (i, ch) in text.chars().enumerate() {
            let glyph = BASIC_FONTS.get(ch).unwrap_or(fallback);
            let gx = x as i64 + i as i64 * GLYPH as i64 * scale;
            if gx >= self.img.width() as i64 {
                break;
            }
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..8i64 {
                    if bits & (1 << col) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            self.blend_at(gx + col * scale + sx, y as i64 + row as i64 * scale + sy, c);
                        }
                    }
                }
            }
        }
    }

    /// Draw `src` scaled into the given box
    pub fn draw_image(&mut self, x: i32, y: i32, width: u32, height: u32, src: &RgbaImage) {
        if width == 0 || height == 0 {
            return;
        }
        let scaled;
        let top = if src.dimensions() == (width, height) {
            src
        } else {
            scaled = imageops::resize(src, width, height, FilterType::Triangle);
            &scaled
        };
        imageops::overlay(&mut self.img, top, x as i64, y as i64);
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.img
    }

    pub fn into_image(self) -> RgbaImage {
        self.img
    }
}

/// Pixel width of `text` drawn at `scale`
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH * scale.max(1)
}

/// Execute a display list onto a fresh canvas
pub fn rasterize(commands: &[PaintCommand], width: u32, height: u32, images: &ImageStates) -> RgbaImage {
    let mut canvas = Canvas::new(width, height, (0, 0, 0, 0));
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, rgba } => {
                canvas.fill_rect(*x, *y, *width, *height, *rgba)
            }
            PaintCommand::Text { x, y, text, scale, rgba } => canvas.draw_text(*x, *y, text, *scale, *rgba),
            PaintCommand::Image { node, x, y, width, height } => match images.get(*node) {
                Some(ImageState::Loaded(img)) => canvas.draw_image(*x, *y, *width, *height, img),
                _ => {
                    canvas.fill_rect(*x, *y, *width, *height, BROKEN_FILL);
                    canvas.stroke_rect(*x, *y, *width, *height, 1, BROKEN_BORDER);
                }
            },
        }
    }
    canvas.into_image()
}

/// Encode a raster as PNG or JPEG. JPEG drops the alpha channel.
pub fn encode(img: &RgbaImage, encoding: ImageEncoding, jpeg_quality: u8) -> Result<Vec<u8>> {
    let (w, h) = img.dimensions();
    let mut out = Vec::new();
    match encoding {
        ImageEncoding::Png => {
            PngEncoder::new(&mut out).write_image(img.as_raw(), w, h, ExtendedColorType::Rgba8)?;
        }
        ImageEncoding::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality.clamp(1, 100))
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)?;
        }
    }
    if out.is_empty() {
        return Err(Error::RenderError(format!("{:?} encoder produced no data", encoding)));
    }
    Ok(out)
}
