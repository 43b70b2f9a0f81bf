//! Synthetic images that stand in for content we could not obtain: the
//! image placeholder used by the resolver's last tier and the error card
//! used by the slide capturer's last tier.

use super::layout::{wrap, GLYPH};
use super::raster::{encode, text_width, Canvas};
use super::ImageEncoding;
use crate::data_uri;
use crate::dom::clamp_box;
use image::RgbaImage;

/// 1x1 white PNG used if encoding a synthetic image ever fails
pub const FALLBACK_PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAAC0lEQVR4nGP4DwQACfsD/fteaysAAAAASUVORK5CYII=";

const GRADIENT_TOP: (u8, u8, u8, u8) = (248, 249, 250, 255);
const GRADIENT_BOTTOM: (u8, u8, u8, u8) = (233, 236, 239, 255);
const ICON_BORDER: (u8, u8, u8, u8) = (173, 181, 189, 255);
const ICON_FILL: (u8, u8, u8, u8) = (222, 226, 230, 255);
const CAPTION: (u8, u8, u8, u8) = (73, 80, 87, 255);
const ERROR_RED: (u8, u8, u8, u8) = (220, 53, 69, 255);

fn centered_x(width: u32, line: &str, scale: u32) -> i32 {
    (width as i32 - text_width(line, scale) as i32) / 2
}

/// Placeholder for an image that could not be inlined: light gradient,
/// a bordered picture glyph and `caption` plus the box dimensions.
pub fn placeholder(width: u32, height: u32, caption: &str) -> RgbaImage {
    let (width, height) = clamp_box(width, height);
    let mut canvas = Canvas::new(width, height, GRADIENT_TOP);
    canvas.vertical_gradient(GRADIENT_TOP, GRADIENT_BOTTOM);
    canvas.stroke_rect(0, 0, width, height, 1, ICON_BORDER);

    let dims = format!("{}x{}", width, height);
    let text_h = (GLYPH * 2 + 4) as i32;
    let icon = (width.min(height) / 3).clamp(8, 64);
    let block_h = icon as i32 + 6 + text_h;
    let top = ((height as i32 - block_h) / 2).max(2);

    let ix = (width as i32 - icon as i32) / 2;
    canvas.fill_rect(ix, top, icon, icon, ICON_FILL);
    canvas.stroke_rect(ix, top, icon, icon, 2, ICON_BORDER);
    // mountain and sun inside the frame
    let inner = icon as i32 - 8;
    if inner > 4 {
        let base = top + icon as i32 - 4;
        for step in 0..inner / 2 {
            let x = ix + 4 + step;
            canvas.fill_rect(x, base - step, ((inner - 2 * step).max(1)) as u32, 1, ICON_BORDER);
        }
        canvas.fill_rect(ix + icon as i32 - 4 - inner / 4, top + 4, (inner / 5).max(1) as u32, (inner / 5).max(1) as u32, ICON_BORDER);
    }

    let ty = top + icon as i32 + 6;
    canvas.draw_text(centered_x(width, caption, 1), ty, caption, 1, CAPTION);
    canvas.draw_text(centered_x(width, &dims, 1), ty + GLYPH as i32 + 4, &dims, 1, CAPTION);
    canvas.into_image()
}

/// PNG data URI of [`placeholder`]. Never fails.
pub fn placeholder_data_uri(width: u32, height: u32, caption: &str) -> String {
    png_data_uri(&placeholder(width, height, caption))
}

/// Slide-shaped error card: white background, red centered text.
pub fn error_card(width: u32, height: u32, title: &str) -> RgbaImage {
    let (width, height) = clamp_box(width, height);
    let mut canvas = Canvas::new(width, height, (255, 255, 255, 255));
    let message = format!("Failed to capture: {}", title);

    let scale = if text_width(&message, 2) + 2 * GLYPH <= width { 2 } else { 1 };
    let chars_per_line = ((width.saturating_sub(2 * GLYPH)) / (GLYPH * scale)) as usize;
    let lines = wrap(&message, chars_per_line);
    let line_h = (GLYPH * scale + 4) as i32;
    let top = (height as i32 - line_h * lines.len() as i32) / 2;
    for (i, line) in lines.iter().enumerate() {
        canvas.draw_text(centered_x(width, line, scale), top + i as i32 * line_h, line, scale, ERROR_RED);
    }
    canvas.into_image()
}

/// PNG data URI of [`error_card`]. Never fails.
pub fn error_card_data_uri(width: u32, height: u32, title: &str) -> String {
    png_data_uri(&error_card(width, height, title))
}

fn png_data_uri(img: &RgbaImage) -> String {
    match encode(img, ImageEncoding::Png, 100) {
        Ok(bytes) => data_uri::encode("image/png", &bytes),
        Err(e) => {
            log::warn!("synthetic image encoding failed, using 1x1 fallback: {}", e);
            FALLBACK_PNG_DATA_URI.to_string()
        }
    }
}
