//! Helpers for `data:` URIs used to inline images and carry captured slides.

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Whether `src` is already a self-contained data URI
pub fn is_data_uri(src: &str) -> bool {
    src.trim_start().starts_with("data:")
}

/// Encode bytes as `data:<mime>;base64,<payload>`
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decode a data URI into its MIME type and raw bytes.
///
/// Non-base64 payloads are returned as their literal bytes.
pub fn decode(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::ParseError("not a data URI".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::ParseError("data URI without payload".into()))?;

    let mut parts = header.split(';');
    let mime = match parts.next() {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => "text/plain".to_string(),
    };

    if parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::ParseError(format!("invalid base64 in data URI: {}", e)))?;
        Ok((mime, bytes))
    } else {
        Ok((mime, payload.as_bytes().to_vec()))
    }
}

/// MIME type of raster image bytes, judged by their magic number.
/// `None` for anything we could not decode later (HTML, SVG, garbage).
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|fmt| fmt.to_mime_type())
}
