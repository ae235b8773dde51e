//! Best-effort metadata extraction for uploaded files.
//!
//! Only headers are inspected. Anything that cannot be recognized yields
//! `None` fields rather than an error, so extraction never fails an upload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::record::FileKind;

/// Dimensions and format of an uploaded image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

/// Page count and document info of an uploaded PDF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfInfo {
    pub pages: Option<u32>,
    pub info: BTreeMap<String, String>,
}

const PDF_INFO_KEYS: [&str; 4] = ["Title", "Author", "Creator", "Producer"];
const MAX_INFO_LEN: usize = 256;

/// Decide whether an upload is an image or a PDF.
///
/// Uses the declared content type first, then the filename extension.
pub fn detect_upload_kind(filename: &str, content_type: Option<&str>) -> Option<FileKind> {
    let from_mime = |mime: &str| -> Option<FileKind> {
        match mime {
            "application/pdf" => Some(FileKind::Pdf),
            "image/jpeg" | "image/jpg" | "image/png" | "image/gif" | "image/webp" => {
                Some(FileKind::Image)
            }
            _ => None,
        }
    };

    if let Some(kind) = content_type.and_then(|ct| from_mime(ct.trim().to_ascii_lowercase().as_str())) {
        return Some(kind);
    }

    mime_guess::from_path(filename)
        .iter()
        .find_map(|mime| from_mime(mime.essence_str()))
}

/// Read image dimensions from the file header.
pub fn image_info(content: &[u8], filename: &str) -> ImageInfo {
    let sniffed = png_size(content)
        .map(|d| ("png", d))
        .or_else(|| jpeg_size(content).map(|d| ("jpeg", d)))
        .or_else(|| gif_size(content).map(|d| ("gif", d)))
        .or_else(|| webp_size(content).map(|d| ("webp", d)));

    match sniffed {
        Some((format, (width, height))) => ImageInfo {
            width: Some(width),
            height: Some(height),
            format: Some(format.to_string()),
        },
        None => ImageInfo {
            width: None,
            height: None,
            format: mime_guess::from_path(filename)
                .first()
                .filter(|m| m.type_() == mime_guess::mime::IMAGE)
                .map(|m| m.subtype().as_str().to_string()),
        },
    }
}

/// Count pages and read the document info strings of a PDF.
pub fn pdf_info(content: &[u8]) -> PdfInfo {
    if !content.starts_with(b"%PDF") {
        return PdfInfo::default();
    }

    let mut info = BTreeMap::new();
    for key in PDF_INFO_KEYS {
        if let Some(value) = pdf_string_value(content, key) {
            info.insert(key.to_string(), value);
        }
    }

    PdfInfo {
        pages: pdf_page_count(content),
        info,
    }
}

fn be_u16(b: &[u8], at: usize) -> Option<u32> {
    Some(u16::from_be_bytes([*b.get(at)?, *b.get(at + 1)?]) as u32)
}

fn le_u16(b: &[u8], at: usize) -> Option<u32> {
    Some(u16::from_le_bytes([*b.get(at)?, *b.get(at + 1)?]) as u32)
}

fn le_u24(b: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes([*b.get(at)?, *b.get(at + 1)?, *b.get(at + 2)?, 0]))
}

fn png_size(b: &[u8]) -> Option<(u32, u32)> {
    if !b.starts_with(b"\x89PNG\r\n\x1a\n") || b.get(12..16)? != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(b.get(16..20)?.try_into().ok()?);
    let height = u32::from_be_bytes(b.get(20..24)?.try_into().ok()?);
    Some((width, height))
}

fn gif_size(b: &[u8]) -> Option<(u32, u32)> {
    if !(b.starts_with(b"GIF87a") || b.starts_with(b"GIF89a")) {
        return None;
    }
    Some((le_u16(b, 6)?, le_u16(b, 8)?))
}

fn jpeg_size(b: &[u8]) -> Option<(u32, u32)> {
    if !b.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut i = 2;
    while i + 1 < b.len() {
        if b[i] != 0xFF {
            return None;
        }
        let marker = b[i + 1];
        match marker {
            // Fill bytes.
            0xFF => {
                i += 1;
                continue;
            }
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(b, i + 5)?;
                let width = be_u16(b, i + 7)?;
                return Some((width, height));
            }
            _ => {
                let len = be_u16(b, i + 2)? as usize;
                if len < 2 {
                    return None;
                }
                i += 2 + len;
            }
        }
    }
    None
}

fn webp_size(b: &[u8]) -> Option<(u32, u32)> {
    if b.get(0..4)? != b"RIFF" || b.get(8..12)? != b"WEBP" {
        return None;
    }

    match b.get(12..16)? {
        b"VP8 " => Some((le_u16(b, 26)? & 0x3FFF, le_u16(b, 28)? & 0x3FFF)),
        b"VP8L" => {
            let b1 = *b.get(21)? as u32;
            let b2 = *b.get(22)? as u32;
            let b3 = *b.get(23)? as u32;
            let b4 = *b.get(24)? as u32;
            let width = 1 + (((b2 & 0x3F) << 8) | b1);
            let height = 1 + (((b4 & 0x0F) << 10) | (b3 << 2) | ((b2 & 0xC0) >> 6));
            Some((width, height))
        }
        b"VP8X" => Some((1 + le_u24(b, 24)?, 1 + le_u24(b, 27)?)),
        _ => None,
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn skip_ws(b: &[u8], mut i: usize) -> usize {
    while i < b.len() && b[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn pdf_page_count(b: &[u8]) -> Option<u32> {
    let mut pages = 0u32;
    let mut pos = 0;

    while let Some(at) = find(b, b"/Type", pos) {
        let i = skip_ws(b, at + 5);
        if b.get(i..i + 5) == Some(&b"/Page"[..]) && b.get(i + 5) != Some(&b's') {
            pages += 1;
        }
        pos = at + 5;
    }

    if pages > 0 {
        return Some(pages);
    }

    // Compressed object streams hide the page objects; fall back to /Count.
    let mut best = None;
    let mut pos = 0;
    while let Some(at) = find(b, b"/Count", pos) {
        let start = skip_ws(b, at + 6);
        let end = b[start..]
            .iter()
            .position(|c| !c.is_ascii_digit())
            .map_or(b.len(), |p| p + start);
        if let Some(n) = std::str::from_utf8(&b[start..end])
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            best = Some(best.map_or(n, |m: u32| m.max(n)));
        }
        pos = at + 6;
    }
    best
}

fn pdf_string_value(b: &[u8], key: &str) -> Option<String> {
    let needle = format!("/{key}");
    let at = find(b, needle.as_bytes(), 0)?;
    let mut i = skip_ws(b, at + needle.len());
    if b.get(i) != Some(&b'(') {
        return None;
    }
    i += 1;

    let mut out = Vec::new();
    let mut depth = 0;
    while i < b.len() && out.len() < MAX_INFO_LEN {
        match b[i] {
            b'\\' => {
                if let Some(&next) = b.get(i + 1) {
                    out.push(match next {
                        b'n' => b'\n',
                        b't' => b'\t',
                        other => other,
                    });
                }
                i += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' if depth == 0 => break,
            b')' => depth -= 1,
            _ => {}
        }
        out.push(b[i]);
        i += 1;
    }

    let value = String::from_utf8_lossy(&out).trim().to_string();
    (!value.is_empty()).then_some(value)
}
