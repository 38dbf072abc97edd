//! Image header sniffing.
//!
//! Textures hold encoded image bytes; only the header is parsed, to report
//! dimensions and to guess a MIME type when the manifest omits one.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const KTX2_SIGNATURE: [u8; 12] = [
    0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

/// Guess the MIME type from magic bytes.
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&PNG_SIGNATURE) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8]) {
        Some("image/jpeg")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(&KTX2_SIGNATURE) {
        Some("image/ktx2")
    } else {
        None
    }
}

/// Width and height from the encoded image header.
pub fn image_size(data: &[u8], mime_type: &str) -> Option<(u32, u32)> {
    match mime_type {
        "image/png" => png_size(data),
        "image/jpeg" => jpeg_size(data),
        "image/webp" => webp_size(data),
        "image/ktx2" => ktx2_size(data),
        _ => sniff_mime_type(data).and_then(|m| image_size(data, m)),
    }
}

fn png_size(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 24 || !data.starts_with(&PNG_SIGNATURE) || &data[12..16] != b"IHDR" {
        return None;
    }
    Some((
        BigEndian::read_u32(&data[16..20]),
        BigEndian::read_u32(&data[20..24]),
    ))
}

fn jpeg_size(data: &[u8]) -> Option<(u32, u32)> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        // Fill bytes and standalone markers carry no length.
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0xD8 || (0xD0..=0xD7).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let len = BigEndian::read_u16(&data[pos + 2..pos + 4]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if pos + 9 > data.len() {
                return None;
            }
            let h = BigEndian::read_u16(&data[pos + 5..pos + 7]) as u32;
            let w = BigEndian::read_u16(&data[pos + 7..pos + 9]) as u32;
            return Some((w, h));
        }
        pos += 2 + len;
    }
    None
}

fn webp_size(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 30 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return None;
    }
    match &data[12..16] {
        b"VP8 " => {
            let w = LittleEndian::read_u16(&data[26..28]) & 0x3FFF;
            let h = LittleEndian::read_u16(&data[28..30]) & 0x3FFF;
            Some((w as u32, h as u32))
        }
        b"VP8L" => {
            let b = &data[21..25];
            let w = 1 + (((b[1] as u32 & 0x3F) << 8) | b[0] as u32);
            let h = 1 + (((b[3] as u32 & 0x0F) << 10) | ((b[2] as u32) << 2) | ((b[1] as u32 & 0xC0) >> 6));
            Some((w, h))
        }
        b"VP8X" => {
            let w = 1 + LittleEndian::read_u24(&data[24..27]);
            let h = 1 + LittleEndian::read_u24(&data[27..30]);
            Some((w, h))
        }
        _ => None,
    }
}

fn ktx2_size(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 28 || !data.starts_with(&KTX2_SIGNATURE) {
        return None;
    }
    Some((
        LittleEndian::read_u32(&data[20..24]),
        LittleEndian::read_u32(&data[24..28]),
    ))
}

/// File extension for a MIME type, without the dot.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/ktx2" => "ktx2",
        "image/avif" => "avif",
        _ => "bin",
    }
}

/// MIME type implied by a file extension or URI.
pub fn mime_for_uri(uri: &str) -> Option<&'static str> {
    let ext = uri.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "ktx2" => Some("image/ktx2"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}
