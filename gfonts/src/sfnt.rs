//! Font container detection, WOFF2 decoding, and big-endian table access

use crate::{Error, Result};

/// The format of a font file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    /// TrueType outlines (.ttf)
    Ttf,
    /// OpenType with CFF outlines (.otf)
    Otf,
    /// TrueType/OpenType collection (.ttc)
    Collection,
    /// WOFF (Web Open Font Format) version 1
    Woff,
    /// WOFF (Web Open Font Format) version 2
    Woff2,
    /// Unknown format
    Unknown,
}

impl FontFormat {
    /// Detect the format of a font file from its magic bytes
    pub fn detect(data: &[u8]) -> Self {
        if data.len() < 4 {
            return FontFormat::Unknown;
        }
        match &data[0..4] {
            // WOFF2: "wOF2"
            [0x77, 0x4F, 0x46, 0x32] => FontFormat::Woff2,
            // WOFF1: "wOFF"
            [0x77, 0x4F, 0x46, 0x46] => FontFormat::Woff,
            // TrueType: 0x00010000
            [0x00, 0x01, 0x00, 0x00] => FontFormat::Ttf,
            // OpenType with CFF: "OTTO"
            [0x4F, 0x54, 0x54, 0x4F] => FontFormat::Otf,
            // "ttcf"
            [0x74, 0x74, 0x63, 0x66] => FontFormat::Collection,
            // "true" (used by some Mac fonts)
            [0x74, 0x72, 0x75, 0x65] => FontFormat::Ttf,
            _ => FontFormat::Unknown,
        }
    }
}

/// Turn a downloaded subset into plain sfnt data.
///
/// TrueType and OpenType data is returned unchanged, WOFF2 is decompressed.
/// Everything else is rejected, since the merge step only reads sfnt tables.
pub fn decompress_font(font_data: &[u8]) -> Result<Vec<u8>> {
    match FontFormat::detect(font_data) {
        FontFormat::Ttf | FontFormat::Otf => Ok(font_data.to_vec()),
        FontFormat::Woff2 => decompress_woff2(font_data),
        FontFormat::Woff => Err(Error::Merge(
            "WOFF1 subsets are not supported, request WOFF2 or TTF instead".to_string(),
        )),
        FontFormat::Collection => Err(Error::Merge(
            "font collections cannot be merged".to_string(),
        )),
        FontFormat::Unknown => Err(Error::Merge(
            "data is not a recognizable font binary".to_string(),
        )),
    }
}

#[cfg(feature = "woff2")]
fn decompress_woff2(font_data: &[u8]) -> Result<Vec<u8>> {
    woofwoof::decompress(font_data)
        .ok_or_else(|| Error::Merge("WOFF2 decompression failed".to_string()))
}

#[cfg(not(feature = "woff2"))]
fn decompress_woff2(_font_data: &[u8]) -> Result<Vec<u8>> {
    Err(Error::Merge(
        "WOFF2 support is disabled (enable the `woff2` feature)".to_string(),
    ))
}

fn truncated(what: &str, offset: usize) -> Error {
    Error::Merge(format!("{what} table is truncated at byte {offset}"))
}

/// Bounds-checked big-endian reader over one table
#[derive(Clone, Copy)]
pub(crate) struct TableReader<'a> {
    pub(crate) name: &'static str,
    pub(crate) data: &'a [u8],
}

impl<'a> TableReader<'a> {
    pub(crate) fn new(name: &'static str, data: &'a [u8]) -> Self {
        Self { name, data }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| truncated(self.name, offset))
    }

    pub(crate) fn u16(&self, offset: usize) -> Result<u16> {
        let b = self.bytes(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn i16(&self, offset: usize) -> Result<i16> {
        Ok(self.u16(offset)? as i16)
    }

    pub(crate) fn u32(&self, offset: usize) -> Result<u32> {
        let b = self.bytes(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

pub(crate) fn put_i16(buf: &mut [u8], offset: usize, value: i16) {
    put_u16(buf, offset, value as u16);
}

pub(crate) fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}
