//! Stylesheet parsing
//!
//! Stylesheets are parsed with lightningcss in error-recovery mode: a rule or
//! declaration that does not parse is dropped and logged, and everything
//! around it is kept. Only input that is not UTF-8 is rejected outright.

use std::sync::{Arc, RwLock};

use lightningcss::error::{Error as CssError, ParserError};
use lightningcss::properties::font::FontFamily;
use lightningcss::rules::CssRule;
use lightningcss::rules::font_face::FontFaceRule;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;

use crate::{Error, Result};

/// A parsed stylesheet, borrowing from the CSS text
#[derive(Debug)]
pub struct Stylesheet<'i> {
    sheet: StyleSheet<'i>,
    skipped: usize,
}

impl<'i> Stylesheet<'i> {
    /// Top-level rules, in source order
    pub fn rules(&self) -> &[CssRule<'i>] {
        &self.sheet.rules.0
    }

    /// Every top-level `@font-face` rule, in source order
    pub fn font_faces(&self) -> impl Iterator<Item = &FontFaceRule<'i>> {
        self.rules().iter().filter_map(|rule| match rule {
            CssRule::FontFace(font_face) => Some(font_face),
            _ => None,
        })
    }

    /// How many rules or declarations were dropped because they did not parse
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Parse a stylesheet as served over HTTP.
pub fn parse_stylesheet(bytes: &[u8]) -> Result<Stylesheet<'_>> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        let (line, column) = line_and_column(bytes, e.valid_up_to());
        Error::parse(line, column, "stylesheet is not valid UTF-8")
    })?;
    parse_stylesheet_str(text)
}

pub fn parse_stylesheet_str(text: &str) -> Result<Stylesheet<'_>> {
    let warnings = Arc::new(RwLock::new(Vec::new()));
    let options = ParserOptions {
        error_recovery: true,
        warnings: Some(Arc::clone(&warnings)),
        ..ParserOptions::default()
    };
    let sheet = StyleSheet::parse(text, options).map_err(|e| css_error(&e))?;

    let skipped = match warnings.read() {
        Ok(warnings) => {
            for warning in warnings.iter() {
                tracing::debug!("Skipped unparseable CSS: {warning}");
            }
            warnings.len()
        }
        Err(_) => 0,
    };

    Ok(Stylesheet { sheet, skipped })
}

fn css_error(e: &CssError<ParserError<'_>>) -> Error {
    let (line, column) = e
        .loc
        .as_ref()
        .map_or((0, 0), |loc| (loc.line as usize + 1, loc.column as usize));
    Error::parse(line, column, e.kind.to_string())
}

/// 1-based line and byte column of `offset`
fn line_and_column(bytes: &[u8], offset: usize) -> (usize, usize) {
    let before = &bytes[..offset.min(bytes.len())];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let column = match before.iter().rposition(|b| *b == b'\n') {
        Some(newline) => before.len() - newline,
        None => before.len() + 1,
    };
    (line, column)
}

/// The name a `font-family` descriptor or `local()` source refers to.
///
/// Generic families (`serif`, `monospace`, ...) name no particular font.
pub fn family_name(family: &FontFamily<'_>) -> Option<String> {
    match family {
        FontFamily::Generic(_) => None,
        FontFamily::FamilyName(name) => {
            let css = name.to_css_string(PrinterOptions::default()).ok()?;
            let name = unescape(&css);
            (!name.is_empty()).then_some(name)
        }
    }
}

/// Undo CSS serialization of an identifier sequence or string.
fn unescape(css: &str) -> String {
    let inner = css
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(css);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            out.extend(chars.next());
            continue;
        }
        // one whitespace character terminates a hex escape
        if chars.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            chars.next();
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        out.push(decoded);
    }
    out
}
