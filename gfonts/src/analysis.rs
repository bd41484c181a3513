//! `@font-face` analysis
//!
//! Turns a parsed stylesheet into font keys, their subset URIs, and the
//! `local()` names the CDN advertises for each face.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use lightningcss::properties::font::{AbsoluteFontWeight, FontWeight};
use lightningcss::rules::font_face::{self, FontFaceProperty, Source};

use crate::css::{Stylesheet, family_name};
use crate::style::{BOLD_WEIGHT, NORMAL_WEIGHT};
use crate::{Error, FontKey, FontStyle, Result};

/// A parsed @font-face rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFaceRule {
    /// The font-family name declared in @font-face
    pub family: String,
    pub style: FontStyle,
    /// Every `url(...)` of the `src` descriptor, in order
    pub sources: Vec<String>,
    /// Arguments of the `local(...)` sources
    pub local_names: Vec<String>,
}

impl FontFaceRule {
    pub fn key(&self) -> FontKey {
        FontKey::new(self.family.clone(), self.style)
    }
}

/// Read every usable `@font-face` rule of a stylesheet.
///
/// Rules without a family or with a relative weight (`bolder`, `lighter`)
/// are skipped with a warning.
pub fn font_face_rules(stylesheet: &Stylesheet<'_>) -> Vec<FontFaceRule> {
    stylesheet
        .font_faces()
        .filter_map(|rule| match parse_font_face(&rule.properties) {
            Ok(rule) => Some(rule),
            Err(reason) => {
                tracing::warn!("Skipping @font-face rule: {reason}");
                None
            }
        })
        .collect()
}

fn parse_font_face(
    properties: &[FontFaceProperty<'_>],
) -> std::result::Result<FontFaceRule, String> {
    let mut family = None;
    let mut weight = None;
    let mut italic = false;
    let mut sources = Vec::new();
    let mut local_names = Vec::new();

    // a repeated descriptor overrides the earlier one
    for property in properties {
        match property {
            FontFaceProperty::FontFamily(value) => family = family_name(value),
            FontFaceProperty::FontWeight(range) => weight = Some(&range.0),
            FontFaceProperty::FontStyle(style) => {
                italic = matches!(style, font_face::FontStyle::Italic);
            }
            FontFaceProperty::Source(list) => {
                sources.clear();
                local_names.clear();
                for source in list {
                    match source {
                        Source::Url(url) => sources.push(url.url.url.to_string()),
                        Source::Local(name) => local_names.extend(family_name(name)),
                    }
                }
            }
            _ => {}
        }
    }

    let family = family.ok_or("no font-family")?;
    let weight = match weight {
        None => NORMAL_WEIGHT,
        Some(value) => css_weight(value)
            .ok_or_else(|| format!("unsupported font-weight {value:?} in {family:?}"))?,
    };

    Ok(FontFaceRule {
        family,
        style: FontStyle::new(weight, italic),
        sources,
        local_names,
    })
}

/// Numeric weight of an absolute `font-weight`; a range resolves to its start.
fn css_weight(weight: &FontWeight) -> Option<u16> {
    match weight {
        FontWeight::Absolute(AbsoluteFontWeight::Normal) => Some(NORMAL_WEIGHT),
        FontWeight::Absolute(AbsoluteFontWeight::Bold) => Some(BOLD_WEIGHT),
        FontWeight::Absolute(AbsoluteFontWeight::Weight(n))
            if n.fract() == 0.0 && (1.0..=1000.0).contains(n) =>
        {
            Some(*n as u16)
        }
        _ => None,
    }
}

/// Group every `@font-face` source URI by font key.
///
/// Keys keep the order in which they first appear, and URIs keep their order
/// across all rules sharing a key.
pub fn extract_font_keys(stylesheet: &Stylesheet<'_>) -> IndexMap<FontKey, Vec<String>> {
    font_keys(&font_face_rules(stylesheet))
}

/// [`extract_font_keys`] for rules that were already read
pub fn font_keys(rules: &[FontFaceRule]) -> IndexMap<FontKey, Vec<String>> {
    let mut keys: IndexMap<FontKey, Vec<String>> = IndexMap::new();
    for rule in rules {
        let key = rule.key();
        if rule.sources.is_empty() {
            tracing::warn!(%key, "@font-face rule has no url() source");
        }
        keys.entry(key).or_default().extend(rule.sources.iter().cloned());
    }
    keys
}

/// Collect the `local()` names of all rules.
pub fn extract_local_names(rules: &[FontFaceRule]) -> BTreeSet<String> {
    rules
        .iter()
        .flat_map(|rule| rule.local_names.iter().cloned())
        .collect()
}

/// Pick the name with the fewest distinct characters, ignoring spaces.
///
/// Ties go to the lexicographically smallest name.
pub fn select_simplest_name<I, S>(names: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| {
            let name = name.as_ref();
            let distinct: BTreeSet<char> = name.chars().filter(|c| *c != ' ').collect();
            (distinct.len(), name.to_string())
        })
        .min()
        .map(|(_, name)| name)
        .ok_or_else(|| Error::Value("no font names to choose from".to_string()))
}
