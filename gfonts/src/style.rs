//! Font style identity: weight plus italic, and the family it belongs to.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Weight of the `normal` keyword
pub const NORMAL_WEIGHT: u16 = 400;
/// Weight of the `bold` keyword
pub const BOLD_WEIGHT: u16 = 700;

/// Weight and slant of one font instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontStyle {
    /// CSS weight (100..=900 for the named classes)
    pub weight: u16,
    pub italic: bool,
}

impl FontStyle {
    /// Suffix marking italic styles in their string form (`400i`)
    pub const ITALIC_MARKER: char = 'i';

    pub const REGULAR: FontStyle = FontStyle::new(NORMAL_WEIGHT, false);

    pub const fn new(weight: u16, italic: bool) -> Self {
        Self { weight, italic }
    }

    /// Weight on the 0..100 scale used by desktop font databases
    pub fn normalized_weight(&self) -> Option<u8> {
        normalized_weight(self.weight)
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.weight)?;
        if self.italic {
            write!(f, "{}", Self::ITALIC_MARKER)?;
        }
        Ok(())
    }
}

impl FromStr for FontStyle {
    type Err = Error;

    /// Parses catalog tokens: `400`, `400i`, `400italic`, and bare `italic`.
    /// The CSS keywords `normal` and `bold` stand for 400 and 700.
    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        let (digits, italic) = if let Some(rest) = token.strip_suffix("italic") {
            (rest, true)
        } else if let Some(rest) = token.strip_suffix(Self::ITALIC_MARKER) {
            (rest, true)
        } else {
            (token, false)
        };

        if digits.is_empty() && italic {
            return Ok(FontStyle::new(NORMAL_WEIGHT, true));
        }

        let weight = match weight_keyword(digits) {
            Some(weight) => weight,
            None => digits
                .parse::<u16>()
                .map_err(|_| Error::Value(format!("not a font weight: {token:?}")))?,
        };
        Ok(FontStyle::new(weight, italic))
    }
}

/// Weight of a CSS weight keyword (`normal`, `bold`)
pub fn weight_keyword(keyword: &str) -> Option<u16> {
    if keyword.eq_ignore_ascii_case("normal") {
        Some(NORMAL_WEIGHT)
    } else if keyword.eq_ignore_ascii_case("bold") {
        Some(BOLD_WEIGHT)
    } else {
        None
    }
}

/// Groups `@font-face` rules and the subsets they point to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    pub family: String,
    pub style: FontStyle,
}

impl FontKey {
    pub fn new(family: impl Into<String>, style: FontStyle) -> Self {
        Self {
            family: family.into(),
            style,
        }
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.style)
    }
}

/// Map a CSS weight class onto the 0..100 desktop scale.
///
/// Only the nine classes 100, 200, ..., 900 are defined; anything else is `None`.
pub fn normalized_weight(css_weight: u16) -> Option<u8> {
    match css_weight {
        100 => Some(0),  // thin, hairline
        200 => Some(12), // extra light
        300 => Some(25), // light
        400 => Some(50), // normal
        500 => Some(57), // medium
        600 => Some(63), // semi bold
        700 => Some(75), // bold
        800 => Some(81), // extra bold
        900 => Some(87), // black, heavy
        _ => None,
    }
}

/// [`normalized_weight`] for a catalog token such as `700` or `700i`
pub fn weight_token_to_numeric(token: &str) -> Option<u8> {
    token
        .parse::<FontStyle>()
        .ok()
        .and_then(|style| style.normalized_weight())
}
