//! The Google Fonts family catalog

use serde::Deserialize;

use crate::{Error, Result};

/// Anti-hijacking prefix the metadata endpoint puts on its own line before the JSON
pub const SENTINEL: &[u8] = b")]}'";

/// One family and the weight tokens it is available in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMetadata {
    pub family: String,
    /// Catalog tokens such as `400` or `400i`, in catalog order
    pub weights: Vec<String>,
}

/// Every family known to the metadata endpoint, in catalog order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    families: Vec<FamilyMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    family_metadata_list: Vec<RawFamily>,
}

#[derive(Deserialize)]
struct RawFamily {
    family: String,
    fonts: serde_json::Map<String, serde_json::Value>,
}

impl Catalog {
    pub fn new(families: Vec<FamilyMetadata>) -> Self {
        Self { families }
    }

    /// Parse a metadata response body, with or without the sentinel line.
    pub fn from_response_bytes(body: &[u8]) -> Result<Self> {
        let json = strip_sentinel(body);
        let envelope: Envelope = serde_json::from_slice(json).map_err(|e| Error::Format {
            message: "expected an object with a familyMetadataList array".to_string(),
            source: Some(e),
        })?;

        let families = envelope
            .family_metadata_list
            .into_iter()
            .map(|raw| FamilyMetadata {
                family: raw.family,
                weights: raw.fonts.into_iter().map(|(token, _)| token).collect(),
            })
            .collect();

        Ok(Self { families })
    }

    pub fn families(&self) -> &[FamilyMetadata] {
        &self.families
    }

    /// Family names in catalog order
    pub fn family_names(&self) -> Vec<&str> {
        self.families.iter().map(|f| f.family.as_str()).collect()
    }

    pub fn get(&self, family: &str) -> Option<&FamilyMetadata> {
        self.families.iter().find(|f| f.family == family)
    }

    /// Weight tokens of `family`, or `None` if the catalog does not list it
    pub fn weights(&self, family: &str) -> Option<&[String]> {
        self.get(family).map(|f| f.weights.as_slice())
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Drop the first line if, and only if, it is exactly the sentinel.
fn strip_sentinel(body: &[u8]) -> &[u8] {
    let Some(newline) = body.iter().position(|&b| b == b'\n') else {
        return body;
    };
    let first_line = &body[..newline];
    let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);
    if first_line == SENTINEL {
        &body[newline + 1..]
    } else {
        body
    }
}
