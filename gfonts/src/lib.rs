#![doc = include_str!("../README.md")]

mod analysis;
mod catalog;
mod client;
mod config;
pub mod css;
mod dispatch;
mod error;
mod merge;
mod pipeline;
mod session;
mod sfnt;
mod style;

#[cfg(test)]
mod testing;

pub use analysis::{
    FontFaceRule, extract_font_keys, extract_local_names, font_face_rules, font_keys,
    select_simplest_name,
};
pub use catalog::{Catalog, FamilyMetadata};
pub use client::FontsClient;
pub use config::ClientConfig;
pub use dispatch::{
    Dispatcher, Generation, GenerationCounter, TaskError, TaskEvent, TaskHandle, TaskListener,
};
pub use error::{Error, Result};
pub use merge::merge_subsets;
pub use pipeline::{FontInstance, load_selection};
pub use session::Session;
pub use sfnt::{FontFormat, decompress_font};
pub use style::{
    BOLD_WEIGHT, FontKey, FontStyle, NORMAL_WEIGHT, normalized_weight, weight_keyword,
    weight_token_to_numeric,
};
