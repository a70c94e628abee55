use crate::emotes::{Emote, Preanimation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed archive name of the character icon.
pub const CHAR_ICON: &str = "char_icon.png";

/// Archive name the blip sound is copied under.
pub const BLIP_FILE: &str = "blip.wav";

/// A character-local replacement for one of the stock interjections:
/// the sound file as found in the bundle, and its companion bubble
/// animation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterjectionOverride {
    pub sound: String,
    pub anim: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub date: String,
}

/// The package's descriptive document, written as `info.json` next to the
/// content archive.
///
/// Serialization must stay byte-stable for identical inputs: field order is
/// fixed by declaration order, every map is a `BTreeMap`, and absent
/// optionals are skipped rather than written as null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatbox_name: Option<String>,
    pub side: String,
    pub icon: String,
    pub blip: String,
    pub emotes: Vec<Emote>,
    pub preanims: BTreeMap<String, Preanimation>,
    pub objection_override: BTreeMap<String, InterjectionOverride>,
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PackageMeta>,
    #[serde(default)]
    pub digest: String,
}

impl ManifestInfo {
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestInfo, serde_json::Error> {
    serde_json::from_str(input)
}
