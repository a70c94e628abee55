use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("definition has no [{0}] section")]
    MissingSection(&'static str),
    #[error("missing required key '{key}' in [{section}]")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
    #[error("emote count is missing from [Emotions]")]
    MissingEmoteCount,
    #[error("emote count '{0}' is not a number")]
    InvalidEmoteCount(String),
    #[error("character '{character}': emote {index} is missing from [Emotions]")]
    MissingEmote { character: String, index: u32 },
    #[error("character '{character}': emote {index} has {found} fields, expected 4")]
    ShortEmoteEntry {
        character: String,
        index: u32,
        found: usize,
    },
    #[error("character '{character}': preanimation '{preanim}' has no entry in [Time]")]
    MissingDuration { character: String, preanim: String },
}

/// One raw emote definition, split on the `#` field separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEmoteEntry {
    pub name: String,
    pub preanim: String,
    pub suffix: String,
    pub flag: String,
}

/// Parsed character definition. Immutable once produced.
///
/// `name` already carries the display-name policy: the friendly `showname`
/// when the definition has one, the internal `name` otherwise. Keys of
/// `time` are stored lowercased, matching the dialect's case-insensitive
/// key lookup.
#[derive(Debug, Clone)]
pub struct CharacterDefinition {
    pub name: String,
    pub showname: Option<String>,
    pub side: String,
    pub gender: Option<String>,
    pub raw_emotes: Vec<String>,
    pub time: BTreeMap<String, u32>,
    pub sound_names: BTreeMap<u32, String>,
    pub sound_delays: BTreeMap<u32, u32>,
}

impl CharacterDefinition {
    pub fn emote_count(&self) -> u32 {
        self.raw_emotes.len() as u32
    }
}

/// Case-normalized view of the INI-style definition text.
///
/// Sections and keys are lowercased once here, so a later lookup hits the
/// same entry whether the source used canonical or all-lowercase casing.
struct RawSections {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl RawSections {
    fn parse(text: &str) -> Self {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for raw_line in text.trim_start_matches('\u{feff}').lines() {
            let line = raw_line.trim();
            if line.is_empty() || is_comment(line) {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                if let Some(name) = rest.split(']').next() {
                    let name = name.trim().to_lowercase();
                    sections.entry(name.clone()).or_default();
                    current = Some(name);
                    continue;
                }
            }
            // Key lines are split on the first '=' only; the value is kept
            // whole. Emote definitions use '#' as a field separator, so the
            // value must never be re-scanned for comment markers.
            let Some(section) = current.as_ref() else {
                debug!("ignoring key outside any section: {line}");
                continue;
            };
            match line.split_once('=') {
                Some((key, value)) => {
                    sections
                        .entry(section.clone())
                        .or_default()
                        .insert(key.trim().to_lowercase(), value.trim().to_owned());
                }
                None => debug!("ignoring malformed line in [{section}]: {line}"),
            }
        }

        Self { sections }
    }

    fn section(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(&name.to_lowercase())
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)
            .and_then(|s| s.get(&key.to_lowercase()))
            .map(String::as_str)
    }

    fn require(&self, section: &'static str, key: &'static str) -> Result<&str, DefinitionError> {
        if self.section(section).is_none() {
            return Err(DefinitionError::MissingSection(section));
        }
        self.get(section, key)
            .ok_or(DefinitionError::MissingKey { section, key })
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#')
        || line.starts_with(';')
        || line.starts_with("//")
        || line.starts_with("\\\\")
}

/// Parse the definition text into a [`CharacterDefinition`].
///
/// Tolerates canonical and all-lowercase section casing, the dialect's
/// comment styles, and absent optional tables; fails on anything the
/// conversion cannot proceed without.
pub fn parse_definition(text: &str) -> Result<CharacterDefinition, DefinitionError> {
    let raw = RawSections::parse(text);

    let internal_name = raw.require("Options", "name")?.to_owned();
    let showname = raw
        .get("Options", "showname")
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned);
    let name = showname.clone().unwrap_or_else(|| internal_name.clone());
    let side = raw.require("Options", "side")?.to_owned();
    let gender = raw
        .get("Options", "gender")
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned);

    let count_raw = raw
        .get("Emotions", "number")
        .ok_or(DefinitionError::MissingEmoteCount)?;
    let count: u32 = count_raw
        .parse()
        .map_err(|_| DefinitionError::InvalidEmoteCount(count_raw.to_owned()))?;

    let mut raw_emotes = Vec::with_capacity(count as usize);
    for index in 1..=count {
        let entry = raw
            .get("Emotions", &index.to_string())
            .ok_or_else(|| DefinitionError::MissingEmote {
                character: name.clone(),
                index,
            })?;
        raw_emotes.push(entry.to_owned());
    }

    let time = numeric_values(&raw, "Time");
    let sound_names = indexed_values(&raw, "SoundN");
    let sound_delays = indexed_numeric_values(&raw, "SoundT");

    Ok(CharacterDefinition {
        name,
        showname,
        side,
        gender,
        raw_emotes,
        time,
        sound_names,
        sound_delays,
    })
}

fn numeric_values(raw: &RawSections, section: &str) -> BTreeMap<String, u32> {
    let mut out = BTreeMap::new();
    if let Some(entries) = raw.section(section) {
        for (key, value) in entries {
            match value.parse::<u32>() {
                Ok(n) => {
                    out.insert(key.clone(), n);
                }
                Err(_) => debug!("skipping non-numeric [{section}] value {key}={value}"),
            }
        }
    }
    out
}

fn indexed_values(raw: &RawSections, section: &str) -> BTreeMap<u32, String> {
    let mut out = BTreeMap::new();
    if let Some(entries) = raw.section(section) {
        for (key, value) in entries {
            if let Ok(index) = key.parse::<u32>() {
                out.insert(index, value.clone());
            }
        }
    }
    out
}

fn indexed_numeric_values(raw: &RawSections, section: &str) -> BTreeMap<u32, u32> {
    let mut out = BTreeMap::new();
    if let Some(entries) = raw.section(section) {
        for (key, value) in entries {
            let Ok(index) = key.parse::<u32>() else {
                continue;
            };
            match value.parse::<u32>() {
                Ok(n) => {
                    out.insert(index, n);
                }
                Err(_) => debug!("skipping non-numeric [{section}] value {key}={value}"),
            }
        }
    }
    out
}
