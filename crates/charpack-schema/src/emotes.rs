use crate::chardef::{CharacterDefinition, DefinitionError, RawEmoteEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One definition tick is 60 milliseconds.
pub const TICK_MS: u64 = 60;

/// The flag token marking a zoomed emote. The legacy format writes it as
/// text, so the comparison is textual.
pub const ZOOM_FLAG: &str = "5";

/// Preanim tokens meaning "no preanimation" (exact, case-sensitive).
const NO_PREANIM: [&str; 2] = ["-", "normal"];

/// How to treat a preanimation that has no `[Time]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialectStrictness {
    /// Omit the duration and record a warning.
    #[default]
    Lenient,
    /// Fail the conversion.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Emote {
    pub name: String,
    pub icon: String,
    pub idle: String,
    pub talking: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talking_preanim: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreanimSfx {
    pub file: String,
    pub delay: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preanimation {
    pub anim: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sfx: Option<PreanimSfx>,
}

/// A substituted default, reported alongside the build result so callers can
/// distinguish it from a fatal error without inspecting error classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    MissingDuration { preanim: String },
    MissingSoundName { index: u32 },
    MissingSoundDelay { index: u32 },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDuration { preanim } => {
                write!(f, "preanimation '{preanim}' has no [Time] entry; duration omitted")
            }
            Self::MissingSoundName { index } => {
                write!(f, "no [SoundN] entry for emote {index}; assuming no sound")
            }
            Self::MissingSoundDelay { index } => {
                write!(f, "no [SoundT] entry for emote {index}; sound delay set to 0")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmoteSet {
    pub emotes: Vec<Emote>,
    pub preanims: BTreeMap<String, Preanimation>,
    pub warnings: Vec<BuildWarning>,
}

/// Derive the ordered emote list and deduplicated preanimation table.
///
/// The first emote to reference a preanimation defines it; later emotes only
/// attach by name. `emotions_folder` is the already-resolved on-disk name of
/// the bundle's icon folder.
pub fn build_emotes(
    def: &CharacterDefinition,
    emotions_folder: &str,
    strictness: DialectStrictness,
) -> Result<EmoteSet, DefinitionError> {
    let mut emotes = Vec::with_capacity(def.raw_emotes.len());
    let mut preanims: BTreeMap<String, Preanimation> = BTreeMap::new();
    let mut warnings = Vec::new();

    for (offset, raw) in def.raw_emotes.iter().enumerate() {
        let index = offset as u32 + 1;
        let entry = split_entry(def, index, raw)?;

        let mut emote = Emote {
            name: entry.name.clone(),
            icon: format!("{emotions_folder}/button{index}_on.png"),
            idle: format!("(a){}.gif", entry.suffix),
            talking: format!("(b){}.gif", entry.suffix),
            zoom: (entry.flag == ZOOM_FLAG).then_some(true),
            talking_preanim: None,
        };

        if !NO_PREANIM.contains(&entry.preanim.as_str()) {
            emote.talking_preanim = Some(entry.preanim.clone());

            if !preanims.contains_key(&entry.preanim) {
                let preanim =
                    build_preanim(def, index, &entry.preanim, strictness, &mut warnings)?;
                preanims.insert(entry.preanim.clone(), preanim);
            }
        }

        emotes.push(emote);
    }

    Ok(EmoteSet {
        emotes,
        preanims,
        warnings,
    })
}

fn split_entry(
    def: &CharacterDefinition,
    index: u32,
    raw: &str,
) -> Result<RawEmoteEntry, DefinitionError> {
    let tokens: Vec<&str> = raw.split('#').collect();
    if tokens.len() < 4 {
        return Err(DefinitionError::ShortEmoteEntry {
            character: def.name.clone(),
            index,
            found: tokens.len(),
        });
    }
    Ok(RawEmoteEntry {
        name: tokens[0].to_owned(),
        preanim: tokens[1].to_owned(),
        suffix: tokens[2].to_owned(),
        flag: tokens[3].to_owned(),
    })
}

fn build_preanim(
    def: &CharacterDefinition,
    index: u32,
    name: &str,
    strictness: DialectStrictness,
    warnings: &mut Vec<BuildWarning>,
) -> Result<Preanimation, DefinitionError> {
    let duration = match def.time.get(&name.to_lowercase()) {
        Some(ticks) => Some(u64::from(*ticks) * TICK_MS),
        None => match strictness {
            DialectStrictness::Strict => {
                return Err(DefinitionError::MissingDuration {
                    character: def.name.clone(),
                    preanim: name.to_owned(),
                });
            }
            DialectStrictness::Lenient => {
                warnings.push(BuildWarning::MissingDuration {
                    preanim: name.to_owned(),
                });
                None
            }
        },
    };

    let sfx_name = match def.sound_names.get(&index) {
        Some(sfx) => sfx.as_str(),
        None => {
            warnings.push(BuildWarning::MissingSoundName { index });
            ""
        }
    };

    // A single filler character stands for "no sound" in the legacy data.
    let sfx = if sfx_name.len() > 1 {
        let delay = match def.sound_delays.get(&index) {
            Some(ticks) => u64::from(*ticks) * TICK_MS,
            None => {
                warnings.push(BuildWarning::MissingSoundDelay { index });
                0
            }
        };
        Some(PreanimSfx {
            file: format!("{sfx_name}.wav"),
            delay,
        })
    } else {
        None
    };

    Ok(Preanimation {
        anim: format!("{name}.gif"),
        duration,
        sfx,
    })
}
