//! Typed data layer for charpack: the legacy character definition dialect,
//! the shared-base manifest, and the output package manifest.
//!
//! This crate is pure: it parses text it is handed and produces documents,
//! but never touches the filesystem beyond the `*_file` convenience loaders.

pub mod basepack;
pub mod chardef;
pub mod emotes;
pub mod manifest;

pub use basepack::{
    load_base_manifest, parse_base_manifest, BaseManifestError, StandardBaseManifest,
    SFX_NAMESPACE,
};
pub use chardef::{parse_definition, CharacterDefinition, DefinitionError, RawEmoteEntry};
pub use emotes::{
    build_emotes, BuildWarning, DialectStrictness, Emote, EmoteSet, Preanimation, PreanimSfx,
    TICK_MS, ZOOM_FLAG,
};
pub use manifest::{
    parse_manifest_str, InterjectionOverride, ManifestInfo, PackageMeta, BLIP_FILE, CHAR_ICON,
};
