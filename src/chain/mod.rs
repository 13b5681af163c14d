//! Chain types and per-file-type availability.
//!
//! A chain is a named specialized conversation strategy. `Chat` is always
//! available and never binds to document content; the others are offered
//! only for a matching detected file type.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Closed set of conversation strategies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChainType {
    Chat,
    FictionWriting,
    Proofreader,
    StoryAnalysis,
    OutlineWriter,
    RulesWriter,
    CharacterDevelopment,
    StyleGuide,
}

/// Chain metadata for selection UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub chain: ChainType,
    pub display_name: &'static str,
    pub description: &'static str,
}

impl ChainType {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Chat => "General Chat",
            Self::FictionWriting => "Fiction Writing",
            Self::Proofreader => "Proofreader",
            Self::StoryAnalysis => "Story Analysis",
            Self::OutlineWriter => "Outline Writer",
            Self::RulesWriter => "Rules Writer",
            Self::CharacterDevelopment => "Character Development",
            Self::StyleGuide => "Style Guide",
        }
    }

    /// Short name used in tab titles.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::FictionWriting => "Fiction",
            Self::Proofreader => "Proofread",
            Self::StoryAnalysis => "Analysis",
            Self::OutlineWriter => "Outline",
            Self::RulesWriter => "Rules",
            Self::CharacterDevelopment => "Characters",
            Self::StyleGuide => "Style",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Chat => "Document-independent general conversation",
            Self::FictionWriting => "Drafting and revising fiction manuscripts",
            Self::Proofreader => "Grammar, spelling, and continuity checks",
            Self::StoryAnalysis => "Structural analysis of a story",
            Self::OutlineWriter => "Building and reworking outlines",
            Self::RulesWriter => "Worldbuilding rules documents",
            Self::CharacterDevelopment => "Character sheets and arcs",
            Self::StyleGuide => "Style guide maintenance",
        }
    }

    pub fn info(self) -> ChainInfo {
        ChainInfo {
            chain: self,
            display_name: self.display_name(),
            description: self.description(),
        }
    }

    /// All chains, `Chat` first.
    pub fn all() -> Vec<ChainType> {
        ChainType::iter().collect()
    }
}

/// Compute the chains offered for a detected file type.
///
/// `Chat` is always present. The mapping is case-insensitive on the detected
/// value; an unrecognized value offers nothing beyond `Chat` — explicit
/// frontmatter is authoritative and there is no content-sniffing fallback.
pub fn chains_for_file_type(detected: Option<&str>) -> Vec<ChainType> {
    let mut chains = vec![ChainType::Chat];
    let Some(detected) = detected else {
        return chains;
    };
    match detected.to_ascii_lowercase().as_str() {
        "fiction" => chains.extend([
            ChainType::FictionWriting,
            ChainType::Proofreader,
            ChainType::StoryAnalysis,
        ]),
        "outline" => chains.push(ChainType::OutlineWriter),
        "rules" => chains.push(ChainType::RulesWriter),
        "character" | "characters" => chains.push(ChainType::CharacterDevelopment),
        "style" | "styleguide" | "style-guide" => chains.push(ChainType::StyleGuide),
        _ => {}
    }
    chains
}
