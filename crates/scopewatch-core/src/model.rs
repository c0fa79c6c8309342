//! Data model shared by both pipelines
//!
//! - [`Program`]: one bounty program as published by the scope feed
//! - [`ScopeEntry`]: one in-scope asset, flattened with its program
//! - [`ProbeResult`]: raw output of the probing collaborator
//! - [`ProbeRecord`]: the persisted, comparable state of one service
//! - [`ChangeEvent`]: one reportable change

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Asset type of an in-scope entry
///
/// Only `URL` assets are monitored; every other feed value collapses to
/// [`AssetType::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    /// Hostname or URL asset
    #[serde(rename = "URL")]
    Url,
    /// Anything else (mobile apps, source code, hardware, ...)
    #[serde(other)]
    #[default]
    Other,
}

/// Decode a feed field, treating an explicit `null` like a missing one
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One in-scope asset of a bounty program
///
/// `asset_identifier` is the comparison key. The feed does not guarantee it
/// is unique across programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub asset_identifier: String,
    pub asset_type: AssetType,
    pub eligible_for_submission: bool,
    pub eligible_for_bounty: bool,
    pub max_severity: String,
    pub program_name: String,
    pub program_url: String,
}

impl ScopeEntry {
    /// Whether the scope pipeline tracks this entry at all
    pub fn is_monitored(&self) -> bool {
        self.asset_type == AssetType::Url
            && self.eligible_for_submission
            && !self.asset_identifier.trim().is_empty()
    }
}

/// One program of the upstream scope feed
///
/// Unknown fields are ignored so upstream additions don't break decoding,
/// and `null` in any field decodes to that field's empty value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub handle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub offers_bounties: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub targets: Targets,
}

/// Target lists of a program
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default, deserialize_with = "null_as_default")]
    pub in_scope: Vec<FeedScope>,
}

/// One in-scope item exactly as the feed publishes it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedScope {
    #[serde(default, deserialize_with = "null_as_default")]
    pub asset_identifier: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub asset_type: AssetType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub eligible_for_bounty: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub eligible_for_submission: bool,
    #[serde(default)]
    pub max_severity: Option<String>,
}

impl Program {
    /// Flatten this program's in-scope items into [`ScopeEntry`] values
    pub fn scope_entries(&self) -> impl Iterator<Item = ScopeEntry> + '_ {
        self.targets.in_scope.iter().map(|item| ScopeEntry {
            asset_identifier: item.asset_identifier.clone(),
            asset_type: item.asset_type,
            eligible_for_submission: item.eligible_for_submission,
            eligible_for_bounty: item.eligible_for_bounty,
            max_severity: item.max_severity.clone().unwrap_or_default(),
            program_name: self.name.clone(),
            program_url: self.url.clone(),
        })
    }
}

/// Decode the raw scope feed payload
///
/// # Errors
///
/// - [`Error::FeedDecode`] when the payload is not a JSON array of programs
/// - [`Error::EmptyFeed`] when it decodes to zero programs
pub fn decode_programs(payload: &[u8]) -> Result<Vec<Program>> {
    let programs: Vec<Program> =
        serde_json::from_slice(payload).map_err(|e| Error::feed_decode(e.to_string()))?;

    if programs.is_empty() {
        return Err(Error::EmptyFeed);
    }

    Ok(programs)
}

/// Output of the probing collaborator for one input host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// Host as it was handed to the prober
    pub input: String,
    /// Final URL after redirects (may be empty when the probe failed)
    pub url: String,
    pub title: String,
    pub technologies: Vec<String>,
    /// Redirect chain status codes, in order
    pub status_codes: Vec<String>,
    pub word_count: u64,
    pub succeeded: bool,
}

/// Latest observed HTTP state of one monitored service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub url: String,
    pub title: String,
    pub technologies: BTreeSet<String>,
    pub status_codes: Vec<String>,
    pub word_count: u64,
    pub is_live: bool,
}

impl From<ProbeResult> for ProbeRecord {
    fn from(result: ProbeResult) -> Self {
        if !result.succeeded {
            let url = if result.url.is_empty() {
                result.input.clone()
            } else {
                result.url
            };
            return Self {
                url,
                title: result.input,
                ..Self::default()
            };
        }

        Self {
            url: result.url,
            title: result.title,
            technologies: result.technologies.into_iter().collect(),
            status_codes: result.status_codes,
            word_count: result.word_count,
            is_live: true,
        }
    }
}

/// One reportable change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// An identifier not present in the previous scope snapshot
    NewScopeAsset { entry: ScopeEntry },

    /// A monitored service flipped between live and unreachable
    ScopeStatusChanged { url: String, old: bool, new: bool },

    /// A service URL not present in the previous probe snapshot
    NewLiveService { record: ProbeRecord },

    /// The set of redirect-chain status codes changed
    StatusCodeChanged {
        url: String,
        old: Vec<String>,
        new: Vec<String>,
    },

    WordCountChanged { url: String, old: u64, new: u64 },

    TechnologyChanged {
        url: String,
        old: BTreeSet<String>,
        new: BTreeSet<String>,
    },

    TitleChanged {
        url: String,
        old: String,
        new: String,
    },
}

impl ChangeEvent {
    /// Natural key of the entity this event is about
    pub fn key(&self) -> &str {
        match self {
            ChangeEvent::NewScopeAsset { entry } => &entry.asset_identifier,
            ChangeEvent::NewLiveService { record } => &record.url,
            ChangeEvent::ScopeStatusChanged { url, .. }
            | ChangeEvent::StatusCodeChanged { url, .. }
            | ChangeEvent::WordCountChanged { url, .. }
            | ChangeEvent::TechnologyChanged { url, .. }
            | ChangeEvent::TitleChanged { url, .. } => url,
        }
    }

    /// Stable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::NewScopeAsset { .. } => "new_scope_asset",
            ChangeEvent::ScopeStatusChanged { .. } => "scope_status_changed",
            ChangeEvent::NewLiveService { .. } => "new_live_service",
            ChangeEvent::StatusCodeChanged { .. } => "status_code_changed",
            ChangeEvent::WordCountChanged { .. } => "word_count_changed",
            ChangeEvent::TechnologyChanged { .. } => "technology_changed",
            ChangeEvent::TitleChanged { .. } => "title_changed",
        }
    }
}
