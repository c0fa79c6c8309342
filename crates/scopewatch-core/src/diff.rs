//! Snapshot comparison
//!
//! Pure functions turning a previous snapshot and the current cycle's data
//! into [`ChangeEvent`] values. Nothing here touches the disk or the network.
//!
//! Comparison is deliberately one-sided: keys that disappear between two
//! cycles produce no event in either pipeline.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::model::{ChangeEvent, ProbeRecord, ScopeEntry};

/// Which newly seen scope entries are worth reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopePolicy {
    /// Report entries that are not eligible for bounty (VDP-only assets)
    pub include_vdp: bool,
}

impl ScopePolicy {
    fn admits(&self, entry: &ScopeEntry) -> bool {
        self.include_vdp || entry.eligible_for_bounty
    }
}

/// Compare the current scope entries against the previously seen keys
///
/// # Parameters
///
/// - `previous_keys`: identifiers from the last persisted snapshot
/// - `current`: monitored entries of this cycle, in any order
/// - `policy`: reporting gate
///
/// # Returns
///
/// One [`ChangeEvent::NewScopeAsset`] per identifier not in `previous_keys`
/// that passes the gate. When the same identifier is listed by several
/// programs, the first admitted entry wins.
pub fn diff_scope(
    previous_keys: &[String],
    current: &[ScopeEntry],
    policy: &ScopePolicy,
) -> Vec<ChangeEvent> {
    let known: HashSet<&str> = previous_keys.iter().map(String::as_str).collect();
    let mut reported: HashSet<&str> = HashSet::new();
    let mut events = Vec::new();

    for entry in current {
        let key = entry.asset_identifier.as_str();
        if known.contains(key) || !policy.admits(entry) {
            continue;
        }
        if reported.insert(key) {
            events.push(ChangeEvent::NewScopeAsset {
                entry: entry.clone(),
            });
        }
    }
    events
}

/// Compare the current probe records against the previous snapshot
///
/// Records are matched by `url`. A URL missing from `previous` yields
/// [`ChangeEvent::NewLiveService`]. For a shared URL every field is checked
/// independently and each difference yields its own event.
pub fn diff_probes(previous: &[ProbeRecord], current: &[ProbeRecord]) -> Vec<ChangeEvent> {
    let known: HashMap<&str, &ProbeRecord> =
        previous.iter().map(|r| (r.url.as_str(), r)).collect();

    let mut events = Vec::new();
    for record in current {
        match known.get(record.url.as_str()) {
            None => events.push(ChangeEvent::NewLiveService {
                record: record.clone(),
            }),
            Some(old) => compare_record(old, record, &mut events),
        }
    }
    events
}

fn compare_record(old: &ProbeRecord, new: &ProbeRecord, events: &mut Vec<ChangeEvent>) {
    let url = &new.url;

    if old.is_live != new.is_live {
        events.push(ChangeEvent::ScopeStatusChanged {
            url: url.clone(),
            old: old.is_live,
            new: new.is_live,
        });
    }

    if differs_as_set(&old.status_codes, &new.status_codes) {
        events.push(ChangeEvent::StatusCodeChanged {
            url: url.clone(),
            old: old.status_codes.clone(),
            new: new.status_codes.clone(),
        });
    }

    if old.word_count != new.word_count {
        events.push(ChangeEvent::WordCountChanged {
            url: url.clone(),
            old: old.word_count,
            new: new.word_count,
        });
    }

    if old.technologies != new.technologies {
        events.push(ChangeEvent::TechnologyChanged {
            url: url.clone(),
            old: old.technologies.clone(),
            new: new.technologies.clone(),
        });
    }

    if old.title != new.title {
        events.push(ChangeEvent::TitleChanged {
            url: url.clone(),
            old: old.title.clone(),
            new: new.title.clone(),
        });
    }
}

/// Whether two collections hold different sets of values
///
/// Order and repetition are ignored: `[301, 200]` and `[200, 301, 200]` are
/// the same set.
pub fn differs_as_set<T: Eq + Hash + Ord>(a: &[T], b: &[T]) -> bool {
    let a: BTreeSet<&T> = a.iter().collect();
    let b: BTreeSet<&T> = b.iter().collect();
    a != b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetType;

    fn entry(id: &str, program: &str, bounty: bool) -> ScopeEntry {
        ScopeEntry {
            asset_identifier: id.to_string(),
            asset_type: AssetType::Url,
            eligible_for_submission: true,
            eligible_for_bounty: bounty,
            max_severity: "high".to_string(),
            program_name: program.to_string(),
            program_url: format!("https://hackerone.com/{}", program),
        }
    }

    fn record(url: &str) -> ProbeRecord {
        ProbeRecord {
            url: url.to_string(),
            title: "Home".to_string(),
            technologies: ["Nginx".to_string()].into_iter().collect(),
            status_codes: vec!["200".to_string()],
            word_count: 100,
            is_live: true,
        }
    }

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scope_reports_only_unseen_keys() {
        let previous = codes(&["a.example.com"]);
        let current = vec![entry("a.example.com", "acme", true), entry("b.example.com", "acme", true)];

        let events = diff_scope(&previous, &current, &ScopePolicy::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key(), "b.example.com");
    }

    #[test]
    fn test_scope_vdp_gate() {
        let current = vec![entry("vdp.example.com", "acme", false)];

        let gated = diff_scope(&[], &current, &ScopePolicy { include_vdp: false });
        assert!(gated.is_empty());

        let admitted = diff_scope(&[], &current, &ScopePolicy { include_vdp: true });
        assert_eq!(admitted.len(), 1);
    }

    #[test]
    fn test_scope_duplicate_identifier_reported_once() {
        let current = vec![
            entry("shared.example.com", "first", true),
            entry("shared.example.com", "second", true),
        ];

        let events = diff_scope(&[], &current, &ScopePolicy::default());
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChangeEvent::NewScopeAsset { entry } => assert_eq!(entry.program_name, "first"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_scope_removal_is_silent() {
        let previous = codes(&["gone.example.com"]);
        assert!(diff_scope(&previous, &[], &ScopePolicy::default()).is_empty());
    }

    #[test]
    fn test_status_codes_compare_as_sets() {
        assert!(!differs_as_set(&codes(&["301", "200"]), &codes(&["200", "301"])));
        assert!(!differs_as_set(&codes(&["200"]), &codes(&["200", "200"])));
        assert!(differs_as_set(&codes(&["200"]), &codes(&["301", "200"])));
        // Removal is a change too
        assert!(differs_as_set(&codes(&["301", "200"]), &codes(&["200"])));
    }

    #[test]
    fn test_reordered_status_codes_are_not_a_change() {
        let mut old = record("https://a.example.com");
        old.status_codes = codes(&["302", "200"]);
        let mut new = old.clone();
        new.status_codes = codes(&["200", "302"]);

        assert!(diff_probes(&[old], &[new]).is_empty());
    }

    #[test]
    fn test_fields_are_checked_independently() {
        let old = record("https://a.example.com");
        let mut new = old.clone();
        new.title = "Maintenance".to_string();
        new.word_count = 12;

        let events = diff_probes(&[old], &[new]);
        let kinds: BTreeSet<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(events.len(), 2);
        assert!(kinds.contains("title_changed"));
        assert!(kinds.contains("word_count_changed"));
    }

    #[test]
    fn test_every_field_change_is_reported() {
        let old = record("https://a.example.com");
        let new = ProbeRecord {
            url: old.url.clone(),
            title: "New".to_string(),
            technologies: ["Apache".to_string()].into_iter().collect(),
            status_codes: codes(&["503"]),
            word_count: 5,
            is_live: false,
        };

        let events = diff_probes(&[old], &[new]);
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_new_url_and_vanished_url() {
        let previous = vec![record("https://old.example.com")];
        let current = vec![record("https://new.example.com")];

        let events = diff_probes(&previous, &current);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "new_live_service");
        assert_eq!(events[0].key(), "https://new.example.com");
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        let records = vec![record("https://a.example.com"), record("https://b.example.com")];
        assert!(diff_probes(&records, &records).is_empty());

        let keys = codes(&["a.example.com"]);
        let entries = vec![entry("a.example.com", "acme", true)];
        assert!(diff_scope(&keys, &entries, &ScopePolicy::default()).is_empty());
    }
}
