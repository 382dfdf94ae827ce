// src/models/vocab.rs

//! Keyword vocabulary and the comparison stats table.
//!
//! Both documents are produced by an offline preparation step and read here
//! as-is. The vocabulary maps a trigger term either to a list of candidate
//! replies or to an alias sentinel (`"%canonical%"`) pointing at another
//! term; the stats table maps metric name to per-subject values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One vocabulary value: candidate replies, or an alias to another term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VocabEntry {
    Alias(String),
    Candidates(Vec<String>),
}

/// Term → replies mapping loaded from `keyword_reply.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabulary {
    pub entries: BTreeMap<String, VocabEntry>,
}

impl Vocabulary {
    /// The trigger terms, in stable order. These drive both the crawl-time
    /// content filter and reply matching.
    pub fn terms(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Candidate replies for a term, following at most one alias hop.
    ///
    /// `None` covers every miss: unknown term, alias without the sentinel
    /// wrapping, alias to a missing or alias entry, empty candidate list.
    pub fn resolve(&self, term: &str) -> Option<&[String]> {
        let candidates = match self.entries.get(term)? {
            VocabEntry::Candidates(c) => c,
            VocabEntry::Alias(raw) => {
                let target = raw.strip_prefix('%')?.strip_suffix('%')?;
                match self.entries.get(target)? {
                    VocabEntry::Candidates(c) => c,
                    VocabEntry::Alias(_) => return None,
                }
            }
        };
        if candidates.is_empty() {
            None
        } else {
            Some(candidates)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Metric → subject → value table backing comparison replies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsTable {
    pub metrics: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl StatsTable {
    /// Format a two-subject comparison across every metric that knows both
    /// subjects. `None` when no metric does.
    pub fn compare(&self, a: &str, b: &str) -> Option<String> {
        let mut out = String::new();
        for (metric, values) in &self.metrics {
            let (Some(va), Some(vb)) = (values.get(a), values.get(b)) else {
                continue;
            };
            out.push_str(&format!(
                "{metric}:\n\t{a}: {}\n\t{b}: {}\n",
                display_value(va),
                display_value(vb)
            ));
        }
        if out.is_empty() { None } else { Some(out) }
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(raw: &str) -> Vocabulary {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn entries_deserialize_as_lists_or_aliases() {
        let vocab = vocab(r#"{"ahri": ["nine tails"], "阿狸": "%ahri%"}"#);
        assert_eq!(
            vocab.entries["ahri"],
            VocabEntry::Candidates(vec!["nine tails".to_string()])
        );
        assert_eq!(
            vocab.entries["阿狸"],
            VocabEntry::Alias("%ahri%".to_string())
        );
    }

    #[test]
    fn alias_resolves_to_canonical_candidates() {
        let vocab = vocab(r#"{"ahri": ["a", "b"], "阿狸": "%ahri%"}"#);
        let resolved = vocab.resolve("阿狸").unwrap();
        assert_eq!(resolved, ["a".to_string(), "b".to_string()]);
        assert!(resolved.iter().all(|r| !r.contains('%')));
    }

    #[test]
    fn resolution_misses_yield_none() {
        let vocab = vocab(
            r#"{
                "dangling": "%nowhere%",
                "chained": "%dangling%",
                "bare": "no sentinel",
                "empty": []
            }"#,
        );
        assert!(vocab.resolve("unknown").is_none());
        assert!(vocab.resolve("dangling").is_none());
        assert!(vocab.resolve("chained").is_none());
        assert!(vocab.resolve("bare").is_none());
        assert!(vocab.resolve("empty").is_none());
    }

    #[test]
    fn compare_formats_metrics_with_both_subjects() {
        let stats: StatsTable = serde_json::from_str(
            r#"{
                "win rate": {"ahri": "52%", "zed": "49%"},
                "games": {"ahri": 1200, "zed": 3400},
                "ban rate": {"ahri": "3%"}
            }"#,
        )
        .unwrap();
        let text = stats.compare("ahri", "zed").unwrap();
        assert_eq!(
            text,
            "games:\n\tahri: 1200\n\tzed: 3400\nwin rate:\n\tahri: 52%\n\tzed: 49%\n"
        );
        assert!(stats.compare("ahri", "missing").is_none());
    }
}
