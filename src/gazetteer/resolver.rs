//! The place-name resolver: merges candidates from the store's lookup
//! primitives, filters, assigns a confidence score and ranks.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ToolError;
use crate::gazetteer::store::{PlaceRecord, PlaceStore};

/// How a candidate matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    ExactPrimary,
    ExactAlt,
    Prefix,
    Fuzzy,
}

/// A ranked resolver result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceMatch {
    #[serde(flatten)]
    pub record: PlaceRecord,
    pub confidence: f64,
    pub match_kind: MatchKind,
}

/// Resolver input.
#[derive(Debug, Clone, Default)]
pub struct PlaceQuery {
    pub query: String,
    pub preferred_place_classes: Vec<String>,
    pub preferred_municipality_code: Option<String>,
    pub limit: Option<usize>,
}

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;
/// How many full-text candidates to pull before ranking.
const FTS_CANDIDATES: usize = 20;

/// Merges, filters, scores and ranks candidates from the store.
pub struct Resolver {
    store: Arc<PlaceStore>,
}

impl Resolver {
    pub fn new(store: Arc<PlaceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PlaceStore {
        &self.store
    }

    /// Resolve a free-form name to ranked matches. No results is success.
    pub fn resolve(&self, query: &PlaceQuery) -> Result<Vec<PlaceMatch>, ToolError> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(ToolError::invalid_input(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        let normalised = normalise_query(&query.query);
        if normalised.is_empty() {
            return Err(ToolError::invalid_input("Query must not be empty"));
        }

        // Merge in fixed order; first occurrence wins the match kind.
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<(PlaceRecord, MatchKind, f64)> = Vec::new();

        for record in lookup("exact", self.store.find_exact_primary(&normalised))? {
            if seen.insert(record.id.clone()) {
                candidates.push((record, MatchKind::ExactPrimary, 0.0));
            }
        }
        for record in lookup("alt-name", self.store.find_exact_alt(&normalised))? {
            if seen.insert(record.id.clone()) {
                candidates.push((record, MatchKind::ExactAlt, 0.0));
            }
        }
        for (record, rank) in lookup(
            "full-text",
            self.store.find_full_text(&normalised, FTS_CANDIDATES),
        )? {
            if seen.insert(record.id.clone()) {
                let kind = if record.name.to_lowercase().starts_with(&normalised) {
                    MatchKind::Prefix
                } else {
                    MatchKind::Fuzzy
                };
                candidates.push((record, kind, rank));
            }
        }

        // Optional class filter, only when it keeps at least one candidate.
        if !query.preferred_place_classes.is_empty() {
            let keeps_any = candidates
                .iter()
                .any(|(r, _, _)| query.preferred_place_classes.contains(&r.place_class));
            if keeps_any {
                candidates
                    .retain(|(r, _, _)| query.preferred_place_classes.contains(&r.place_class));
            }
        }

        // Stable municipality-first reorder; non-matchers keep their order.
        if let Some(code) = &query.preferred_municipality_code {
            candidates.sort_by_key(|(r, _, _)| r.municipality_code.as_ref() != Some(code));
        }

        let mut matches: Vec<PlaceMatch> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, (record, kind, rank))| {
                let confidence = confidence(&record, kind, rank, index);
                PlaceMatch {
                    record,
                    confidence,
                    match_kind: kind,
                }
            })
            .collect();

        // Stable by descending confidence, so ties keep insertion order.
        matches.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        matches.truncate(limit);
        Ok(matches)
    }
}

fn lookup<T>(
    label: &str,
    result: Result<T, crate::gazetteer::store::GazetteerError>,
) -> Result<T, ToolError> {
    result.map_err(|e| ToolError::internal(format!("Gazetteer {} lookup failed: {}", label, e)))
}

/// Trim, collapse whitespace, lowercase and strip a trailing country name.
pub fn normalise_query(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let lowered = collapsed.to_lowercase();
    for suffix in [", norway", ", norge", " norway", " norge"] {
        if let Some(stripped) = lowered.strip_suffix(suffix) {
            return stripped.trim_end_matches(',').trim().to_string();
        }
    }
    lowered
}

fn confidence(record: &PlaceRecord, kind: MatchKind, rank: f64, index: usize) -> f64 {
    let base = match kind {
        MatchKind::ExactPrimary => 1.0,
        MatchKind::ExactAlt => 0.85,
        MatchKind::Prefix => 0.70,
        MatchKind::Fuzzy => 0.40 + (rank / 100.0).min(0.30),
    };
    let mut score = base;
    if record.is_county_seat {
        score += 0.05;
    }
    if record.is_municipality_seat {
        score += 0.03;
    }
    score += (record.importance / 10.0).min(0.05);
    score -= 0.01 * index as f64;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::store::fixtures::create_fixture;

    fn resolver() -> (tempfile::TempDir, Resolver) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.db");
        create_fixture(&path);
        let store = Arc::new(PlaceStore::open(&path).unwrap());
        (dir, Resolver::new(store))
    }

    fn query(text: &str) -> PlaceQuery {
        PlaceQuery {
            query: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn oslo_resolves_with_high_confidence() {
        let (_dir, resolver) = resolver();
        let matches = resolver.resolve(&query("Oslo")).unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0].record.name, "Oslo");
        assert_eq!(matches[0].match_kind, MatchKind::ExactPrimary);
        assert!(matches[0].confidence >= 0.95);
    }

    #[test]
    fn query_normalisation() {
        assert_eq!(normalise_query("  Oslo  "), "oslo");
        assert_eq!(normalise_query("Oslo, Norway"), "oslo");
        assert_eq!(normalise_query("Mo   i  Rana"), "mo i rana");
        assert_eq!(normalise_query("Bergen, Norge"), "bergen");
    }

    #[test]
    fn alt_name_matches() {
        let (_dir, resolver) = resolver();
        let matches = resolver.resolve(&query("Nidaros")).unwrap();
        assert_eq!(matches[0].record.name, "Trondheim");
        assert_eq!(matches[0].match_kind, MatchKind::ExactAlt);
    }

    #[test]
    fn confidences_are_clamped_and_ordered() {
        let (_dir, resolver) = resolver();
        let matches = resolver.resolve(&query("osl")).unwrap();
        assert!(matches.len() >= 2);
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for m in &matches {
            assert!((0.0..=1.0).contains(&m.confidence));
        }
    }

    #[test]
    fn class_filter_restricts_when_it_keeps_candidates() {
        let (_dir, resolver) = resolver();
        let mut q = query("osl");
        q.preferred_place_classes = vec!["farm".to_string()];
        let matches = resolver.resolve(&q).unwrap();
        assert!(matches.iter().all(|m| m.record.place_class == "farm"));

        // A filter matching nothing leaves the candidates untouched.
        let mut q = query("oslo");
        q.preferred_place_classes = vec!["village".to_string()];
        let matches = resolver.resolve(&q).unwrap();
        assert!(!matches.is_empty());
    }

    #[test]
    fn limit_bounds() {
        let (_dir, resolver) = resolver();
        let mut q = query("oslo");
        q.limit = Some(0);
        assert!(resolver.resolve(&q).is_err());
        q.limit = Some(21);
        assert!(resolver.resolve(&q).is_err());
        q.limit = Some(1);
        assert!(resolver.resolve(&q).unwrap().len() <= 1);
    }

    #[test]
    fn no_results_is_success() {
        let (_dir, resolver) = resolver();
        let matches = resolver.resolve(&query("zzzzzz")).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn identical_queries_yield_identical_results() {
        let (_dir, resolver) = resolver();
        let a = resolver.resolve(&query("osl")).unwrap();
        let b = resolver.resolve(&query("osl")).unwrap();
        let ids = |ms: &[PlaceMatch]| ms.iter().map(|m| m.record.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
    }
}
