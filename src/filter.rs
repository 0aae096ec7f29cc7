//! Relevance predicates applied to candidates before deduplication.
//!
//! Both predicates are plain substring heuristics. They lean towards false
//! positives.

use crate::config::FilterConfig;
use crate::models::CandidateItem;

/// Fields inspected by the location predicate, in join order.
pub const LOCATION_FIELDS: &[&str] = &["venue", "city", "region", "location"];

/// Fields inspected by the keyword predicate.
pub const KEYWORD_FIELDS: &[&str] = &["name", "title", "description"];

/// Case-insensitive location match over free-text location fields.
///
/// The non-empty fields are joined with `", "` and padded with a space on
/// each side, so tokens such as `", nc"`, `" nc "` or `" nc,"` line up with
/// how a state code sits at the end of an address. An empty token set with
/// no regions accepts everything.
#[derive(Debug, Clone, Default)]
pub struct LocationPredicate {
    tokens: Vec<String>,
    regions: Vec<String>,
}

impl LocationPredicate {
    pub fn new<T: AsRef<str>>(tokens: &[T], regions: &[T]) -> Self {
        Self {
            tokens: lowered(tokens),
            regions: lowered(regions),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.tokens.is_empty() && self.regions.is_empty()
    }

    /// Test literal location parts directly.
    pub fn matches_parts(&self, parts: &[&str]) -> bool {
        if self.is_unconstrained() {
            return true;
        }
        let joined = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
            .to_lowercase();
        let text = format!(" {} ", joined);
        self.tokens.iter().any(|t| text.contains(t.as_str()))
    }

    pub fn matches(&self, candidate: &CandidateItem) -> bool {
        if self.is_unconstrained() {
            return true;
        }
        if let Some(region) = candidate.field("region") {
            let region = region.to_lowercase();
            if self.regions.iter().any(|r| *r == region) {
                return true;
            }
        }
        let parts: Vec<&str> = LOCATION_FIELDS
            .iter()
            .filter_map(|f| candidate.field(f))
            .collect();
        self.matches_parts(&parts)
    }
}

/// Case-insensitive keyword match over title-like fields.
#[derive(Debug, Clone, Default)]
pub struct KeywordPredicate {
    keywords: Vec<String>,
}

impl KeywordPredicate {
    pub fn new<T: AsRef<str>>(keywords: &[T]) -> Self {
        Self {
            keywords: lowered(keywords),
        }
    }

    pub fn matches_text(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn matches(&self, candidate: &CandidateItem) -> bool {
        let text = KEYWORD_FIELDS
            .iter()
            .filter_map(|f| candidate.field(f))
            .collect::<Vec<_>>()
            .join(" ");
        self.matches_text(&text)
    }
}

/// Conjunction of the location and keyword predicates.
#[derive(Debug, Clone, Default)]
pub struct CriteriaFilter {
    pub location: LocationPredicate,
    pub keyword: KeywordPredicate,
}

impl CriteriaFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            location: LocationPredicate::new(
                config.location_tokens.as_slice(),
                config.regions.as_slice(),
            ),
            keyword: KeywordPredicate::new(config.keywords.as_slice()),
        }
    }

    pub fn is_relevant(&self, candidate: &CandidateItem) -> bool {
        self.location.matches(candidate) && self.keyword.matches(candidate)
    }
}

fn lowered<T: AsRef<str>>(values: &[T]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.as_ref().to_lowercase())
        .filter(|v| !v.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nc() -> LocationPredicate {
        LocationPredicate::new(&[", nc", "north carolina"], &[])
    }

    fn venue(venue: &str, city: &str, region: &str) -> CandidateItem {
        CandidateItem::new("test")
            .with_field("venue", venue)
            .with_field("city", city)
            .with_field("region", region)
    }

    #[test]
    fn location_matches_state_code_after_city() {
        assert!(nc().matches(&venue("PNC Arena", "Raleigh", "NC")));
    }

    #[test]
    fn location_rejects_other_state() {
        assert!(!nc().matches(&venue("PNC Arena", "Raleigh", "SC")));
    }

    #[test]
    fn location_matches_full_region_name_anywhere() {
        assert!(nc().matches_parts(&["Bojangles Coliseum", "Charlotte, North Carolina", ""]));
    }

    #[test]
    fn location_tolerates_missing_fields() {
        let p = nc();
        assert!(!p.matches(&CandidateItem::new("test")));
        assert!(!p.matches_parts(&["", "  "]));
    }

    #[test]
    fn location_spaced_token_needs_word_boundary() {
        let p = LocationPredicate::new(&[" nc "], &[]);
        assert!(p.matches_parts(&["Raleigh nc"]));
        assert!(!p.matches_parts(&["Lincoln Center"]));
    }

    #[test]
    fn region_field_equality_matches_without_tokens() {
        let p = LocationPredicate::new(&[], &["NC"]);
        assert!(p.matches(&CandidateItem::new("t").with_field("region", "nc")));
        assert!(!p.matches(&CandidateItem::new("t").with_field("region", "NCX")));
    }

    #[test]
    fn empty_location_config_accepts_everything() {
        let p = LocationPredicate::new::<&str>(&[], &[]);
        assert!(p.matches(&CandidateItem::new("t")));
    }

    #[test]
    fn keyword_is_case_insensitive_substring() {
        let k = KeywordPredicate::new(&["comic", "cosplay"]);
        assert!(k.matches_text("Oak City COMICON"));
        assert!(k.matches_text("Cosplay meetup"));
        assert!(!k.matches_text("Farmers market"));
    }

    #[test]
    fn keyword_reads_name_title_description() {
        let k = KeywordPredicate::new(&["anime"]);
        let c = CandidateItem::new("t")
            .with_field("name", "Animazement")
            .with_field("description", "The largest anime con in NC");
        assert!(k.matches(&c));
    }

    #[test]
    fn criteria_requires_both_predicates() {
        let filter = CriteriaFilter::from_config(&FilterConfig {
            location_tokens: vec![", nc".into()],
            regions: vec![],
            keywords: vec!["comic".into()],
        });
        let hit = CandidateItem::new("t")
            .with_field("name", "Charlotte Comicon")
            .with_field("location", "Charlotte, NC");
        let wrong_place = CandidateItem::new("t")
            .with_field("name", "Charlotte Comicon")
            .with_field("location", "Atlanta, GA");
        assert!(filter.is_relevant(&hit));
        assert!(!filter.is_relevant(&wrong_place));
    }
}
