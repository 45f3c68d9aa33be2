//! Rule-based relevance filtering and classification fallback.
//!
//! The deterministic path: a fixed relevance vocabulary decides whether a
//! candidate enters the pipeline at all, and keyword rules provide the
//! update type, keywords, and confidence score when the LLM classifier is
//! unavailable. The confidence score produced here is canonical even when
//! the LLM classification succeeds, so scores stay comparable across runs.

use regmonitor_shared::{ExtractedUpdate, UpdateType};

/// Terms that make a candidate relevant to regulatory monitoring.
/// Matched case-insensitively as substrings of title + description.
const RELEVANCE_TERMS: &[&str] = &[
    "regulation",
    "regulatory",
    "compliance",
    "amendment",
    "guidance",
    "consultation",
    "enforcement",
    "penalty",
    "fine",
    "directive",
    "legislation",
    "statutory",
    "data protection",
    "gdpr",
    "privacy",
    "breach",
    "dpa",
];

/// Authority abbreviations that boost confidence when mentioned.
const AUTHORITY_TERMS: &[&str] = &["ico", "fca", "edpb", "gdpr"];

/// Whether a candidate is worth classifying and persisting.
pub fn is_relevant(candidate: &ExtractedUpdate) -> bool {
    let text = candidate_text(candidate);
    RELEVANCE_TERMS.iter().any(|term| text.contains(term))
}

/// Rule-based update-type classification, first match wins.
pub fn fallback_update_type(text: &str) -> UpdateType {
    let text = text.to_lowercase();
    if text.contains("amendment") || text.contains("amends") || text.contains("revised") {
        UpdateType::Amendment
    } else if text.contains("consultation") || text.contains("call for evidence") {
        UpdateType::Consultation
    } else if text.contains("draft") || text.contains("proposed") || text.contains("bill") {
        UpdateType::Pending
    } else if text.contains("new regulation")
        || text.contains("comes into force")
        || text.contains("introduces")
    {
        UpdateType::NewRegulation
    } else {
        UpdateType::Guidance
    }
}

/// Frequency-ranked keywords: lowercase words longer than three characters,
/// most frequent first, capped at ten.
pub fn fallback_keywords(text: &str) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
    {
        match counts.iter_mut().find(|(w, _)| w == word) {
            Some((_, n)) => *n += 1,
            None => counts.push((word.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.truncate(10);
    counts.into_iter().map(|(w, _)| w).collect()
}

/// Deterministic confidence score in [0.5, 1.0].
///
/// Base 0.5 for passing the relevance filter, plus bonuses for core
/// regulatory vocabulary, data-protection terms, classified update kinds,
/// and named authorities.
pub fn score_confidence(text: &str) -> f64 {
    let text = text.to_lowercase();
    let mut score: f64 = 0.5;

    if text.contains("regulation") || text.contains("compliance") {
        score += 0.2;
    }
    if text.contains("data protection") || text.contains("privacy") {
        score += 0.2;
    }
    if text.contains("amendment") || text.contains("guidance") {
        score += 0.1;
    }
    if AUTHORITY_TERMS.iter().any(|t| text.contains(t)) {
        score += 0.1;
    }

    score.min(1.0)
}

/// Lowercased title + description of a candidate, for term matching.
pub fn candidate_text(candidate: &ExtractedUpdate) -> String {
    format!("{} {}", candidate.title, candidate.description).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, description: &str) -> ExtractedUpdate {
        ExtractedUpdate {
            title: title.into(),
            description: description.into(),
            link: "https://example.org/x".into(),
            date: None,
        }
    }

    #[test]
    fn relevance_matches_title_or_description() {
        assert!(is_relevant(&candidate("New GDPR Guidance", "")));
        assert!(is_relevant(&candidate(
            "Board minutes",
            "Discussion of the upcoming consultation period"
        )));
        assert!(!is_relevant(&candidate(
            "Office closed for holidays",
            "We reopen in January"
        )));
    }

    #[test]
    fn relevance_is_case_insensitive() {
        assert!(is_relevant(&candidate("ENFORCEMENT Notice Issued", "")));
    }

    #[test]
    fn update_type_rules() {
        assert_eq!(
            fallback_update_type("Amendment to the Data Protection Act"),
            UpdateType::Amendment
        );
        assert_eq!(
            fallback_update_type("Consultation on cookie banners"),
            UpdateType::Consultation
        );
        assert_eq!(
            fallback_update_type("Draft Online Safety Bill published"),
            UpdateType::Pending
        );
        assert_eq!(
            fallback_update_type("New regulation comes into force in May"),
            UpdateType::NewRegulation
        );
        assert_eq!(
            fallback_update_type("How to handle subject access requests"),
            UpdateType::Guidance
        );
    }

    #[test]
    fn keywords_ranked_by_frequency() {
        let keywords =
            fallback_keywords("breach breach breach notification notification deadline the an");
        assert_eq!(keywords[0], "breach");
        assert_eq!(keywords[1], "notification");
        // Words of three characters or fewer are dropped.
        assert!(!keywords.contains(&"the".to_string()));
        assert!(!keywords.contains(&"an".to_string()));
    }

    #[test]
    fn keywords_capped_at_ten() {
        let text = "alpha bravo charlie delta echoes foxtrot golfs hotel india juliet kilos lima";
        assert_eq!(fallback_keywords(text).len(), 10);
    }

    #[test]
    fn confidence_bounds() {
        // Minimal relevant text scores the base.
        assert_eq!(score_confidence("penalty notice"), 0.5);

        // Everything at once still caps at 1.0.
        let loaded = "ICO guidance: amendment to data protection regulation compliance";
        assert!(score_confidence(loaded) <= 1.0);
        assert!(score_confidence(loaded) > 0.9);
    }

    #[test]
    fn confidence_term_bonuses() {
        let base = score_confidence("penalty notice");
        assert!(score_confidence("regulation penalty notice") > base);
        assert!(score_confidence("privacy penalty notice") > base);
    }
}
