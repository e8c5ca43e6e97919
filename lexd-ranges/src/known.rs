//! Well-known range ids
//!
//! Static tables for taxonomies that exist by convention across lexicon
//! tooling: the ids recognized as standard, and the singular/plural alias
//! spellings that historically name the same taxonomy in imported data.

/// Range ids recognized as well-known taxonomies
pub const STANDARD_RANGE_IDS: &[&str] = &[
    "anthro-code",
    "dialect-labels",
    "do-not-publish-in",
    "domain-type",
    "etymology",
    "from-part-of-speech",
    "grammatical-info",
    "lexical-relation",
    "location",
    "morph-type",
    "note-type",
    "num-feature-value",
    "paradigm",
    "publications",
    "reversal-type",
    "semantic-domain-ddp4",
    "status",
    "translation-type",
    "usage-type",
    "users",
];

/// Alias spellings of one taxonomy id: (surviving spelling, alternate).
///
/// Imported documents disagree on pluralization; the reconciler collapses
/// each pair to a single key.
pub const RANGE_ID_ALIASES: &[(&str, &str)] = &[
    ("domain-type", "domain-types"),
    ("lexical-relation", "lexical-relations"),
    ("note-type", "note-types"),
    ("translation-type", "translation-types"),
    ("usage-type", "usage-types"),
];

/// True if the id names a well-known taxonomy (either alias spelling counts)
pub fn is_standard(range_id: &str) -> bool {
    STANDARD_RANGE_IDS.contains(&range_id)
        || RANGE_ID_ALIASES
            .iter()
            .any(|(primary, alt)| *alt == range_id && STANDARD_RANGE_IDS.contains(primary))
}

/// The alias partner of a range id, if it has one
pub fn alias_of(range_id: &str) -> Option<&'static str> {
    RANGE_ID_ALIASES.iter().find_map(|(primary, alt)| {
        if *primary == range_id {
            Some(*alt)
        } else if *alt == range_id {
            Some(*primary)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_ids() {
        assert!(is_standard("grammatical-info"));
        assert!(is_standard("lexical-relations")); // plural alias
        assert!(!is_standard("my-custom-range"));
    }

    #[test]
    fn test_alias_lookup_is_symmetric() {
        assert_eq!(alias_of("lexical-relation"), Some("lexical-relations"));
        assert_eq!(alias_of("lexical-relations"), Some("lexical-relation"));
        assert_eq!(alias_of("grammatical-info"), None);
    }
}
