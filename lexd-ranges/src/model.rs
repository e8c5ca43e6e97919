//! Range and range-element model
//!
//! A `Range` is a named controlled vocabulary; its elements form an ordered
//! forest. Children are owned subtrees, so the in-memory structure cannot
//! contain pointer cycles; hierarchy links to other elements are expressed
//! by id only (`parent_id`), and the parent-chain walk in the mutation
//! engine is the single cycle-safety check.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A named controlled vocabulary constraining a dictionary field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Range {
    /// Stable string key
    pub id: String,
    /// Opaque generated identifier
    pub guid: String,
    /// Multilingual label (language -> text)
    pub label: BTreeMap<String, String>,
    /// Multilingual description
    pub description: BTreeMap<String, String>,
    /// Ordered forest of top-level elements
    #[serde(rename = "values")]
    pub elements: Vec<RangeElement>,
    /// Present in the canonical store
    pub official: bool,
    /// Id recognized as a well-known taxonomy
    pub standard: bool,
    /// Materialized solely from static fallback metadata
    pub provided_by_config: bool,
    /// Config declares this range as a FieldWorks taxonomy
    pub fieldworks_standard: bool,
    /// Declared type from the config file, when the id appears there
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_type: Option<String>,
}

/// One (possibly hierarchical) entry within a range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RangeElement {
    /// Unique within the owning range's entire hierarchy
    pub id: String,
    /// Opaque generated identifier
    pub guid: String,
    /// Reference string used by dictionary records, when distinct from id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Multilingual label
    pub label: BTreeMap<String, String>,
    /// Multilingual description
    pub description: BTreeMap<String, String>,
    /// Multilingual abbreviation
    pub abbreviation: BTreeMap<String, String>,
    /// Parent element id; hierarchy by reference, never by pointer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Ordered child elements
    pub children: Vec<RangeElement>,
    /// Opaque extension metadata; unknown keys are preserved
    pub traits: BTreeMap<String, String>,
    /// Originates from the relational custom store
    pub custom: bool,
    /// Inherited display label; set only on resolver output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_label: Option<String>,
    /// Inherited display abbreviation; set only on resolver output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_abbrev: Option<String>,
}

/// Preferred display text from a multilingual map: English if present,
/// otherwise the first available language.
///
/// Maps are ordered, so "first available" is deterministic.
pub fn preferred_text(map: &BTreeMap<String, String>) -> Option<&str> {
    map.get("en")
        .or_else(|| map.values().next())
        .map(String::as_str)
}

impl Range {
    /// Find an element anywhere in the hierarchy by id
    pub fn find_element(&self, element_id: &str) -> Option<&RangeElement> {
        find_in(&self.elements, element_id)
    }

    /// All element ids in the hierarchy, depth-first
    pub fn element_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        collect_ids(&self.elements, &mut ids);
        ids
    }

    /// True if any element in the hierarchy has this id
    pub fn contains_element(&self, element_id: &str) -> bool {
        self.find_element(element_id).is_some()
    }

    /// Element id -> parent id over the full hierarchy.
    ///
    /// An explicit `parent_id` wins over the physical nesting position.
    pub fn parent_map(&self) -> BTreeMap<String, Option<String>> {
        let mut map = BTreeMap::new();
        collect_parents(None, &self.elements, &mut map);
        map
    }
}

impl RangeElement {
    /// Preferred display label text
    pub fn label_text(&self) -> Option<&str> {
        preferred_text(&self.label)
    }

    /// Preferred display abbreviation text
    pub fn abbrev_text(&self) -> Option<&str> {
        preferred_text(&self.abbreviation)
    }

    /// The reference string dictionary records use for this element
    pub fn reference_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.id)
    }
}

fn find_in<'a>(elements: &'a [RangeElement], id: &str) -> Option<&'a RangeElement> {
    for el in elements {
        if el.id == id {
            return Some(el);
        }
        if let Some(found) = find_in(&el.children, id) {
            return Some(found);
        }
    }
    None
}

fn collect_ids(elements: &[RangeElement], out: &mut Vec<String>) {
    for el in elements {
        out.push(el.id.clone());
        collect_ids(&el.children, out);
    }
}

fn collect_parents(
    enclosing: Option<&str>,
    elements: &[RangeElement],
    map: &mut BTreeMap<String, Option<String>>,
) {
    for el in elements {
        let parent = el
            .parent_id
            .clone()
            .or_else(|| enclosing.map(String::from));
        map.insert(el.id.clone(), parent);
        collect_parents(Some(el.id.as_str()), &el.children, map);
    }
}

/// Build a nested forest from a flat, parent-attributed element list.
///
/// Document order is preserved. A `parent_id` that does not resolve to
/// another element (dangling reference, self-reference) degrades to
/// top-level placement, and elements stranded on a parent cycle are
/// surfaced at top level rather than dropped.
pub fn nest_elements(flat: Vec<RangeElement>) -> Vec<RangeElement> {
    let ids: HashSet<String> = flat.iter().map(|e| e.id.clone()).collect();
    let order: Vec<String> = flat.iter().map(|e| e.id.clone()).collect();
    let mut by_id: BTreeMap<String, RangeElement> = flat
        .into_iter()
        .map(|mut e| {
            e.children.clear();
            (e.id.clone(), e)
        })
        .collect();

    let mut roots: Vec<String> = Vec::new();
    let mut kids: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen = HashSet::new();
    for id in &order {
        if !seen.insert(id.clone()) {
            continue;
        }
        let parent = by_id[id]
            .parent_id
            .clone()
            .filter(|p| ids.contains(p) && p != id);
        match parent {
            Some(p) => kids.entry(p).or_default().push(id.clone()),
            None => roots.push(id.clone()),
        }
    }

    fn take(
        id: &str,
        by_id: &mut BTreeMap<String, RangeElement>,
        kids: &BTreeMap<String, Vec<String>>,
    ) -> RangeElement {
        let mut el = by_id.remove(id).expect("element claimed twice");
        if let Some(children) = kids.get(id) {
            for child in children {
                if by_id.contains_key(child) {
                    el.children.push(take(child, by_id, kids));
                }
            }
        }
        el
    }

    let mut out: Vec<RangeElement> = roots
        .iter()
        .map(|root| take(root, &mut by_id, &kids))
        .collect();

    // Elements never reached from a root sit on a parent cycle
    while let Some(id) = by_id.keys().next().cloned() {
        out.push(take(&id, &mut by_id, &kids));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, parent: Option<&str>) -> RangeElement {
        RangeElement {
            id: id.to_string(),
            parent_id: parent.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_nest_by_parent_attribute() {
        let flat = vec![
            element("noun", None),
            element("proper-noun", Some("noun")),
            element("verb", None),
            element("transitive", Some("verb")),
            element("ditransitive", Some("transitive")),
        ];

        let forest = nest_elements(flat);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].id, "noun");
        assert_eq!(forest[0].children[0].id, "proper-noun");
        assert_eq!(forest[1].children[0].id, "transitive");
        assert_eq!(forest[1].children[0].children[0].id, "ditransitive");
    }

    #[test]
    fn test_nest_dangling_parent_becomes_root() {
        let flat = vec![element("orphan", Some("missing")), element("self", Some("self"))];
        let forest = nest_elements(flat);
        assert_eq!(forest.len(), 2);
        assert!(forest.iter().all(|e| e.children.is_empty()));
    }

    #[test]
    fn test_nest_parent_cycle_surfaces_elements() {
        // a -> b -> a is corrupt data; both must still appear in the forest
        let flat = vec![element("a", Some("b")), element("b", Some("a"))];
        let forest = nest_elements(flat);
        let mut ids = Vec::new();
        collect_ids(&forest, &mut ids);
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_find_element_recurses() {
        let range = Range {
            id: "grammatical-info".to_string(),
            elements: nest_elements(vec![
                element("noun", None),
                element("proper-noun", Some("noun")),
            ]),
            ..Default::default()
        };

        assert!(range.contains_element("proper-noun"));
        assert!(!range.contains_element("adverb"));
        assert_eq!(range.element_ids(), vec!["noun", "proper-noun"]);
    }

    #[test]
    fn test_parent_map_prefers_explicit_reference() {
        // "stray" is physically nested under "noun" but declares "verb"
        let mut noun = element("noun", None);
        let mut stray = element("stray", Some("verb"));
        stray.children.push(element("leaf", None));
        noun.children.push(stray);
        let range = Range {
            id: "grammatical-info".to_string(),
            elements: vec![noun, element("verb", None)],
            ..Default::default()
        };

        let parents = range.parent_map();
        assert_eq!(parents["stray"], Some("verb".to_string()));
        assert_eq!(parents["leaf"], Some("stray".to_string()));
        assert_eq!(parents["noun"], None);
    }

    #[test]
    fn test_preferred_text_prefers_english() {
        let mut map = BTreeMap::new();
        map.insert("de".to_string(), "Substantiv".to_string());
        assert_eq!(preferred_text(&map), Some("Substantiv"));
        map.insert("en".to_string(), "Noun".to_string());
        assert_eq!(preferred_text(&map), Some("Noun"));
        assert_eq!(preferred_text(&BTreeMap::new()), None);
    }

    #[test]
    fn test_view_serialization_names() {
        let range = Range {
            id: "grammatical-info".to_string(),
            provided_by_config: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&range).unwrap();
        assert!(json.get("values").is_some());
        assert_eq!(json["providedByConfig"], true);
        assert!(json.get("config_type").is_none());
    }
}
