//! Query builders for the canonical store
//!
//! All engine round-trips go through these builders so the query text stays
//! in one place. Mutating queries follow the delete-then-reinsert discipline:
//! a node update is expressed as one combined updating query, applied by the
//! store atomically at the single-query level.

use crate::usage::UsageQueryShape;

/// Quote a string as a query string literal
pub fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// The whole ranges document
pub fn all_ranges(db: &str) -> String {
    format!("collection({})//lift-ranges", literal(db))
}

/// One range by id
pub fn range_by_id(db: &str, range_id: &str) -> String {
    format!(
        "collection({})//lift-ranges/range[@id = {}]",
        literal(db),
        literal(range_id)
    )
}

/// Insert a new range node into the ranges document
pub fn insert_range(db: &str, range_xml: &str) -> String {
    format!(
        "insert node {} into (collection({})//lift-ranges)[1]",
        range_xml,
        literal(db)
    )
}

/// Replace a range node: delete the current node, reinsert the new one
pub fn replace_range(db: &str, range_id: &str, range_xml: &str) -> String {
    format!(
        "delete node collection({db})//lift-ranges/range[@id = {id}], \
         insert node {xml} into (collection({db})//lift-ranges)[1]",
        db = literal(db),
        id = literal(range_id),
        xml = range_xml
    )
}

/// Delete a range node
pub fn delete_range(db: &str, range_id: &str) -> String {
    format!(
        "delete node collection({})//lift-ranges/range[@id = {}]",
        literal(db),
        literal(range_id)
    )
}

/// Insert a new element node as a child of its range.
///
/// Elements are written flat; the `parent` attribute carries hierarchy.
pub fn insert_element(db: &str, range_id: &str, element_xml: &str) -> String {
    format!(
        "insert node {} into (collection({})//lift-ranges/range[@id = {}])[1]",
        element_xml,
        literal(db),
        literal(range_id)
    )
}

/// Replace an element node: delete the current node, reinsert the new one
pub fn replace_element(db: &str, range_id: &str, element_id: &str, element_xml: &str) -> String {
    format!(
        "delete node collection({db})//lift-ranges/range[@id = {rid}]\
         //range-element[@id = {eid}], \
         insert node {xml} into (collection({db})//lift-ranges/range[@id = {rid}])[1]",
        db = literal(db),
        rid = literal(range_id),
        eid = literal(element_id),
        xml = element_xml
    )
}

/// Delete an element node
pub fn delete_element(db: &str, range_id: &str, element_id: &str) -> String {
    format!(
        "delete node collection({})//lift-ranges/range[@id = {}]//range-element[@id = {}]",
        literal(db),
        literal(range_id),
        literal(element_id)
    )
}

/// Per-entry hit expression for a usage scan, bound to `$e`
fn hit_path(shape: &UsageQueryShape, value: Option<&str>) -> String {
    match (shape, value) {
        (UsageQueryShape::GrammaticalCategory, Some(v)) => {
            format!("$e/sense/grammatical-info[@value = {}]", literal(v))
        }
        (UsageQueryShape::GrammaticalCategory, None) => {
            "$e/sense/grammatical-info[@value]".to_string()
        }
        (UsageQueryShape::RelationType, Some(v)) => {
            format!("$e/relation[@type = {}]", literal(v))
        }
        (UsageQueryShape::RelationType, None) => "$e/relation[@type]".to_string(),
        (UsageQueryShape::Trait(name), Some(v)) => format!(
            "$e//trait[@name = {} and @value = {}]",
            literal(name),
            literal(v)
        ),
        (UsageQueryShape::Trait(name), None) => {
            format!("$e//trait[@name = {}]", literal(name))
        }
    }
}

/// Collection-level value path for a usage scan (unbound)
fn value_path(shape: &UsageQueryShape) -> String {
    match shape {
        UsageQueryShape::GrammaticalCategory => "sense/grammatical-info/@value".to_string(),
        UsageQueryShape::RelationType => "relation/@type".to_string(),
        UsageQueryShape::Trait(name) => {
            format!("descendant::trait[@name = {}]/@value", literal(name))
        }
    }
}

/// Records referencing a range (or one of its values):
/// `<usage><record id label count/>...</usage>`
pub fn usage_records(db: &str, shape: &UsageQueryShape, value: Option<&str>) -> String {
    let mut q = String::new();
    q.push_str("element usage { ");
    q.push_str(&format!(
        "for $e in collection({})//entry ",
        literal(db)
    ));
    q.push_str(&format!("let $hits := {} ", hit_path(shape, value)));
    q.push_str("where count($hits) > 0 ");
    q.push_str("return element record { ");
    q.push_str("attribute id { string($e/@id) }, ");
    q.push_str("attribute label { string(($e/lexical-unit/form/text)[1]) }, ");
    q.push_str("attribute count { count($hits) } ");
    q.push_str("} }");
    q
}

/// Distinct-value usage aggregation with up to `sample_limit` sample records
/// per value:
/// `<usage total><element value count><record id label/>...</element></usage>`
pub fn usage_by_element(db: &str, shape: &UsageQueryShape, sample_limit: usize) -> String {
    let path = value_path(shape);
    let mut q = String::new();
    q.push_str(&format!(
        "let $entries := collection({})//entry ",
        literal(db)
    ));
    q.push_str("return element usage { ");
    q.push_str(&format!(
        "attribute total {{ count($entries[{}]) }}, ",
        path
    ));
    q.push_str(&format!(
        "for $v in distinct-values($entries/{}) ",
        path
    ));
    q.push_str(&format!("let $matched := $entries[{} = $v] ", path));
    q.push_str("return element element { ");
    q.push_str("attribute value { $v }, ");
    q.push_str("attribute count { count($matched) }, ");
    q.push_str(&format!(
        "for $e in subsequence($matched, 1, {}) ",
        sample_limit
    ));
    q.push_str("return element record { ");
    q.push_str("attribute id { string($e/@id) }, ");
    q.push_str("attribute label { string(($e/lexical-unit/form/text)[1]) } ");
    q.push_str("} } }");
    q
}

/// Rewrite every reference to `old_value` with `new_value`
pub fn migrate_replace(db: &str, shape: &UsageQueryShape, old_value: &str, new_value: &str) -> String {
    let target = match shape {
        UsageQueryShape::GrammaticalCategory => format!(
            "collection({})//entry/sense/grammatical-info/@value[. = {}]",
            literal(db),
            literal(old_value)
        ),
        UsageQueryShape::RelationType => format!(
            "collection({})//entry/relation/@type[. = {}]",
            literal(db),
            literal(old_value)
        ),
        UsageQueryShape::Trait(name) => format!(
            "collection({})//entry//trait[@name = {}]/@value[. = {}]",
            literal(db),
            literal(name),
            literal(old_value)
        ),
    };
    format!(
        "for $a in {} return replace value of node $a with {}",
        target,
        literal(new_value)
    )
}

/// Remove every node referencing `old_value`
pub fn migrate_remove(db: &str, shape: &UsageQueryShape, old_value: &str) -> String {
    let target = match shape {
        UsageQueryShape::GrammaticalCategory => format!(
            "collection({})//entry/sense/grammatical-info[@value = {}]",
            literal(db),
            literal(old_value)
        ),
        UsageQueryShape::RelationType => format!(
            "collection({})//entry/relation[@type = {}]",
            literal(db),
            literal(old_value)
        ),
        UsageQueryShape::Trait(name) => format!(
            "collection({})//entry//trait[@name = {} and @value = {}]",
            literal(db),
            literal(name),
            literal(old_value)
        ),
    };
    format!("delete node {}", target)
}
