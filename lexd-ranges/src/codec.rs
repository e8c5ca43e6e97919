//! Codec for the canonical ranges document
//!
//! The canonical store embeds one ranges document per dictionary database:
//!
//! ```xml
//! <lift-ranges>
//!   <range id="grammatical-info" guid="...">
//!     <label><form lang="en"><text>Grammatical Category</text></form></label>
//!     <range-element id="noun" guid="...">
//!       <label><form lang="en"><text>Noun</text></form></label>
//!       <abbrev><form lang="en"><text>n</text></form></abbrev>
//!       <trait name="catalog-source-id" value="Noun"/>
//!     </range-element>
//!   </range>
//! </lift-ranges>
//! ```
//!
//! Elements may be physically nested or flat with a `parent` attribute;
//! decoding collects them flat and normalizes to a nested forest, with an
//! explicit `parent` attribute winning over the nesting position. Encoding
//! produces single `<range>`/`<range-element>` nodes for mutation queries.

use crate::model::{nest_elements, Range, RangeElement};
use lexd_common::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

/// Which multilingual map the current `<form>` text belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
enum TextField {
    Label,
    Abbrev,
    Description,
}

/// Decode a ranges document (or a bare `<range>` fragment) into ranges.
///
/// Empty input decodes to no ranges. Malformed XML is an error here; the
/// reconciler downgrades it to "no canonical ranges" with a warning.
pub fn decode_ranges(xml: &str) -> Result<Vec<Range>> {
    let mut reader = Reader::from_str(xml);

    let mut ranges: Vec<Range> = Vec::new();
    let mut current_range: Option<Range> = None;
    let mut flat: Vec<RangeElement> = Vec::new();
    let mut element_stack: Vec<RangeElement> = Vec::new();

    let mut current_field: Option<TextField> = None;
    let mut current_lang: Option<String> = None;
    let mut in_text = false;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"lift-ranges" => {}
                b"range" => {
                    current_range = Some(range_from_attrs(e));
                    flat.clear();
                }
                b"range-element" => {
                    element_stack.push(element_from_attrs(e));
                }
                b"label" => current_field = Some(TextField::Label),
                b"abbrev" | b"abbreviation" => current_field = Some(TextField::Abbrev),
                b"description" => current_field = Some(TextField::Description),
                b"form" => {
                    current_lang =
                        Some(attr_value(e, b"lang").unwrap_or_else(|| "en".to_string()));
                }
                b"text" => {
                    in_text = true;
                    text_buf.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"range" => {
                    ranges.push(range_from_attrs(e));
                }
                b"range-element" => {
                    let mut el = element_from_attrs(e);
                    if el.parent_id.is_none() {
                        el.parent_id = element_stack.last().map(|p| p.id.clone());
                    }
                    flat.push(el);
                }
                b"trait" => {
                    if let Some(el) = element_stack.last_mut() {
                        if let (Some(name), Some(value)) =
                            (attr_value(e, b"name"), attr_value(e, b"value"))
                        {
                            el.traits.insert(name, value);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text {
                    if let Ok(unescaped) = e.unescape() {
                        text_buf.push_str(&unescaped);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"text" => {
                    in_text = false;
                    let value = text_buf.trim();
                    if !value.is_empty() {
                        if let (Some(field), Some(lang)) = (current_field, current_lang.as_ref()) {
                            if let Some(map) = target_map(
                                field,
                                element_stack.last_mut(),
                                current_range.as_mut(),
                            ) {
                                map.insert(lang.clone(), value.to_string());
                            }
                        }
                    }
                    text_buf.clear();
                }
                b"form" => current_lang = None,
                b"label" | b"abbrev" | b"abbreviation" | b"description" => current_field = None,
                b"range-element" => {
                    if let Some(mut el) = element_stack.pop() {
                        if el.parent_id.is_none() {
                            el.parent_id = element_stack.last().map(|p| p.id.clone());
                        }
                        flat.push(el);
                    }
                }
                b"range" => {
                    if let Some(mut range) = current_range.take() {
                        range.elements = nest_elements(std::mem::take(&mut flat));
                        ranges.push(range);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Internal(format!(
                    "Ranges document parse error: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(ranges)
}

/// Decode a targeted single-range query result
pub fn decode_range(xml: &str) -> Result<Option<Range>> {
    Ok(decode_ranges(xml)?.into_iter().next())
}

fn range_from_attrs(e: &BytesStart) -> Range {
    Range {
        id: attr_value(e, b"id").unwrap_or_default(),
        guid: attr_value(e, b"guid").unwrap_or_default(),
        official: true,
        ..Default::default()
    }
}

fn element_from_attrs(e: &BytesStart) -> RangeElement {
    RangeElement {
        id: attr_value(e, b"id").unwrap_or_default(),
        guid: attr_value(e, b"guid").unwrap_or_default(),
        parent_id: attr_value(e, b"parent").filter(|p| !p.is_empty()),
        value: attr_value(e, b"value").filter(|v| !v.is_empty()),
        ..Default::default()
    }
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| {
            attr.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
        })
}

fn target_map<'a>(
    field: TextField,
    element: Option<&'a mut RangeElement>,
    range: Option<&'a mut Range>,
) -> Option<&'a mut BTreeMap<String, String>> {
    if let Some(el) = element {
        return Some(match field {
            TextField::Label => &mut el.label,
            TextField::Abbrev => &mut el.abbreviation,
            TextField::Description => &mut el.description,
        });
    }
    let range = range?;
    match field {
        TextField::Label => Some(&mut range.label),
        TextField::Description => Some(&mut range.description),
        TextField::Abbrev => None,
    }
}

/// Encode one range as a canonical `<range>` node
pub fn encode_range(range: &Range) -> String {
    let mut out = String::new();
    out.push_str("<range id=\"");
    out.push_str(&esc(&range.id));
    out.push_str("\" guid=\"");
    out.push_str(&esc(&range.guid));
    out.push_str("\">");
    write_forms(&mut out, "label", &range.label);
    write_forms(&mut out, "description", &range.description);
    for el in &range.elements {
        write_element(&mut out, el);
    }
    out.push_str("</range>");
    out
}

/// Encode one element as a canonical `<range-element>` node.
///
/// Hierarchy is carried by the `parent` attribute; physically nested
/// children are written through so a node replacement keeps its subtree.
pub fn encode_element(element: &RangeElement) -> String {
    let mut out = String::new();
    write_element(&mut out, element);
    out
}

fn write_element(out: &mut String, el: &RangeElement) {
    out.push_str("<range-element id=\"");
    out.push_str(&esc(&el.id));
    out.push('"');
    if !el.guid.is_empty() {
        out.push_str(" guid=\"");
        out.push_str(&esc(&el.guid));
        out.push('"');
    }
    if let Some(parent) = &el.parent_id {
        out.push_str(" parent=\"");
        out.push_str(&esc(parent));
        out.push('"');
    }
    if let Some(value) = &el.value {
        out.push_str(" value=\"");
        out.push_str(&esc(value));
        out.push('"');
    }
    out.push('>');
    write_forms(out, "label", &el.label);
    write_forms(out, "abbrev", &el.abbreviation);
    write_forms(out, "description", &el.description);
    for (name, value) in &el.traits {
        out.push_str("<trait name=\"");
        out.push_str(&esc(name));
        out.push_str("\" value=\"");
        out.push_str(&esc(value));
        out.push_str("\"/>");
    }
    for child in &el.children {
        write_element(out, child);
    }
    out.push_str("</range-element>");
}

fn write_forms(out: &mut String, tag: &str, map: &BTreeMap<String, String>) {
    if map.is_empty() {
        return;
    }
    out.push('<');
    out.push_str(tag);
    out.push('>');
    for (lang, text) in map {
        out.push_str("<form lang=\"");
        out.push_str(&esc(lang));
        out.push_str("\"><text>");
        out.push_str(&esc(text));
        out.push_str("</text></form>");
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<lift-ranges>
  <range id="grammatical-info" guid="a1b2">
    <label><form lang="en"><text>Grammatical Category</text></form>
           <form lang="fr"><text>Cat&#233;gorie grammaticale</text></form></label>
    <description><form lang="en"><text>Part-of-speech inventory</text></form></description>
    <range-element id="noun" guid="e-1">
      <label><form lang="en"><text>Noun</text></form></label>
      <abbrev><form lang="en"><text>n</text></form></abbrev>
      <range-element id="proper-noun" guid="e-2">
        <label><form lang="en"><text>Proper Noun</text></form></label>
      </range-element>
    </range-element>
    <range-element id="verb" guid="e-3">
      <trait name="catalog-source-id" value="Verb"/>
    </range-element>
  </range>
  <range id="lexical-relation" guid="c3d4">
    <range-element id="synonym" parent=""/>
    <range-element id="near-synonym" parent="synonym"/>
  </range>
</lift-ranges>
"#;

    #[test]
    fn test_decode_document() {
        let ranges = decode_ranges(SAMPLE).unwrap();
        assert_eq!(ranges.len(), 2);

        let gram = &ranges[0];
        assert_eq!(gram.id, "grammatical-info");
        assert_eq!(gram.guid, "a1b2");
        assert!(gram.official);
        assert_eq!(gram.label["en"], "Grammatical Category");
        assert_eq!(gram.label["fr"], "Catégorie grammaticale");
        assert_eq!(gram.description["en"], "Part-of-speech inventory");

        // Physically nested child normalized under its parent
        assert_eq!(gram.elements.len(), 2);
        let noun = &gram.elements[0];
        assert_eq!(noun.id, "noun");
        assert_eq!(noun.abbreviation["en"], "n");
        assert_eq!(noun.children[0].id, "proper-noun");
        assert_eq!(noun.children[0].parent_id.as_deref(), Some("noun"));

        let verb = &gram.elements[1];
        assert_eq!(verb.traits["catalog-source-id"], "Verb");
    }

    #[test]
    fn test_decode_flat_parent_attribute() {
        let ranges = decode_ranges(SAMPLE).unwrap();
        let relations = &ranges[1];
        assert_eq!(relations.elements.len(), 1);
        assert_eq!(relations.elements[0].id, "synonym");
        assert_eq!(relations.elements[0].children[0].id, "near-synonym");
    }

    #[test]
    fn test_decode_bare_range_fragment() {
        let xml = r#"<range id="status" guid="g-9">
            <range-element id="confirmed"/>
        </range>"#;
        let range = decode_range(xml).unwrap().unwrap();
        assert_eq!(range.id, "status");
        assert_eq!(range.elements.len(), 1);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode_ranges("").unwrap().is_empty());
        assert!(decode_range("  \n").unwrap().is_none());
    }

    #[test]
    fn test_decode_malformed_is_error() {
        let xml = r#"<range id="x"><label></range>"#;
        assert!(decode_ranges(xml).is_err());
    }

    #[test]
    fn test_encode_element_round_trip() {
        let mut el = RangeElement {
            id: "noun".to_string(),
            guid: "e-1".to_string(),
            parent_id: None,
            value: Some("Noun".to_string()),
            ..Default::default()
        };
        el.label.insert("en".to_string(), "Noun <& more>".to_string());
        el.abbreviation.insert("en".to_string(), "n".to_string());
        el.traits
            .insert("catalog-source-id".to_string(), "Noun".to_string());
        el.children.push(RangeElement {
            id: "proper-noun".to_string(),
            parent_id: Some("noun".to_string()),
            ..Default::default()
        });

        let xml = format!("<range id=\"r\" guid=\"g\">{}</range>", encode_element(&el));
        let decoded = decode_range(&xml).unwrap().unwrap();
        let got = &decoded.elements[0];
        assert_eq!(got.id, "noun");
        assert_eq!(got.value.as_deref(), Some("Noun"));
        assert_eq!(got.label["en"], "Noun <& more>");
        assert_eq!(got.traits["catalog-source-id"], "Noun");
        assert_eq!(got.children[0].id, "proper-noun");
    }

    #[test]
    fn test_encode_range_includes_forms() {
        let mut range = Range {
            id: "status".to_string(),
            guid: "g-9".to_string(),
            ..Default::default()
        };
        range.label.insert("en".to_string(), "Status".to_string());
        let xml = encode_range(&range);
        assert!(xml.starts_with("<range id=\"status\" guid=\"g-9\">"));
        assert!(xml.contains("<label><form lang=\"en\"><text>Status</text></form></label>"));
        assert!(xml.ends_with("</range>"));
    }
}
