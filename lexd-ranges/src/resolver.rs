//! Hierarchy resolver
//!
//! Computes inherited ("effective") display values over an element forest.
//! Pure: the input is never mutated, and the output is a deep copy with
//! `effective_label`/`effective_abbrev` filled on every node. A node without
//! its own label or abbreviation inherits the already-resolved effective
//! value of its parent, so inheritance chains through intermediate unlabeled
//! nodes; the raw element id is the last resort.

use crate::model::RangeElement;

/// Resolve effective display values over a forest, returning an annotated
/// deep copy. Calling this twice on the same input yields identical output.
pub fn resolve_elements(elements: &[RangeElement]) -> Vec<RangeElement> {
    elements
        .iter()
        .map(|el| resolve_one(el, None, None))
        .collect()
}

fn resolve_one(
    el: &RangeElement,
    parent_label: Option<&str>,
    parent_abbrev: Option<&str>,
) -> RangeElement {
    let effective_label = el
        .label_text()
        .or(parent_label)
        .unwrap_or(&el.id)
        .to_string();
    let effective_abbrev = el
        .abbrev_text()
        .or(parent_abbrev)
        .unwrap_or(&el.id)
        .to_string();

    let children = el
        .children
        .iter()
        .map(|child| resolve_one(child, Some(&effective_label), Some(&effective_abbrev)))
        .collect();

    RangeElement {
        children,
        effective_label: Some(effective_label),
        effective_abbrev: Some(effective_abbrev),
        ..el.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(id: &str, label: Option<&str>, abbrev: Option<&str>) -> RangeElement {
        let mut el = RangeElement {
            id: id.to_string(),
            ..Default::default()
        };
        if let Some(l) = label {
            el.label.insert("en".to_string(), l.to_string());
        }
        if let Some(a) = abbrev {
            el.abbreviation.insert("en".to_string(), a.to_string());
        }
        el
    }

    #[test]
    fn test_child_inherits_parent_values() {
        let mut parent = labeled("parentX", Some("Parent X"), Some("PX"));
        let mut child = labeled("childX", None, None);
        child.parent_id = Some("parentX".to_string());
        parent.children.push(child);

        let resolved = resolve_elements(&[parent]);
        let child = &resolved[0].children[0];
        assert_eq!(child.effective_label.as_deref(), Some("Parent X"));
        assert_eq!(child.effective_abbrev.as_deref(), Some("PX"));
    }

    #[test]
    fn test_inheritance_chains_through_unlabeled_nodes() {
        let mut top = labeled("top", Some("Top"), Some("T"));
        let mut middle = labeled("middle", None, None);
        middle.children.push(labeled("leaf", None, None));
        top.children.push(middle);

        let resolved = resolve_elements(&[top]);
        let leaf = &resolved[0].children[0].children[0];
        assert_eq!(leaf.effective_label.as_deref(), Some("Top"));
        assert_eq!(leaf.effective_abbrev.as_deref(), Some("T"));
    }

    #[test]
    fn test_own_values_win_over_inherited() {
        let mut parent = labeled("parent", Some("Parent"), Some("P"));
        parent
            .children
            .push(labeled("child", Some("Child"), None));

        let resolved = resolve_elements(&[parent]);
        let child = &resolved[0].children[0];
        assert_eq!(child.effective_label.as_deref(), Some("Child"));
        // Abbreviation still inherited
        assert_eq!(child.effective_abbrev.as_deref(), Some("P"));
    }

    #[test]
    fn test_raw_id_is_last_resort() {
        let resolved = resolve_elements(&[labeled("bare", None, None)]);
        assert_eq!(resolved[0].effective_label.as_deref(), Some("bare"));
        assert_eq!(resolved[0].effective_abbrev.as_deref(), Some("bare"));
    }

    #[test]
    fn test_input_is_never_mutated_and_output_is_stable() {
        let mut parent = labeled("parent", Some("Parent"), Some("P"));
        parent.children.push(labeled("child", None, None));
        let input = vec![parent];
        let before = input.clone();

        let first = resolve_elements(&input);
        let second = resolve_elements(&input);

        assert_eq!(input, before);
        assert!(input[0].effective_label.is_none());
        assert_eq!(first, second);
    }
}
