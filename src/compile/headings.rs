//! Heading ids, self-links and outline.

use std::collections::HashMap;

use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};

use super::html::{
    create_element, get_attribute, has_descendant, own_text, prepend_child, set_attribute,
    tag_name, text_content, wrap_children, Visitor,
};

/// Id used when a heading has no sluggable text.
const FALLBACK_ID: &str = "section";

/// A heading of the document outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level, from 1 to 6.
    pub depth: u8,
    /// Text of the heading.
    pub text: String,
    /// Id of the heading element.
    pub id: String,
}

/// Return the level of a heading element.
pub fn heading_depth(element: &Handle) -> Option<u8> {
    match tag_name(element)? {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Generate unique ids within a document.
///
/// Repeated slugs get a numeric suffix: `intro`, `intro-1`, `intro-2`...
#[derive(Debug, Default)]
pub struct Slugger {
    occurrences: HashMap<String, usize>,
}

impl Slugger {
    /// Create a slug from text, unique among the slugs of this slugger.
    pub fn slug(&mut self, text: &str) -> String {
        let base = match slug::slugify(text) {
            slug if slug.is_empty() => FALLBACK_ID.to_owned(),
            slug => slug,
        };

        let mut id = base.clone();

        while self.occurrences.contains_key(&id) {
            let count = self.occurrences.entry(base.clone()).or_default();
            *count += 1;
            id = format!("{}-{}", base, count);
        }

        self.occurrences.insert(id.clone(), 0);

        id
    }

    /// Mark an existing id as taken.
    pub fn reserve(&mut self, id: &str) {
        self.occurrences.entry(id.to_owned()).or_default();
    }
}

/// Assign an id to every heading lacking one.
#[derive(Debug, Default)]
pub struct HeadingIds {
    slugger: Slugger,
}

impl Visitor for HeadingIds {
    fn visit(&mut self, element: &Handle) {
        if heading_depth(element).is_none() {
            return;
        }

        match get_attribute(element, "id").filter(|id| !id.is_empty()) {
            Some(id) => self.slugger.reserve(&id),
            None => {
                let id = self.slugger.slug(&text_content(element));
                set_attribute(element, "id", &id);
            },
        }
    }
}

/// Record headings in document order.
#[derive(Debug, Default)]
pub struct HeadingCollector {
    headings: Vec<Heading>,
}

impl HeadingCollector {
    /// Return the collected headings.
    pub fn into_headings(self) -> Vec<Heading> {
        self.headings
    }
}

impl Visitor for HeadingCollector {
    fn visit(&mut self, element: &Handle) {
        let Some(depth) = heading_depth(element) else {
            return;
        };

        self.headings.push(Heading {
            depth,
            text: own_text(element),
            id: get_attribute(element, "id").unwrap_or_default(),
        });
    }
}

/// Link headings to themselves.
///
/// The content of a heading is wrapped in the link, unless it already holds
/// a link: anchors cannot nest, so an empty link is prepended instead.
#[derive(Debug, Default)]
pub struct HeadingAutolink;

impl Visitor for HeadingAutolink {
    fn visit(&mut self, element: &Handle) {
        if heading_depth(element).is_none() {
            return;
        }

        let Some(id) = get_attribute(element, "id").filter(|id| !id.is_empty()) else {
            return;
        };

        let href = format!("#{}", id);

        if has_descendant(element, "a") {
            prepend_child(
                element,
                create_element(
                    "a",
                    &[("href", &href), ("aria-hidden", "true"), ("tabindex", "-1")],
                ),
            );
        } else {
            wrap_children(element, create_element("a", &[("href", &href)]));
        }
    }
}
