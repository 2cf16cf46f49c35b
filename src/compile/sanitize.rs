//! Sanitize HTML against an allow-list schema.
//!
//! Sanitization is best-effort cleaning, never a failure: disallowed elements
//! are unwrapped (their children are kept), elements listed in
//! [`Schema::strip`] are removed along with their content, comments are
//! removed, and disallowed attributes are dropped. The default schema follows
//! the one GitHub uses to render user content.

use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use html5ever::tendril::StrTendril;
use markup5ever_rcdom::{Handle, NodeData};

use super::html::qual_name_attr;

/// Attribute key applying to every element.
const ANY_ELEMENT: &str = "*";

const TAG_NAMES: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "dd", "del", "details", "div", "dl", "dt", "em", "h1",
    "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "input", "ins", "kbd", "li", "ol", "p",
    "picture", "pre", "q", "rp", "rt", "ruby", "s", "samp", "section", "source", "span", "strike",
    "strong", "sub", "summary", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "tt",
    "ul", "var",
];

const STRIP: &[&str] = &["script", "style", "template", "noscript", "iframe", "object", "embed"];

const GLOBAL_ATTRIBUTES: &[&str] = &[
    "abbr", "accept", "accept-charset", "accesskey", "action", "align", "alt",
    "aria-describedby", "aria-hidden", "aria-label", "aria-labelledby", "axis", "border",
    "cellpadding", "cellspacing", "char", "charoff", "charset", "checked", "clear", "colspan",
    "color", "cols", "compact", "coords", "datetime", "dir", "disabled", "enctype", "frame",
    "hspace", "headers", "height", "hreflang", "for", "id", "ismap", "itemprop", "label", "lang",
    "maxlength", "media", "method", "multiple", "name", "nohref", "noshade", "nowrap", "open",
    "prompt", "readonly", "rev", "rowspan", "rows", "rules", "scope", "selected", "shape", "size",
    "span", "start", "summary", "tabindex", "title", "usemap", "valign", "value", "width",
];

/// Values allowed for an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allowed {
    /// Any value.
    Any,
    /// One of the listed values (for `class`, each token is checked).
    Values(Vec<String>),
    /// Values starting with one of the listed prefixes (for `class`, each
    /// token is checked).
    Prefixes(Vec<String>),
}

/// Allow-list of elements and attributes.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Elements kept in the output.
    pub tag_names: HashSet<String>,

    /// Elements removed along with their content.
    pub strip: HashSet<String>,

    /// Attributes kept per element; the `*` key applies to every element.
    pub attributes: HashMap<String, HashMap<String, Allowed>>,

    /// URL protocols allowed per attribute. Relative URLs are always allowed.
    pub protocols: HashMap<String, Vec<String>>,

    /// Attributes whose values are prefixed with [`Self::clobber_prefix`], so
    /// that user content cannot clobber ids of the host page.
    pub clobber: HashSet<String>,

    /// Prefix for clobbered attribute values.
    pub clobber_prefix: String,

    /// Attributes forced on elements, whatever the source says.
    pub required: HashMap<String, Vec<(String, String)>>,
}

impl Default for Schema {
    fn default() -> Self {
        fn set(values: &[&str]) -> HashSet<String> {
            values.iter().map(|v| v.to_string()).collect()
        }

        fn strings(values: &[&str]) -> Vec<String> {
            values.iter().map(|v| v.to_string()).collect()
        }

        let mut attributes: HashMap<String, HashMap<String, Allowed>> = HashMap::new();
        let mut allow = |tag: &str, attribute: &str, allowed: Allowed| {
            attributes
                .entry(tag.to_owned())
                .or_default()
                .insert(attribute.to_owned(), allowed);
        };

        for attribute in GLOBAL_ATTRIBUTES {
            allow(ANY_ELEMENT, attribute, Allowed::Any);
        }
        allow("a", "href", Allowed::Any);
        for tag in ["blockquote", "del", "ins", "q"] {
            allow(tag, "cite", Allowed::Any);
        }
        allow("code", "class", Allowed::Prefixes(strings(&["language-"])));
        allow("div", "itemscope", Allowed::Any);
        allow("div", "itemtype", Allowed::Any);
        allow("img", "src", Allowed::Any);
        allow("img", "longdesc", Allowed::Any);
        allow("input", "type", Allowed::Values(strings(&["checkbox"])));
        allow("li", "class", Allowed::Values(strings(&["task-list-item"])));
        allow("ol", "class", Allowed::Values(strings(&["contains-task-list"])));
        allow("ul", "class", Allowed::Values(strings(&["contains-task-list"])));
        allow("source", "srcset", Allowed::Any);

        let protocols = [
            ("href", strings(&["http", "https", "mailto", "xmpp", "irc", "ircs"])),
            ("cite", strings(&["http", "https"])),
            ("src", strings(&["http", "https"])),
            ("longdesc", strings(&["http", "https"])),
        ]
        .into_iter()
        .map(|(attribute, protocols)| (attribute.to_owned(), protocols))
        .collect();

        let required = [(
            "input".to_owned(),
            vec![
                ("type".to_owned(), "checkbox".to_owned()),
                ("disabled".to_owned(), String::new()),
            ],
        )]
        .into_iter()
        .collect();

        Self {
            tag_names: set(TAG_NAMES),
            strip: set(STRIP),
            attributes,
            protocols,
            clobber: set(&["aria-describedby", "aria-labelledby", "id", "name"]),
            clobber_prefix: "user-content-".to_owned(),
            required,
        }
    }
}

impl Schema {
    /// Allow any `class` value on the given elements.
    pub fn allow_classes(&mut self, tags: &[&str]) -> &mut Self {
        for tag in tags {
            self.attributes
                .entry(tag.to_string())
                .or_default()
                .insert("class".to_owned(), Allowed::Any);
        }
        self
    }

    /// Look up the rule for an attribute of an element.
    fn allowed(&self, tag: &str, attribute: &str) -> Option<&Allowed> {
        self.attributes
            .get(tag)
            .and_then(|attributes| attributes.get(attribute))
            .or_else(|| {
                self.attributes
                    .get(ANY_ELEMENT)
                    .and_then(|attributes| attributes.get(attribute))
            })
    }
}

/// Sanitize the descendants of `root` in place.
pub fn sanitize(root: &Handle, schema: &Schema) {
    let children = std::mem::take(&mut *root.children.borrow_mut());
    let mut kept = Vec::with_capacity(children.len());

    for child in children {
        match &child.data {
            NodeData::Text { .. } => kept.push(child),
            NodeData::Element { name, attrs, .. } => {
                let tag = (*name.local).to_ascii_lowercase();

                if schema.strip.contains(&tag) {
                    continue;
                }

                sanitize(&child, schema);

                if schema.tag_names.contains(&tag) {
                    let cleaned = sanitize_attributes(&tag, &attrs.borrow(), schema);
                    *attrs.borrow_mut() = cleaned;
                    kept.push(child);
                } else {
                    // Unwrap the element, keeping its (sanitized) children
                    kept.append(&mut child.children.borrow_mut());
                }
            },
            NodeData::Comment { .. }
            | NodeData::Doctype { .. }
            | NodeData::ProcessingInstruction { .. }
            | NodeData::Document => {},
        }
    }

    for child in &kept {
        child.parent.set(Some(Rc::downgrade(root)));
    }

    *root.children.borrow_mut() = kept;
}

/// Keep only allowed attributes, then add required ones.
fn sanitize_attributes(
    tag: &str,
    attrs: &[html5ever::Attribute],
    schema: &Schema,
) -> Vec<html5ever::Attribute> {
    let mut cleaned: Vec<html5ever::Attribute> = attrs
        .iter()
        .filter(|attr| attr.name.prefix.is_none())
        .filter_map(|attr| {
            let name = (*attr.name.local).to_ascii_lowercase();
            let allowed = schema.allowed(tag, &name)?;

            let value = filter_value(&name, &attr.value, allowed)?;

            if let Some(protocols) = schema.protocols.get(&name) {
                if !is_safe_url(&value, protocols) {
                    return None;
                }
            }

            let value = if schema.clobber.contains(&name) && !value.is_empty() {
                format!("{}{}", schema.clobber_prefix, value)
            } else {
                value
            };

            Some(html5ever::Attribute {
                name: attr.name.clone(),
                value: StrTendril::from(value),
            })
        })
        .collect();

    for (name, value) in schema.required.get(tag).into_iter().flatten() {
        let value = StrTendril::from(value.as_str());

        match cleaned
            .iter_mut()
            .find(|attr| &*attr.name.local == name.as_str())
        {
            Some(attr) => attr.value = value,
            None => cleaned.push(html5ever::Attribute {
                name: qual_name_attr(name),
                value,
            }),
        }
    }

    cleaned
}

/// Check an attribute value against its rule.
///
/// `class` values are filtered token by token; the attribute is dropped when
/// no token remains.
fn filter_value(name: &str, value: &str, allowed: &Allowed) -> Option<String> {
    let accepts = |token: &str| match allowed {
        Allowed::Any => true,
        Allowed::Values(values) => values.iter().any(|v| v == token),
        Allowed::Prefixes(prefixes) => prefixes.iter().any(|p| token.starts_with(p.as_str())),
    };

    if name == "class" {
        let tokens: Vec<&str> = value.split_whitespace().filter(|t| accepts(t)).collect();
        return (!tokens.is_empty()).then(|| tokens.join(" "));
    }

    accepts(value).then(|| value.to_owned())
}

/// Check that a URL is relative or uses an allowed protocol.
fn is_safe_url(value: &str, protocols: &[String]) -> bool {
    let value = value.trim();

    let Some(colon) = value.find(':') else {
        return true;
    };

    // A `/`, `?` or `#` before the colon means the URL is relative
    if value
        .find(['/', '?', '#'])
        .is_some_and(|boundary| boundary < colon)
    {
        return true;
    }

    let protocol = value[..colon].to_ascii_lowercase();
    protocols.iter().any(|allowed| *allowed == protocol)
}
