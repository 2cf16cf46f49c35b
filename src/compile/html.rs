//! Parse, walk and serialize HTML fragments.
//!
//! The HTML rendered from Markdown, including the raw HTML written by authors,
//! is parsed into a DOM so that every element takes part in the sanitization
//! and rewriting passes.
//!
//! This module uses [`html5ever`] and [`markup5ever_rcdom`] under the hood.

use std::{cell::RefCell, rc::Rc};

use html5ever::{
    parse_fragment,
    serialize::{serialize, SerializeOpts, TraversalScope},
    tendril::{StrTendril, TendrilSink},
    Attribute, LocalName, Namespace, ParseOpts, QualName,
};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use thiserror::Error;

/// XHTML namespace of HTML elements.
const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// List of errors for this module.
#[derive(Debug, Error)]
pub enum HtmlError {
    /// The parser did not produce a fragment root.
    #[error("missing fragment root")]
    MissingRoot,
    /// I/O error while serializing.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The serializer produced invalid UTF-8.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A parsed HTML fragment.
pub struct Fragment {
    /// Element holding the fragment nodes.
    root: Handle,
    /// Owner of the tree; dropping it detaches every descendant.
    _dom: RcDom,
}

impl Fragment {
    /// Parse an HTML fragment in the context of a `<body>` element.
    pub fn parse(html: &str) -> Result<Self, HtmlError> {
        let dom = parse_fragment(
            RcDom::default(),
            ParseOpts::default(),
            qual_name("body"),
            Vec::new(),
        )
        .one(html);

        // The fragment nodes are children of a synthetic `<html>` element
        let root = dom
            .document
            .children
            .borrow()
            .iter()
            .find(|node| matches!(node.data, NodeData::Element { .. }))
            .cloned()
            .ok_or(HtmlError::MissingRoot)?;

        Ok(Self { root, _dom: dom })
    }

    /// Return the element holding the fragment nodes.
    pub fn root(&self) -> &Handle {
        &self.root
    }

    /// Serialize the fragment to an HTML string.
    pub fn to_html(&self) -> Result<String, HtmlError> {
        let mut output = Vec::new();

        serialize(
            &mut output,
            &SerializableHandle::from(self.root.clone()),
            SerializeOpts {
                traversal_scope: TraversalScope::ChildrenOnly(None),
                ..Default::default()
            },
        )?;

        Ok(String::from_utf8(output)?)
    }
}

/// Visit elements of a DOM tree.
///
/// Visitors run in a single pre-order traversal: for each element, every
/// visitor is called in order before the traversal descends into the
/// (possibly modified) children of that element.
pub trait Visitor {
    /// Visit an element.
    fn visit(&mut self, element: &Handle);
}

/// Walk the descendants of `root` in document order, calling visitors on each
/// element.
pub fn walk(root: &Handle, visitors: &mut [&mut dyn Visitor]) {
    // Clone the handles so visitors may modify the children list
    let children: Vec<Handle> = root.children.borrow().clone();

    for child in &children {
        if !matches!(child.data, NodeData::Element { .. }) {
            continue;
        }

        for visitor in visitors.iter_mut() {
            visitor.visit(child);
        }

        walk(child, visitors);
    }
}

/// Create a qualified name in the HTML namespace.
pub fn qual_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

/// Create a detached element.
pub fn create_element(local: &str, attrs: &[(&str, &str)]) -> Handle {
    let attrs = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: qual_name_attr(name),
            value: StrTendril::from(*value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: qual_name(local),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// Create a qualified attribute name (attributes have no namespace).
pub fn qual_name_attr(local: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(local))
}

/// Return the local tag name of an element.
pub fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

/// Return the value of an attribute.
pub fn get_attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Set the value of an attribute, adding it if missing.
pub fn set_attribute(node: &Handle, name: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };

    let mut attrs = attrs.borrow_mut();

    match attrs.iter_mut().find(|attr| &*attr.name.local == name) {
        Some(attr) => attr.value = StrTendril::from(value),
        None => attrs.push(Attribute {
            name: qual_name_attr(name),
            value: StrTendril::from(value),
        }),
    }
}

/// Concatenate the text of all descendants.
pub fn text_content(node: &Handle) -> String {
    let mut output = String::new();
    collect_text(node, &mut output);
    output
}

fn collect_text(node: &Handle, output: &mut String) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => output.push_str(&contents.borrow()),
            NodeData::Element { .. } => collect_text(child, output),
            _ => {},
        }
    }
}

/// Concatenate the text of direct text children only.
pub fn own_text(node: &Handle) -> String {
    node.children
        .borrow()
        .iter()
        .filter_map(|child| match &child.data {
            NodeData::Text { contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect()
}

/// Move all children of `node` into `wrapper`, then make `wrapper` the only
/// child of `node`.
pub fn wrap_children(node: &Handle, wrapper: Handle) {
    let children = std::mem::take(&mut *node.children.borrow_mut());

    for child in &children {
        child.parent.set(Some(Rc::downgrade(&wrapper)));
    }
    *wrapper.children.borrow_mut() = children;

    wrapper.parent.set(Some(Rc::downgrade(node)));
    node.children.borrow_mut().push(wrapper);
}

/// Insert `child` as the first child of `node`.
pub fn prepend_child(node: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(node)));
    node.children.borrow_mut().insert(0, child);
}

/// Check if a descendant of `node` is an element named `local`.
pub fn has_descendant(node: &Handle, local: &str) -> bool {
    node.children
        .borrow()
        .iter()
        .any(|child| tag_name(child) == Some(local) || has_descendant(child, local))
}

#[cfg(test)]
mod tests {
    use markup5ever_rcdom::Handle;

    use super::{
        create_element, get_attribute, has_descendant, own_text, prepend_child, set_attribute,
        tag_name, text_content, walk, wrap_children, Fragment, Visitor,
    };

    #[test]
    fn parse_and_serialize() {
        let fragment = Fragment::parse("<p>Hello <em>world</em></p>").unwrap();
        assert_eq!(fragment.to_html().unwrap(), "<p>Hello <em>world</em></p>");
    }

    #[test]
    fn keep_nodes_after_parse() {
        let fragment = Fragment::parse("<h1>Title</h1><p>Body</p>").unwrap();

        let names: Vec<_> = fragment
            .root()
            .children
            .borrow()
            .iter()
            .filter_map(|node| tag_name(node).map(str::to_owned))
            .collect();

        assert_eq!(names, vec!["h1", "p"]);
        assert_eq!(text_content(fragment.root()), "TitleBody");
    }

    #[test]
    fn serialize_escapes_text() {
        let fragment = Fragment::parse("<p>a &amp; b &lt; c</p>").unwrap();
        assert_eq!(fragment.to_html().unwrap(), "<p>a &amp; b &lt; c</p>");
    }

    #[test]
    fn walk_in_document_order() {
        struct Names(Vec<String>);

        impl Visitor for Names {
            fn visit(&mut self, element: &Handle) {
                self.0.push(tag_name(element).unwrap_or_default().to_owned());
            }
        }

        let fragment = Fragment::parse("<h1>a</h1><div><p>b</p></div><h2>c</h2>").unwrap();
        let mut names = Names(Vec::new());
        walk(fragment.root(), &mut [&mut names]);

        assert_eq!(names.0, vec!["h1", "div", "p", "h2"]);
    }

    #[test]
    fn edit_attributes() {
        let fragment = Fragment::parse(r#"<a href="/x">x</a>"#).unwrap();
        let anchor = fragment.root().children.borrow()[0].clone();

        set_attribute(&anchor, "href", "/y");
        set_attribute(&anchor, "title", "Y");

        assert_eq!(get_attribute(&anchor, "href").as_deref(), Some("/y"));
        assert_eq!(
            fragment.to_html().unwrap(),
            r#"<a href="/y" title="Y">x</a>"#
        );
    }

    #[test]
    fn collect_texts() {
        let fragment = Fragment::parse("<h2>Hello <em>big</em> world</h2>").unwrap();
        let heading = fragment.root().children.borrow()[0].clone();

        assert_eq!(text_content(&heading), "Hello big world");
        assert_eq!(own_text(&heading), "Hello  world");
    }

    #[test]
    fn wrap_all_children() {
        let fragment = Fragment::parse("<h1>Title <em>x</em></h1>").unwrap();
        let heading = fragment.root().children.borrow()[0].clone();

        wrap_children(&heading, create_element("a", &[("href", "#title")]));

        assert_eq!(
            fragment.to_html().unwrap(),
            r##"<h1><a href="#title">Title <em>x</em></a></h1>"##
        );
    }

    #[test]
    fn prepend_and_find_children() {
        let fragment = Fragment::parse(r#"<h2>See <a href="/docs">docs</a></h2>"#).unwrap();
        let heading = fragment.root().children.borrow()[0].clone();

        assert!(has_descendant(&heading, "a"));
        assert!(!has_descendant(&heading, "em"));

        prepend_child(&heading, create_element("span", &[]));

        assert_eq!(
            fragment.to_html().unwrap(),
            r#"<h2><span></span>See <a href="/docs">docs</a></h2>"#
        );
    }
}
