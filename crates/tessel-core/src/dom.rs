//! Thin helpers over `html5ever` + `markup5ever_rcdom`.
//!
//! Every pipeline stage parses its input into a [`Document`], mutates it
//! in place, and serializes it back to a string before the next stage.
//! The tree is reference counted (`Rc`), so a `Document` must never be
//! held across an `.await`; stages collect what they need, drop the
//! document, do their I/O, then parse again to apply the results.

use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{
    Attribute, LocalName, ParseOpts, QualName, local_name, namespace_url, ns, parse_document,
    parse_fragment, serialize,
};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::Rc;

/// A parsed HTML document.
pub struct Document {
    dom: RcDom,
}

impl Document {
    /// Parse a full HTML document. HTML parsing never fails; malformed
    /// input is recovered the way browsers recover it.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        hoist_template_contents(&dom.document);
        Self { dom }
    }

    /// Root document node.
    pub fn root(&self) -> Handle {
        self.dom.document.clone()
    }

    /// Serialize the whole document back to HTML.
    pub fn to_html(&self) -> String {
        serialize_node(&self.dom.document, TraversalScope::ChildrenOnly(None))
    }

    /// Every element in document order.
    pub fn elements(&self) -> Vec<Handle> {
        descendants(&self.dom.document)
            .into_iter()
            .filter(|node| matches!(node.data, NodeData::Element { .. }))
            .collect()
    }

    /// Elements with the given local tag name, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<Handle> {
        self.elements()
            .into_iter()
            .filter(|node| tag_name(node) == Some(tag))
            .collect()
    }

    /// The `<head>` element, which the parser always synthesizes.
    pub fn head(&self) -> Option<Handle> {
        self.elements_by_tag("head").into_iter().next()
    }
}

/// Parse an HTML fragment in `<body>` context. The returned nodes are
/// detached and can be inserted anywhere.
pub fn parse_fragment_nodes(html: &str) -> Vec<Handle> {
    let context = QualName::new(None, ns!(html), local_name!("body"));
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html);
    hoist_template_contents(&dom.document);

    // Fragment parsing wraps the result in a synthetic <html> element.
    let wrapper = dom.document.children.borrow().first().cloned();
    let Some(wrapper) = wrapper else {
        return Vec::new();
    };
    let nodes: Vec<Handle> = wrapper.children.borrow_mut().drain(..).collect();
    for node in &nodes {
        node.parent.set(None);
    }
    nodes
}

/// Pre-order traversal below `root` (excluding `root`).
///
/// `<template>` elements are visited but not entered: their contents are
/// inert and not part of the document.
pub fn descendants(root: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        if tag_name(&node) != Some("template") {
            stack.extend(node.children.borrow().iter().rev().cloned());
        }
        out.push(node);
    }
    out
}

/// The rcdom serializer ignores template contents, so move them into the
/// template's children where they serialize like ordinary markup.
fn hoist_template_contents(root: &Handle) {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if let NodeData::Element {
            template_contents, ..
        } = &node.data
        {
            let fragment = template_contents.borrow_mut().take();
            if let Some(fragment) = fragment {
                let children: Vec<Handle> = fragment.children.borrow_mut().drain(..).collect();
                for child in children {
                    append_child(&node, child);
                }
            }
        }
        stack.extend(node.children.borrow().iter().cloned());
    }
}

/// Local tag name of an element.
pub fn tag_name(node: &Node) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

pub fn attr(node: &Node, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn has_attr(node: &Node, name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs.borrow().iter().any(|a| a.name.local.as_ref() == name),
        _ => false,
    }
}

/// All attributes as `(name, value)` pairs, in source order.
pub fn attributes(node: &Node) -> Vec<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|a| (a.name.local.to_string(), a.value.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Set or replace an attribute.
pub fn set_attr(node: &Node, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|a| a.name.local.as_ref() == name) {
            Some(existing) => existing.value = StrTendril::from_slice(value),
            None => attrs.push(make_attribute(name, value)),
        }
    }
}

/// Concatenated text of every descendant text node.
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    for child in descendants(node) {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

/// Create a detached HTML element.
pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attrs.iter().map(|(k, v)| make_attribute(k, v)).collect()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// Append a text node to `parent`.
pub fn append_text(parent: &Handle, text: &str) {
    let node = Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    });
    append_child(parent, node);
}

pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Detach `node` from its parent.
pub fn remove(node: &Handle) {
    replace_with(node, Vec::new());
}

/// Replace `node` with `replacements`, in place.
pub fn replace_with(node: &Handle, replacements: Vec<Handle>) {
    let Some(parent) = parent_of(node) else {
        return;
    };
    let mut children = parent.children.borrow_mut();
    let Some(index) = children.iter().position(|child| Rc::ptr_eq(child, node)) else {
        return;
    };
    for replacement in &replacements {
        replacement.parent.set(Some(Rc::downgrade(&parent)));
    }
    children.splice(index..=index, replacements);
    node.parent.set(None);
}

fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

fn make_attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, ns!(), LocalName::from(name)),
        value: StrTendril::from_slice(value),
    }
}

fn serialize_node(node: &Handle, scope: TraversalScope) -> String {
    let mut out = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..SerializeOpts::default()
    };
    // Writing into a Vec cannot fail.
    let _ = serialize(&mut out, &SerializableHandle::from(node.clone()), opts);
    String::from_utf8_lossy(&out).into_owned()
}

/// Serialize a single element including its own tag.
pub fn outer_html(node: &Handle) -> String {
    serialize_node(node, TraversalScope::IncludeNode)
}
