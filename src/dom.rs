use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Node as HtmlNode};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Slot>,
    root: NodeId,
}

impl Document {
    pub fn new(root_tag: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.push(NodeKind::Element(Element::new(root_tag)));
        doc
    }

    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let source_root = parsed.root_element();

        let mut doc = Self::new(source_root.value().name());
        let root = doc.root;
        for (key, value) in source_root.value().attrs() {
            doc.set_attr(root, key, value);
        }
        doc.copy_html_children(source_root, root);
        doc
    }

    fn copy_html_children(&mut self, source: ElementRef<'_>, parent: NodeId) {
        for child in source.children() {
            let id = match child.value() {
                HtmlNode::Text(text) => self.create_text(text),
                HtmlNode::Comment(comment) => self.push(NodeKind::Comment((**comment).to_owned())),
                HtmlNode::Element(_) => {
                    let Some(child_ref) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let mut element = Element::new(child_ref.value().name());
                    for (key, value) in child_ref.value().attrs() {
                        element.attrs.insert(key.to_owned(), value.to_owned());
                    }
                    let id = self.push(NodeKind::Element(element));
                    self.copy_html_children(child_ref, id);
                    id
                }
                _ => continue,
            };
            self.append(parent, id);
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Slot {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, node: NodeId) {
        self.detach(node);
        self.root = node;
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag_name(id) == Some(tag)
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_class(class))
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(key))
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attrs.insert(key.to_owned(), value.to_owned());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) {
        if let Some(element) = self.element_mut(id) {
            element.attrs.remove(key);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element(Element::new(name)))
    }

    pub fn create_element_with_attrs(
        &mut self,
        name: &str,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        let mut element = Element::new(name);
        element.attrs = attrs;
        self.push(NodeKind::Element(element))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_owned()))
    }

    /// Appends `child` as the last child of `parent`, detaching it from any
    /// previous parent. Attaching a node below itself is refused.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            tracing::warn!(?parent, ?child, "refusing to attach a node below itself");
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Replaces an element with its own children, keeping their position.
    pub fn unwrap(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &children {
            self.nodes[child.0].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent.0].children;
        if let Some(pos) = siblings.iter().position(|c| *c == id) {
            siblings.remove(pos);
            for (offset, child) in children.into_iter().enumerate() {
                siblings.insert(pos + offset, child);
            }
        }
        self.nodes[id.0].parent = None;
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    pub fn find_ancestor(&self, id: NodeId, pred: impl Fn(&Element) -> bool) -> Option<NodeId> {
        self.ancestors(id)
            .find(|a| self.element(*a).is_some_and(|e| pred(e)))
    }

    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn find_all(&self, scope: NodeId, pred: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.descendants(scope)
            .filter(|id| self.element(*id).is_some_and(|e| pred(e)))
            .collect()
    }

    pub fn find_by_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.find_all(scope, |e| e.name == tag)
    }

    pub fn find_by_class(&self, scope: NodeId, tag: Option<&str>, class: &str) -> Vec<NodeId> {
        self.find_all(scope, |e| tag.is_none_or(|t| e.name == t) && e.has_class(class))
    }

    pub fn find_first(&self, scope: NodeId, pred: impl Fn(&Element) -> bool) -> Option<NodeId> {
        self.descendants(scope)
            .find(|id| self.element(*id).is_some_and(|e| pred(e)))
    }

    pub fn find_first_by_tag(&self, scope: NodeId, tag: &str) -> Option<NodeId> {
        self.find_first(scope, |e| e.name == tag)
    }

    pub fn contains_tag(&self, scope: NodeId, tag: &str) -> bool {
        self.find_first_by_tag(scope, tag).is_some()
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    pub fn text(&self, id: NodeId) -> String {
        if let NodeKind::Text(text) = self.kind(id) {
            return text.clone();
        }
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeKind::Text(text) = self.kind(node) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn has_text(&self, id: NodeId) -> bool {
        std::iter::once(id)
            .chain(self.descendants(id))
            .any(|node| matches!(self.kind(node), NodeKind::Text(t) if !t.trim().is_empty()))
    }

    pub fn import(&mut self, other: &Document, node: NodeId) -> NodeId {
        let copy = self.push(other.kind(node).clone());
        for child in other.children(node) {
            let child_copy = self.import(other, *child);
            self.append(copy, child_copy);
        }
        copy
    }

    pub fn to_xhtml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    pub fn inner_xhtml(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(&escape_comment(comment));
                out.push_str("-->");
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (key, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                let children = self.children(id);
                if children.is_empty() && VOID_TAGS.contains(&element.name.as_str()) {
                    out.push_str(" />");
                    return;
                }
                out.push('>');
                for child in children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
        }
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(current).iter().rev().copied());
        Some(current)
    }
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}

/// XML comments may not contain `--` or end with `-`.
fn escape_comment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '-' && out.ends_with('-') {
            out.push(' ');
        }
        out.push(c);
    }
    if out.ends_with('-') {
        out.push(' ');
    }
    out
}
