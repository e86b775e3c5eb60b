//! The live tree the overlay reads from and writes into.
//!
//! The engine never walks a concrete tree. It goes through two seams:
//!
//! - [`TextSource`]: enumerate leaf text positions and overwrite their content
//! - [`ContentEvents`]: be told when the structure of the tree changes
//!
//! [`Document`] is the in-memory implementation used by the binary and the
//! tests. Any other producer (a component tree, a parsed HTML document) can be
//! plugged in by implementing the two traits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors raised by a text source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("document root is detached")]
    Detached,

    #[error("node {0:?} does not exist")]
    NoSuchNode(NodeId),

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
}

/// Opaque handle to one leaf text position, assigned by the text source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitRef(u64);

impl UnitRef {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The element directly containing a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

impl Container {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One leaf text position and its current content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub unit: UnitRef,
    pub text: String,
    pub container: Container,
}

/// Read/write access to the leaf text of a tree the overlay does not own.
pub trait TextSource: Send + Sync {
    /// All leaf text positions, depth-first in document order.
    fn collect_leaves(&self) -> Result<Vec<Leaf>, SourceError>;

    /// Overwrite the content of `unit`. Returns `false` if the unit is gone.
    fn apply_text(&self, unit: &UnitRef, text: &str) -> bool;
}

pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Structural change notifications.
pub trait ContentEvents: Send + Sync {
    fn on_content_changed(&self, callback: Callback) -> Subscription;
}

/// Keeps a callback registered until dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Callback registry shared by the in-memory event producers.
#[derive(Clone, Default)]
pub struct Listeners {
    next_id: Arc<AtomicU64>,
    callbacks: Arc<Mutex<Vec<(u64, Callback)>>>,
}

impl Listeners {
    pub fn subscribe(&self, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));

        let callbacks = Arc::downgrade(&self.callbacks);
        Subscription::new(move || {
            if let Some(callbacks) = callbacks.upgrade() {
                callbacks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(registered, _)| *registered != id);
            }
        })
    }

    /// Invoke every callback. Callbacks run outside the registry lock, so
    /// they may subscribe or unsubscribe.
    pub fn notify(&self) {
        let snapshot: Vec<Callback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialized form of a node: a bare string is a text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Text(String),
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        classes: Vec<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<NodeSpec>,
    },
}

impl NodeSpec {
    pub fn text(text: impl Into<String>) -> Self {
        NodeSpec::Text(text.into())
    }

    pub fn element(tag: impl Into<String>, children: Vec<NodeSpec>) -> Self {
        NodeSpec::Element {
            tag: tag.into(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            children,
        }
    }
}

/// Handle to a node. A handle outlives its node: once the node is removed the
/// handle resolves to nothing, even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
enum NodeKind {
    Element(Container),
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
    alive: bool,
    generation: u32,
}

/// Slot arena. Removed nodes are returned to `free` and their slot is reused
/// with a bumped generation, so re-rendering does not grow the arena.
#[derive(Debug)]
struct Tree {
    nodes: Vec<Node>,
    free: Vec<usize>,
    attached: bool,
}

const BODY: usize = 0;
const BODY_ID: NodeId = NodeId {
    index: BODY,
    generation: 0,
};

/// Unit refs carry the slot generation in the high half.
fn unit_ref(index: usize, generation: u32) -> UnitRef {
    UnitRef::new((u64::from(generation) << 32) | index as u64)
}

fn split_unit_ref(unit: &UnitRef) -> (usize, u32) {
    let raw = unit.raw();
    ((raw & 0xFFFF_FFFF) as usize, (raw >> 32) as u32)
}

impl Tree {
    fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element(Container::new("body")),
                parent: None,
                children: Vec::new(),
                alive: true,
                generation: 0,
            }],
            free: Vec::new(),
            attached: true,
        }
    }

    fn live(&self, id: NodeId) -> Result<&Node, SourceError> {
        self.nodes
            .get(id.index)
            .filter(|node| node.alive && node.generation == id.generation)
            .ok_or(SourceError::NoSuchNode(id))
    }

    fn container_mut(&mut self, id: NodeId) -> Result<&mut Container, SourceError> {
        self.live(id)?;
        match &mut self.nodes[id.index].kind {
            NodeKind::Element(container) => Ok(container),
            NodeKind::Text(_) => Err(SourceError::NotAnElement(id)),
        }
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, SourceError> {
        self.container_mut(parent)?;
        let (index, generation) = match self.free.pop() {
            Some(index) => (index, self.nodes[index].generation.wrapping_add(1)),
            None => (self.nodes.len(), 0),
        };
        let node = Node {
            kind,
            parent: Some(parent.index),
            children: Vec::new(),
            alive: true,
            generation,
        };
        if index == self.nodes.len() {
            self.nodes.push(node);
        } else {
            self.nodes[index] = node;
        }
        self.nodes[parent.index].children.push(index);
        Ok(NodeId { index, generation })
    }

    fn insert_spec(&mut self, parent: NodeId, spec: &NodeSpec) -> Result<NodeId, SourceError> {
        match spec {
            NodeSpec::Text(text) => self.push(parent, NodeKind::Text(text.clone())),
            NodeSpec::Element {
                tag,
                classes,
                attributes,
                children,
            } => {
                let container = Container {
                    tag: tag.clone(),
                    classes: classes.clone(),
                    attributes: attributes.clone(),
                };
                let id = self.push(parent, NodeKind::Element(container))?;
                for child in children {
                    self.insert_spec(id, child)?;
                }
                Ok(id)
            }
        }
    }

    fn kill(&mut self, id: usize) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current];
            node.alive = false;
            stack.extend(node.children.drain(..));
            self.free.push(current);
        }
    }

    fn to_spec(&self, id: usize) -> NodeSpec {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Text(text) => NodeSpec::Text(text.clone()),
            NodeKind::Element(container) => NodeSpec::Element {
                tag: container.tag.clone(),
                classes: container.classes.clone(),
                attributes: container.attributes.clone(),
                children: node.children.iter().map(|&c| self.to_spec(c)).collect(),
            },
        }
    }
}

/// An in-memory live tree rooted at a `body` element.
///
/// Structural edits notify content-changed subscribers; text and attribute
/// edits do not, so the overlay writing translations never re-triggers itself.
pub struct Document {
    tree: RwLock<Tree>,
    listeners: Listeners,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::new()),
            listeners: Listeners::default(),
        }
    }

    /// Build a document from a serialized tree.
    ///
    /// A root element tagged `body` becomes the body itself; anything else
    /// becomes its only child.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, SourceError> {
        let document = Self::new();
        {
            let mut tree = document.write();
            match spec {
                NodeSpec::Element {
                    tag,
                    classes,
                    attributes,
                    children,
                } if tag.eq_ignore_ascii_case("body") => {
                    let body = tree.container_mut(BODY_ID)?;
                    body.classes = classes.clone();
                    body.attributes = attributes.clone();
                    for child in children {
                        tree.insert_spec(BODY_ID, child)?;
                    }
                }
                other => {
                    tree.insert_spec(BODY_ID, other)?;
                }
            }
        }
        Ok(document)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let spec: NodeSpec = serde_json::from_str(json)?;
        Ok(Self::from_spec(&spec)?)
    }

    /// Serialized form of the body and everything under it.
    pub fn to_spec(&self) -> NodeSpec {
        self.read().to_spec(BODY)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_spec())
    }

    pub fn body(&self) -> NodeId {
        BODY_ID
    }

    pub fn append_element(&self, parent: NodeId, tag: &str) -> Result<NodeId, SourceError> {
        let id = self
            .write()
            .push(parent, NodeKind::Element(Container::new(tag)))?;
        self.listeners.notify();
        Ok(id)
    }

    pub fn append_text(&self, parent: NodeId, text: &str) -> Result<NodeId, SourceError> {
        let id = self.write().push(parent, NodeKind::Text(text.to_string()))?;
        self.listeners.notify();
        Ok(id)
    }

    /// Append a whole serialized subtree with a single notification.
    pub fn append_spec(&self, parent: NodeId, spec: &NodeSpec) -> Result<NodeId, SourceError> {
        let id = self.write().insert_spec(parent, spec)?;
        self.listeners.notify();
        Ok(id)
    }

    /// Swap out every child of `parent`, as a re-render would.
    pub fn replace_children(&self, parent: NodeId, children: &[NodeSpec]) -> Result<(), SourceError> {
        {
            let mut tree = self.write();
            tree.container_mut(parent)?;
            let old = std::mem::take(&mut tree.nodes[parent.index].children);
            for child in old {
                tree.kill(child);
            }
            for child in children {
                tree.insert_spec(parent, child)?;
            }
        }
        self.listeners.notify();
        Ok(())
    }

    pub fn remove(&self, node: NodeId) -> Result<(), SourceError> {
        {
            let mut tree = self.write();
            let parent = tree.live(node)?.parent.ok_or(SourceError::NoSuchNode(node))?;
            tree.nodes[parent].children.retain(|&child| child != node.index);
            tree.kill(node.index);
        }
        self.listeners.notify();
        Ok(())
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), SourceError> {
        let mut tree = self.write();
        let container = tree.container_mut(node)?;
        if !container.has_class(class) {
            container.classes.push(class.to_string());
        }
        Ok(())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), SourceError> {
        self.write()
            .container_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Overwrite a text node's content, as the producer re-rendering it would.
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), SourceError> {
        let mut tree = self.write();
        tree.live(node)?;
        match &mut tree.nodes[node.index].kind {
            NodeKind::Text(content) => {
                *content = text.to_string();
                Ok(())
            }
            NodeKind::Element(_) => Err(SourceError::NoSuchNode(node)),
        }
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        let tree = self.read();
        match &tree.live(node).ok()?.kind {
            NodeKind::Text(text) => Some(text.clone()),
            NodeKind::Element(_) => None,
        }
    }

    /// Every text node's content in document order, eligible or not.
    pub fn texts(&self) -> Vec<String> {
        let tree = self.read();
        let mut texts = Vec::new();
        let mut stack = vec![BODY];
        while let Some(id) = stack.pop() {
            let node = &tree.nodes[id];
            if let NodeKind::Text(text) = &node.kind {
                texts.push(text.clone());
            }
            stack.extend(node.children.iter().rev());
        }
        texts
    }

    /// Make the body unreachable; traversal fails from now on.
    pub fn detach(&self) {
        self.write().attached = false;
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.read().nodes.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TextSource for Document {
    fn collect_leaves(&self) -> Result<Vec<Leaf>, SourceError> {
        let tree = self.read();
        if !tree.attached {
            return Err(SourceError::Detached);
        }

        let mut leaves = Vec::new();
        let mut stack = vec![BODY];
        while let Some(id) = stack.pop() {
            let node = &tree.nodes[id];
            match &node.kind {
                NodeKind::Text(text) => {
                    let container = node
                        .parent
                        .and_then(|parent| match &tree.nodes[parent].kind {
                            NodeKind::Element(container) => Some(container.clone()),
                            NodeKind::Text(_) => None,
                        })
                        .unwrap_or_default();
                    leaves.push(Leaf {
                        unit: unit_ref(id, node.generation),
                        text: text.clone(),
                        container,
                    });
                }
                NodeKind::Element(_) => stack.extend(node.children.iter().rev()),
            }
        }
        Ok(leaves)
    }

    fn apply_text(&self, unit: &UnitRef, text: &str) -> bool {
        let (index, generation) = split_unit_ref(unit);
        let mut tree = self.write();
        match tree.nodes.get_mut(index) {
            Some(Node {
                kind: NodeKind::Text(content),
                alive: true,
                generation: current,
                ..
            }) if *current == generation => {
                if content != text {
                    *content = text.to_string();
                }
                true
            }
            _ => false,
        }
    }
}

impl ContentEvents for Document {
    fn on_content_changed(&self, callback: Callback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(document: &Document) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let subscription = document.on_content_changed(Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        (count, subscription)
    }

    #[test]
    fn test_collect_leaves_in_document_order() {
        let doc = Document::new();
        let header = doc.append_element(doc.body(), "header").unwrap();
        doc.append_text(header, "Accueil").unwrap();
        let main = doc.append_element(doc.body(), "main").unwrap();
        let p = doc.append_element(main, "p").unwrap();
        doc.append_text(p, "Bienvenue").unwrap();
        doc.append_text(main, "Fin").unwrap();

        let leaves = doc.collect_leaves().unwrap();
        let texts: Vec<_> = leaves.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Accueil", "Bienvenue", "Fin"]);
        assert_eq!(leaves[0].container.tag, "header");
        assert_eq!(leaves[1].container.tag, "p");
        assert_eq!(leaves[2].container.tag, "main");
    }

    #[test]
    fn test_apply_text_overwrites_in_place() {
        let doc = Document::new();
        let text = doc.append_text(doc.body(), "Bonjour").unwrap();
        let unit = doc.collect_leaves().unwrap()[0].unit;

        assert!(doc.apply_text(&unit, "Hello"));
        assert_eq!(doc.text(text).as_deref(), Some("Hello"));
        assert_eq!(doc.collect_leaves().unwrap()[0].unit, unit);
    }

    #[test]
    fn test_apply_text_on_removed_unit() {
        let doc = Document::new();
        let p = doc.append_element(doc.body(), "p").unwrap();
        doc.append_text(p, "Bonjour").unwrap();
        let unit = doc.collect_leaves().unwrap()[0].unit;

        doc.remove(p).unwrap();
        assert!(!doc.apply_text(&unit, "Hello"));
        assert!(doc.collect_leaves().unwrap().is_empty());
    }

    #[test]
    fn test_removed_slots_are_reused_without_aliasing() {
        let doc = Document::new();
        let old = doc.append_text(doc.body(), "Bonjour").unwrap();
        let stale_unit = doc.collect_leaves().unwrap()[0].unit;

        doc.remove(old).unwrap();
        let fresh = doc.append_text(doc.body(), "Au revoir").unwrap();

        assert_eq!(doc.slot_count(), 2);
        assert_eq!(doc.text(old), None);
        assert!(doc.set_text(old, "Salut").is_err());
        assert!(!doc.apply_text(&stale_unit, "Hello"));
        assert_eq!(doc.text(fresh).as_deref(), Some("Au revoir"));
    }

    #[test]
    fn test_rerendering_does_not_grow_the_arena() {
        let doc = Document::new();
        let card = NodeSpec::element("p", vec![NodeSpec::text("Nouveau produit")]);
        doc.replace_children(doc.body(), &[card.clone()]).unwrap();
        let slots = doc.slot_count();

        for _ in 0..100 {
            doc.replace_children(doc.body(), &[card.clone()]).unwrap();
        }

        assert_eq!(doc.slot_count(), slots);
        assert_eq!(doc.texts(), vec!["Nouveau produit"]);
    }

    #[test]
    fn test_detached_document_fails_traversal() {
        let doc = Document::new();
        doc.append_text(doc.body(), "Bonjour").unwrap();
        doc.detach();

        assert_eq!(doc.collect_leaves(), Err(SourceError::Detached));
    }

    #[test]
    fn test_structural_edits_notify_text_edits_do_not() {
        let doc = Document::new();
        let (count, _subscription) = counter(&doc);

        let p = doc.append_element(doc.body(), "p").unwrap();
        let text = doc.append_text(p, "Bonjour").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        doc.set_text(text, "Salut").unwrap();
        doc.add_class(p, "lead").unwrap();
        let unit = doc.collect_leaves().unwrap()[0].unit;
        doc.apply_text(&unit, "Hello");
        assert_eq!(count.load(Ordering::SeqCst), 2);

        doc.replace_children(p, &[NodeSpec::text("Nouveau")]).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let doc = Document::new();
        let (count, subscription) = counter(&doc);
        assert_eq!(doc.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(doc.subscriber_count(), 0);

        doc.append_text(doc.body(), "Bonjour").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_append_to_text_node_fails() {
        let doc = Document::new();
        let text = doc.append_text(doc.body(), "Bonjour").unwrap();
        assert_eq!(
            doc.append_text(text, "x"),
            Err(SourceError::NotAnElement(text))
        );
    }

    #[test]
    fn test_json_roundtrip_keeps_markers() {
        let json = r#"{
            "tag": "body",
            "children": [
                { "tag": "h1", "children": ["Nos produits"] },
                { "tag": "span", "classes": ["notranslate"], "children": ["MaMarque"] },
                { "tag": "p", "attributes": { "translate": "no" }, "children": ["Texte"] }
            ]
        }"#;
        let doc = Document::from_json(json).unwrap();

        let leaves = doc.collect_leaves().unwrap();
        assert_eq!(leaves.len(), 3);
        assert!(leaves[1].container.has_class("notranslate"));
        assert_eq!(leaves[2].container.attribute("translate"), Some("no"));

        let rendered = doc.to_json_pretty().unwrap();
        let reparsed = Document::from_json(&rendered).unwrap();
        assert_eq!(reparsed.to_spec(), doc.to_spec());
    }

    #[test]
    fn test_non_body_root_is_wrapped() {
        let doc = Document::from_json(r#"{ "tag": "div", "children": ["Bonjour"] }"#).unwrap();
        match doc.to_spec() {
            NodeSpec::Element { tag, children, .. } => {
                assert_eq!(tag, "body");
                assert_eq!(children.len(), 1);
            }
            NodeSpec::Text(_) => panic!("body should be an element"),
        }
    }

    #[test]
    fn test_texts_lists_every_text_node() {
        let doc = Document::new();
        let script = doc.append_element(doc.body(), "script").unwrap();
        doc.append_text(script, "var x = 1;").unwrap();
        doc.append_text(doc.body(), "42").unwrap();

        assert_eq!(doc.texts(), vec!["var x = 1;", "42"]);
    }
}
