use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::ElementId;

use super::{FeedPage, HoverStyles, Label, Selector};

/// Serializable description of an element subtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    fn text_content(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.text_content(out);
        }
    }

    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug)]
struct Node {
    tag: String,
    id: Option<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<ElementId>,
    styles: BTreeMap<String, String>,
    hover: Option<HoverStyles>,
    labels: Vec<Label>,
}

impl Node {
    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Tag(tag) => self.tag == *tag,
            Selector::Id(id) => self.id.as_deref() == Some(*id),
            Selector::TagWithId(tag, id) => self.tag == *tag && self.id.as_deref() == Some(*id),
            Selector::IdContains(fragment) => self
                .id
                .as_deref()
                .is_some_and(|id| id.contains(fragment)),
            Selector::TagWithAttr(tag, attr) => self.tag == *tag && self.attrs.contains_key(*attr),
            Selector::Descendant(_, tag) => self.tag == *tag,
        }
    }
}

#[derive(Debug)]
struct DocumentState {
    url: Url,
    next_id: u64,
    roots: Vec<ElementId>,
    nodes: HashMap<ElementId, Node>,
    overlay: Option<String>,
    scroll_locked: bool,
}

impl DocumentState {
    fn insert(&mut self, spec: &NodeSpec) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        let children = spec.children.iter().map(|c| self.insert(c)).collect::<Vec<_>>();
        self.nodes.insert(
            id,
            Node {
                tag: spec.tag.clone(),
                id: spec.id.clone(),
                attrs: spec.attrs.clone(),
                text: spec.text.clone(),
                children,
                styles: BTreeMap::new(),
                hover: None,
                labels: Vec::new(),
            },
        );
        id
    }

    /// Same tag, id and subtree text as `spec`.
    fn same_shape(&self, id: ElementId, spec: &NodeSpec) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if node.tag != spec.tag || node.id != spec.id {
            return false;
        }
        let (mut current, mut incoming) = (String::new(), String::new());
        self.text_of(id, &mut current);
        spec.text_content(&mut incoming);
        current == incoming
    }

    /// Reuses `existing` when it has the same shape as `spec`, keeping its
    /// styles, hover handlers and labels. Children are matched by position.
    fn reconcile(&mut self, existing: Option<ElementId>, spec: &NodeSpec) -> ElementId {
        let reusable = existing.filter(|id| self.same_shape(*id, spec));
        let Some(id) = reusable else {
            if let Some(old) = existing {
                self.remove_subtree(old);
            }
            return self.insert(spec);
        };

        let old_children = self
            .nodes
            .get(&id)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        let children = spec
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| self.reconcile(old_children.get(i).copied(), child))
            .collect::<Vec<_>>();
        for stale in old_children.iter().skip(spec.children.len()) {
            self.remove_subtree(*stale);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.attrs = spec.attrs.clone();
            node.children = children;
        }
        id
    }

    fn remove_subtree(&mut self, id: ElementId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    /// Pre-order walk below `from`, excluding `from` itself.
    fn descendants(&self, from: ElementId, out: &mut Vec<ElementId>) {
        if let Some(node) = self.nodes.get(&from) {
            for child in &node.children {
                out.push(*child);
                self.descendants(*child, out);
            }
        }
    }

    fn all_in_order(&self) -> Vec<ElementId> {
        let mut out = Vec::new();
        for root in &self.roots {
            out.push(*root);
            self.descendants(*root, &mut out);
        }
        out
    }

    fn has_ancestor_tag(&self, scope: Option<ElementId>, target: ElementId, tag: &str) -> bool {
        // Walk from scope (or roots) down to target, tracking whether `tag` was passed.
        fn walk(
            state: &DocumentState,
            current: ElementId,
            target: ElementId,
            tag: &str,
            seen: bool,
        ) -> Option<bool> {
            let node = state.nodes.get(&current)?;
            for child in &node.children {
                if *child == target {
                    return Some(seen);
                }
                let child_seen = seen
                    || state
                        .nodes
                        .get(child)
                        .is_some_and(|n| n.tag == tag);
                if let Some(found) = walk(state, *child, target, tag, child_seen) {
                    return Some(found);
                }
            }
            None
        }

        match scope {
            Some(scope) => walk(self, scope, target, tag, false).unwrap_or(false),
            None => self.roots.iter().any(|root| {
                let seen = self.nodes.get(root).is_some_and(|n| n.tag == tag);
                walk(self, *root, target, tag, seen).unwrap_or(false)
            }),
        }
    }

    fn matches(&self, scope: Option<ElementId>, id: ElementId, selector: &Selector) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if !node.matches(selector) {
            return false;
        }
        match selector {
            Selector::Descendant(ancestor, _) => self.has_ancestor_tag(scope, id, ancestor),
            _ => true,
        }
    }

    fn text_of(&self, id: ElementId, out: &mut String) {
        if let Some(node) = self.nodes.get(&id) {
            out.push_str(&node.text);
            for child in &node.children {
                self.text_of(*child, out);
            }
        }
    }
}

/// In-memory page used by the host binary and by tests.
#[derive(Debug)]
pub struct FeedDocument {
    state: Mutex<DocumentState>,
}

impl FeedDocument {
    pub fn new(url: Url, body: &[NodeSpec]) -> Self {
        let mut state = DocumentState {
            url,
            next_id: 1,
            roots: Vec::new(),
            nodes: HashMap::new(),
            overlay: None,
            scroll_locked: false,
        };
        let roots = body.iter().map(|spec| state.insert(spec)).collect();
        state.roots = roots;
        Self {
            state: Mutex::new(state),
        }
    }

    /// Replaces the page body and location. Elements that keep their shape and
    /// tree position keep their handles and applied effects; the rest go stale.
    pub fn replace(&self, url: Url, body: &[NodeSpec]) {
        let mut state = self.state.lock();
        state.url = url;
        let old_roots = std::mem::take(&mut state.roots);
        let roots = body
            .iter()
            .enumerate()
            .map(|(i, spec)| state.reconcile(old_roots.get(i).copied(), spec))
            .collect::<Vec<_>>();
        for stale in old_roots.iter().skip(body.len()) {
            state.remove_subtree(*stale);
        }
        state.roots = roots;
    }

    pub fn navigate(&self, url: Url) {
        self.state.lock().url = url;
    }

    pub fn append(&self, spec: &NodeSpec) -> ElementId {
        let mut state = self.state.lock();
        let id = state.insert(spec);
        state.roots.push(id);
        id
    }

    pub fn overlay_message(&self) -> Option<String> {
        self.state.lock().overlay.clone()
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.state.lock().scroll_locked
    }

    pub fn labels(&self, element: ElementId) -> Vec<Label> {
        self.state
            .lock()
            .nodes
            .get(&element)
            .map(|n| n.labels.clone())
            .unwrap_or_default()
    }

    pub fn pointer_enter(&self, element: ElementId) {
        self.apply_hover(element, true);
    }

    pub fn pointer_leave(&self, element: ElementId) {
        self.apply_hover(element, false);
    }

    fn apply_hover(&self, element: ElementId, entering: bool) {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.get_mut(&element) {
            if let Some(hover) = node.hover.clone() {
                let styles = if entering { hover.enter } else { hover.leave };
                for (k, v) in styles {
                    node.styles.insert(k, v);
                }
            }
        }
    }
}

impl FeedPage for FeedDocument {
    fn location(&self) -> Url {
        self.state.lock().url.clone()
    }

    fn query_all(&self, selector: &Selector) -> Vec<ElementId> {
        let state = self.state.lock();
        state
            .all_in_order()
            .into_iter()
            .filter(|id| state.matches(None, *id, selector))
            .collect()
    }

    fn query_within(&self, scope: ElementId, selector: &Selector) -> Option<ElementId> {
        let state = self.state.lock();
        let mut below = Vec::new();
        state.descendants(scope, &mut below);
        below
            .into_iter()
            .find(|id| state.matches(Some(scope), *id, selector))
    }

    fn text_content(&self, element: ElementId) -> Option<String> {
        let state = self.state.lock();
        if !state.nodes.contains_key(&element) {
            return None;
        }
        let mut out = String::new();
        state.text_of(element, &mut out);
        Some(out)
    }

    fn style(&self, element: ElementId, property: &str) -> Option<String> {
        self.state
            .lock()
            .nodes
            .get(&element)
            .and_then(|n| n.styles.get(property).cloned())
    }

    fn set_style(&self, element: ElementId, property: &str, value: &str) {
        if let Some(node) = self.state.lock().nodes.get_mut(&element) {
            node.styles.insert(property.to_string(), value.to_string());
        }
    }

    fn append_label(&self, element: ElementId, label: Label) {
        if let Some(node) = self.state.lock().nodes.get_mut(&element) {
            node.labels.push(label);
        }
    }

    fn set_hover_styles(&self, element: ElementId, hover: HoverStyles) {
        if let Some(node) = self.state.lock().nodes.get_mut(&element) {
            node.hover = Some(hover);
        }
    }

    fn show_overlay(&self, message: &str) -> bool {
        let mut state = self.state.lock();
        if state.overlay.is_some() {
            return false;
        }
        state.overlay = Some(message.to_string());
        true
    }

    fn set_overlay_message(&self, message: &str) {
        if let Some(overlay) = self.state.lock().overlay.as_mut() {
            *overlay = message.to_string();
        }
    }

    fn remove_overlay(&self) -> bool {
        self.state.lock().overlay.take().is_some()
    }

    fn set_scroll_locked(&self, locked: bool) {
        self.state.lock().scroll_locked = locked;
    }
}
