// ── Segment trie for channel matching ──
//
// Patterns are dot-delimited. `*` matches exactly one segment, `**`
// matches zero or more. Emitted channel names are always literal.

use std::collections::HashMap;

use super::{Listener, ListenerId};

pub(crate) const SINGLE: &str = "*";
pub(crate) const MULTI: &str = "**";

#[derive(Default)]
struct Node {
    children: HashMap<String, Node>,
    listeners: Vec<Listener>,
}

impl Node {
    fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.children.is_empty()
    }
}

#[derive(Default)]
pub(crate) struct Trie {
    root: Node,
}

impl Trie {
    pub(crate) fn insert(&mut self, pattern: &[String], listener: Listener) {
        let mut node = &mut self.root;
        for segment in pattern {
            node = node.children.entry(segment.clone()).or_default();
        }
        node.listeners.push(listener);
    }

    /// Remove the listener registered under `pattern` with `id`.
    /// Empty branches are pruned on the way back up.
    pub(crate) fn remove(&mut self, pattern: &[String], id: ListenerId) -> bool {
        remove_at(&mut self.root, pattern, id)
    }

    /// Every listener whose pattern matches `channel`, deduplicated and in
    /// registration order.
    pub(crate) fn matches(&self, channel: &[&str]) -> Vec<Listener> {
        let mut found = Vec::new();
        collect(&self.root, channel, &mut found);
        found.sort_by_key(|l| l.id);
        found.dedup_by_key(|l| l.id);
        found.into_iter().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.root = Node::default();
    }
}

fn remove_at(node: &mut Node, pattern: &[String], id: ListenerId) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        let before = node.listeners.len();
        node.listeners.retain(|l| l.id != id);
        return node.listeners.len() != before;
    };

    let Some(child) = node.children.get_mut(head) else {
        return false;
    };
    let removed = remove_at(child, rest, id);
    if child.is_empty() {
        node.children.remove(head);
    }
    removed
}

fn collect<'a>(node: &'a Node, segments: &[&str], out: &mut Vec<&'a Listener>) {
    if let Some(multi) = node.children.get(MULTI) {
        // `**` swallows any number of segments, including none.
        for skip in 0..=segments.len() {
            collect(multi, segments.get(skip..).unwrap_or_default(), out);
        }
    }

    let Some((head, rest)) = segments.split_first() else {
        out.extend(node.listeners.iter());
        return;
    };

    if let Some(child) = node.children.get(*head) {
        collect(child, rest, out);
    }
    if let Some(child) = node.children.get(SINGLE) {
        collect(child, rest, out);
    }
}
