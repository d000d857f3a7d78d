//! Persistent append-only entry sequence.
//!
//! Appending creates one new node pointing at the previous head, so every
//! older version of a memory sink keeps seeing exactly the entries it had.

use std::sync::Arc;

use crate::entry::Entry;

#[derive(Debug)]
struct Node {
    entry: Entry,
    prev: Option<Arc<Node>>,
}

/// Entries in append order, shared between sink versions.
#[derive(Debug, Clone, Default)]
pub(crate) struct History {
    head: Option<Arc<Node>>,
    len: usize,
}

impl History {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn pushed(&self, entry: Entry) -> Self {
        History {
            head: Some(Arc::new(Node {
                entry,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Newest first.
    fn iter_rev(&self) -> impl Iterator<Item = &Entry> {
        std::iter::successors(self.head.as_deref(), |node| node.prev.as_deref())
            .map(|node| &node.entry)
    }

    /// All entries, oldest first.
    pub(crate) fn to_vec(&self) -> Vec<&Entry> {
        self.last(self.len)
    }

    /// The `n` most recent entries, oldest first.
    pub(crate) fn last(&self, n: usize) -> Vec<&Entry> {
        let mut out: Vec<&Entry> = self.iter_rev().take(n).collect();
        out.reverse();
        out
    }
}

impl FromIterator<Entry> for History {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        iter.into_iter()
            .fold(History::new(), |history, entry| history.pushed(entry))
    }
}

impl Drop for History {
    // Unlink uniquely owned nodes one at a time so long histories don't
    // recurse through `Arc` drops.
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.prev.take(),
                Err(_) => break,
            }
        }
    }
}
