//! Immutable, arena-backed snapshots of the UI tree.
//!
//! A [`UiSnapshot`] is built once per tree query from a [`ScreenDump`]. All
//! nodes are flattened into a single vector in depth-first order, walking
//! windows from the topmost down, so iteration order equals the visual
//! stacking order. [`ElementHandle`]s are plain indices into that vector,
//! tagged with the id of the snapshot that produced them.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

use crate::element::{ElementFrame, ScreenDump, ScreenSize, UIElement};

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to one node of a [`UiSnapshot`].
///
/// A handle only resolves against the snapshot it came from; the tree is
/// rebuilt on every query, so handles must not be kept across queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    snapshot_id: u64,
    index: usize,
}

/// A flattened node of the tree.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub identifier: Option<String>,
    pub text: Option<String>,
    pub description: Option<String>,
    pub element_type: Option<String>,
    pub frame: Option<ElementFrame>,
    /// Component of the window this node belongs to.
    pub component: Option<String>,
    /// Index of the owning window in stacking order (0 = topmost).
    pub window: usize,
}

/// Point-in-time view of every inspectable element on screen.
#[derive(Debug, Clone)]
pub struct UiSnapshot {
    id: u64,
    taken_at: Instant,
    screen: ScreenSize,
    nodes: Vec<ElementNode>,
}

impl UiSnapshot {
    /// Flattens a dump into a new snapshot.
    pub fn from_dump(dump: ScreenDump) -> Self {
        let mut nodes = Vec::new();
        for (window_index, window) in dump.windows.into_iter().enumerate() {
            flatten(window.root, &window.component, window_index, &mut nodes);
        }
        Self {
            id: NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed),
            taken_at: Instant::now(),
            screen: dump.screen,
            nodes,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn taken_at(&self) -> Instant {
        self.taken_at
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves a handle, or `None` if it belongs to another snapshot.
    pub fn get(&self, handle: ElementHandle) -> Option<&ElementNode> {
        if handle.snapshot_id != self.id {
            return None;
        }
        self.nodes.get(handle.index)
    }

    /// All nodes with their handles, in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = (ElementHandle, &ElementNode)> + '_ {
        let snapshot_id = self.id;
        self.nodes
            .iter()
            .enumerate()
            .map(move |(index, node)| (ElementHandle { snapshot_id, index }, node))
    }
}

fn flatten(
    element: UIElement,
    component: &Option<String>,
    window: usize,
    nodes: &mut Vec<ElementNode>,
) {
    nodes.push(ElementNode {
        identifier: element.identifier,
        text: element.text,
        description: element.description,
        element_type: element.element_type,
        frame: element.frame,
        component: component.clone(),
        window,
    });
    for child in element.children {
        flatten(child, component, window, nodes);
    }
}
