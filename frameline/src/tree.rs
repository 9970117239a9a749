use std::fmt;

/// Logical track a record or reconstructed node belongs to. Multiple thread
/// ids may map onto the same track; each duration track holds one active
/// nesting stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Ui,
    Raster,
    Async,
    Unknown,
}

/// Half-open-aware time range in microseconds. Bounds are filled in as
/// reconstruction discovers them; `end` stays `None` while a span is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl TimeRange {
    pub fn span(start: u64, end: u64) -> Self {
        TimeRange {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn point(ts: u64) -> Self {
        Self::span(ts, ts)
    }

    /// `end >= start` whenever both bounds are known.
    pub fn is_well_formed(&self) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        }
    }

    /// Full containment of a bounded `other`. Unbounded ranges contain
    /// nothing and fit in nothing.
    pub fn contains(&self, other: &TimeRange) -> bool {
        match (self.start, self.end, other.start, other.end) {
            (Some(s), Some(e), Some(os), Some(oe)) => s <= os && oe <= e,
            _ => false,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_bound = |b: Option<u64>| match b {
            Some(v) => v.to_string(),
            None => "?".to_string(),
        };
        write!(f, "[{}, {}]", fmt_bound(self.start), fmt_bound(self.end))
    }
}

/// Index of a node inside its [`EventArena`]. Valid until the arena is
/// cleared; clearing the result store invalidates every outstanding id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// One reconstructed duration span. Children are owned by the parent's child
/// list (as arena ids, in discovery order); the parent pointer is a
/// non-owning back-link for traversal only.
#[derive(Debug, Clone)]
pub struct EventNode {
    pub name: String,
    pub category: String,
    pub track: TrackType,
    pub time: TimeRange,
    /// Correlation key, set only on async nodes.
    pub async_id: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl EventNode {
    pub fn new(name: String, category: String, track: TrackType) -> Self {
        EventNode {
            name,
            category,
            track,
            time: TimeRange::default(),
            async_id: None,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_open(&self) -> bool {
        self.time.end.is_none()
    }
}

/// Flat arena owning every reconstructed node. Tree edges are id lists, so
/// parent/child references never form ownership cycles.
#[derive(Debug, Default)]
pub struct EventArena {
    nodes: Vec<EventNode>,
}

impl EventArena {
    pub fn new() -> Self {
        EventArena { nodes: Vec::new() }
    }

    pub fn alloc(&mut self, node: EventNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &EventNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut EventNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Appends `child` to `parent`'s child list and sets the back-link.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0 as usize].children.push(child);
        self.nodes[child.0 as usize].parent = Some(parent);
    }

    /// Removes `child` from `parent`'s child list and clears the back-link.
    /// Used when a phantom span from a duplicated end record is dropped.
    pub fn detach_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0 as usize]
            .children
            .retain(|&c| c != child);
        self.nodes[child.0 as usize].parent = None;
    }

    /// Pre-order traversal of the subtree rooted at `root`.
    pub fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.node(id).children().iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
