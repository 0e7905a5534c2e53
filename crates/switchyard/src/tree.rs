//! Radix tree of normalized pattern paths.
//!
//! Nodes live in an arena and refer to each other by index. Every node keeps
//! the index of its parent, which the matcher uses to walk back up when a
//! branch dead-ends. Variable elements are stored as their own nodes keyed by
//! the markers `{}` and `{...}`, so a node has at most one variable child and
//! at most one wildcard child next to its static children.

use std::collections::HashMap;

use crate::pattern::{VAR_MARKER, WILDCARD_MARKER};
use crate::pool::{PooledValues, Span, ValuePool};

type NodeId = usize;

const ROOT: NodeId = 0;

/// What a node matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// Its literal prefix.
    Static,
    /// One path segment, possibly empty.
    Variable,
    /// The rest of the path.
    Wildcard,
}

/// A registered handler together with what the matcher reports for it.
#[derive(Debug, Clone)]
pub(crate) struct Entry<H> {
    /// Method, empty for any method.
    pub(crate) method: String,
    /// Pattern as it was registered.
    pub(crate) pattern: String,
    pub(crate) handler: H,
    /// Names for the captured values, in path order.
    pub(crate) var_names: Vec<String>,
    /// Synthesized redirect from a bare path to its slash form.
    pub(crate) trailing_slash: bool,
}

#[derive(Debug)]
struct Node<H> {
    prefix: Vec<u8>,
    label: u8,
    kind: NodeKind,
    parent: Option<NodeId>,
    /// Sorted by label.
    statics: Vec<(u8, NodeId)>,
    variable: Option<NodeId>,
    wildcard: Option<NodeId>,
    methods: HashMap<String, Entry<H>>,
    catch_all: Option<Entry<H>>,
}

impl<H> Node<H> {
    fn new(kind: NodeKind, prefix: &[u8], parent: Option<NodeId>) -> Self {
        Self {
            prefix: prefix.to_vec(),
            label: prefix.first().copied().unwrap_or_default(),
            kind,
            parent,
            statics: Vec::new(),
            variable: None,
            wildcard: None,
            methods: HashMap::new(),
            catch_all: None,
        }
    }

    fn static_child(&self, label: u8) -> Option<NodeId> {
        self.statics
            .binary_search_by_key(&label, |&(l, _)| l)
            .ok()
            .map(|i| self.statics[i].1)
    }

    fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.statics
            .iter()
            .map(|&(_, id)| id)
            .chain(self.variable)
            .chain(self.wildcard)
    }

    fn has_handler(&self) -> bool {
        !self.methods.is_empty() || self.catch_all.is_some()
    }

    /// Exact method first, then the catch-all.
    fn entry_for(&self, method: &str) -> Option<&Entry<H>> {
        self.methods.get(method).or(self.catch_all.as_ref())
    }

    fn allowed_methods(&self) -> Vec<String> {
        let mut allowed: Vec<String> = self.methods.keys().cloned().collect();
        allowed.sort();
        allowed
    }

    fn set_entry(&mut self, entry: Entry<H>) {
        let trailing_slash = entry.trailing_slash;

        if entry.method.is_empty() || trailing_slash {
            // A synthesized redirect never displaces a real handler.
            if !(trailing_slash && self.has_handler()) {
                self.catch_all = Some(entry);
            }
        } else {
            self.methods.insert(entry.method.clone(), entry);
        }

        if !trailing_slash
            && !self.methods.is_empty()
            && self.catch_all.as_ref().is_some_and(|e| e.trailing_slash)
        {
            self.catch_all = None;
        }
    }
}

/// Outcome of a lookup.
#[derive(Debug)]
pub(crate) enum Match<'t, 'p, H> {
    /// A handler accepts the path and method.
    Found {
        entry: &'t Entry<H>,
        captures: Captures<'p>,
    },
    /// The path matched but no handler accepts the method.
    MethodNotAllowed { allowed: Vec<String> },
    NotFound,
}

/// Values captured by a successful lookup, as byte ranges of the path.
#[derive(Debug)]
pub(crate) struct Captures<'p> {
    values: Option<PooledValues<'p>>,
    len: usize,
}

impl Captures<'_> {
    pub(crate) fn spans(&self) -> &[Span] {
        match &self.values {
            Some(values) => &values[..self.len],
            None => &[],
        }
    }
}

/// Where the matcher resumes at the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Consume the node itself and check for a handler.
    Enter,
    Static,
    Variable,
    Wildcard,
    /// Undo the node and resume at its parent.
    Backtrack,
}

/// The routing tree for one host.
pub(crate) struct Tree<H> {
    nodes: Vec<Node<H>>,
    max_vars: usize,
}

impl<H> Default for Tree<H> {
    fn default() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Static, b"", None)],
            max_vars: 0,
        }
    }
}

impl<H> Tree<H> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Largest number of variables of any entry.
    pub(crate) fn max_vars(&self) -> usize {
        self.max_vars
    }

    /// Add an entry for a normalized path.
    ///
    /// Every literal run and variable marker in front of the final element
    /// gets its own node first, so each marker is inserted as a node of its
    /// own kind.
    pub(crate) fn add(&mut self, path: &str, entry: Entry<H>) {
        self.max_vars = self.max_vars.max(entry.var_names.len());

        let mut from = 0;
        while let Some(open) = path[from..].find('{').map(|i| from + i) {
            self.insert(NodeKind::Static, &path.as_bytes()[..open], None);
            let Some(close) = path[open..].find('}').map(|i| open + i) else {
                break;
            };
            let kind = if &path[open..=close] == VAR_MARKER {
                NodeKind::Variable
            } else {
                NodeKind::Wildcard
            };
            if close + 1 < path.len() {
                self.insert(kind, &path.as_bytes()[..=close], None);
            }
            from = close + 1;
        }

        let kind = if path.ends_with(WILDCARD_MARKER) {
            NodeKind::Wildcard
        } else if path.ends_with(VAR_MARKER) {
            NodeKind::Variable
        } else {
            NodeKind::Static
        };
        self.insert(kind, path.as_bytes(), Some(entry));
    }

    fn insert(&mut self, kind: NodeKind, path: &[u8], entry: Option<Entry<H>>) {
        let mut current = ROOT;
        let mut search = path;

        loop {
            let prefix = &self.nodes[current].prefix;
            let lcp = search
                .iter()
                .zip(prefix.iter())
                .take_while(|(a, b)| a == b)
                .count();

            if lcp < prefix.len() {
                self.split(current, lcp);
                if lcp == search.len() {
                    self.attach(current, entry);
                } else {
                    self.add_child(current, kind, &search[lcp..], entry);
                }
                return;
            }

            if lcp == search.len() {
                self.attach(current, entry);
                return;
            }

            search = &search[lcp..];
            let node = &self.nodes[current];
            let next = if search[0] != b'{' {
                node.static_child(search[0])
            } else if search.starts_with(VAR_MARKER.as_bytes()) {
                node.variable
            } else {
                node.wildcard
            };

            match next {
                Some(child) => current = child,
                None => {
                    self.add_child(current, kind, search, entry);
                    return;
                }
            }
        }
    }

    /// Move everything from byte `at` of the node's prefix on into a new
    /// static child.
    fn split(&mut self, id: NodeId, at: usize) {
        let tail_id = self.nodes.len();
        let node = &mut self.nodes[id];

        let mut tail = Node::new(NodeKind::Static, &node.prefix[at..], Some(id));
        node.prefix.truncate(at);
        tail.kind = node.kind;
        tail.statics = std::mem::take(&mut node.statics);
        tail.variable = node.variable.take();
        tail.wildcard = node.wildcard.take();
        tail.methods = std::mem::take(&mut node.methods);
        tail.catch_all = node.catch_all.take();

        node.kind = NodeKind::Static;
        node.statics = vec![(tail.label, tail_id)];

        let moved: Vec<NodeId> = tail.children().collect();
        self.nodes.push(tail);
        for child in moved {
            self.nodes[child].parent = Some(tail_id);
        }
    }

    fn add_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        prefix: &[u8],
        entry: Option<Entry<H>>,
    ) {
        let id = self.nodes.len();
        let child = Node::new(kind, prefix, Some(parent));
        let label = child.label;
        self.nodes.push(child);

        let node = &mut self.nodes[parent];
        match kind {
            NodeKind::Static => {
                let at = node.statics.partition_point(|&(l, _)| l < label);
                node.statics.insert(at, (label, id));
            }
            NodeKind::Variable => node.variable = Some(id),
            NodeKind::Wildcard => node.wildcard = Some(id),
        }
        self.attach(id, entry);
    }

    fn attach(&mut self, id: NodeId, entry: Option<Entry<H>>) {
        if let Some(entry) = entry {
            self.nodes[id].set_entry(entry);
        }
    }

    /// Find the entry for `method` at `path`.
    ///
    /// Static children are tried before the variable child, which is tried
    /// before the wildcard child. When a branch dead-ends the matcher undoes
    /// the node and resumes at its parent with the next alternative, so the
    /// whole tree is searched in that order without recursion.
    pub(crate) fn search<'t, 'p>(
        &'t self,
        path: &str,
        method: &str,
        pool: &'p ValuePool,
    ) -> Match<'t, 'p, H> {
        let bytes = path.as_bytes();
        let mut values: Option<PooledValues<'p>> = None;
        let mut captured = 0;
        let mut cursor = 0;
        let mut fallback: Option<NodeId> = None;
        let mut id = ROOT;
        let mut step = Step::Enter;

        loop {
            let node = &self.nodes[id];
            match step {
                Step::Enter => {
                    if node.kind == NodeKind::Static {
                        if !bytes[cursor..].starts_with(&node.prefix) {
                            // Nothing consumed, so the parent moves on directly.
                            let Some(parent) = node.parent else { break };
                            id = parent;
                            step = Step::Variable;
                            continue;
                        }
                        cursor += node.prefix.len();
                    }

                    if cursor == bytes.len() && node.has_handler() {
                        fallback.get_or_insert(id);
                        if let Some(entry) = node.entry_for(method) {
                            return Match::Found {
                                entry,
                                captures: Captures {
                                    values,
                                    len: captured,
                                },
                            };
                        }
                    }
                    step = Step::Static;
                }
                Step::Static => {
                    step = Step::Variable;
                    if let Some(child) = bytes.get(cursor).and_then(|&b| node.static_child(b)) {
                        id = child;
                        step = Step::Enter;
                    }
                }
                Step::Variable => {
                    step = Step::Wildcard;
                    if let Some(child) = node.variable {
                        let end = bytes[cursor..]
                            .iter()
                            .position(|&b| b == b'/')
                            .map_or(bytes.len(), |i| cursor + i);
                        let buf = values.get_or_insert_with(|| pool.acquire());
                        buf[captured] = cursor..end;
                        captured += 1;
                        cursor = end;
                        id = child;
                        step = Step::Enter;
                    }
                }
                Step::Wildcard => {
                    step = Step::Backtrack;
                    if let Some(child) = node.wildcard {
                        let buf = values.get_or_insert_with(|| pool.acquire());
                        buf[captured] = cursor..bytes.len();
                        captured += 1;
                        cursor = bytes.len();
                        id = child;
                        step = Step::Enter;
                    }
                }
                Step::Backtrack => {
                    let Some(parent) = node.parent else { break };
                    step = match node.kind {
                        NodeKind::Static => {
                            cursor -= node.prefix.len();
                            Step::Variable
                        }
                        NodeKind::Variable | NodeKind::Wildcard => {
                            captured -= 1;
                            cursor = values.as_deref().map_or(0, |v| v[captured].start);
                            if node.kind == NodeKind::Variable {
                                Step::Wildcard
                            } else {
                                Step::Backtrack
                            }
                        }
                    };
                    id = parent;
                }
            }
        }

        match fallback {
            Some(id) => Match::MethodNotAllowed {
                allowed: self.nodes[id].allowed_methods(),
            },
            None => Match::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    fn entry(pattern: &str, trailing_slash: bool) -> (String, Entry<&'static str>) {
        let parsed = Pattern::parse(pattern).expect("valid pattern");
        let handler: &'static str = Box::leak(pattern.to_string().into_boxed_str());
        let entry = Entry {
            method: parsed.method,
            pattern: pattern.to_string(),
            handler,
            var_names: parsed.var_names,
            trailing_slash,
        };
        (parsed.path, entry)
    }

    fn tree(patterns: &[&str]) -> Tree<&'static str> {
        let mut tree = Tree::new();
        for pattern in patterns {
            let (path, entry) = entry(pattern, false);
            tree.add(&path, entry);
        }
        tree
    }

    /// The matched pattern and its captured values, or `None`.
    fn lookup(
        tree: &Tree<&'static str>,
        method: &str,
        path: &str,
    ) -> Option<(&'static str, Vec<String>)> {
        let pool = ValuePool::new(tree.max_vars(), 4);
        let found = match tree.search(path, method, &pool) {
            Match::Found { entry, captures } => {
                let values = captures
                    .spans()
                    .iter()
                    .map(|span| path[span.clone()].to_string())
                    .collect();
                Some((entry.handler, values))
            }
            _ => None,
        };
        found
    }

    // === Precedence tests ===

    #[test]
    fn static_beats_variable_beats_wildcard() {
        let orders: [&[&str]; 3] = [
            &["/a/{rest...}", "/a/{x}", "/a/b"],
            &["/a/b", "/a/{x}", "/a/{rest...}"],
            &["/a/{x}", "/a/{rest...}", "/a/b"],
        ];

        for patterns in orders {
            let tree = tree(patterns);
            assert_eq!(lookup(&tree, "GET", "/a/b"), Some(("/a/b", vec![])));
            assert_eq!(
                lookup(&tree, "GET", "/a/c"),
                Some(("/a/{x}", vec!["c".to_string()]))
            );
            assert_eq!(
                lookup(&tree, "GET", "/a/c/d"),
                Some(("/a/{rest...}", vec!["c/d".to_string()]))
            );
        }
    }

    #[test]
    fn literal_suffix_beats_variable_suffix() {
        let tree = tree(&["/a/{x}/{y}", "/a/{x}/edit"]);
        assert_eq!(
            lookup(&tree, "GET", "/a/1/edit"),
            Some(("/a/{x}/edit", vec!["1".to_string()]))
        );
        assert_eq!(
            lookup(&tree, "GET", "/a/1/view"),
            Some(("/a/{x}/{y}", vec!["1".to_string(), "view".to_string()]))
        );
    }

    // === Backtracking tests ===

    #[test]
    fn backtracks_from_static_to_variable() {
        let tree = tree(&["/a/b/d", "/a/{x}/c"]);
        assert_eq!(
            lookup(&tree, "GET", "/a/b/c"),
            Some(("/a/{x}/c", vec!["b".to_string()]))
        );
    }

    #[test]
    fn backtracks_to_wildcard_higher_up() {
        let tree = tree(&["/{path...}", "/a/{x}/b"]);
        assert_eq!(
            lookup(&tree, "GET", "/a/z/c"),
            Some(("/{path...}", vec!["a/z/c".to_string()]))
        );
        assert_eq!(
            lookup(&tree, "GET", "/a/z/b"),
            Some(("/a/{x}/b", vec!["z".to_string()]))
        );
    }

    #[test]
    fn backtracks_past_method_mismatch() {
        let tree = tree(&["POST /a/b", "GET /a/{x}"]);
        assert_eq!(
            lookup(&tree, "GET", "/a/b"),
            Some(("GET /a/{x}", vec!["b".to_string()]))
        );
    }

    #[test]
    fn captured_values_are_restored_on_backtrack() {
        let tree = tree(&["/{a}/{b}/x", "/{a}/{rest...}"]);
        assert_eq!(
            lookup(&tree, "GET", "/1/2/y"),
            Some(("/{a}/{rest...}", vec!["1".to_string(), "2/y".to_string()]))
        );
    }

    // === Method tests ===

    #[test]
    fn method_not_allowed_lists_methods() {
        let tree = tree(&["POST /r", "PUT /r"]);
        let pool = ValuePool::new(0, 4);
        match tree.search("/r", "GET", &pool) {
            Match::MethodNotAllowed { allowed } => assert_eq!(allowed, vec!["POST", "PUT"]),
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        };
        assert!(matches!(
            tree.search("/unregistered", "DELETE", &pool),
            Match::NotFound
        ));
    }

    #[test]
    fn method_not_allowed_reports_first_full_match() {
        let tree = tree(&["POST /a/b", "GET /a/{x}"]);
        let pool = ValuePool::new(tree.max_vars(), 4);
        match tree.search("/a/b", "DELETE", &pool) {
            Match::MethodNotAllowed { allowed } => assert_eq!(allowed, vec!["POST"]),
            other => panic!("expected MethodNotAllowed, got {other:?}"),
        };
    }

    #[test]
    fn exact_method_beats_catch_all() {
        let tree = tree(&["/r", "GET /r"]);
        assert_eq!(lookup(&tree, "GET", "/r"), Some(("GET /r", vec![])));
        assert_eq!(lookup(&tree, "DELETE", "/r"), Some(("/r", vec![])));
    }

    // === Structure tests ===

    #[test]
    fn split_keeps_existing_entries() {
        let tree = tree(&["/abc", "/abd", "/ab", "/a"]);
        for path in ["/abc", "/abd", "/ab", "/a"] {
            assert_eq!(lookup(&tree, "GET", path), Some((path, vec![])));
        }
        assert_eq!(lookup(&tree, "GET", "/abe"), None);
        assert_eq!(lookup(&tree, "GET", "/"), None);
    }

    #[test]
    fn split_inside_multibyte_character() {
        let mut tree = Tree::new();
        for path in ["/é", "/è"] {
            let (_, entry) = entry(path, false);
            tree.add(path, entry);
        }
        assert_eq!(lookup(&tree, "GET", "/é"), Some(("/é", vec![])));
        assert_eq!(lookup(&tree, "GET", "/è"), Some(("/è", vec![])));
    }

    #[test]
    fn variable_may_be_empty() {
        let tree = tree(&["/a/{x}"]);
        assert_eq!(lookup(&tree, "GET", "/a/"), Some(("/a/{x}", vec![String::new()])));
    }

    #[test]
    fn variable_stops_at_slash() {
        let tree = tree(&["GET /a/{x}/b"]);
        assert_eq!(
            lookup(&tree, "GET", "/a/42/b"),
            Some(("GET /a/{x}/b", vec!["42".to_string()]))
        );
        assert_eq!(lookup(&tree, "GET", "/a/42/b/"), None);
    }

    #[test]
    fn root_wildcard_matches_everything() {
        let tree = tree(&["/"]);
        assert_eq!(lookup(&tree, "GET", "/"), Some(("/", vec![String::new()])));
        assert_eq!(
            lookup(&tree, "GET", "/x/y"),
            Some(("/", vec!["x/y".to_string()]))
        );
    }

    #[test]
    fn max_vars_tracks_largest_entry() {
        let tree = tree(&["/{a}", "/x/{a}/{b}/{c...}", "/y"]);
        assert_eq!(tree.max_vars(), 3);
    }

    // === Trailing slash entry tests ===

    #[test]
    fn trailing_slash_entry_does_not_displace_handler() {
        let mut tree = tree(&["GET /dir"]);
        let (_, redirect) = entry("/dir", true);
        tree.add("/dir", redirect);
        assert_eq!(lookup(&tree, "GET", "/dir"), Some(("GET /dir", vec![])));
    }

    #[test]
    fn trailing_slash_entry_superseded_by_later_handler() {
        let mut tree = Tree::new();
        let (_, redirect) = entry("/dir", true);
        tree.add("/dir", redirect);
        assert!(lookup(&tree, "PUT", "/dir").is_some());

        let (path, explicit) = entry("GET /dir", false);
        tree.add(&path, explicit);
        assert_eq!(lookup(&tree, "GET", "/dir"), Some(("GET /dir", vec![])));
        assert_eq!(lookup(&tree, "PUT", "/dir"), None);
    }

    #[test]
    fn trailing_slash_entry_replaced_by_catch_all() {
        let mut tree = Tree::new();
        let (_, redirect) = entry("/dir", true);
        tree.add("/dir", redirect);
        let (path, explicit) = entry("/dir", false);
        tree.add(&path, explicit);

        let pool = ValuePool::new(0, 1);
        match tree.search("/dir", "GET", &pool) {
            Match::Found { entry, .. } => assert!(!entry.trailing_slash),
            other => panic!("expected Found, got {other:?}"),
        };
    }
}
