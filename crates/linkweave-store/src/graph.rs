//! Relationship graph: a bipartite document <-> entity graph on petgraph.
//!
//! Documents and entities live in separate id namespaces, so a document id
//! that happens to equal an entity string never aliases it. Edges only ever
//! join a document to an entity; entity nodes are pruned as soon as their
//! last edge disappears.
//!
//! The whole graph sits behind one `RwLock`. Composite mutations
//! ([`GraphStore::replace_document`], [`GraphStore::delete_document_node`])
//! run and persist under a single write guard, so a snapshot never captures
//! a half-applied change.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use petgraph::stable_graph::{NodeIndex, StableUnGraph};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use linkweave_core::{Durability, Error, Result};

const SNAPSHOT_VERSION: u32 = 1;

/// Node type attribute. Immutable once a node exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Entity,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Entity => write!(f, "entity"),
        }
    }
}

/// Typed node identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "node_type", content = "node_id", rename_all = "lowercase")]
pub enum NodeId {
    Document(String),
    Entity(String),
}

impl NodeId {
    pub fn document(id: impl Into<String>) -> Self {
        Self::Document(id.into())
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity(name.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Document(_) => NodeKind::Document,
            Self::Entity(_) => NodeKind::Entity,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Document(id) | Self::Entity(id) => id,
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

/// Normalize an entity string: lowercase, collapse whitespace, strip
/// surrounding punctuation. Returns `None` when nothing alphabetic is left.
pub fn normalize_entity(raw: &str) -> Option<String> {
    let lowered = raw.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string();
    if trimmed.chars().any(char::is_alphabetic) {
        Some(trimmed)
    } else {
        None
    }
}

fn validate_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.trim().is_empty() {
        return Err(Error::InvalidArgument("document id must not be empty".into()));
    }
    Ok(())
}

fn entity_key(entity: &str) -> Result<String> {
    normalize_entity(entity)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid entity: {:?}", entity)))
}

/// Nodes reachable from a start node, partitioned by type. Both lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub documents: Vec<String>,
    pub entities: Vec<String>,
}

impl Neighborhood {
    pub fn len(&self) -> usize {
        self.documents.len() + self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Node and edge counts by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub document_nodes: usize,
    pub entity_nodes: usize,
}

/// Outcome of replacing a document's entity associations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub doc_id: String,
    /// True when the document node did not exist before.
    pub created: bool,
    /// Entity set now attached to the document, in extraction order.
    pub entities: Vec<String>,
    pub added_edges: usize,
    pub removed_edges: usize,
    /// Entities pruned because this update left them without edges.
    pub removed_entities: Vec<String>,
    pub durability: Durability,
}

/// Outcome of deleting a document node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDeletion {
    pub doc_id: String,
    pub removed_edges: usize,
    pub removed_entities: Vec<String>,
    pub durability: Durability,
}

/// On-disk full-state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphSnapshot {
    version: u32,
    documents: Vec<String>,
    entities: Vec<String>,
    edges: Vec<SnapshotEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEdge {
    document: String,
    entity: String,
}

#[derive(Default)]
struct GraphInner {
    graph: StableUnGraph<NodeId, ()>,
    documents: HashMap<String, NodeIndex>,
    entities: HashMap<String, NodeIndex>,
}

impl GraphInner {
    fn index_of(&self, node: &NodeId) -> Option<NodeIndex> {
        match node {
            NodeId::Document(id) => self.documents.get(id).copied(),
            NodeId::Entity(name) => self.entities.get(name).copied(),
        }
    }

    /// Insert the node if absent. Returns its index and whether it was created.
    fn ensure_node(&mut self, node: NodeId) -> (NodeIndex, bool) {
        if let Some(ix) = self.index_of(&node) {
            return (ix, false);
        }
        let key = node.key().to_string();
        let kind = node.kind();
        let ix = self.graph.add_node(node);
        match kind {
            NodeKind::Document => self.documents.insert(key, ix),
            NodeKind::Entity => self.entities.insert(key, ix),
        };
        (ix, true)
    }

    fn connect(&mut self, doc_ix: NodeIndex, entity_ix: NodeIndex) -> bool {
        if self.graph.find_edge(doc_ix, entity_ix).is_some() {
            return false;
        }
        self.graph.add_edge(doc_ix, entity_ix, ());
        true
    }

    fn degree(&self, ix: NodeIndex) -> usize {
        self.graph.neighbors(ix).count()
    }

    fn neighbors_of_kind(&self, ix: NodeIndex, kind: NodeKind) -> Vec<String> {
        let mut out: Vec<String> = self
            .graph
            .neighbors(ix)
            .filter_map(|n| {
                let node = &self.graph[n];
                (node.kind() == kind).then(|| node.key().to_string())
            })
            .collect();
        out.sort();
        out
    }

    /// Remove entity nodes from `candidates` that have no edges left.
    fn prune_orphans(&mut self, candidates: impl IntoIterator<Item = NodeIndex>) -> Vec<String> {
        let mut removed = Vec::new();
        for ix in candidates {
            if !self.graph.contains_node(ix) || self.degree(ix) > 0 {
                continue;
            }
            if let Some(NodeId::Entity(name)) = self.graph.remove_node(ix) {
                self.entities.remove(&name);
                removed.push(name);
            }
        }
        removed.sort();
        removed
    }

    fn bfs(&self, start: NodeIndex, depth: usize) -> Neighborhood {
        let mut out = Neighborhood::default();
        if depth == 0 {
            return out;
        }

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((ix, hops)) = queue.pop_front() {
            if hops == depth {
                continue;
            }
            for next in self.graph.neighbors(ix) {
                if !visited.insert(next) {
                    continue;
                }
                match &self.graph[next] {
                    NodeId::Document(id) => out.documents.push(id.clone()),
                    NodeId::Entity(name) => out.entities.push(name.clone()),
                }
                queue.push_back((next, hops + 1));
            }
        }

        out.documents.sort();
        out.entities.sort();
        out
    }

    fn stats(&self) -> GraphStats {
        GraphStats {
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            document_nodes: self.documents.len(),
            entity_nodes: self.entities.len(),
        }
    }

    fn snapshot(&self) -> GraphSnapshot {
        let mut documents: Vec<String> = self.documents.keys().cloned().collect();
        let mut entities: Vec<String> = self.entities.keys().cloned().collect();
        documents.sort();
        entities.sort();

        let mut edges: Vec<SnapshotEdge> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .filter_map(|(a, b)| match (&self.graph[a], &self.graph[b]) {
                (NodeId::Document(d), NodeId::Entity(e)) | (NodeId::Entity(e), NodeId::Document(d)) => {
                    Some(SnapshotEdge {
                        document: d.clone(),
                        entity: e.clone(),
                    })
                }
                _ => None,
            })
            .collect();
        edges.sort_by(|a, b| (&a.document, &a.entity).cmp(&(&b.document, &b.entity)));

        GraphSnapshot {
            version: SNAPSHOT_VERSION,
            documents,
            entities,
            edges,
        }
    }

    fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Persistence(format!(
                "unsupported graph snapshot version {}",
                snapshot.version
            )));
        }

        let mut inner = Self::default();
        for doc in snapshot.documents {
            if validate_doc_id(&doc).is_ok() {
                inner.ensure_node(NodeId::Document(doc));
            }
        }
        for entity in snapshot.entities {
            if let Some(name) = normalize_entity(&entity) {
                inner.ensure_node(NodeId::Entity(name));
            }
        }

        let mut dropped = 0usize;
        for edge in snapshot.edges {
            let doc_ix = inner.documents.get(&edge.document).copied();
            let entity_ix = normalize_entity(&edge.entity).and_then(|e| inner.entities.get(&e).copied());
            match (doc_ix, entity_ix) {
                (Some(d), Some(e)) => {
                    inner.connect(d, e);
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!("Dropped {} graph snapshot edges referencing unknown nodes", dropped);
        }

        let all_entities: Vec<NodeIndex> = inner.entities.values().copied().collect();
        let orphans = inner.prune_orphans(all_entities);
        if !orphans.is_empty() {
            warn!("Pruned {} orphan entities from graph snapshot", orphans.len());
        }
        Ok(inner)
    }
}

/// Consistent read-only view of the graph, held for the duration of a
/// multi-step query.
pub struct GraphReader<'a> {
    guard: RwLockReadGuard<'a, GraphInner>,
}

impl GraphReader<'_> {
    pub fn contains_document(&self, doc_id: &str) -> bool {
        self.guard.documents.contains_key(doc_id)
    }

    /// Entities attached to a document, sorted. Empty if the document is unknown.
    pub fn document_entities(&self, doc_id: &str) -> Vec<String> {
        self.guard
            .documents
            .get(doc_id)
            .map(|&ix| self.guard.neighbors_of_kind(ix, NodeKind::Entity))
            .unwrap_or_default()
    }

    /// Documents attached to an entity, sorted. Empty if the entity is unknown.
    pub fn entity_documents(&self, entity: &str) -> Vec<String> {
        self.guard
            .entities
            .get(entity)
            .map(|&ix| self.guard.neighbors_of_kind(ix, NodeKind::Document))
            .unwrap_or_default()
    }
}

/// Shared, persistent relationship graph.
pub struct GraphStore {
    path: PathBuf,
    inner: RwLock<GraphInner>,
}

impl GraphStore {
    /// Empty graph that will persist to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: RwLock::new(GraphInner::default()),
        }
    }

    /// Load the snapshot at `path`. A missing file yields an empty graph.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = match fs::read(&path) {
            Ok(bytes) => {
                let snapshot: GraphSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Persistence(format!("corrupt graph snapshot {}: {}", path.display(), e))
                })?;
                GraphInner::from_snapshot(snapshot)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No graph snapshot at {}, starting empty", path.display());
                GraphInner::default()
            }
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "cannot read graph snapshot {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let stats = inner.stats();
        info!(
            "Graph loaded: {} documents, {} entities, {} edges, path={}",
            stats.document_nodes,
            stats.entity_nodes,
            stats.total_edges,
            path.display()
        );
        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    /// Like [`GraphStore::load`], but never fails: an unreadable snapshot is
    /// moved aside to `<path>.corrupt` and the store starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                let aside = suffixed(path, ".corrupt");
                warn!(
                    "{}. Moving it to {} and starting with an empty graph",
                    e,
                    aside.display()
                );
                if let Err(rename_err) = fs::rename(path, &aside) {
                    warn!("Could not move corrupt snapshot aside: {}", rename_err);
                }
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ---------------------------------------------------------------
    // Primitive mutations (not persisted on their own)
    // ---------------------------------------------------------------

    /// Add a document node. Returns `true` if it was created.
    pub fn add_document_node(&self, doc_id: &str) -> Result<bool> {
        validate_doc_id(doc_id)?;
        let (_, created) = self.inner.write().ensure_node(NodeId::document(doc_id));
        Ok(created)
    }

    /// Add an entity node. The name is normalized with [`normalize_entity`].
    pub fn add_entity_node(&self, entity: &str) -> Result<bool> {
        let name = entity_key(entity)?;
        let (_, created) = self.inner.write().ensure_node(NodeId::Entity(name));
        Ok(created)
    }

    /// Connect an existing document to an existing entity.
    ///
    /// Both nodes must already exist (`NotFound` otherwise). Returns `false`
    /// when the edge was already present.
    pub fn add_edge(&self, doc_id: &str, entity: &str) -> Result<bool> {
        validate_doc_id(doc_id)?;
        let name = entity_key(entity)?;
        let mut inner = self.inner.write();
        let doc_ix = inner
            .documents
            .get(doc_id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("document node {}", doc_id)))?;
        let entity_ix = inner
            .entities
            .get(&name)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("entity node {}", name)))?;
        Ok(inner.connect(doc_ix, entity_ix))
    }

    // ---------------------------------------------------------------
    // Composite mutations (persisted under the same write guard)
    // ---------------------------------------------------------------

    /// Set a document's entity associations to exactly `entities`.
    ///
    /// Creates the document node if needed, drops edges to entities no longer
    /// listed, prunes entities this leaves orphaned, and saves the snapshot.
    /// Entities that do not normalize to anything are skipped.
    pub fn replace_document(&self, doc_id: &str, entities: &[String]) -> Result<GraphUpdate> {
        validate_doc_id(doc_id)?;

        let mut wanted: Vec<String> = Vec::with_capacity(entities.len());
        for entity in entities {
            if let Some(name) = normalize_entity(entity) {
                if !wanted.contains(&name) {
                    wanted.push(name);
                }
            }
        }

        let mut inner = self.inner.write();
        let (doc_ix, created) = inner.ensure_node(NodeId::document(doc_id));

        let wanted_set: HashSet<&str> = wanted.iter().map(String::as_str).collect();
        let stale: Vec<NodeIndex> = inner
            .graph
            .neighbors(doc_ix)
            .filter(|&n| !wanted_set.contains(inner.graph[n].key()))
            .collect();

        let mut removed_edges = 0;
        for &entity_ix in &stale {
            if let Some(edge) = inner.graph.find_edge(doc_ix, entity_ix) {
                inner.graph.remove_edge(edge);
                removed_edges += 1;
            }
        }

        let mut added_edges = 0;
        for name in &wanted {
            let (entity_ix, _) = inner.ensure_node(NodeId::Entity(name.clone()));
            if inner.connect(doc_ix, entity_ix) {
                added_edges += 1;
            }
        }

        let removed_entities = inner.prune_orphans(stale);
        let durability = self.persist(inner).into();

        debug!(
            doc_id,
            added_edges,
            removed_edges,
            pruned = removed_entities.len(),
            "Replaced document entities"
        );

        Ok(GraphUpdate {
            doc_id: doc_id.to_string(),
            created,
            entities: wanted,
            added_edges,
            removed_edges,
            removed_entities,
            durability,
        })
    }

    /// Remove a document node and its edges, prune orphaned entities, and save.
    pub fn delete_document_node(&self, doc_id: &str) -> Result<GraphDeletion> {
        validate_doc_id(doc_id)?;
        let mut inner = self.inner.write();
        let doc_ix = inner
            .documents
            .get(doc_id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("document {} not in graph", doc_id)))?;

        let touched: Vec<NodeIndex> = inner.graph.neighbors(doc_ix).collect();
        let removed_edges = touched.len();
        inner.graph.remove_node(doc_ix);
        inner.documents.remove(doc_id);

        let removed_entities = inner.prune_orphans(touched);
        let durability = self.persist(inner).into();

        info!(
            "Deleted document {} from graph ({} edges, {} orphan entities)",
            doc_id,
            removed_edges,
            removed_entities.len()
        );

        Ok(GraphDeletion {
            doc_id: doc_id.to_string(),
            removed_edges,
            removed_entities,
            durability,
        })
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// All nodes within `depth` hops of `node`, excluding `node` itself.
    /// `depth == 0` yields an empty neighborhood.
    pub fn neighbors(&self, node: &NodeId, depth: usize) -> Result<Neighborhood> {
        let inner = self.inner.read();
        let start = inner
            .index_of(node)
            .ok_or_else(|| Error::NotFound(format!("node {}", node)))?;
        Ok(inner.bfs(start, depth))
    }

    /// Entities directly attached to a document.
    pub fn document_entities(&self, doc_id: &str) -> Result<Vec<String>> {
        let reader = self.read();
        if !reader.contains_document(doc_id) {
            return Err(Error::NotFound(format!("document {} not in graph", doc_id)));
        }
        Ok(reader.document_entities(doc_id))
    }

    pub fn node_exists(&self, node: &NodeId) -> bool {
        self.inner.read().index_of(node).is_some()
    }

    pub fn contains_document(&self, doc_id: &str) -> bool {
        self.inner.read().documents.contains_key(doc_id)
    }

    /// Every node id, sorted (documents first).
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut ids: Vec<NodeId> = inner
            .graph
            .node_indices()
            .map(|ix| inner.graph[ix].clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> GraphStats {
        self.inner.read().stats()
    }

    /// Hold a read lock for several queries against one consistent state.
    pub fn read(&self) -> GraphReader<'_> {
        GraphReader {
            guard: self.inner.read(),
        }
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Write the full snapshot. Serialized with all mutations.
    pub fn save(&self) -> Result<()> {
        self.persist(self.inner.write())
    }

    /// Snapshot under `guard`, then write it with the guard downgraded:
    /// readers proceed during the disk write, other writers (and so other
    /// saves) still wait, keeping snapshots in mutation order.
    fn persist(&self, guard: RwLockWriteGuard<'_, GraphInner>) -> Result<()> {
        let snapshot = guard.snapshot();
        let _reading = RwLockWriteGuard::downgrade(guard);
        let result = write_snapshot(&self.path, &snapshot);
        if let Err(e) = &result {
            warn!("Graph snapshot not saved, continuing in memory: {}", e);
        }
        result
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Write to `<path>.tmp`, fsync, then rename over `path`.
fn write_snapshot(path: &Path, snapshot: &GraphSnapshot) -> Result<()> {
    let fail = |e: std::io::Error| Error::Persistence(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(fail)?;
    }

    let data = serde_json::to_vec(snapshot)?;
    let tmp = suffixed(path, ".tmp");
    {
        let mut file = fs::File::create(&tmp).map_err(fail)?;
        file.write_all(&data).map_err(fail)?;
        file.sync_all().map_err(fail)?;
    }
    fs::rename(&tmp, path).map_err(fail)?;
    Ok(())
}
