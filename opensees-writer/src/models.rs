use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use crate::error::{EmitError, EmitResult};
use crate::writer::WriteReport;
use crate::xobject::XObject;

/// Request body for the generate/validate endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub model: ModelDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Success,
    Failed,
}

/// Response of the generate endpoint: the written files by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub job_id: String,
    pub status: WriteStatus,
    pub files: BTreeMap<String, String>,
    pub report: Option<WriteReport>,
    pub error_message: Option<String>,
    pub timestamp: String,
}

/// The model handed over by the host: mesh, partitioning and every XObject
/// that has to be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    pub nodes: Vec<MeshNode>,
    #[serde(default)]
    pub elements: Vec<MeshElement>,
    #[serde(default)]
    pub partitions: PartitionData,
    /// Materials, sections, time series (written to definitions.tcl)
    #[serde(default)]
    pub definitions: Vec<XObject>,
    #[serde(default)]
    pub element_properties: Vec<XObject>,
    #[serde(default)]
    pub conditions: Vec<ConditionAssignment>,
    #[serde(default)]
    pub patterns: Vec<XObject>,
    #[serde(default = "default_dimension")]
    pub default_dimension: (u32, u32),
    /// Lookup tables built on the first query. Call [`ModelDocument::reindex`]
    /// after editing the mesh or the partition data of a queried document.
    #[serde(skip)]
    index: IndexCell,
}

/// Clones start without tables, so a cloned-then-edited document never
/// answers from its source's mesh.
#[derive(Debug, Default)]
struct IndexCell(OnceLock<MeshIndex>);

impl Clone for IndexCell {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Id lookups and node ownership, computed in one pass over the mesh.
#[derive(Debug, Default)]
struct MeshIndex {
    nodes: HashMap<u64, usize>,
    elements: HashMap<u64, usize>,
    /// Primary partition of every node referenced by the document
    primary: HashMap<u64, usize>,
    /// Sorted partitions holding a copy of each node
    holders: HashMap<u64, Vec<usize>>,
    /// Sorted nodes each partition declares
    required: BTreeMap<usize, Vec<u64>>,
}

impl MeshIndex {
    fn build(doc: &ModelDocument) -> Self {
        let mut index = MeshIndex::default();
        for (i, node) in doc.nodes.iter().enumerate() {
            index.nodes.entry(node.id).or_insert(i);
        }

        let mut first_element: HashMap<u64, usize> = HashMap::new();
        let mut holders: HashMap<u64, Vec<usize>> = HashMap::new();
        for (i, element) in doc.elements.iter().enumerate() {
            index.elements.entry(element.id).or_insert(i);
            let pid = doc.element_partition(element.id);
            for node in element.all_nodes() {
                first_element.entry(node).or_insert(pid);
                holders.entry(node).or_default().push(pid);
            }
        }

        let ids = doc.nodes.iter().map(|n| n.id).chain(holders.keys().copied()).collect::<Vec<_>>();
        for id in ids {
            let primary = doc
                .partitions
                .node_partition
                .get(&id)
                .or_else(|| first_element.get(&id))
                .copied()
                .unwrap_or(0);
            index.primary.insert(id, primary);
            let pids = holders.entry(id).or_default();
            pids.push(primary);
            pids.sort_unstable();
            pids.dedup();
        }

        for node in &doc.nodes {
            for pid in holders.get(&node.id).into_iter().flatten() {
                index.required.entry(*pid).or_default().push(node.id);
            }
        }
        for ids in index.required.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        index.holders = holders;
        index
    }
}

fn default_dimension() -> (u32, u32) {
    (3, 3)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshNode {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MeshNode {
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementFamily {
    Point,
    Line2,
    Line3,
    Triangle3,
    Quad4,
    Tetra4,
    Hexa8,
}

impl ElementFamily {
    pub fn node_count(&self) -> usize {
        match self {
            ElementFamily::Point => 1,
            ElementFamily::Line2 => 2,
            ElementFamily::Line3 => 3,
            ElementFamily::Triangle3 => 3,
            ElementFamily::Quad4 => 4,
            ElementFamily::Tetra4 => 4,
            ElementFamily::Hexa8 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshElement {
    pub id: u64,
    pub family: ElementFamily,
    pub node_ids: Vec<u64>,
    /// Element property XObject id
    #[serde(default)]
    pub property: Option<u64>,
    /// Extra nodes beyond the geometric ones (e.g. a contact slave node)
    #[serde(default)]
    pub extra_nodes: Vec<u64>,
}

impl MeshElement {
    /// Geometric nodes followed by extra nodes
    pub fn all_nodes(&self) -> impl Iterator<Item = u64> + '_ {
        self.node_ids.iter().chain(self.extra_nodes.iter()).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionData {
    #[serde(default = "default_process_count")]
    pub process_count: usize,
    #[serde(default)]
    pub element_partition: HashMap<u64, usize>,
    #[serde(default)]
    pub node_partition: HashMap<u64, usize>,
}

fn default_process_count() -> usize {
    1
}

impl Default for PartitionData {
    fn default() -> Self {
        Self {
            process_count: 1,
            element_partition: HashMap::new(),
            node_partition: HashMap::new(),
        }
    }
}

/// A condition XObject together with what it is assigned to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionAssignment {
    pub xobject: XObject,
    #[serde(default)]
    pub targets: Targets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default)]
    pub nodes: Vec<u64>,
    #[serde(default)]
    pub elements: Vec<u64>,
}

impl Targets {
    pub fn nodes(nodes: Vec<u64>) -> Self {
        Self {
            nodes,
            elements: Vec::new(),
        }
    }

    pub fn elements(elements: Vec<u64>) -> Self {
        Self {
            nodes: Vec::new(),
            elements,
        }
    }
}

impl ModelDocument {
    pub fn new(nodes: Vec<MeshNode>, elements: Vec<MeshElement>) -> Self {
        Self {
            nodes,
            elements,
            partitions: PartitionData::default(),
            definitions: Vec::new(),
            element_properties: Vec::new(),
            conditions: Vec::new(),
            patterns: Vec::new(),
            default_dimension: default_dimension(),
            index: IndexCell::default(),
        }
    }

    fn index(&self) -> &MeshIndex {
        self.index.0.get_or_init(|| MeshIndex::build(self))
    }

    /// Drop the lookup tables so the next query sees the current mesh.
    pub fn reindex(&mut self) {
        self.index = IndexCell::default();
    }

    pub fn node(&self, id: u64) -> Option<&MeshNode> {
        self.index().nodes.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn element(&self, id: u64) -> Option<&MeshElement> {
        self.index().elements.get(&id).map(|&i| &self.elements[i])
    }

    pub fn node_coords(&self, id: u64) -> EmitResult<[f64; 3]> {
        self.node(id)
            .map(MeshNode::coords)
            .ok_or(EmitError::UnknownNode(id))
    }

    pub fn max_node_id(&self) -> u64 {
        self.nodes.iter().map(|n| n.id).max().unwrap_or(0)
    }

    pub fn max_element_id(&self) -> u64 {
        self.elements.iter().map(|e| e.id).max().unwrap_or(0)
    }

    /// Largest id over every XObject in the document
    pub fn max_xobject_id(&self) -> u64 {
        self.definitions
            .iter()
            .chain(self.element_properties.iter())
            .chain(self.patterns.iter())
            .chain(self.conditions.iter().map(|c| &c.xobject))
            .map(|x| x.id)
            .max()
            .unwrap_or(0)
    }

    pub fn all_xobjects(&self) -> impl Iterator<Item = &XObject> {
        self.definitions
            .iter()
            .chain(self.element_properties.iter())
            .chain(self.patterns.iter())
            .chain(self.conditions.iter().map(|c| &c.xobject))
    }

    pub fn element_property(&self, id: u64) -> Option<&XObject> {
        self.element_properties.iter().find(|x| x.id == id)
    }

    pub fn definition(&self, id: u64) -> Option<&XObject> {
        self.definitions.iter().find(|x| x.id == id)
    }

    pub fn condition(&self, id: u64) -> Option<&ConditionAssignment> {
        self.conditions.iter().find(|c| c.xobject.id == id)
    }

    /// Ids of conditions referenced by at least one pattern
    pub fn pattern_condition_ids(&self) -> HashSet<u64> {
        self.patterns
            .iter()
            .filter_map(|p| p.index_vector("conditions").ok())
            .flat_map(|ids| ids.iter().copied())
            .collect()
    }

    pub fn element_partition(&self, element: u64) -> usize {
        self.partitions
            .element_partition
            .get(&element)
            .copied()
            .unwrap_or(0)
    }

    /// Explicit entry first, then the partition of the first element using the node.
    pub fn node_partition(&self, node: u64) -> usize {
        match self.index().primary.get(&node) {
            Some(pid) => *pid,
            None => self.partitions.node_partition.get(&node).copied().unwrap_or(0),
        }
    }

    pub fn elements_in_partition(&self, ids: &[u64], pid: usize) -> Vec<u64> {
        ids.iter()
            .copied()
            .filter(|&id| self.element_partition(id) == pid)
            .collect()
    }

    /// Nodes whose primary partition is `pid`
    pub fn nodes_in_partition(&self, ids: &[u64], pid: usize) -> Vec<u64> {
        ids.iter()
            .copied()
            .filter(|&id| self.node_partition(id) == pid)
            .collect()
    }

    /// Every partition holding a copy of the node: its primary partition and
    /// those of the elements using it, ascending.
    pub fn partitions_of_node(&self, node: u64) -> Vec<usize> {
        match self.index().holders.get(&node) {
            Some(pids) => pids.clone(),
            None => vec![self.node_partition(node)],
        }
    }

    fn holds(&self, pid: usize, node: u64) -> bool {
        match self.index().holders.get(&node) {
            Some(pids) => pids.binary_search(&pid).is_ok(),
            None => self.node_partition(node) == pid,
        }
    }

    /// Nodes a partition must declare, ascending
    pub fn nodes_required_by_partition(&self, pid: usize) -> Vec<u64> {
        self.index().required.get(&pid).cloned().unwrap_or_default()
    }

    /// Subset of `ids` that partition `pid` holds a copy of
    pub fn nodes_present_in_partition(&self, ids: &[u64], pid: usize) -> Vec<u64> {
        ids.iter().copied().filter(|&id| self.holds(pid, id)).collect()
    }

    /// Axis-aligned bounds of all nodes as (min, max)
    pub fn bounding_box(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = self.nodes.first()?.coords();
        let mut min = first;
        let mut max = first;
        for node in &self.nodes {
            let c = node.coords();
            for k in 0..3 {
                min[k] = min[k].min(c[k]);
                max[k] = max[k].max(c[k]);
            }
        }
        Some((min, max))
    }

    pub fn validate(&self) -> EmitResult<()> {
        if self.nodes.is_empty() {
            return Err(EmitError::InvalidModel("Model must have at least one node".into()));
        }
        if self.partitions.process_count == 0 {
            return Err(EmitError::InvalidModel("Process count must be at least 1".into()));
        }

        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id) {
                return Err(EmitError::InvalidModel(format!("Duplicate node id {}", node.id)));
            }
        }

        let mut element_ids = HashSet::new();
        for element in &self.elements {
            if !element_ids.insert(element.id) {
                return Err(EmitError::InvalidModel(format!("Duplicate element id {}", element.id)));
            }
            if element.node_ids.len() != element.family.node_count() {
                return Err(EmitError::InvalidModel(format!(
                    "Element {} ({:?}) has {} nodes, expected {}",
                    element.id,
                    element.family,
                    element.node_ids.len(),
                    element.family.node_count()
                )));
            }
            if let Some(missing) = element.all_nodes().find(|n| !node_ids.contains(n)) {
                return Err(EmitError::InvalidModel(format!(
                    "Element {} references unknown node {}",
                    element.id, missing
                )));
            }
        }

        let count = self.partitions.process_count;
        let out_of_range = self
            .partitions
            .element_partition
            .values()
            .chain(self.partitions.node_partition.values())
            .find(|&&pid| pid >= count);
        if let Some(pid) = out_of_range {
            return Err(EmitError::InvalidModel(format!(
                "Partition id {} out of range for {} processes",
                pid, count
            )));
        }

        let mut xobject_ids = BTreeMap::new();
        for x in self.all_xobjects() {
            if let Some(previous) = xobject_ids.insert(x.id, x.label()) {
                return Err(EmitError::InvalidModel(format!(
                    "Duplicate XObject id {} ({} and {})",
                    x.id,
                    previous,
                    x.label()
                )));
            }
        }

        Ok(())
    }
}
