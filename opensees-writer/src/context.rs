//! Emission context threaded through every TCL emitter
//!
//! One [`EmissionContext`] lives for a whole model write. It owns:
//! - the output sink and the current indentation
//! - the active `model basic` (ndm, ndf) pair, remembered per partition
//! - id allocators for synthesized nodes, elements and definitions
//! - the nodal mass accumulator
//! - the cdata remap bookkeeping consumed by [`crate::cdata`]

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{EmitError, EmitResult};
use crate::format::DoubleFormatter;
use crate::models::ModelDocument;

pub const DEFINITIONS_FILE: &str = "definitions.tcl";

/// Monotonic id source. Issued ids are never handed out again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }

    pub fn allocate(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Make sure the next id is above `max`.
    pub fn seed_above(&mut self, max: u64) {
        self.next = self.next.max(max + 1);
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// User-level ids expanded into several solver-level entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CdataRemap {
    pub element_remap: BTreeMap<u64, Vec<u64>>,
    pub physical_property_remap: BTreeMap<u64, BTreeMap<u64, u64>>,
    dirty: bool,
}

impl CdataRemap {
    pub fn map_element(&mut self, source: u64, generated: u64) {
        let generated_ids = self.element_remap.entry(source).or_default();
        if !generated_ids.contains(&generated) {
            generated_ids.push(generated);
        }
        self.dirty = true;
    }

    pub fn map_physical_properties(&mut self, source_property: u64, element: u64, new_property: u64) {
        self.physical_property_remap
            .entry(source_property)
            .or_default()
            .insert(element, new_property);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

enum Sink {
    Memory(String),
    File { path: PathBuf, writer: BufWriter<File> },
}

pub struct EmissionContext {
    pub output_directory: PathBuf,
    sink: Sink,

    pub indent_unit: String,
    current_indent: String,
    pub formatter: DoubleFormatter,

    ndm: u32,
    ndf: u32,
    process_count: usize,
    process_id: usize,
    dimension_per_process: Vec<(u32, u32)>,
    /// Set once a process switch or model builder update happened
    started: bool,

    node_dimension_map: BTreeMap<u64, (u32, u32)>,
    pub inverse_model_map: BTreeMap<String, Value>,
    pub custom_data: BTreeMap<String, Value>,
    mass_accumulator: BTreeMap<u64, [f64; 6]>,

    pub next_node_id: IdAllocator,
    pub next_element_id: IdAllocator,
    pub next_physical_property_id: IdAllocator,
    pub next_definition_id: IdAllocator,
    pub next_condition_id: IdAllocator,
    pub next_analysis_step_id: IdAllocator,

    pub lagrangian_node_coordinates: [f64; 3],
    current_description_label: String,
    pub cdata_remap: CdataRemap,
}

impl EmissionContext {
    /// Context writing to memory until an output file is selected
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
            sink: Sink::Memory(String::new()),
            indent_unit: "\t".to_string(),
            current_indent: String::new(),
            formatter: DoubleFormatter::default(),
            ndm: 0,
            ndf: 0,
            process_count: 1,
            process_id: 0,
            dimension_per_process: vec![(0, 0)],
            started: false,
            node_dimension_map: BTreeMap::new(),
            inverse_model_map: BTreeMap::new(),
            custom_data: BTreeMap::new(),
            mass_accumulator: BTreeMap::new(),
            next_node_id: IdAllocator::default(),
            next_element_id: IdAllocator::default(),
            next_physical_property_id: IdAllocator::default(),
            next_definition_id: IdAllocator::default(),
            next_condition_id: IdAllocator::default(),
            next_analysis_step_id: IdAllocator::default(),
            lagrangian_node_coordinates: [0.0; 3],
            current_description_label: String::new(),
            cdata_remap: CdataRemap::default(),
        }
    }

    pub fn with_formatting(mut self, indent_unit: &str, formatter: DoubleFormatter) -> Self {
        self.indent_unit = indent_unit.to_string();
        self.formatter = formatter;
        self
    }

    // ---- output -------------------------------------------------------

    /// Redirect output to `path`, flushing whatever sink was active.
    pub fn set_output_file(&mut self, path: impl AsRef<Path>) -> EmitResult<()> {
        self.close_output()?;
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(File::create(&path)?);
        tracing::debug!("Writing TCL to {:?}", path);
        self.sink = Sink::File { path, writer };
        Ok(())
    }

    pub fn set_output_memory(&mut self) -> EmitResult<()> {
        self.close_output()?;
        self.sink = Sink::Memory(String::new());
        Ok(())
    }

    /// Flush a file sink. Leaves an empty memory sink in its place.
    pub fn close_output(&mut self) -> EmitResult<()> {
        let previous = std::mem::replace(&mut self.sink, Sink::Memory(String::new()));
        if let Sink::File { mut writer, path } = previous {
            writer.flush()?;
            tracing::debug!("Closed {:?}", path);
        }
        Ok(())
    }

    /// Text written to the memory sink so far (empty for file sinks).
    pub fn take_output(&mut self) -> String {
        match &mut self.sink {
            Sink::Memory(text) => std::mem::take(text),
            Sink::File { .. } => String::new(),
        }
    }

    pub fn write_raw(&mut self, text: &str) -> EmitResult<()> {
        match &mut self.sink {
            Sink::Memory(buffer) => buffer.push_str(text),
            Sink::File { writer, .. } => writer.write_all(text.as_bytes())?,
        }
        Ok(())
    }

    /// Write one indented line.
    pub fn write_line(&mut self, text: &str) -> EmitResult<()> {
        let line = format!("{}{}\n", self.current_indent, text);
        self.write_raw(&line)
    }

    pub fn indent(&self) -> &str {
        &self.current_indent
    }

    pub fn push_indent(&mut self) {
        self.current_indent.push_str(&self.indent_unit);
    }

    pub fn pop_indent(&mut self) {
        let len = self.current_indent.len().saturating_sub(self.indent_unit.len());
        self.current_indent.truncate(len);
    }

    pub fn fmt(&self, value: f64) -> String {
        self.formatter.format(value)
    }

    /// Write a `# label` banner unless the previous banner had the same label.
    pub fn write_description(&mut self, label: &str) -> EmitResult<()> {
        if self.current_description_label == label {
            return Ok(());
        }
        self.current_description_label = label.to_string();
        let banner = format!("\n{}# {}\n", self.current_indent, label);
        self.write_raw(&banner)
    }

    pub fn description_label(&self) -> &str {
        &self.current_description_label
    }

    // ---- model builder and partitions ----------------------------------

    pub fn dimension(&self) -> (u32, u32) {
        (self.ndm, self.ndf)
    }

    /// Declare `model basic` for (ndm, ndf) if it is not already active on
    /// the current process.
    pub fn update_model_builder(&mut self, ndm: u32, ndf: u32) -> EmitResult<()> {
        self.started = true;
        let ndf = normalize_ndf(ndf);
        if (self.ndm, self.ndf) == (ndm, ndf) {
            return Ok(());
        }
        self.ndm = ndm;
        self.ndf = ndf;
        self.current_description_label.clear();
        let indent = self.current_indent.clone();
        self.write_raw(&format!(
            "\n{indent}model basic -ndm {ndm} -ndf {ndf}\n{indent}source {DEFINITIONS_FILE}\n"
        ))
    }

    pub fn process_count(&self) -> usize {
        self.process_count
    }

    pub fn process_id(&self) -> usize {
        self.process_id
    }

    pub fn set_process_count(&mut self, count: usize) -> EmitResult<()> {
        if self.started {
            return Err(EmitError::UnsupportedConfiguration(
                "process count must be set before any process switch or model declaration".into(),
            ));
        }
        let count = count.max(1);
        if count != self.process_count {
            self.process_count = count;
            self.dimension_per_process = vec![(0, 0); count];
            self.process_id = 0;
        }
        Ok(())
    }

    pub fn set_process_id(&mut self, pid: usize) -> EmitResult<()> {
        if pid >= self.process_count {
            return Err(EmitError::ProcessIdOutOfRange {
                pid: pid as i64,
                count: self.process_count,
            });
        }
        self.started = true;
        if pid != self.process_id {
            self.dimension_per_process[self.process_id] = (self.ndm, self.ndf);
            self.process_id = pid;
            let (ndm, ndf) = self.dimension_per_process[pid];
            self.ndm = ndm;
            self.ndf = ndf;
        }
        Ok(())
    }

    // ---- nodes ---------------------------------------------------------

    /// Declare a node under the right model builder and remember its dimension.
    pub fn declare_node(&mut self, id: u64, coords: [f64; 3], ndm: u32, ndf: u32) -> EmitResult<()> {
        let ndf = normalize_ndf(ndf);
        if let Some(&(known_ndm, known_ndf)) = self.node_dimension_map.get(&id) {
            if (known_ndm, known_ndf) != (ndm, ndf) {
                return Err(EmitError::DimensionMismatch {
                    node: id,
                    ndm,
                    ndf,
                    other_ndm: known_ndm,
                    other_ndf: known_ndf,
                });
            }
        }
        if ndm == 0 || ndm > 3 {
            return Err(EmitError::UnsupportedConfiguration(format!(
                "node {} requested with ndm = {}",
                id, ndm
            )));
        }
        self.update_model_builder(ndm, ndf)?;
        let components: Vec<String> = coords[..ndm as usize].iter().map(|c| self.fmt(*c)).collect();
        self.write_line(&format!("node {} {}", id, components.join(" ")))?;
        self.node_dimension_map.insert(id, (ndm, ndf));
        Ok(())
    }

    pub fn node_dimension(&self, id: u64) -> Option<(u32, u32)> {
        self.node_dimension_map.get(&id).copied()
    }

    pub fn require_node_dimension(&self, id: u64) -> EmitResult<(u32, u32)> {
        self.node_dimension(id).ok_or(EmitError::UnknownNode(id))
    }

    /// Fail when two coupled nodes were declared with different dimensions.
    pub fn ensure_same_dimension(&self, a: u64, b: u64) -> EmitResult<()> {
        let (ndm_a, ndf_a) = self.require_node_dimension(a)?;
        let (ndm_b, ndf_b) = self.require_node_dimension(b)?;
        if (ndm_a, ndf_a) != (ndm_b, ndf_b) {
            return Err(EmitError::DimensionMismatch {
                node: b,
                ndm: ndm_b,
                ndf: ndf_b,
                other_ndm: ndm_a,
                other_ndf: ndf_a,
            });
        }
        Ok(())
    }

    // ---- ids -----------------------------------------------------------

    /// Seed every allocator above the ids already used by the document.
    pub fn seed_from_document(&mut self, doc: &ModelDocument) {
        self.next_node_id.seed_above(doc.max_node_id());
        self.next_element_id.seed_above(doc.max_element_id());
        let max_xobject = doc.max_xobject_id();
        self.next_physical_property_id.seed_above(max_xobject);
        self.next_definition_id.seed_above(max_xobject);
        self.next_condition_id.seed_above(max_xobject);
        self.next_analysis_step_id.seed_above(max_xobject);
    }

    /// Put the Lagrange-multiplier point outside the mesh bounds.
    pub fn set_lagrangian_node_coordinates_from_bounds(&mut self, min: [f64; 3], max: [f64; 3]) {
        let diagonal = (0..3).map(|k| (max[k] - min[k]).powi(2)).sum::<f64>().sqrt();
        let offset = if diagonal > 1e-12 { 0.1 * diagonal } else { 1.0 };
        self.lagrangian_node_coordinates = [max[0] + offset, max[1] + offset, max[2] + offset];
    }

    // ---- masses --------------------------------------------------------

    pub fn add_mass(&mut self, node: u64, contribution: [f64; 6]) {
        let entry = self.mass_accumulator.entry(node).or_insert([0.0; 6]);
        for (total, value) in entry.iter_mut().zip(contribution.iter()) {
            *total += value;
        }
    }

    pub fn accumulated_mass(&self, node: u64) -> Option<[f64; 6]> {
        self.mass_accumulator.get(&node).copied()
    }

    /// Remove and return every accumulated mass.
    pub fn take_masses(&mut self) -> BTreeMap<u64, [f64; 6]> {
        std::mem::take(&mut self.mass_accumulator)
    }

    /// Write a single `mass` command, mapped onto the node's dofs.
    pub fn write_mass(&mut self, node: u64, values: [f64; 6]) -> EmitResult<()> {
        let components = match self.node_dimension(node) {
            Some((ndm, ndf)) => dof_components(values, ndm, ndf),
            None => values.to_vec(),
        };
        let text: Vec<String> = components.iter().map(|v| self.fmt(*v)).collect();
        self.write_line(&format!("mass {} {}", node, text.join(" ")))
    }

    /// Write one `mass` command per accumulated node and clear the accumulator.
    pub fn flush_masses(&mut self) -> EmitResult<usize> {
        let masses = self.take_masses();
        if masses.is_empty() {
            return Ok(0);
        }
        self.write_description("Nodal masses")?;
        for (node, values) in &masses {
            self.write_mass(*node, *values)?;
        }
        Ok(masses.len())
    }

    // ---- cdata ---------------------------------------------------------

    pub fn map_element(&mut self, source: u64, generated: u64) {
        self.cdata_remap.map_element(source, generated);
    }

    pub fn map_physical_properties(&mut self, source_property: u64, element: u64, new_property: u64) {
        self.cdata_remap
            .map_physical_properties(source_property, element, new_property);
    }
}

/// Map a 6-component (ux uy uz rx ry rz) vector onto a node's dofs.
///
/// 2D frames keep the in-plane translations and the rotation about z.
pub fn dof_components(values: [f64; 6], ndm: u32, ndf: u32) -> Vec<f64> {
    match (ndm, ndf) {
        (2, 3) => vec![values[0], values[1], values[5]],
        (_, ndf) => (0..ndf as usize)
            .map(|k| values.get(k).copied().unwrap_or(0.0))
            .collect(),
    }
}

/// Extended dof variants 32/33 resolve to 2/3.
pub fn normalize_ndf(ndf: u32) -> u32 {
    match ndf {
        32 => 2,
        33 => 3,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EmissionContext {
        EmissionContext::new("/tmp")
    }

    #[test]
    fn test_model_builder_written_once_per_pair() {
        let mut c = ctx();
        c.update_model_builder(3, 6).unwrap();
        c.update_model_builder(3, 6).unwrap();
        c.update_model_builder(3, 3).unwrap();
        c.update_model_builder(3, 6).unwrap();
        let out = c.take_output();
        assert_eq!(out.matches("model basic").count(), 3);
        assert_eq!(out.matches("source definitions.tcl").count(), 3);
        assert!(out.starts_with("\nmodel basic -ndm 3 -ndf 6\nsource definitions.tcl\n"));
    }

    #[test]
    fn test_extended_dofs_normalized() {
        let mut c = ctx();
        c.update_model_builder(2, 32).unwrap();
        assert_eq!(c.dimension(), (2, 2));
        c.update_model_builder(2, 2).unwrap();
        c.update_model_builder(3, 33).unwrap();
        assert_eq!(c.dimension(), (3, 3));
        let out = c.take_output();
        assert_eq!(out.matches("model basic").count(), 2);
        assert!(out.contains("-ndm 2 -ndf 2"));
        assert!(out.contains("-ndm 3 -ndf 3"));
    }

    #[test]
    fn test_model_builder_resets_description() {
        let mut c = ctx();
        c.write_description("Elements").unwrap();
        c.write_description("Elements").unwrap();
        c.update_model_builder(2, 3).unwrap();
        c.write_description("Elements").unwrap();
        assert_eq!(c.take_output().matches("# Elements").count(), 2);
    }

    #[test]
    fn test_dimension_preserved_per_process() {
        let mut c = ctx();
        c.set_process_count(3).unwrap();
        c.set_process_id(0).unwrap();
        c.update_model_builder(3, 6).unwrap();
        c.set_process_id(1).unwrap();
        assert_eq!(c.dimension(), (0, 0));
        c.update_model_builder(2, 3).unwrap();
        c.set_process_id(0).unwrap();
        assert_eq!(c.dimension(), (3, 6));
        c.set_process_id(2).unwrap();
        assert_eq!(c.dimension(), (0, 0));
        c.set_process_id(1).unwrap();
        assert_eq!(c.dimension(), (2, 3));
    }

    #[test]
    fn test_process_id_out_of_range() {
        let mut c = ctx();
        c.set_process_count(2).unwrap();
        assert!(matches!(
            c.set_process_id(2),
            Err(EmitError::ProcessIdOutOfRange { pid: 2, count: 2 })
        ));
        assert!(c.set_process_id(1).is_ok());
    }

    #[test]
    fn test_process_count_clamped_and_fixed_after_start() {
        let mut c = ctx();
        c.set_process_count(0).unwrap();
        assert_eq!(c.process_count(), 1);
        c.update_model_builder(3, 3).unwrap();
        assert!(matches!(
            c.set_process_count(4),
            Err(EmitError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_id_allocator_sequence() {
        let mut ids = IdAllocator::new(1);
        ids.seed_above(41);
        let issued: Vec<u64> = (0..5).map(|_| ids.allocate()).collect();
        assert_eq!(issued, vec![42, 43, 44, 45, 46]);
        ids.seed_above(10);
        assert_eq!(ids.allocate(), 47);
    }

    #[test]
    fn test_declare_node_tracks_dimension() {
        let mut c = ctx();
        c.declare_node(1, [0.0, 1.0, 2.0], 3, 6).unwrap();
        c.declare_node(2, [1.0, 0.5, 9.0], 2, 3).unwrap();
        assert_eq!(c.node_dimension(1), Some((3, 6)));
        assert_eq!(c.node_dimension(2), Some((2, 3)));
        let out = c.take_output();
        assert!(out.contains("node 1 0.0 1.0 2.0\n"));
        assert!(out.contains("node 2 1.0 0.5\n"));
        assert!(matches!(
            c.ensure_same_dimension(1, 2),
            Err(EmitError::DimensionMismatch { node: 2, .. })
        ));
        assert!(matches!(c.ensure_same_dimension(1, 3), Err(EmitError::UnknownNode(3))));
    }

    #[test]
    fn test_declare_node_twice_with_other_dimension_fails() {
        let mut c = ctx();
        c.declare_node(1, [0.0; 3], 3, 6).unwrap();
        assert!(c.declare_node(1, [0.0; 3], 3, 6).is_ok());
        assert!(c.declare_node(1, [0.0; 3], 3, 3).is_err());
    }

    #[test]
    fn test_mass_accumulation_order_independent() {
        let mut a = ctx();
        a.add_mass(1, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        a.add_mass(1, [2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let mut b = ctx();
        b.add_mass(1, [2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        b.add_mass(1, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(a.accumulated_mass(1), Some([3.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        assert_eq!(a.accumulated_mass(1), b.accumulated_mass(1));
    }

    #[test]
    fn test_flush_masses_once() {
        let mut c = ctx();
        c.declare_node(5, [0.0; 3], 3, 3).unwrap();
        c.take_output();
        c.add_mass(5, [1.5, 1.5, 1.5, 0.0, 0.0, 0.0]);
        c.add_mass(7, [1.0; 6]);
        assert_eq!(c.flush_masses().unwrap(), 2);
        assert_eq!(c.flush_masses().unwrap(), 0);
        let out = c.take_output();
        assert!(out.contains("mass 5 1.5 1.5 1.5\n"));
        assert!(out.contains("mass 7 1.0 1.0 1.0 1.0 1.0 1.0\n"));
        assert_eq!(out.matches("mass 5").count(), 1);
    }

    #[test]
    fn test_dof_components() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(dof_components(v, 2, 3), vec![1.0, 2.0, 6.0]);
        assert_eq!(dof_components(v, 2, 2), vec![1.0, 2.0]);
        assert_eq!(dof_components(v, 3, 6), v.to_vec());
        assert_eq!(dof_components(v, 3, 7), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    fn test_cdata_remap_dirty_tracking() {
        let mut c = ctx();
        assert!(!c.cdata_remap.is_dirty());
        c.map_element(10, 100);
        c.map_element(10, 100);
        c.map_element(10, 101);
        assert!(c.cdata_remap.is_dirty());
        assert_eq!(c.cdata_remap.element_remap[&10], vec![100, 101]);
        c.map_physical_properties(3, 10, 30);
        assert_eq!(c.cdata_remap.physical_property_remap[&3][&10], 30);
    }

    #[test]
    fn test_lagrangian_point_outside_bounds() {
        let mut c = ctx();
        c.set_lagrangian_node_coordinates_from_bounds([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]);
        assert_eq!(c.lagrangian_node_coordinates, [3.5, 4.5, 0.5]);
        c.set_lagrangian_node_coordinates_from_bounds([1.0; 3], [1.0; 3]);
        assert_eq!(c.lagrangian_node_coordinates, [2.0; 3]);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.tcl");
        let mut c = EmissionContext::new(dir.path());
        c.set_output_file(&path).unwrap();
        c.push_indent();
        c.write_line("puts hello").unwrap();
        c.pop_indent();
        c.pop_indent();
        c.close_output().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\tputs hello\n");
    }
}
