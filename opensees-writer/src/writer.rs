//! Whole-model TCL writer
//!
//! Produces `definitions.tcl` (materials, sections, time series) and
//! `main.tcl` (nodes, elements, conditions, masses, patterns) for one model
//! document, then reconciles the recorder cdata with the synthesized ids.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::cdata::{self, CdataReport};
use crate::config::WriterConfig;
use crate::context::{normalize_ndf, EmissionContext, DEFINITIONS_FILE};
use crate::error::{EmitError, EmitResult};
use crate::models::{ModelDocument, Targets};
use crate::partition::emit_partitioned;
use crate::registry::Registry;

pub const MAIN_FILE: &str = "main.tcl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReport {
    pub files: Vec<PathBuf>,
    pub node_count: usize,
    pub element_count: usize,
    pub process_count: usize,
    pub synthesized_nodes: u64,
    pub synthesized_elements: u64,
    pub cdata: CdataReport,
}

pub struct TclWriter {
    registry: Registry,
    config: WriterConfig,
}

impl TclWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self::with_registry(config, Registry::builtin())
    }

    pub fn with_registry(config: WriterConfig, registry: Registry) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// (ndm, ndf) of every document node.
    ///
    /// Element properties report the dimension they need on their nodes.
    /// Properties of the same ndm meeting at a node resolve to the largest
    /// ndf; different ndm is an error. Untouched nodes get the document default.
    pub fn resolve_node_dimensions(&self, doc: &ModelDocument) -> EmitResult<BTreeMap<u64, (u32, u32)>> {
        let mut resolved: BTreeMap<u64, (u32, u32)> = BTreeMap::new();
        for element in &doc.elements {
            let Some(property_id) = element.property else {
                continue;
            };
            let property = doc
                .element_property(property_id)
                .ok_or(EmitError::UnknownEntity(property_id))?;
            let emitter = self.registry.emitter_for(property)?;
            let Some((ndm, ndf)) = emitter.nodal_spatial_dim(property, doc.default_dimension)? else {
                continue;
            };
            let ndf = normalize_ndf(ndf);

            for node in element.all_nodes() {
                match resolved.get_mut(&node) {
                    None => {
                        resolved.insert(node, (ndm, ndf));
                    }
                    Some(known) if known.0 != ndm => {
                        return Err(EmitError::DimensionMismatch {
                            node,
                            ndm,
                            ndf,
                            other_ndm: known.0,
                            other_ndf: known.1,
                        });
                    }
                    Some(known) => known.1 = known.1.max(ndf),
                }
            }
        }

        let (default_ndm, default_ndf) = doc.default_dimension;
        for node in &doc.nodes {
            resolved
                .entry(node.id)
                .or_insert((default_ndm, normalize_ndf(default_ndf)));
        }
        Ok(resolved)
    }

    pub fn write_model(&self, doc: &ModelDocument, output_dir: &Path) -> EmitResult<WriteReport> {
        doc.validate()?;
        fs::create_dir_all(output_dir)?;
        let dimensions = self.resolve_node_dimensions(doc)?;

        let mut ctx = self.config.context(output_dir);
        ctx.seed_from_document(doc);
        ctx.set_process_count(doc.partitions.process_count)?;
        if let Some((min, max)) = doc.bounding_box() {
            ctx.set_lagrangian_node_coordinates_from_bounds(min, max);
        }
        let first_node = ctx.next_node_id.peek();
        let first_element = ctx.next_element_id.peek();

        tracing::info!(
            "Writing model with {} nodes, {} elements on {} process(es) to {:?}",
            doc.nodes.len(),
            doc.elements.len(),
            doc.partitions.process_count,
            output_dir
        );

        let definitions_path = output_dir.join(DEFINITIONS_FILE);
        self.write_definitions(&mut ctx, doc, &definitions_path)?;

        let main_path = output_dir.join(MAIN_FILE);
        ctx.set_output_file(&main_path)?;
        let written = self.write_main(&mut ctx, doc, &dimensions);
        ctx.close_output()?;
        written?;

        let cdata = if ctx.cdata_remap.is_dirty() {
            cdata::apply_remap(output_dir, &ctx.cdata_remap)?
        } else {
            CdataReport::default()
        };

        let files = vec![definitions_path, main_path];
        if let Some(dest) = &self.config.debug_export {
            export_debug_files(dest, &files);
        }

        let report = WriteReport {
            files,
            node_count: doc.nodes.len(),
            element_count: doc.elements.len(),
            process_count: ctx.process_count(),
            synthesized_nodes: ctx.next_node_id.peek() - first_node,
            synthesized_elements: ctx.next_element_id.peek() - first_element,
            cdata,
        };
        tracing::info!(
            "Model written: {} synthesized nodes, {} synthesized elements, {} cdata rows appended",
            report.synthesized_nodes,
            report.synthesized_elements,
            report.cdata.total_appended()
        );
        Ok(report)
    }

    fn write_definitions(&self, ctx: &mut EmissionContext, doc: &ModelDocument, path: &Path) -> EmitResult<()> {
        ctx.set_output_memory()?;
        for definition in &doc.definitions {
            self.registry.emit(ctx, doc, definition, &Targets::default())?;
        }
        let mut text = ctx.take_output();
        if text.starts_with('\n') {
            text.remove(0);
        }
        fs::write(path, text)?;
        tracing::debug!("Wrote {} definitions to {:?}", doc.definitions.len(), path);
        Ok(())
    }

    fn write_main(
        &self,
        ctx: &mut EmissionContext,
        doc: &ModelDocument,
        dimensions: &BTreeMap<u64, (u32, u32)>,
    ) -> EmitResult<()> {
        ctx.write_line("# OpenSees model written by opensees-writer")?;
        ctx.write_line(&format!("# process count: {}", ctx.process_count()))?;

        ctx.write_description("Nodes")?;
        emit_partitioned(
            ctx,
            |_, pid| doc.nodes_required_by_partition(pid),
            |ctx, _, ids| {
                for id in ids {
                    let (ndm, ndf) = dimensions.get(id).copied().ok_or(EmitError::UnknownNode(*id))?;
                    ctx.declare_node(*id, doc.node_coords(*id)?, ndm, ndf)?;
                }
                Ok(())
            },
        )?;

        let mut by_property: HashMap<u64, Vec<u64>> = HashMap::new();
        for element in &doc.elements {
            if let Some(property) = element.property {
                by_property.entry(property).or_default().push(element.id);
            }
        }
        for property in &doc.element_properties {
            let Some(targets) = by_property.remove(&property.id) else {
                tracing::debug!("{} is not assigned to any element", property.label());
                continue;
            };
            self.registry
                .emit(ctx, doc, property, &Targets::elements(targets))?;
        }

        let in_patterns = doc.pattern_condition_ids();
        for condition in doc.conditions.iter().filter(|c| !in_patterns.contains(&c.xobject.id)) {
            self.registry
                .emit(ctx, doc, &condition.xobject, &condition.targets)?;
        }

        self.flush_masses(ctx, doc)?;

        for pattern in &doc.patterns {
            self.registry.emit(ctx, doc, pattern, &Targets::default())?;
        }
        Ok(())
    }

    /// Accumulated masses, each written once on the node's primary partition.
    fn flush_masses(&self, ctx: &mut EmissionContext, doc: &ModelDocument) -> EmitResult<usize> {
        let masses = ctx.take_masses();
        if masses.is_empty() {
            return Ok(0);
        }
        ctx.write_description("Nodal masses")?;
        emit_partitioned(
            ctx,
            |_, pid| {
                masses
                    .keys()
                    .copied()
                    .filter(|node| doc.node_partition(*node) == pid)
                    .collect::<Vec<u64>>()
            },
            |ctx, _, nodes| {
                for node in nodes {
                    if let Some(values) = masses.get(node) {
                        ctx.write_mass(*node, *values)?;
                    }
                }
                Ok(())
            },
        )?;
        Ok(masses.len())
    }
}

fn export_debug_files(dest: &Path, files: &[PathBuf]) {
    let dest = dest.join(format!("model_{}", Uuid::new_v4()));
    if let Err(err) = fs::create_dir_all(&dest) {
        tracing::warn!("Failed to create debug export directory {:?}: {}", dest, err);
        return;
    }
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = dest.join(name);
        if let Err(err) = fs::copy(file, &target) {
            tracing::warn!("Failed to export debug file {:?}: {}", target, err);
        } else {
            tracing::info!("Exported debug file to {:?}", target);
        }
    }
}
