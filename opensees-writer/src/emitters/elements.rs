//! Frame and truss element properties

use crate::context::EmissionContext;
use crate::error::{EmitError, EmitResult};
use crate::models::{ElementFamily, MeshElement, Targets};
use crate::partition::emit_partitioned;
use crate::registry::{Emitter, Scope};
use crate::xobject::XObject;

use super::{definition_ref, property_ndm, require_family, target_elements};

fn frame_dimension(ndm: u32) -> (u32, u32) {
    if ndm == 2 {
        (2, 3)
    } else {
        (3, 6)
    }
}

/// Elements of `targets` owned by the active partition
fn owned<'a>(scope: &Scope<'a>, elements: &[&'a MeshElement], pid: usize) -> Vec<&'a MeshElement> {
    elements
        .iter()
        .copied()
        .filter(|e| scope.doc.element_partition(e.id) == pid)
        .collect()
}

/// `geomTransf Linear` under a fresh definition id.
///
/// The tag is allocated once, the line is written in every partition that
/// owns one of the elements, after its model builder is in place.
struct LinearTransformation {
    tag: u64,
    line: String,
}

impl LinearTransformation {
    fn new(ctx: &mut EmissionContext, entity: &XObject, ndm: u32) -> EmitResult<Self> {
        let tag = ctx.next_definition_id.allocate();
        if ndm != 3 {
            return Ok(Self {
                tag,
                line: format!("geomTransf Linear {}", tag),
            });
        }
        let vecxz = entity.quantity_vector("vecxz")?;
        if vecxz.len() != 3 {
            return Err(EmitError::InvalidValue {
                entity: entity.label(),
                attribute: "vecxz".into(),
                reason: format!("expected 3 components, got {}", vecxz.len()),
            });
        }
        let line = format!("geomTransf Linear {} {}", tag, super::join_values(ctx, vecxz));
        Ok(Self { tag, line })
    }

    fn write(&self, ctx: &mut EmissionContext, (ndm, ndf): (u32, u32)) -> EmitResult<()> {
        ctx.update_model_builder(ndm, ndf)?;
        ctx.write_line(&self.line)
    }
}

/// `element truss id i j A matTag`
pub struct Truss;

impl Emitter for Truss {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let ndm = property_ndm(entity, scope.doc.default_dimension)?;
        let area = entity.quantity_scalar("A")?;
        let material = definition_ref(scope, entity, "material", "materials.uniaxial")?;
        let elements = target_elements(scope, &targets.elements)?;
        for element in &elements {
            require_family(entity, element, ElementFamily::Line2, 0)?;
        }

        ctx.write_description("Elements")?;
        emit_partitioned(
            ctx,
            |_, pid| owned(scope, &elements, pid),
            |ctx, _, mine| {
                ctx.update_model_builder(ndm, ndm)?;
                for element in mine {
                    let line = format!(
                        "element truss {} {} {} {} {}",
                        element.id,
                        element.node_ids[0],
                        element.node_ids[1],
                        ctx.fmt(area),
                        material.id
                    );
                    ctx.write_line(&line)?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }

    fn nodal_spatial_dim(&self, entity: &XObject, default: (u32, u32)) -> EmitResult<Option<(u32, u32)>> {
        let ndm = property_ndm(entity, default)?;
        Ok(Some((ndm, ndm)))
    }
}

/// `element elasticBeamColumn id i j secTag transfTag`
pub struct ElasticBeamColumn;

impl Emitter for ElasticBeamColumn {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let ndm = property_ndm(entity, scope.doc.default_dimension)?;
        let section = definition_ref(scope, entity, "section", "sections")?;
        let elements = target_elements(scope, &targets.elements)?;
        for element in &elements {
            require_family(entity, element, ElementFamily::Line2, 0)?;
        }

        ctx.write_description("Elements")?;
        let transformation = LinearTransformation::new(ctx, entity, ndm)?;
        emit_partitioned(
            ctx,
            |_, pid| owned(scope, &elements, pid),
            |ctx, _, mine| {
                transformation.write(ctx, frame_dimension(ndm))?;
                for element in mine {
                    ctx.write_line(&format!(
                        "element elasticBeamColumn {} {} {} {} {}",
                        element.id, element.node_ids[0], element.node_ids[1], section.id, transformation.tag
                    ))?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }

    fn nodal_spatial_dim(&self, entity: &XObject, default: (u32, u32)) -> EmitResult<Option<(u32, u32)>> {
        Ok(Some(frame_dimension(property_ndm(entity, default)?)))
    }
}

/// Elastic beam with zero-length shear hinges at both ends.
///
/// Each user element `e = (i, j)` becomes
/// `zeroLength h1 (i, i')`, `elasticBeamColumn e (i', j')` and
/// `zeroLength h2 (j', j)`, where `i'`, `j'` are synthesized nodes co-located
/// with the ends. The hinges are recorded in the cdata remap under `e`.
pub struct BeamWithShearHinge;

impl Emitter for BeamWithShearHinge {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let ndm = property_ndm(entity, scope.doc.default_dimension)?;
        let (_, ndf) = frame_dimension(ndm);
        let section = definition_ref(scope, entity, "section", "sections")?;
        let hinge_material = definition_ref(scope, entity, "hinge_material", "materials.uniaxial")?;
        let direction = if entity.has("hinge_direction") {
            entity.integer("hinge_direction")?
        } else {
            2
        };
        if direction < 1 || direction as u32 > ndf {
            return Err(EmitError::InvalidValue {
                entity: entity.label(),
                attribute: "hinge_direction".into(),
                reason: format!("{} outside 1..={}", direction, ndf),
            });
        }
        let tied: Vec<String> = (1..=ndf as i64)
            .filter(|d| *d != direction)
            .map(|d| d.to_string())
            .collect();
        let tied = tied.join(" ");

        let elements = target_elements(scope, &targets.elements)?;
        for element in &elements {
            require_family(entity, element, ElementFamily::Line2, 0)?;
        }

        ctx.write_description("Elements")?;
        let transformation = LinearTransformation::new(ctx, entity, ndm)?;
        // hinges share one synthesized physical property
        let hinge_property = ctx.next_physical_property_id.allocate();

        emit_partitioned(
            ctx,
            |_, pid| owned(scope, &elements, pid),
            |ctx, _, mine| {
                transformation.write(ctx, (ndm, ndf))?;
                for element in mine {
                    let (i, j) = (element.node_ids[0], element.node_ids[1]);
                    ctx.ensure_same_dimension(i, j)?;
                    if ctx.require_node_dimension(i)? != (ndm, ndf) {
                        return Err(EmitError::WrongProperty {
                            entity: entity.label(),
                            reason: format!("element {} nodes are not ({}, {})", element.id, ndm, ndf),
                        });
                    }

                    let i_aux = ctx.next_node_id.allocate();
                    let j_aux = ctx.next_node_id.allocate();
                    ctx.declare_node(i_aux, scope.doc.node_coords(i)?, ndm, ndf)?;
                    ctx.declare_node(j_aux, scope.doc.node_coords(j)?, ndm, ndf)?;

                    let h1 = ctx.next_element_id.allocate();
                    let h2 = ctx.next_element_id.allocate();
                    ctx.write_line(&format!(
                        "element zeroLength {} {} {} -mat {} -dir {}",
                        h1, i, i_aux, hinge_material.id, direction
                    ))?;
                    ctx.write_line(&format!("equalDOF {} {} {}", i, i_aux, tied))?;
                    ctx.write_line(&format!(
                        "element elasticBeamColumn {} {} {} {} {}",
                        element.id, i_aux, j_aux, section.id, transformation.tag
                    ))?;
                    ctx.write_line(&format!(
                        "element zeroLength {} {} {} -mat {} -dir {}",
                        h2, j_aux, j, hinge_material.id, direction
                    ))?;
                    ctx.write_line(&format!("equalDOF {} {} {}", j, j_aux, tied))?;

                    ctx.map_element(element.id, h1);
                    ctx.map_element(element.id, h2);
                    ctx.map_physical_properties(entity.id, h1, hinge_property);
                    ctx.map_physical_properties(entity.id, h2, hinge_property);
                }
                Ok(())
            },
        )?;
        Ok(())
    }

    fn nodal_spatial_dim(&self, entity: &XObject, default: (u32, u32)) -> EmitResult<Option<(u32, u32)>> {
        Ok(Some(frame_dimension(property_ndm(entity, default)?)))
    }
}
