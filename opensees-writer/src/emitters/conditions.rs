//! Restraints, constraints, masses and nodal loads

use crate::context::{dof_components, EmissionContext};
use crate::error::{EmitError, EmitResult};
use crate::mass::{lump_distributed_mass, DensityField};
use crate::models::Targets;
use crate::partition::emit_partitioned;
use crate::registry::{Emitter, Scope};
use crate::xobject::XObject;

use super::{dof_mask, target_elements};

fn vector3(entity: &XObject, attribute: &str) -> EmitResult<[f64; 3]> {
    match entity.quantity_vector(attribute)? {
        &[x, y, z] => Ok([x, y, z]),
        other => Err(EmitError::InvalidValue {
            entity: entity.label(),
            attribute: attribute.into(),
            reason: format!("expected 3 components, got {}", other.len()),
        }),
    }
}

fn require_nodes(scope: &Scope<'_>, ids: &[u64]) -> EmitResult<()> {
    match ids.iter().find(|id| scope.doc.node(**id).is_none()) {
        Some(id) => Err(EmitError::UnknownNode(*id)),
        None => Ok(()),
    }
}

/// `fix id f1 ... f_ndf`
///
/// Written in every partition holding a copy of the node.
pub struct Fix;

impl Emitter for Fix {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let dofs = entity.index_vector("dofs")?;
        require_nodes(scope, &targets.nodes)?;

        ctx.write_description("Restraints")?;
        emit_partitioned(
            ctx,
            |_, pid| scope.doc.nodes_present_in_partition(&targets.nodes, pid),
            |ctx, _, mine| {
                for node in mine {
                    let (_, ndf) = ctx.require_node_dimension(*node)?;
                    let mask = dof_mask(entity, dofs, ndf)?;
                    let flags: Vec<String> = mask.iter().map(|m| m.to_string()).collect();
                    ctx.write_line(&format!("fix {} {}", node, flags.join(" ")))?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }
}

/// `equalDOF master slave d...` with targets `[master, slave...]`
pub struct EqualDof;

impl Emitter for EqualDof {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let dofs = entity.index_vector("dofs")?;
        let (master, slaves) = match targets.nodes.split_first() {
            Some((master, slaves)) if !slaves.is_empty() => (*master, slaves),
            _ => {
                return Err(EmitError::InvalidValue {
                    entity: entity.label(),
                    attribute: "targets".into(),
                    reason: "needs a master node and at least one slave".into(),
                })
            }
        };
        require_nodes(scope, &targets.nodes)?;

        let (_, ndf) = ctx.require_node_dimension(master)?;
        dof_mask(entity, dofs, ndf)?;
        for slave in slaves {
            ctx.ensure_same_dimension(master, *slave)?;
        }

        let master_partitions = scope.doc.partitions_of_node(master);
        for slave in slaves {
            let pid = scope.doc.node_partition(*slave);
            if !master_partitions.contains(&pid) {
                return Err(EmitError::UnsupportedConfiguration(format!(
                    "{}: master node {} is not in partition {} of slave node {}",
                    entity.label(),
                    master,
                    pid,
                    slave
                )));
            }
        }

        let dof_list: Vec<String> = dofs.iter().map(|d| d.to_string()).collect();
        let dof_list = dof_list.join(" ");
        ctx.write_description("Constraints")?;
        emit_partitioned(
            ctx,
            |_, pid| scope.doc.nodes_in_partition(slaves, pid),
            |ctx, _, mine| {
                for slave in mine {
                    ctx.write_line(&format!("equalDOF {} {} {}", master, slave, dof_list))?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }
}

/// Lumps a (possibly graded) density over the target elements.
///
/// Nothing is written until the context flushes its masses.
pub struct DistributedMass;

impl Emitter for DistributedMass {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let density = entity.real("density")?;
        let field = if entity.has("gradient") {
            let gradient = vector3(entity, "gradient")?;
            let origin = scope
                .doc
                .bounding_box()
                .map(|(min, _)| min)
                .unwrap_or([0.0; 3]);
            DensityField::Linear {
                origin,
                value: density,
                gradient,
            }
        } else {
            DensityField::Uniform(density)
        };

        let mut directions = [true; 3];
        if entity.has("directions") {
            directions = [false; 3];
            for &d in entity.index_vector("directions")? {
                if !(1..=3).contains(&d) {
                    return Err(EmitError::InvalidValue {
                        entity: entity.label(),
                        attribute: "directions".into(),
                        reason: format!("direction {} outside 1..=3", d),
                    });
                }
                directions[d as usize - 1] = true;
            }
        }

        for element in target_elements(scope, &targets.elements)? {
            let coords = element
                .node_ids
                .iter()
                .map(|id| scope.doc.node_coords(*id))
                .collect::<EmitResult<Vec<_>>>()?;
            lump_distributed_mass(
                ctx,
                element.id,
                element.family,
                &element.node_ids,
                &coords,
                &field,
                directions,
            )?;
        }
        Ok(())
    }
}

/// Concentrated mass `[m, m, m, r, r, r]` on every target node.
pub struct NodalMass;

impl Emitter for NodalMass {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let m = entity.quantity_scalar("mass")?;
        let r = entity.real_or("rotational", 0.0)?;
        require_nodes(scope, &targets.nodes)?;
        for node in &targets.nodes {
            ctx.add_mass(*node, [m, m, m, r, r, r]);
        }
        Ok(())
    }
}

/// `load id v...` inside a load pattern, on the primary partition of each node.
pub struct NodalForce;

impl Emitter for NodalForce {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        if scope.pattern.is_none() {
            return Err(EmitError::UnsupportedConfiguration(format!(
                "{} must be listed in a load pattern",
                entity.label()
            )));
        }
        let force = vector3(entity, "force")?;
        let moment = if entity.has("moment") {
            vector3(entity, "moment")?
        } else {
            [0.0; 3]
        };
        require_nodes(scope, &targets.nodes)?;
        let values = [force[0], force[1], force[2], moment[0], moment[1], moment[2]];

        emit_partitioned(
            ctx,
            |_, pid| scope.doc.nodes_in_partition(&targets.nodes, pid),
            |ctx, _, mine| {
                for node in mine {
                    let (ndm, ndf) = ctx.require_node_dimension(*node)?;
                    let components = super::join_values(ctx, &dof_components(values, ndm, ndf));
                    ctx.write_line(&format!("load {} {}", node, components))?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }
}
