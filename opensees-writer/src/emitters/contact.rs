//! Node-to-surface contact with a Lagrange-multiplier node per element

use crate::context::EmissionContext;
use crate::error::EmitResult;
use crate::models::{ElementFamily, MeshElement, Targets};
use crate::partition::emit_partitioned;
use crate::registry::{Emitter, Scope};
use crate::xobject::XObject;

use super::{definition_ref, require_family, target_elements};

/// `SimpleContact2D` / `SimpleContact3D`.
///
/// Target elements carry the master facet as geometry (Line2 in 2D, Quad4 in
/// 3D) and the slave node as their single extra node. Every element gets a
/// synthesized Lagrange-multiplier node declared with (ndm, ndm) at the
/// context's off-model point.
pub struct SimpleContact {
    pub ndm: u32,
}

impl SimpleContact {
    fn master_family(&self) -> ElementFamily {
        if self.ndm == 2 {
            ElementFamily::Line2
        } else {
            ElementFamily::Quad4
        }
    }

    fn command(&self) -> &'static str {
        if self.ndm == 2 {
            "SimpleContact2D"
        } else {
            "SimpleContact3D"
        }
    }
}

impl Emitter for SimpleContact {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, targets: &Targets) -> EmitResult<()> {
        let namespace = "materials.nD";
        let material = definition_ref(scope, entity, "material", namespace)?;
        let g_tol = entity.real("gTol")?;
        let f_tol = entity.real("fTol")?;

        let elements = target_elements(scope, &targets.elements)?;
        for element in &elements {
            require_family(entity, element, self.master_family(), 1)?;
        }

        ctx.write_description("Contact elements")?;
        let ndm = self.ndm;
        emit_partitioned(
            ctx,
            |_, pid| {
                elements
                    .iter()
                    .copied()
                    .filter(|e| scope.doc.element_partition(e.id) == pid)
                    .collect::<Vec<&MeshElement>>()
            },
            |ctx, _, mine| {
                for element in mine {
                    let slave = element.extra_nodes[0];
                    for master in &element.node_ids {
                        ctx.ensure_same_dimension(*master, slave)?;
                    }

                    let lagrange = ctx.next_node_id.allocate();
                    let point = ctx.lagrangian_node_coordinates;
                    ctx.declare_node(lagrange, point, ndm, ndm)?;

                    let nodes: Vec<String> = element.all_nodes().map(|n| n.to_string()).collect();
                    let line = format!(
                        "element {} {} {} {} {} {} {}",
                        self.command(),
                        element.id,
                        nodes.join(" "),
                        lagrange,
                        material.id,
                        ctx.fmt(g_tol),
                        ctx.fmt(f_tol)
                    );
                    ctx.write_line(&line)?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }

    fn nodal_spatial_dim(&self, _entity: &XObject, _default: (u32, u32)) -> EmitResult<Option<(u32, u32)>> {
        Ok(Some((self.ndm, self.ndm)))
    }
}
