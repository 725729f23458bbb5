//! Built-in emitters
//!
//! Each emitter reads typed attributes from its XObject and writes OpenSees
//! commands through the [`EmissionContext`]. Tags are XObject ids.

pub mod conditions;
pub mod contact;
pub mod elements;
pub mod materials;
pub mod patterns;
pub mod sections;
pub mod time_series;

use crate::context::EmissionContext;
use crate::error::{EmitError, EmitResult};
use crate::models::{ElementFamily, MeshElement};
use crate::registry::{Registry, Scope};
use crate::xobject::XObject;

pub fn register_builtin(registry: &mut Registry) {
    registry.register("materials.uniaxial", "Elastic", Box::new(materials::UniaxialElastic));
    registry.register("materials.nD", "ElasticIsotropic", Box::new(materials::ElasticIsotropic));
    registry.register(
        "materials.nD",
        "ContactMaterial2D",
        Box::new(materials::ContactMaterial { command: "ContactMaterial2D" }),
    );
    registry.register(
        "materials.nD",
        "ContactMaterial3D",
        Box::new(materials::ContactMaterial { command: "ContactMaterial3D" }),
    );
    registry.register("sections", "Elastic", Box::new(sections::ElasticSection));
    registry.register("timeSeries", "Linear", Box::new(time_series::LinearSeries));
    registry.register("timeSeries", "Path", Box::new(time_series::PathSeries));
    registry.register("elements", "truss", Box::new(elements::Truss));
    registry.register("elements", "elasticBeamColumn", Box::new(elements::ElasticBeamColumn));
    registry.register("elements", "BeamWithShearHinge", Box::new(elements::BeamWithShearHinge));
    registry.register("elements.contact", "SimpleContact2D", Box::new(contact::SimpleContact { ndm: 2 }));
    registry.register("elements.contact", "SimpleContact3D", Box::new(contact::SimpleContact { ndm: 3 }));
    registry.register("conditions.restraint", "fix", Box::new(conditions::Fix));
    registry.register("conditions.constraints", "equalDOF", Box::new(conditions::EqualDof));
    registry.register("conditions.mass", "DistributedMass", Box::new(conditions::DistributedMass));
    registry.register("conditions.mass", "NodalMass", Box::new(conditions::NodalMass));
    registry.register("conditions.loads", "NodalForce", Box::new(conditions::NodalForce));
    registry.register("patterns", "Plain", Box::new(patterns::PlainPattern));
}

/// Space-separated formatted values
pub(crate) fn join_values(ctx: &EmissionContext, values: &[f64]) -> String {
    values.iter().map(|v| ctx.fmt(*v)).collect::<Vec<_>>().join(" ")
}

/// Resolve an index attribute pointing at a definition in `namespace`.
pub(crate) fn definition_ref<'a>(
    scope: &Scope<'a>,
    entity: &XObject,
    attribute: &str,
    namespace: &str,
) -> EmitResult<&'a XObject> {
    let id = entity.index(attribute)?;
    let definition = scope.doc.definition(id).ok_or(EmitError::UnknownEntity(id))?;
    if definition.namespace != namespace {
        return Err(EmitError::WrongProperty {
            entity: entity.label(),
            reason: format!(
                "'{}' refers to {} but a {} definition is required",
                attribute,
                definition.label(),
                namespace
            ),
        });
    }
    Ok(definition)
}

pub(crate) fn target_elements<'a>(scope: &Scope<'a>, ids: &[u64]) -> EmitResult<Vec<&'a MeshElement>> {
    ids.iter()
        .map(|id| scope.doc.element(*id).ok_or(EmitError::UnknownElement(*id)))
        .collect()
}

pub(crate) fn require_family(
    entity: &XObject,
    element: &MeshElement,
    family: ElementFamily,
    extra_nodes: usize,
) -> EmitResult<()> {
    if element.family != family || element.extra_nodes.len() != extra_nodes {
        return Err(EmitError::WrongGeometry {
            entity: entity.label(),
            element: element.id,
            reason: format!(
                "expected {:?} with {} extra node(s), got {:?} with {}",
                family,
                extra_nodes,
                element.family,
                element.extra_nodes.len()
            ),
        });
    }
    Ok(())
}

/// Spatial dimension of an element property: the `ndm` attribute or the model default
pub(crate) fn property_ndm(entity: &XObject, default: (u32, u32)) -> EmitResult<u32> {
    if !entity.has("ndm") {
        return Ok(default.0);
    }
    match entity.integer("ndm")? {
        2 => Ok(2),
        3 => Ok(3),
        other => Err(EmitError::InvalidValue {
            entity: entity.label(),
            attribute: "ndm".into(),
            reason: format!("{} is not 2 or 3", other),
        }),
    }
}

/// Turn 1-based dof numbers into a 0/1 mask over `ndf` dofs.
pub(crate) fn dof_mask(entity: &XObject, dofs: &[u64], ndf: u32) -> EmitResult<Vec<u8>> {
    let mut mask = vec![0u8; ndf as usize];
    for &dof in dofs {
        if dof == 0 || dof > ndf as u64 {
            return Err(EmitError::InvalidValue {
                entity: entity.label(),
                attribute: "dofs".into(),
                reason: format!("dof {} outside 1..={}", dof, ndf),
            });
        }
        mask[dof as usize - 1] = 1;
    }
    Ok(mask)
}
