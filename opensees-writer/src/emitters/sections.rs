use crate::context::EmissionContext;
use crate::error::{EmitError, EmitResult};
use crate::models::Targets;
use crate::registry::{Emitter, Scope};
use crate::xobject::XObject;

/// Elastic frame section.
///
/// 2D: `section Elastic tag E A Iz`, 3D: `section Elastic tag E A Iz Iy G J`
pub struct ElasticSection;

impl Emitter for ElasticSection {
    fn emit(&self, ctx: &mut EmissionContext, _: &Scope<'_>, entity: &XObject, _: &Targets) -> EmitResult<()> {
        let dimension = if entity.has("dimension") {
            entity.string("dimension")?
        } else {
            "3D"
        };

        let mut values = vec![
            entity.quantity_scalar("E")?,
            entity.quantity_scalar("A")?,
            entity.quantity_scalar("Iz")?,
        ];
        match dimension {
            "2D" => {}
            "3D" => {
                values.push(entity.quantity_scalar("Iy")?);
                values.push(entity.quantity_scalar("G")?);
                values.push(entity.quantity_scalar("J")?);
            }
            other => {
                return Err(EmitError::InvalidValue {
                    entity: entity.label(),
                    attribute: "dimension".into(),
                    reason: format!("'{}' is not 2D or 3D", other),
                })
            }
        }

        ctx.write_description("Sections")?;
        let line = format!("section Elastic {} {}", entity.id, super::join_values(ctx, &values));
        ctx.write_line(&line)
    }
}
