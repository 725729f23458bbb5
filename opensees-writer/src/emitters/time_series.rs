use crate::context::EmissionContext;
use crate::error::{EmitError, EmitResult};
use crate::models::Targets;
use crate::registry::{Emitter, Scope};
use crate::xobject::XObject;

/// `timeSeries Linear tag -factor f`
pub struct LinearSeries;

impl Emitter for LinearSeries {
    fn emit(&self, ctx: &mut EmissionContext, _: &Scope<'_>, entity: &XObject, _: &Targets) -> EmitResult<()> {
        let factor = entity.real_or("factor", 1.0)?;
        ctx.write_description("Time series")?;
        let line = format!("timeSeries Linear {} -factor {}", entity.id, ctx.fmt(factor));
        ctx.write_line(&line)
    }
}

/// `timeSeries Path tag -dt dt -values {...} -factor f`
pub struct PathSeries;

impl Emitter for PathSeries {
    fn emit(&self, ctx: &mut EmissionContext, _: &Scope<'_>, entity: &XObject, _: &Targets) -> EmitResult<()> {
        let dt = entity.real("dt")?;
        let values = entity.quantity_vector("values")?;
        let factor = entity.real_or("factor", 1.0)?;
        if dt <= 0.0 {
            return Err(EmitError::InvalidValue {
                entity: entity.label(),
                attribute: "dt".into(),
                reason: "time step must be positive".into(),
            });
        }
        if values.is_empty() {
            return Err(EmitError::InvalidValue {
                entity: entity.label(),
                attribute: "values".into(),
                reason: "path has no values".into(),
            });
        }

        ctx.write_description("Time series")?;
        let line = format!(
            "timeSeries Path {} -dt {} -values {{{}}} -factor {}",
            entity.id,
            ctx.fmt(dt),
            super::join_values(ctx, values),
            ctx.fmt(factor)
        );
        ctx.write_line(&line)
    }
}
