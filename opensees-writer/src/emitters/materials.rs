use crate::context::EmissionContext;
use crate::error::EmitResult;
use crate::models::Targets;
use crate::registry::{Emitter, Scope};
use crate::xobject::XObject;

/// `uniaxialMaterial Elastic tag E eta Eneg`
pub struct UniaxialElastic;

impl Emitter for UniaxialElastic {
    fn emit(&self, ctx: &mut EmissionContext, _: &Scope<'_>, entity: &XObject, _: &Targets) -> EmitResult<()> {
        let e = entity.quantity_scalar("E")?;
        let eta = entity.real_or("eta", 0.0)?;
        let e_neg = if entity.has("Eneg") {
            entity.quantity_scalar("Eneg")?
        } else {
            e
        };

        ctx.write_description("Materials")?;
        let line = format!(
            "uniaxialMaterial Elastic {} {} {} {}",
            entity.id,
            ctx.fmt(e),
            ctx.fmt(eta),
            ctx.fmt(e_neg)
        );
        ctx.write_line(&line)
    }
}

/// `nDMaterial ElasticIsotropic tag E v rho`
pub struct ElasticIsotropic;

impl Emitter for ElasticIsotropic {
    fn emit(&self, ctx: &mut EmissionContext, _: &Scope<'_>, entity: &XObject, _: &Targets) -> EmitResult<()> {
        let e = entity.quantity_scalar("E")?;
        let v = entity.real("v")?;
        let rho = entity.real_or("rho", 0.0)?;

        ctx.write_description("Materials")?;
        let line = format!(
            "nDMaterial ElasticIsotropic {} {} {} {}",
            entity.id,
            ctx.fmt(e),
            ctx.fmt(v),
            ctx.fmt(rho)
        );
        ctx.write_line(&line)
    }
}

/// `nDMaterial ContactMaterial{2D,3D} tag mu G c t`
pub struct ContactMaterial {
    pub command: &'static str,
}

impl Emitter for ContactMaterial {
    fn emit(&self, ctx: &mut EmissionContext, _: &Scope<'_>, entity: &XObject, _: &Targets) -> EmitResult<()> {
        let mu = entity.real("mu")?;
        let g = entity.quantity_scalar("G")?;
        let c = entity.real_or("c", 0.0)?;
        let t = entity.real_or("t", 0.0)?;

        ctx.write_description("Materials")?;
        let line = format!(
            "nDMaterial {} {} {} {} {} {}",
            self.command,
            entity.id,
            ctx.fmt(mu),
            ctx.fmt(g),
            ctx.fmt(c),
            ctx.fmt(t)
        );
        ctx.write_line(&line)
    }
}
