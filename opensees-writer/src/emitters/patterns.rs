use crate::context::EmissionContext;
use crate::error::{EmitError, EmitResult};
use crate::models::Targets;
use crate::registry::{Emitter, Scope};
use crate::xobject::XObject;

use super::definition_ref;

/// `pattern Plain tag tsTag { ... }`
///
/// The body holds every condition listed in the `conditions` attribute,
/// dispatched through the registry with the pattern as enclosing scope.
pub struct PlainPattern;

impl Emitter for PlainPattern {
    fn emit(&self, ctx: &mut EmissionContext, scope: &Scope<'_>, entity: &XObject, _: &Targets) -> EmitResult<()> {
        let series = definition_ref(scope, entity, "time_series", "timeSeries")?;
        let listed = entity.index_vector("conditions")?;
        let conditions = listed
            .iter()
            .map(|id| scope.doc.condition(*id).ok_or(EmitError::UnknownEntity(*id)))
            .collect::<EmitResult<Vec<_>>>()?;

        ctx.write_description("Load patterns")?;
        ctx.write_line(&format!("pattern Plain {} {} {{", entity.id, series.id))?;
        ctx.push_indent();
        let inner = scope.within_pattern(entity.id);
        let result = conditions
            .iter()
            .try_for_each(|c| scope.registry.emit_in(ctx, &inner, &c.xobject, &c.targets));
        ctx.pop_indent();
        result?;
        ctx.write_line("}")
    }
}
