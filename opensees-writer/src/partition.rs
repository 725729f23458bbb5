//! Partition-guarded emission
//!
//! Partitioned runs produce one script executed by every MPI process, so
//! statements owned by a partition are wrapped in
//! `if {$STKO_VAR_process_id == N} { ... }` branches. Partitions are visited
//! in ascending order. The first one with entities opens the `if`, later
//! ones add `elseif` branches, and empty partitions get no branch at all.

use crate::context::EmissionContext;
use crate::error::EmitResult;

pub const PROCESS_ID_VAR: &str = "$STKO_VAR_process_id";

/// Run `select`/`emit` once per partition, wrapping non-empty partitions
/// in process-id guards.
///
/// Returns the partitions that produced output. The active process id is
/// restored afterwards, also when `emit` fails.
pub fn emit_partitioned<T, S, E>(
    ctx: &mut EmissionContext,
    mut select: S,
    mut emit: E,
) -> EmitResult<Vec<usize>>
where
    S: FnMut(&EmissionContext, usize) -> Vec<T>,
    E: FnMut(&mut EmissionContext, usize, &[T]) -> EmitResult<()>,
{
    let original = ctx.process_id();
    let result = run_branches(ctx, &mut select, &mut emit);
    ctx.set_process_id(original)?;
    result
}

fn run_branches<T, S, E>(ctx: &mut EmissionContext, select: &mut S, emit: &mut E) -> EmitResult<Vec<usize>>
where
    S: FnMut(&EmissionContext, usize) -> Vec<T>,
    E: FnMut(&mut EmissionContext, usize, &[T]) -> EmitResult<()>,
{
    let count = ctx.process_count();
    let mut emitted = Vec::new();

    if count == 1 {
        ctx.set_process_id(0)?;
        let items = select(ctx, 0);
        if !items.is_empty() {
            emit(ctx, 0, &items)?;
            emitted.push(0);
        }
        return Ok(emitted);
    }

    for pid in 0..count {
        ctx.set_process_id(pid)?;
        let items = select(ctx, pid);
        if items.is_empty() {
            continue;
        }

        if emitted.is_empty() {
            ctx.write_line(&format!("if {{{} == {}}} {{", PROCESS_ID_VAR, pid))?;
        } else {
            ctx.pop_indent();
            ctx.write_line(&format!("}} elseif {{{} == {}}} {{", PROCESS_ID_VAR, pid))?;
        }
        ctx.push_indent();
        emitted.push(pid);

        if let Err(err) = emit(ctx, pid, &items) {
            ctx.pop_indent();
            return Err(err);
        }
    }

    if !emitted.is_empty() {
        ctx.pop_indent();
        ctx.write_line("}")?;
    }
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmitError;
    use std::collections::BTreeMap;

    fn owned() -> BTreeMap<usize, Vec<u64>> {
        BTreeMap::from([(0, vec![]), (1, vec![5]), (2, vec![7, 8]), (3, vec![])])
    }

    #[test]
    fn test_empty_partitions_get_no_branch() {
        let mut ctx = EmissionContext::new("/tmp");
        ctx.set_process_count(4).unwrap();
        let map = owned();

        let branches = emit_partitioned(
            &mut ctx,
            |_, pid| map[&pid].clone(),
            |ctx, _, ids| {
                for id in ids {
                    ctx.write_line(&format!("fix {} 1 1 1", id))?;
                }
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(branches, vec![1, 2]);
        let expected = "if {$STKO_VAR_process_id == 1} {\n\
                        \tfix 5 1 1 1\n\
                        } elseif {$STKO_VAR_process_id == 2} {\n\
                        \tfix 7 1 1 1\n\
                        \tfix 8 1 1 1\n\
                        }\n";
        assert_eq!(ctx.take_output(), expected);
        assert_eq!(ctx.indent(), "");
    }

    #[test]
    fn test_nested_indentation() {
        let mut ctx = EmissionContext::new("/tmp");
        ctx.set_process_count(2).unwrap();
        ctx.push_indent();
        emit_partitioned(
            &mut ctx,
            |_, pid| vec![pid],
            |ctx, pid, _| ctx.write_line(&format!("puts {}", pid)),
        )
        .unwrap();
        let out = ctx.take_output();
        assert!(out.starts_with("\tif {$STKO_VAR_process_id == 0} {\n\t\tputs 0\n\t} elseif"));
        assert!(out.ends_with("\t\tputs 1\n\t}\n"));
    }

    #[test]
    fn test_single_process_is_unguarded() {
        let mut ctx = EmissionContext::new("/tmp");
        emit_partitioned(&mut ctx, |_, _| vec![1u64], |ctx, _, _| ctx.write_line("fix 1 1")).unwrap();
        assert_eq!(ctx.take_output(), "fix 1 1\n");
    }

    #[test]
    fn test_all_empty_writes_nothing() {
        let mut ctx = EmissionContext::new("/tmp");
        ctx.set_process_count(3).unwrap();
        let branches =
            emit_partitioned(&mut ctx, |_, _| Vec::<u64>::new(), |_, _, _| Ok(())).unwrap();
        assert!(branches.is_empty());
        assert_eq!(ctx.take_output(), "");
    }

    #[test]
    fn test_process_id_restored_on_error() {
        let mut ctx = EmissionContext::new("/tmp");
        ctx.set_process_count(3).unwrap();
        ctx.set_process_id(1).unwrap();
        let result = emit_partitioned(
            &mut ctx,
            |_, pid| vec![pid],
            |_, pid, _| {
                if pid == 2 {
                    Err(EmitError::UnsupportedConfiguration("boom".into()))
                } else {
                    Ok(())
                }
            },
        );
        assert!(result.is_err());
        assert_eq!(ctx.process_id(), 1);
        assert_eq!(ctx.indent(), "");
    }

    #[test]
    fn test_select_sees_active_process() {
        let mut ctx = EmissionContext::new("/tmp");
        ctx.set_process_count(2).unwrap();
        let mut seen = Vec::new();
        emit_partitioned(
            &mut ctx,
            |c, pid| {
                seen.push((c.process_id(), pid));
                Vec::<u64>::new()
            },
            |_, _, _| Ok(()),
        )
        .unwrap();
        assert_eq!(seen, vec![(0, 0), (1, 1)]);
    }
}
