//! Alias resolution (§4.6 pass 3).
//!
//! After copy propagation and tuple forwarding, the IR still carries simple
//! single-target aliases — most commonly a UDF's return-value
//! materialization, `let x = identity(__temp_3)`, and bare-copy `let`s like
//! `let x = y`. This pass finds the step that produced the aliased value
//! and renames its result to the final name directly, dropping the
//! identity. Unlike copy propagation, this is not restricted to `__`
//! mangled names — it is what restores user-chosen variable names to the
//! final IR.
//!
//! The rename is only safe when `source` is unused beyond the alias itself
//! (spec.md §4.6 pass 3): if some other step still reads `source`, renaming
//! its producer out from under it would leave that read dangling.

use crate::ir::{Expr, Ir};

pub fn run(ir: Ir) -> Ir {
    let mut ir = ir;

    loop {
        let opportunity = ir.iter().enumerate().find_map(|(i, step)| {
            let crate::ir::Step::ExecutionAssignment { result, function, args, .. } = step else {
                return None;
            };
            if function != "identity" || result.len() != 1 || args.len() != 1 {
                return None;
            }
            let Expr::Variable(source) = &args[0] else {
                return None;
            };
            let producer = (0..i)
                .rev()
                .find(|&j| ir[j].result().len() == 1 && ir[j].result()[0] == *source)?;
            if used_elsewhere(&ir, source, i) {
                return None;
            }
            Some((i, producer, result[0].clone()))
        });

        let Some((identity_index, producer_index, target)) = opportunity else {
            break;
        };

        if let Some(result) = ir[producer_index].result_mut() {
            *result = vec![target];
        }
        ir.remove(identity_index);
    }

    ir
}

/// Whether `name` is read by any step other than the one at `except_index`
/// (the alias being resolved).
fn used_elsewhere(ir: &Ir, name: &str, except_index: usize) -> bool {
    ir.iter()
        .enumerate()
        .any(|(k, step)| k != except_index && step.used_variables().contains(&name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Step;
    use crate::value::ConstValue;

    #[test]
    fn renames_the_producer_and_drops_the_alias() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["__temp_1".into()], value: ConstValue::Scalar(7.0), line: 1 },
            Step::ExecutionAssignment {
                result: vec!["x".into()],
                function: "identity".into(),
                args: vec![Expr::var("__temp_1")],
                line: 2,
            },
        ];
        let out = run(ir);
        assert_eq!(
            out,
            vec![Step::LiteralAssignment { result: vec!["x".into()], value: ConstValue::Scalar(7.0), line: 1 }]
        );
    }

    #[test]
    fn chains_through_several_aliases() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["a".into()], value: ConstValue::Scalar(1.0), line: 1 },
            Step::ExecutionAssignment {
                result: vec!["b".into()],
                function: "identity".into(),
                args: vec![Expr::var("a")],
                line: 2,
            },
            Step::ExecutionAssignment {
                result: vec!["c".into()],
                function: "identity".into(),
                args: vec![Expr::var("b")],
                line: 3,
            },
        ];
        let out = run(ir);
        assert_eq!(
            out,
            vec![Step::LiteralAssignment { result: vec!["c".into()], value: ConstValue::Scalar(1.0), line: 1 }]
        );
    }

    #[test]
    fn skips_the_rename_when_the_source_is_still_used_elsewhere() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["y".into()], value: ConstValue::Scalar(5.0), line: 1 },
            Step::ExecutionAssignment {
                result: vec!["x".into()],
                function: "identity".into(),
                args: vec![Expr::var("y")],
                line: 2,
            },
            Step::ExecutionAssignment {
                result: vec!["z".into()],
                function: "add".into(),
                args: vec![Expr::var("y"), Expr::Const(ConstValue::Scalar(1.0))],
                line: 3,
            },
        ];
        let out = run(ir.clone());
        assert_eq!(out, ir);
    }
}
