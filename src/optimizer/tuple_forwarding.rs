//! Tuple forwarding (§4.6 pass 2).
//!
//! A UDF call assigned to more than one target (`let a, b = f(x)`) is
//! inlined as one combined step: `a, b = identity(ret0, ret1)`, positional
//! by index. When a `ret_i` is a bare variable reference, this pass renames
//! that variable's own producing step to bind `target_i` directly and drops
//! the combined identity step — the same idea as alias resolution, applied
//! element-by-element to a multi-target binding.
//!
//! Each element is only forwarded when its source is unused beyond the
//! combined identity (spec.md §4.6 pass 2), mirroring alias resolution's
//! precondition. This is checked for every element before any step is
//! mutated, so a single unsafe element leaves the whole combined step
//! untouched rather than renaming some producers and not others.

use crate::ir::{Expr, Ir, Step};

pub fn run(ir: Ir) -> Ir {
    let mut ir = ir;

    loop {
        let opportunity = ir.iter().enumerate().find_map(|(i, step)| match step {
            Step::ExecutionAssignment { result, function, args, .. }
                if function == "identity" && result.len() > 1 && result.len() == args.len() =>
            {
                let pairs: Option<Vec<(String, String)>> = result
                    .iter()
                    .zip(args)
                    .map(|(target, arg)| match arg {
                        Expr::Variable(source) => Some((target.clone(), source.clone())),
                        _ => None,
                    })
                    .collect();
                pairs.map(|pairs| (i, pairs))
            }
            _ => None,
        });

        let Some((identity_index, pairs)) = opportunity else {
            break;
        };

        let producers: Option<Vec<usize>> = pairs
            .iter()
            .map(|(_, source)| {
                let j = (0..identity_index)
                    .rev()
                    .find(|&j| ir[j].result().len() == 1 && ir[j].result()[0] == *source)?;
                if used_elsewhere(&ir, source, identity_index) {
                    return None;
                }
                Some(j)
            })
            .collect();

        // No single-result, exclusively-used producer for every element;
        // leave the combined step alone rather than dropping a binding we
        // can't prove is safe to forward.
        let Some(producers) = producers else {
            break;
        };

        for ((target, _), j) in pairs.iter().zip(producers) {
            if let Some(result) = ir[j].result_mut() {
                *result = vec![target.clone()];
            }
        }

        ir.remove(identity_index);
    }

    ir
}

/// Whether `name` is read by any step other than the one at `except_index`
/// (the combined identity being resolved).
fn used_elsewhere(ir: &Ir, name: &str, except_index: usize) -> bool {
    ir.iter()
        .enumerate()
        .any(|(k, step)| k != except_index && step.used_variables().contains(&name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ConstValue;

    #[test]
    fn forwards_each_return_value_to_its_producer() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["__t0".into()], value: ConstValue::Scalar(1.0), line: 1 },
            Step::LiteralAssignment { result: vec!["__t1".into()], value: ConstValue::Scalar(2.0), line: 2 },
            Step::ExecutionAssignment {
                result: vec!["a".into(), "b".into()],
                function: "identity".into(),
                args: vec![Expr::var("__t0"), Expr::var("__t1")],
                line: 3,
            },
        ];
        let out = run(ir);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].result().to_vec(), vec!["a".to_string()]);
        assert_eq!(out[1].result().to_vec(), vec!["b".to_string()]);
    }

    #[test]
    fn leaves_single_target_identities_alone() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["a".into()],
            function: "identity".into(),
            args: vec![Expr::var("x")],
            line: 1,
        }];
        let out = run(ir.clone());
        assert_eq!(out, ir);
    }

    #[test]
    fn skips_forwarding_when_a_return_value_is_still_used_in_the_body() {
        let ir = vec![
            Step::ExecutionAssignment {
                result: vec!["a".into()],
                function: "multiply".into(),
                args: vec![Expr::var("input"), Expr::Const(ConstValue::Scalar(2.0))],
                line: 1,
            },
            Step::ExecutionAssignment {
                result: vec!["b".into()],
                function: "add".into(),
                args: vec![Expr::var("a"), Expr::Const(ConstValue::Scalar(1.0))],
                line: 2,
            },
            Step::ExecutionAssignment {
                result: vec!["__ret0".into(), "__ret1".into()],
                function: "identity".into(),
                args: vec![Expr::var("a"), Expr::var("b")],
                line: 3,
            },
        ];
        let out = run(ir.clone());
        assert_eq!(out, ir);
    }
}
