//! Data-flow integrity check (§4.6): every variable an IR step reads must
//! have been produced by a strictly earlier step (property 1, §8). Run once
//! after IR generation and again after each optimizer pass, since a buggy
//! rewrite could otherwise silently drop a definition or reorder a use
//! ahead of it.

use std::collections::HashSet;

use crate::error::InternalError;
use crate::ir::Ir;

pub fn validate(ir: &Ir) -> Result<(), InternalError> {
    let mut defined: HashSet<&str> = HashSet::new();

    for (i, step) in ir.iter().enumerate() {
        let mut undefined: Vec<String> = step
            .used_variables()
            .into_iter()
            .filter(|v| !defined.contains(v.as_str()))
            .collect();
        if !undefined.is_empty() {
            undefined.sort();
            undefined.dedup();
            return Err(InternalError::new(format!(
                "step {i} uses undefined variable(s) {undefined:?} (step: {step:?})"
            )));
        }
        for r in step.result() {
            defined.insert(r.as_str());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expr, Step};
    use crate::value::ConstValue;

    #[test]
    fn accepts_a_well_ordered_chain() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["a".into()], value: ConstValue::Scalar(1.0), line: 1 },
            Step::ExecutionAssignment {
                result: vec!["b".into()],
                function: "identity".into(),
                args: vec![Expr::var("a")],
                line: 2,
            },
        ];
        assert!(validate(&ir).is_ok());
    }

    #[test]
    fn rejects_a_use_before_definition() {
        let ir = vec![Step::ExecutionAssignment {
            result: vec!["b".into()],
            function: "identity".into(),
            args: vec![Expr::var("a")],
            line: 1,
        }];
        assert!(validate(&ir).is_err());
    }
}
