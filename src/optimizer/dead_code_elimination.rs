//! Dead code elimination (§4.6 pass 5).
//!
//! Seeds liveness from the `@output` variable and walks the IR backward:
//! every step whose result is already known live contributes its own inputs
//! to the live set. Because a step's inputs are always defined by a
//! strictly earlier step (property 1, §8), this single backward sweep is
//! enough to reach a fixed point — no worklist needed. Steps with no live
//! result are dropped.
//!
//! Without an `@output` directive (or a main file not yet discovered — this
//! pass is also exercised by the optimizer's unit tests in isolation) there
//! is nothing to anchor liveness to, so the IR passes through unchanged.

use std::collections::HashSet;

use crate::ast::{Expr as AstExpr, Root};
use crate::ir::Ir;
use crate::symbols::SymbolTable;

pub fn run(ir: Ir, table: &SymbolTable) -> Ir {
    let Some(root) = table.processed_asts.get(&table.main_file_path) else {
        return ir;
    };
    let Some(output_var) = output_variable(root) else {
        return ir;
    };

    let mut live: HashSet<String> = HashSet::new();
    live.insert(output_var);

    for step in ir.iter().rev() {
        if step.result().iter().any(|r| live.contains(r)) {
            live.extend(step.used_variables());
        }
    }

    ir.into_iter().filter(|step| step.result().iter().any(|r| live.contains(r))).collect()
}

fn output_variable(root: &Root) -> Option<String> {
    let directive = root.directives.iter().find(|d| d.name == "output")?;
    match &directive.value {
        Some(AstExpr::Identifier(name, _)) => Some(name.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Directive;
    use crate::ir::{Expr, Step};
    use crate::span::Span;
    use crate::value::ConstValue;
    use std::path::PathBuf;

    fn table_with_output(output: &str) -> SymbolTable {
        let main = PathBuf::from("main.vs");
        let root = Root {
            file_path: main.clone(),
            imports: Vec::new(),
            directives: vec![Directive {
                name: "output".to_string(),
                value: Some(AstExpr::Identifier(output.to_string(), Span::point(main.clone(), 1, 1))),
                span: Span::point(main.clone(), 1, 1),
            }],
            execution_steps: Vec::new(),
            function_definitions: Vec::new(),
        };
        let mut table = SymbolTable { main_file_path: main.clone(), ..Default::default() };
        table.processed_asts.insert(main, root);
        table
    }

    #[test]
    fn drops_steps_that_do_not_reach_output() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["dead".into()], value: ConstValue::Scalar(1.0), line: 1 },
            Step::LiteralAssignment { result: vec!["a".into()], value: ConstValue::Scalar(2.0), line: 2 },
            Step::ExecutionAssignment {
                result: vec!["result".into()],
                function: "identity".into(),
                args: vec![Expr::var("a")],
                line: 3,
            },
        ];
        let out = run(ir, &table_with_output("result"));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.result().to_vec() != vec!["dead".to_string()]));
    }

    #[test]
    fn passes_through_unchanged_without_an_output_directive() {
        let ir = vec![Step::LiteralAssignment {
            result: vec!["a".into()],
            value: ConstValue::Scalar(1.0),
            line: 1,
        }];
        let table = SymbolTable { main_file_path: PathBuf::from("main.vs"), ..Default::default() };
        let out = run(ir.clone(), &table);
        assert_eq!(out, ir);
    }
}
