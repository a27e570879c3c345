//! IR optimization (§4.6): five passes run in a fixed order, each followed
//! by an [`ir_validator`] re-check. A pass that finds nothing to do is a
//! no-op, so running all five unconditionally on an already-clean IR is
//! always safe.
//!
//! Order matters: copy propagation clears out parameter-binding temporaries
//! before tuple forwarding and alias resolution try to collapse UDF return
//! plumbing, constant folding benefits from running after both (fewer
//! indirections to see through), and dead code elimination runs last so it
//! sees the fully-simplified dependency graph.

mod alias_resolution;
mod constant_folding;
mod copy_propagation;
mod dead_code_elimination;
mod ir_validator;
mod tuple_forwarding;

use crate::config::CompilerConfig;
use crate::error::InternalError;
use crate::ir::Ir;
use crate::symbols::SymbolTable;

pub use ir_validator::validate;

pub fn optimize(ir: Ir, table: &SymbolTable, config: &CompilerConfig) -> Result<Ir, InternalError> {
    let mut ir = ir;
    validate(&ir)?;

    if config.run_copy_propagation {
        ir = copy_propagation::run(ir);
        validate(&ir)?;
    }
    if config.run_tuple_forwarding {
        ir = tuple_forwarding::run(ir);
        validate(&ir)?;
    }
    if config.run_alias_resolution {
        ir = alias_resolution::run(ir);
        validate(&ir)?;
    }
    if config.run_constant_folding {
        ir = constant_folding::run(ir);
        validate(&ir)?;
    }
    if config.run_dead_code_elimination {
        ir = dead_code_elimination::run(ir, table);
        validate(&ir)?;
    }

    Ok(ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expr, Step};
    use crate::value::ConstValue;
    use std::path::PathBuf;

    fn table() -> SymbolTable {
        SymbolTable { main_file_path: PathBuf::from("main.vs"), ..Default::default() }
    }

    #[test]
    fn empty_ir_is_a_no_op() {
        let result = optimize(Vec::new(), &table(), &CompilerConfig::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn pipeline_runs_all_passes_and_folds_constants() {
        let ir = vec![
            Step::LiteralAssignment { result: vec!["a".into()], value: ConstValue::Scalar(2.0), line: 1 },
            Step::LiteralAssignment { result: vec!["b".into()], value: ConstValue::Scalar(3.0), line: 2 },
            Step::ExecutionAssignment {
                result: vec!["c".into()],
                function: "add".into(),
                args: vec![Expr::var("a"), Expr::var("b")],
                line: 3,
            },
        ];
        let out = optimize(ir, &table(), &CompilerConfig::default()).unwrap();
        assert!(out.iter().any(|s| matches!(
            s,
            Step::LiteralAssignment { result, value: ConstValue::Scalar(v), .. }
                if result == &["c".to_string()] && *v == 5.0
        )));
    }
}
