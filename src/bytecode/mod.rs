//! Bytecode generation (§4.8): the final stage of the pipeline, lowering
//! the partitioned IR to a flat instruction stream and packing it with its
//! typed register and constant layout into the final recipe.

mod emitter;
mod lowering;
mod opcodes;
mod recipe;
mod resource_allocator;

pub use opcodes::{OpCode, OperandType};
pub use recipe::{ConstantPools, Instr, Recipe, RegisterCounts, SimulationConfig};

use crate::ast::{Expr as AstExpr, Literal};
use crate::error::InternalError;
use crate::partitioner::Partition;
use crate::symbols::SymbolTable;

pub fn generate(partition: Partition, table: &mut SymbolTable) -> Result<Recipe, InternalError> {
    let simulation_config = read_simulation_config(table)?;
    let lowered = lowering::lower(partition, table)?;
    let allocation = resource_allocator::allocate(&lowered, table)?;
    let (pre_trial_instructions, per_trial_instructions) = emitter::emit(&lowered, &allocation)?;

    let (scalar, vector, boolean, string) = allocation.register_counts;
    Ok(Recipe {
        simulation_config,
        variable_register_counts: RegisterCounts { scalar, vector, boolean, string },
        constants: allocation.constant_pools,
        pre_trial_instructions,
        per_trial_instructions,
    })
}

/// Re-reads `@iterations`/`@output`/`@output_file` from the main file's
/// directives. The semantic validator already guaranteed these are present
/// and well-typed for a runnable script; a failure here means that
/// guarantee was violated, which is this stage's problem, not the user's.
fn read_simulation_config(table: &SymbolTable) -> Result<SimulationConfig, InternalError> {
    let root = table
        .processed_asts
        .get(&table.main_file_path)
        .ok_or_else(|| InternalError::new("main file AST missing during bytecode generation"))?;

    let mut num_trials = None;
    let mut output_variable = None;
    let mut output_file = None;

    for directive in &root.directives {
        match (directive.name.as_str(), &directive.value) {
            ("iterations", Some(AstExpr::Literal(Literal::Number(n), _))) => num_trials = Some(*n as u64),
            ("output", Some(AstExpr::Identifier(name, _))) => output_variable = Some(name.clone()),
            ("output_file", Some(AstExpr::Literal(Literal::String(path), _))) => output_file = Some(path.clone()),
            _ => {}
        }
    }

    Ok(SimulationConfig {
        num_trials: num_trials
            .ok_or_else(|| InternalError::new("missing @iterations directive during bytecode generation"))?,
        output_variable: output_variable
            .ok_or_else(|| InternalError::new("missing @output directive during bytecode generation"))?,
        output_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Directive, Root};
    use crate::ir::Step;
    use crate::span::Span;
    use crate::symbols::GlobalVariable;
    use crate::types::Type;
    use crate::value::ConstValue;
    use std::path::PathBuf;

    #[test]
    fn generates_a_recipe_for_a_single_literal_output() {
        let main = PathBuf::from("main.vs");
        let root = Root {
            file_path: main.clone(),
            imports: Vec::new(),
            directives: vec![
                Directive {
                    name: "iterations".to_string(),
                    value: Some(AstExpr::Literal(Literal::Number(1000.0), Span::point(main.clone(), 1, 1))),
                    span: Span::point(main.clone(), 1, 1),
                },
                Directive {
                    name: "output".to_string(),
                    value: Some(AstExpr::Identifier("result".to_string(), Span::point(main.clone(), 2, 1))),
                    span: Span::point(main.clone(), 2, 1),
                },
            ],
            execution_steps: Vec::new(),
            function_definitions: Vec::new(),
        };
        let mut table = SymbolTable { main_file_path: main.clone(), ..Default::default() };
        table.processed_asts.insert(main.clone(), root);
        table.global_variables.insert("result".to_string(), GlobalVariable {
            line: 3,
            source_path: main,
            inferred_type: Some(Type::Scalar),
            is_stochastic: Some(false),
        });

        let partition = Partition {
            pre_trial_steps: vec![Step::LiteralAssignment {
                result: vec!["result".into()],
                value: ConstValue::Scalar(42.0),
                line: 3,
            }],
            per_trial_steps: Vec::new(),
        };

        let recipe = generate(partition, &mut table).unwrap();
        assert_eq!(recipe.simulation_config.num_trials, 1000);
        assert_eq!(recipe.simulation_config.output_variable, "result");
        assert_eq!(recipe.variable_register_counts.scalar, 1);
        assert_eq!(recipe.constants.scalar, vec![42.0]);
        assert_eq!(recipe.pre_trial_instructions.len(), 1);
        assert!(recipe.per_trial_instructions.is_empty());
    }
}
