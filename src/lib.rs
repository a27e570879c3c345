//! ValuaScript compiler (vsc): turns a `.vs` Monte Carlo simulation script
//! into a recipe of flat bytecode, through eight pipeline stages.
//!
//! Parser -> Symbol Discoverer -> Type Inferrer -> Semantic Validator ->
//! IR Generator -> Optimizer -> Partitioner -> Bytecode Generator.
//!
//! Every stage is a pure `Input -> Result<Output, _>` function; [`compile`]
//! just wires them together in order. A [`CompileError`] means the script
//! is wrong; an [`InternalError`] means this compiler is.

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod config;
pub mod error;
pub mod ir;
pub mod ir_generator;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod partitioner;
pub mod preparse;
pub mod span;
pub mod symbols;
pub mod type_inferrer;
pub mod types;
pub mod validator;
pub mod value;

use std::path::Path;

use config::CompilerConfig;
use error::{CompileError, InternalError};

/// Everything that can go wrong while turning source text into a recipe:
/// either the script is invalid, or a compiler invariant broke.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Compile(CompileError),
    Internal(InternalError),
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<InternalError> for Error {
    fn from(e: InternalError) -> Self {
        Error::Internal(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Compile(e) => write!(f, "{e}"),
            Error::Internal(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

/// Runs the full pipeline against `source`, read from `path`, producing the
/// final [`bytecode::Recipe`]. `path` drives `@import` resolution, so stdin
/// input (no real file) can only compile scripts with no imports.
pub fn compile(source: &str, path: &Path, config: &CompilerConfig) -> Result<bytecode::Recipe, Error> {
    let root = parser::parse(source, path)?;
    let mut table = symbols::discover_symbols(root, path)?;
    type_inferrer::infer(&mut table);
    validator::validate(&table)?;
    let ir = ir_generator::generate_ir(&table);
    let ir = optimizer::optimize(ir, &table, config)?;
    let partition = partitioner::partition(ir);
    let recipe = bytecode::generate(partition, &mut table)?;
    Ok(recipe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn compiles_a_minimal_script_to_a_recipe() {
        let source = "@iterations = 100\n@output = result\nlet result = 42\n";
        let recipe = compile(source, &PathBuf::from("main.vs"), &CompilerConfig::default()).unwrap();
        assert_eq!(recipe.simulation_config.num_trials, 100);
        assert_eq!(recipe.simulation_config.output_variable, "result");
        assert!(recipe.pre_trial_instructions.len() >= 1);
    }

    #[test]
    fn reports_a_compile_error_for_an_undefined_variable() {
        let source = "@iterations = 100\n@output = result\nlet result = missing\n";
        let err = compile(source, &PathBuf::from("main.vs"), &CompilerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
    }
}
