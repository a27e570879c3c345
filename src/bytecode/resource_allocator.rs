//! Resource allocation (§4.8(8b)): scans the fully lowered IR and assigns
//! every variable a typed register index and every literal a deduplicated
//! slot in its type's constant pool.

use std::collections::HashMap;

use crate::error::InternalError;
use crate::ir::{Expr, Step};
use crate::symbols::SymbolTable;
use crate::types::Type;
use crate::value::ConstValue;

use super::lowering::{variable_info, LoweredIr};
use super::recipe::ConstantPools;

pub struct Allocation {
    pub variable_map: HashMap<String, (Type, u32)>,
    pub constant_map: HashMap<String, (Type, u32)>,
    pub register_counts: (u32, u32, u32, u32), // scalar, vector, boolean, string
    pub constant_pools: ConstantPools,
}

pub fn allocate(lowered: &LoweredIr, table: &SymbolTable) -> Result<Allocation, InternalError> {
    let mut constant_map = HashMap::new();
    let mut constant_pools = ConstantPools::default();

    for step in lowered.pre_trial_steps.iter().chain(lowered.per_trial_steps.iter()) {
        find_literals_in_step(step, &mut constant_map, &mut constant_pools);
    }

    let (variable_map, register_counts) = allocate_variables(lowered, table)?;

    Ok(Allocation { variable_map, constant_map, register_counts, constant_pools })
}

fn find_literals_in_step(step: &Step, map: &mut HashMap<String, (Type, u32)>, pools: &mut ConstantPools) {
    match step {
        Step::LiteralAssignment { value, .. } => register_constant(value, map, pools),
        Step::ExecutionAssignment { args, .. } => {
            for a in args {
                find_literals_in_expr(a, map, pools);
            }
        }
        Step::JumpIfFalse { condition, .. } => find_literals_in_expr(condition, map, pools),
        Step::ConditionalAssignment { condition, then_expr, else_expr, .. } => {
            find_literals_in_expr(condition, map, pools);
            find_literals_in_expr(then_expr, map, pools);
            find_literals_in_expr(else_expr, map, pools);
        }
        Step::Copy { .. } | Step::Jump { .. } | Step::Label { .. } => {}
    }
}

fn find_literals_in_expr(expr: &Expr, map: &mut HashMap<String, (Type, u32)>, pools: &mut ConstantPools) {
    match expr {
        Expr::Const(value) => register_constant(value, map, pools),
        Expr::Variable(_) => {}
        Expr::Call { args, .. } => {
            for a in args {
                find_literals_in_expr(a, map, pools);
            }
        }
        Expr::Conditional { condition, then_expr, else_expr } => {
            find_literals_in_expr(condition, map, pools);
            find_literals_in_expr(then_expr, map, pools);
            find_literals_in_expr(else_expr, map, pools);
        }
    }
}

fn register_constant(value: &ConstValue, map: &mut HashMap<String, (Type, u32)>, pools: &mut ConstantPools) {
    let key = value.canonical_key();
    if map.contains_key(&key) {
        return;
    }
    let (ty, index) = match value {
        ConstValue::Scalar(v) => {
            pools.scalar.push(*v);
            (Type::Scalar, pools.scalar.len() - 1)
        }
        ConstValue::Vector(items) => {
            pools.vector.push(items.clone());
            (Type::Vector, pools.vector.len() - 1)
        }
        ConstValue::Boolean(v) => {
            pools.boolean.push(*v);
            (Type::Boolean, pools.boolean.len() - 1)
        }
        ConstValue::String(v) => {
            pools.string.push(v.clone());
            (Type::String, pools.string.len() - 1)
        }
    };
    map.insert(key, (ty, index as u32));
}

fn allocate_variables(
    lowered: &LoweredIr,
    table: &SymbolTable,
) -> Result<(HashMap<String, (Type, u32)>, (u32, u32, u32, u32)), InternalError> {
    let mut all_names: Vec<&str> = Vec::new();
    for step in lowered.pre_trial_steps.iter().chain(lowered.per_trial_steps.iter()) {
        for r in step.result() {
            all_names.push(r.as_str());
        }
    }
    all_names.sort_unstable();
    all_names.dedup();

    let mut scalars = Vec::new();
    let mut vectors = Vec::new();
    let mut booleans = Vec::new();
    let mut strings = Vec::new();

    for name in all_names {
        let (ty, _) = variable_info(table, name)?;
        match ty {
            Type::Scalar => scalars.push(name),
            Type::Vector => vectors.push(name),
            Type::Boolean => booleans.push(name),
            Type::String => strings.push(name),
            other => {
                return Err(InternalError::new(format!(
                    "variable '{name}' resolved to non-register type {other} during resource allocation"
                )));
            }
        }
    }
    scalars.sort_unstable();
    vectors.sort_unstable();
    booleans.sort_unstable();
    strings.sort_unstable();

    let mut variable_map = HashMap::new();
    for (i, name) in scalars.iter().enumerate() {
        variable_map.insert(name.to_string(), (Type::Scalar, i as u32));
    }
    for (i, name) in vectors.iter().enumerate() {
        variable_map.insert(name.to_string(), (Type::Vector, i as u32));
    }
    for (i, name) in booleans.iter().enumerate() {
        variable_map.insert(name.to_string(), (Type::Boolean, i as u32));
    }
    for (i, name) in strings.iter().enumerate() {
        variable_map.insert(name.to_string(), (Type::String, i as u32));
    }

    let counts = (scalars.len() as u32, vectors.len() as u32, booleans.len() as u32, strings.len() as u32);
    Ok((variable_map, counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::GlobalVariable;
    use std::path::PathBuf;

    fn table_with(vars: &[(&str, Type)]) -> SymbolTable {
        let mut table = SymbolTable { main_file_path: PathBuf::from("main.vs"), ..Default::default() };
        for (name, ty) in vars {
            table.global_variables.insert((*name).to_string(), GlobalVariable {
                line: 1,
                source_path: PathBuf::from("main.vs"),
                inferred_type: Some(ty.clone()),
                is_stochastic: Some(false),
            });
        }
        table
    }

    #[test]
    fn dedups_a_repeated_literal_across_steps() {
        let lowered = LoweredIr {
            pre_trial_steps: vec![
                Step::LiteralAssignment { result: vec!["a".into()], value: ConstValue::Scalar(1.0), line: 1 },
                Step::LiteralAssignment { result: vec!["b".into()], value: ConstValue::Scalar(1.0), line: 2 },
            ],
            per_trial_steps: Vec::new(),
        };
        let table = table_with(&[("a", Type::Scalar), ("b", Type::Scalar)]);
        let allocation = allocate(&lowered, &table).unwrap();
        assert_eq!(allocation.constant_pools.scalar, vec![1.0]);
        assert_eq!(allocation.register_counts, (2, 0, 0, 0));
    }

    #[test]
    fn assigns_each_variable_a_stable_sorted_index() {
        let lowered = LoweredIr {
            pre_trial_steps: vec![
                Step::LiteralAssignment { result: vec!["zeta".into()], value: ConstValue::Scalar(1.0), line: 1 },
                Step::LiteralAssignment { result: vec!["alpha".into()], value: ConstValue::Scalar(2.0), line: 2 },
            ],
            per_trial_steps: Vec::new(),
        };
        let table = table_with(&[("zeta", Type::Scalar), ("alpha", Type::Scalar)]);
        let allocation = allocate(&lowered, &table).unwrap();
        assert_eq!(allocation.variable_map["alpha"], (Type::Scalar, 0));
        assert_eq!(allocation.variable_map["zeta"], (Type::Scalar, 1));
    }
}
