//! Type inference and stochasticity taint propagation (§4.3).
//!
//! Two nested fixed points: Pass A settles whether each UDF is stochastic;
//! Pass B then assigns a `(Type, is_stochastic)` pair to every variable in
//! the program using those final UDF signatures.

use std::collections::HashMap;

use crate::ast::{Expr, Literal, Statement};
use crate::builtins;
use crate::symbols::SymbolTable;
use crate::types::Type;

#[derive(Debug, Clone, Default)]
struct Scope {
    vars: HashMap<String, (Type, bool)>,
}

impl Scope {
    fn lookup(&self, name: &str) -> Option<&(Type, bool)> {
        self.vars.get(name)
    }
}

pub fn infer(table: &mut SymbolTable) {
    run_pass_a(table);
    run_pass_b(table);
}

/// Pass A: settle every UDF's `is_stochastic` flag to a fixed point.
fn run_pass_a(table: &mut SymbolTable) {
    loop {
        let mut changed = false;
        let names: Vec<String> = table.user_defined_functions.keys().cloned().collect();
        for name in names {
            let is_stochastic = {
                let func = &table.user_defined_functions[&name];
                let mut local_scope = Scope::default();
                for p in &func.params {
                    local_scope.vars.insert(p.name.clone(), (Type::Any, false));
                }
                let mut return_taint = false;
                for stmt in &func.ast_body {
                    match stmt {
                        Statement::Return { values, .. } => {
                            return_taint = values
                                .iter()
                                .any(|v| infer_expr(v, &local_scope, table).1);
                        }
                        _ => apply_statement_recording(stmt, &mut local_scope, table),
                    }
                }
                return_taint
            };
            let func = table.user_defined_functions.get_mut(&name).unwrap();
            if func.is_stochastic != is_stochastic {
                func.is_stochastic = is_stochastic;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Pass B: walk the main script then every UDF body, recording
/// `(type, is_stochastic)` for each assigned variable back into the symbol
/// table (global scope into `global_variables`, UDF locals into
/// `local_types`).
fn run_pass_b(table: &mut SymbolTable) {
    let main_path = table.main_file_path.clone();
    if let Some(root) = table.processed_asts.get(&main_path).cloned() {
        let mut scope = Scope::default();
        for stmt in &root.execution_steps {
            apply_statement_recording(stmt, &mut scope, table);
        }
        for (name, (ty, tainted)) in scope.vars {
            if let Some(g) = table.global_variables.get_mut(&name) {
                g.inferred_type = Some(ty);
                g.is_stochastic = Some(tainted);
            }
        }
    }

    let func_names: Vec<String> = table.user_defined_functions.keys().cloned().collect();
    for fname in func_names {
        let (params, body) = {
            let f = &table.user_defined_functions[&fname];
            (f.params.clone(), f.ast_body.clone())
        };
        let mut scope = Scope::default();
        for p in &params {
            scope.vars.insert(p.name.clone(), (Type::Any, false));
        }
        for stmt in &body {
            apply_statement_recording(stmt, &mut scope, table);
        }
        table.local_types.insert(fname, scope.vars);
    }
}

/// Helper used by both passes: evaluate a statement's RHS and bind its
/// target(s) in `scope`.
fn apply_statement_recording(stmt: &Statement, scope: &mut Scope, table: &SymbolTable) {
    match stmt {
        Statement::LiteralAssignment { targets, value, .. } => {
            let t = literal_type(value);
            scope.vars.insert(targets[0].clone(), (t, false));
        }
        Statement::ExecutionAssignment { targets, expr, .. } => {
            let (t, tainted) = infer_expr(expr, scope, table);
            if targets.len() == 1 {
                scope.vars.insert(targets[0].clone(), (t, tainted));
            } else if let Type::Tuple(types) = t {
                for (name, ty) in targets.iter().zip(types) {
                    scope.vars.insert(name.clone(), (ty, tainted));
                }
            } else {
                for name in targets {
                    scope.vars.insert(name.clone(), (Type::Any, tainted));
                }
            }
        }
        Statement::ConditionalAssignment { target, condition, then_expr, else_expr, .. } => {
            let (_, c_taint) = infer_expr(condition, scope, table);
            let (then_type, then_taint) = infer_expr(then_expr, scope, table);
            let (_, else_taint) = infer_expr(else_expr, scope, table);
            scope.vars.insert(target.clone(), (then_type, c_taint || then_taint || else_taint));
        }
        Statement::MultiAssignment { targets, expr, .. } => {
            let (t, tainted) = infer_expr(expr, scope, table);
            if let Type::Tuple(types) = t {
                for (name, ty) in targets.iter().zip(types) {
                    scope.vars.insert(name.clone(), (ty, tainted));
                }
            } else {
                for name in targets {
                    scope.vars.insert(name.clone(), (Type::Any, tainted));
                }
            }
        }
        Statement::Return { .. } => {}
    }
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Number(_) => Type::Scalar,
        Literal::String(_) => Type::String,
        Literal::Boolean(_) => Type::Boolean,
    }
}

/// Infers `(type, is_stochastic)` for an expression. Undefined identifiers
/// resolve to `(Any, false)` here — that is deliberately not an error; the
/// validator raises `UNDEFINED_VARIABLE` later.
fn infer_expr(expr: &Expr, scope: &Scope, table: &SymbolTable) -> (Type, bool) {
    match expr {
        Expr::Literal(lit, _) => (literal_type(lit), false),
        Expr::Identifier(name, _) => scope
            .lookup(name)
            .cloned()
            .or_else(|| table.global_variables.get(name).map(|g| {
                (g.inferred_type.clone().unwrap_or(Type::Any), g.is_stochastic.unwrap_or(false))
            }))
            .unwrap_or((Type::Any, false)),
        Expr::Vector(_, _) => (Type::Vector, false),
        Expr::Tuple(items, _) => {
            let mut types = Vec::new();
            let mut tainted = false;
            for i in items {
                let (t, s) = infer_expr(i, scope, table);
                types.push(t);
                tainted |= s;
            }
            (Type::Tuple(types), tainted)
        }
        Expr::ElementAccess { target, .. } => {
            let (_, tainted) = infer_expr(target, scope, table);
            (Type::Scalar, tainted)
        }
        Expr::DeleteElement { target, .. } => (Type::Vector, infer_expr(target, scope, table).1),
        Expr::Conditional { condition, then_expr, else_expr, .. } => {
            let (_, ct) = infer_expr(condition, scope, table);
            let (tt, tt_taint) = infer_expr(then_expr, scope, table);
            let (_, et_taint) = infer_expr(else_expr, scope, table);
            (tt, ct || tt_taint || et_taint)
        }
        Expr::Call { function, args, .. } => {
            let mut arg_types = Vec::new();
            let mut arg_tainted = false;
            for a in args {
                let (t, s) = infer_expr(a, scope, table);
                arg_types.push(t);
                arg_tainted |= s;
            }
            let (return_type, own_stochastic) = if let Some(sig) = builtins::lookup(function) {
                (sig.return_type_for(&arg_types), sig.is_stochastic)
            } else if let Some(f) = table.user_defined_functions.get(function) {
                let rt = if f.return_types.len() == 1 {
                    resolve_type_name(&f.return_types[0])
                } else {
                    Type::Tuple(f.return_types.iter().map(|n| resolve_type_name(n)).collect())
                };
                (rt, f.is_stochastic)
            } else {
                (Type::Any, false)
            };
            (return_type, own_stochastic || arg_tainted)
        }
    }
}

fn resolve_type_name(name: &str) -> Type {
    match name {
        "scalar" => Type::Scalar,
        "vector" => Type::Vector,
        "boolean" => Type::Boolean,
        "string" => Type::String,
        _ => Type::Any,
    }
}
