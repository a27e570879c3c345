//! IR generation (§4.5): linearizes the validated program, inlining every
//! user-defined function call site. The emitted IR contains only built-in
//! calls, literals, and (mangled) variable references — no UDF call
//! survives.

use crate::ast::{Expr, Literal, Statement};
use crate::ir::{Ir, Step};
use crate::ir::Expr as IrExpr;
use crate::symbols::SymbolTable;
use crate::value::ConstValue;

use std::collections::HashMap;

struct Generator<'a> {
    table: &'a SymbolTable,
    steps: Vec<Step>,
    call_count: HashMap<String, usize>,
    temp_count: usize,
}

pub fn generate_ir(table: &SymbolTable) -> Ir {
    let mut g = Generator { table, steps: Vec::new(), call_count: HashMap::new(), temp_count: 0 };
    let main_root = table
        .processed_asts
        .get(&table.main_file_path)
        .expect("main file must have been processed before IR generation");
    for stmt in &main_root.execution_steps {
        g.process_statement(stmt, None);
    }
    g.steps
}

/// Renders a source-level name under an optional inlining prefix; `None`
/// means the global scope, where names pass through unchanged.
fn renamed(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}{name}"),
        None => name.to_string(),
    }
}

impl Generator<'_> {
    fn fresh_temp(&mut self) -> String {
        self.temp_count += 1;
        format!("__temp_{}", self.temp_count)
    }

    fn process_statement(&mut self, stmt: &Statement, prefix: Option<&str>) {
        match stmt {
            Statement::LiteralAssignment { targets, value, span } => {
                let result = vec![renamed(prefix, &targets[0])];
                self.steps.push(Step::LiteralAssignment {
                    result,
                    value: literal_value(value),
                    line: span.start_line,
                });
            }
            Statement::ExecutionAssignment { targets, expr, span } => {
                let result: Vec<String> = targets.iter().map(|t| renamed(prefix, t)).collect();
                if let Some(name) = udf_call_target(expr, self.table) {
                    let func = self.table.user_defined_functions[&name].clone();
                    let Expr::Call { args, .. } = expr else { unreachable!() };
                    let arg_values: Vec<IrExpr> = args.iter().map(|a| self.process_expr(a, prefix)).collect();
                    self.inline_call(&name, &func, arg_values, result, span.start_line);
                } else {
                    let e = self.process_expr(expr, prefix);
                    self.emit_assignment(result, e, span.start_line);
                }
            }
            Statement::MultiAssignment { targets, expr, span } => {
                let result: Vec<String> = targets.iter().map(|t| renamed(prefix, t)).collect();
                if let Some(name) = udf_call_target(expr, self.table) {
                    let func = self.table.user_defined_functions[&name].clone();
                    let Expr::Call { args, .. } = expr else { unreachable!() };
                    let arg_values: Vec<IrExpr> = args.iter().map(|a| self.process_expr(a, prefix)).collect();
                    self.inline_call(&name, &func, arg_values, result, span.start_line);
                } else {
                    let e = self.process_expr(expr, prefix);
                    self.emit_assignment(result, e, span.start_line);
                }
            }
            Statement::ConditionalAssignment { target, condition, then_expr, else_expr, span } => {
                let c = self.process_expr(condition, prefix);
                let t = self.process_expr(then_expr, prefix);
                let e = self.process_expr(else_expr, prefix);
                self.steps.push(Step::ConditionalAssignment {
                    result: vec![renamed(prefix, target)],
                    condition: c,
                    then_expr: t,
                    else_expr: e,
                    line: span.start_line,
                });
            }
            Statement::Return { .. } => {
                unreachable!("return statements are consumed by UDF inlining, never generated directly")
            }
        }
    }

    /// Every assignment becomes an `ExecutionAssignment`; a bare variable or
    /// literal copy is represented as `identity(value)`, the same idiom the
    /// inliner already uses to materialize parameter bindings.
    fn emit_assignment(&mut self, result: Vec<String>, value: IrExpr, line: usize) {
        let (function, args) = match value {
            IrExpr::Call { function, args } => (function, args),
            other => ("identity".to_string(), vec![other]),
        };
        self.steps.push(Step::ExecutionAssignment { result, function, args, line });
    }

    /// Recursively lowers a source expression to an IR expression, inlining
    /// any UDF call it encounters (including calls nested inside another
    /// UDF's body, to a fixed point — no UDF call can survive).
    fn process_expr(&mut self, expr: &Expr, prefix: Option<&str>) -> IrExpr {
        match expr {
            Expr::Literal(lit, _) => IrExpr::Const(literal_value(lit)),
            Expr::Identifier(name, _) => IrExpr::var(renamed(prefix, name)),
            Expr::Vector(items, _) => {
                let args = items.iter().map(|i| self.process_expr(i, prefix)).collect();
                IrExpr::Call { function: "ComposeVector".to_string(), args }
            }
            Expr::Tuple(items, _) => {
                // Only ever reaches here as a UDF's multi-value return
                // expression; represented the same as a vector of values so
                // downstream mangling/flattening treats it uniformly.
                let args = items.iter().map(|i| self.process_expr(i, prefix)).collect();
                IrExpr::Call { function: "ComposeVector".to_string(), args }
            }
            Expr::ElementAccess { target, index, .. } => {
                let t = self.process_expr(target, prefix);
                let i = self.process_expr(index, prefix);
                IrExpr::Call { function: "GetElement".to_string(), args: vec![t, i] }
            }
            Expr::DeleteElement { target, index, .. } => {
                let t = self.process_expr(target, prefix);
                let i = self.process_expr(index, prefix);
                IrExpr::Call { function: "DeleteElement".to_string(), args: vec![t, i] }
            }
            Expr::Conditional { condition, then_expr, else_expr, .. } => IrExpr::Conditional {
                condition: Box::new(self.process_expr(condition, prefix)),
                then_expr: Box::new(self.process_expr(then_expr, prefix)),
                else_expr: Box::new(self.process_expr(else_expr, prefix)),
            },
            Expr::Call { function, args, span } => {
                if let Some(func) = self.table.user_defined_functions.get(function).cloned() {
                    // A UDF call found while processing a nested expression
                    // (an argument, a condition, a return value): lift it to
                    // a fresh global temporary rather than the caller's own
                    // target, which is reserved for a direct top-level call.
                    let arg_values: Vec<IrExpr> =
                        args.iter().map(|a| self.process_expr(a, prefix)).collect();
                    let temp = self.fresh_temp();
                    self.inline_call(function, &func, arg_values, vec![temp.clone()], span.start_line);
                    IrExpr::var(temp)
                } else {
                    let ir_args = args.iter().map(|a| self.process_expr(a, prefix)).collect();
                    IrExpr::Call { function: function.clone(), args: ir_args }
                }
            }
        }
    }

    /// Inlines one call to UDF `name`: appends its parameter bindings and
    /// mangled body to the IR, then binds its return value(s) into
    /// `final_targets` — the caller's own assignment target(s) for a
    /// direct top-level call, or a single fresh temporary for a call nested
    /// inside another expression.
    fn inline_call(
        &mut self,
        name: &str,
        func: &crate::symbols::UserFunction,
        arg_values: Vec<IrExpr>,
        final_targets: Vec<String>,
        line: usize,
    ) {
        let count = *self.call_count.entry(name.to_string()).and_modify(|c| *c += 1).or_insert(1);
        let prefix = format!("__{name}_{count}__");

        for (param, value) in func.params.iter().zip(arg_values) {
            let mangled = format!("{prefix}{}", param.name);
            self.steps.push(Step::ExecutionAssignment {
                result: vec![mangled],
                function: "identity".to_string(),
                args: vec![value],
                line,
            });
        }

        let mut return_values: Vec<IrExpr> = Vec::new();
        for stmt in &func.ast_body {
            match stmt {
                Statement::Return { values, .. } => {
                    return_values = values.iter().map(|v| self.process_expr(v, Some(&prefix))).collect();
                }
                other => self.process_statement(other, Some(&prefix)),
            }
        }

        if final_targets.len() > 1 {
            // One combined step carrying all N forwardings positionally
            // (result[i] binds args[i]); tuple_forwarding later unwraps it
            // by renaming each return value's own producer in place.
            self.steps.push(Step::ExecutionAssignment {
                result: final_targets,
                function: "identity".to_string(),
                args: return_values,
                line,
            });
        } else {
            self.steps.push(Step::ExecutionAssignment {
                result: final_targets,
                function: "identity".to_string(),
                args: vec![return_values.into_iter().next().expect("UDF always returns at least one value")],
                line,
            });
        }
    }
}

/// If `expr` is a direct call to a user-defined function, its name.
fn udf_call_target(expr: &Expr, table: &SymbolTable) -> Option<String> {
    match expr {
        Expr::Call { function, .. } if table.user_defined_functions.contains_key(function) => {
            Some(function.clone())
        }
        _ => None,
    }
}

fn literal_value(lit: &Literal) -> ConstValue {
    match lit {
        Literal::Number(n) => ConstValue::Scalar(*n),
        Literal::String(s) => ConstValue::String(s.clone()),
        Literal::Boolean(b) => ConstValue::Boolean(*b),
    }
}
