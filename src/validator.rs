//! Semantic validation (§4.4): directive shape, a strict re-walk of every
//! expression (undefined names, arity, operator/argument types), vector and
//! multi-assignment shape rules, UDF return-path checks, and recursion
//! detection. Runs after type inference and is fatal on the first
//! violation.

use std::collections::{HashMap, HashSet};

use crate::ast::{Expr, Literal, Root, Statement};
use crate::builtins;
use crate::config::{self, directive_rule};
use crate::error::{CompileError, ErrorKind};
use crate::span::Span;
use crate::symbols::SymbolTable;
use crate::types::Type;

const MATH_OPERATORS: &[&str] = &["add", "subtract", "multiply", "divide", "power"];
const LOGICAL_OPERATORS: &[&str] = &["__and__", "__or__", "__not__"];

pub fn validate(table: &SymbolTable) -> Result<(), CompileError> {
    for root in table.processed_asts.values() {
        validate_directives(root)?;
    }
    check_recursion(table)?;

    let mut scope: HashMap<String, Type> = HashMap::new();
    let main_root = table
        .processed_asts
        .get(&table.main_file_path)
        .expect("main file must have been processed by symbol discovery");
    for step in &main_root.execution_steps {
        validate_assignment(step, &mut scope, table, None)?;
    }

    for (fname, func) in &table.user_defined_functions {
        let mut scope: HashMap<String, Type> = HashMap::new();
        for p in &func.params {
            scope.insert(p.name.clone(), resolve_type_name(&p.type_name));
        }
        let mut has_return = false;
        for stmt in &func.ast_body {
            match stmt {
                Statement::Return { values, span } => {
                    has_return = true;
                    validate_return(values, span, func, fname, &scope, table)?;
                }
                _ => validate_assignment(stmt, &mut scope, table, Some(fname.as_str()))?,
            }
        }
        if !has_return {
            return Err(CompileError::at(
                ErrorKind::MissingReturnStatement { func: fname.clone() },
                func.ast_body.first().map(|s| s.span().clone()).unwrap_or_else(|| {
                    Span::point(&func.source_path, 1, 1)
                }),
            ));
        }
    }

    Ok(())
}

fn validate_directives(root: &Root) -> Result<(), CompileError> {
    let mut seen: HashMap<&str, &crate::ast::Directive> = HashMap::new();
    for d in &root.directives {
        let rule = directive_rule(&d.name).ok_or_else(|| {
            CompileError::at(ErrorKind::UnknownDirective { name: d.name.clone() }, d.span.clone())
        })?;
        if let Some(_existing) = seen.insert(&rule.name, d) {
            let kind = if rule.name == "module" {
                ErrorKind::DuplicateModuleDirective
            } else {
                ErrorKind::DuplicateDirective { name: d.name.clone() }
            };
            return Err(CompileError::at(kind, d.span.clone()));
        }
    }

    if root.is_module() {
        let module_directive = seen.get("module").unwrap();
        if module_directive.value.is_some() {
            return Err(CompileError::at(
                ErrorKind::ModuleDirectiveWithValue,
                module_directive.span.clone(),
            ));
        }
        for (name, d) in &seen {
            let rule = directive_rule(name).unwrap();
            if !rule.allowed_in_module {
                return Err(CompileError::at(
                    ErrorKind::DirectiveNotAllowedInModule { name: name.to_string() },
                    d.span.clone(),
                ));
            }
        }
    } else {
        for rule in config::DIRECTIVES {
            if rule.name == "import" || rule.name == "module" {
                continue;
            }
            if rule.required && !seen.contains_key(rule.name) {
                return Err(CompileError::new(
                    ErrorKind::MissingRequiredDirective { name: rule.name },
                    None,
                ));
            }
        }
        if let Some(d) = seen.get("iterations") {
            match &d.value {
                Some(Expr::Literal(Literal::Number(n), _)) if *n > 0.0 && n.fract() == 0.0 => {}
                _ => {
                    return Err(CompileError::at(
                        ErrorKind::InvalidDirectiveValue {
                            name: "iterations".to_string(),
                            detail: "expected a positive integer".to_string(),
                        },
                        d.span.clone(),
                    ));
                }
            }
        }
        if let Some(d) = seen.get("output") {
            if !matches!(&d.value, Some(Expr::Identifier(_, _))) {
                return Err(CompileError::at(
                    ErrorKind::InvalidDirectiveValue {
                        name: "output".to_string(),
                        detail: "expected an identifier".to_string(),
                    },
                    d.span.clone(),
                ));
            }
        }
        if let Some(d) = seen.get("output_file") {
            if !matches!(&d.value, Some(Expr::Literal(Literal::String(_), _))) {
                return Err(CompileError::at(
                    ErrorKind::InvalidDirectiveValue {
                        name: "output_file".to_string(),
                        detail: "expected a string".to_string(),
                    },
                    d.span.clone(),
                ));
            }
        }
    }
    Ok(())
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

fn validate_assignment(
    stmt: &Statement,
    scope: &mut HashMap<String, Type>,
    table: &SymbolTable,
    func: Option<&str>,
) -> Result<(), CompileError> {
    match stmt {
        Statement::LiteralAssignment { targets, value, .. } => {
            scope.insert(targets[0].clone(), literal_type(value));
        }
        Statement::ExecutionAssignment { targets, expr, span } => {
            if matches!(expr, Expr::Tuple(_, _)) {
                let arity = match expr {
                    Expr::Tuple(items, _) => items.len(),
                    _ => unreachable!(),
                };
                return Err(CompileError::at(
                    ErrorKind::AssignmentArityMismatch { targets: targets.len(), values: arity },
                    span.clone(),
                ));
            }
            let t = infer_checked(expr, scope, table, func)?;
            if targets.len() == 1 {
                if let Type::Tuple(_) = t {
                    return Err(CompileError::at(
                        ErrorKind::AssignmentArityMismatch { targets: 1, values: tuple_len(&t) },
                        span.clone(),
                    ));
                }
                scope.insert(targets[0].clone(), t);
            } else {
                bind_multi(targets, t, span, scope)?;
            }
        }
        Statement::MultiAssignment { targets, expr, span } => {
            if matches!(expr, Expr::Tuple(_, _)) {
                let arity = match expr {
                    Expr::Tuple(items, _) => items.len(),
                    _ => unreachable!(),
                };
                return Err(CompileError::at(
                    ErrorKind::AssignmentArityMismatch { targets: targets.len(), values: arity },
                    span.clone(),
                ));
            }
            let t = infer_checked(expr, scope, table, func)?;
            bind_multi(targets, t, span, scope)?;
        }
        Statement::ConditionalAssignment { target, condition, then_expr, else_expr, span } => {
            let cond_t = infer_checked(condition, scope, table, func)?;
            if cond_t != Type::Boolean {
                return Err(CompileError::at(
                    ErrorKind::IfConditionNotBoolean { found: cond_t.to_string() },
                    span.clone(),
                ));
            }
            let then_t = infer_checked(then_expr, scope, table, func)?;
            let else_t = infer_checked(else_expr, scope, table, func)?;
            if then_t != else_t {
                return Err(CompileError::at(
                    ErrorKind::IfElseTypeMismatch {
                        then_type: then_t.to_string(),
                        else_type: else_t.to_string(),
                    },
                    span.clone(),
                ));
            }
            scope.insert(target.clone(), then_t);
        }
        Statement::Return { .. } => {}
    }
    Ok(())
}

fn tuple_len(t: &Type) -> usize {
    match t {
        Type::Tuple(items) => items.len(),
        _ => 1,
    }
}

fn bind_multi(
    targets: &[String],
    t: Type,
    span: &Span,
    scope: &mut HashMap<String, Type>,
) -> Result<(), CompileError> {
    let Type::Tuple(types) = t else {
        return Err(CompileError::at(
            ErrorKind::AssignmentArityMismatch { targets: targets.len(), values: 1 },
            span.clone(),
        ));
    };
    if types.len() != targets.len() {
        return Err(CompileError::at(
            ErrorKind::AssignmentArityMismatch { targets: targets.len(), values: types.len() },
            span.clone(),
        ));
    }
    for (name, ty) in targets.iter().zip(types) {
        scope.insert(name.clone(), ty);
    }
    Ok(())
}

fn validate_return(
    values: &[Expr],
    span: &Span,
    func: &crate::symbols::UserFunction,
    func_name: &str,
    scope: &HashMap<String, Type>,
    table: &SymbolTable,
) -> Result<(), CompileError> {
    if values.len() == 1 && func.return_types.len() == 1 {
        let actual = infer_checked(&values[0], scope, table, Some(func_name))?;
        let expected = resolve_type_name(&func.return_types[0]);
        if actual != expected {
            return Err(CompileError::at(
                ErrorKind::ReturnTypeMismatch {
                    func: func_name.to_string(),
                    expected: expected.to_string(),
                    found: actual.to_string(),
                },
                span.clone(),
            ));
        }
        return Ok(());
    }

    let mut actual_types = Vec::with_capacity(values.len());
    for v in values {
        actual_types.push(infer_checked(v, scope, table, Some(func_name))?);
    }
    if actual_types.len() != func.return_types.len() {
        return Err(CompileError::at(
            ErrorKind::ReturnTypeMismatch {
                func: func_name.to_string(),
                expected: format!("a tuple of {} items", func.return_types.len()),
                found: format!("a tuple of {} items", actual_types.len()),
            },
            span.clone(),
        ));
    }
    for (i, (expected_name, actual)) in func.return_types.iter().zip(&actual_types).enumerate() {
        let expected = resolve_type_name(expected_name);
        if &expected != actual {
            return Err(CompileError::at(
                ErrorKind::ReturnTypeMismatch {
                    func: format!("{func_name} (return item {})", i + 1),
                    expected: expected.to_string(),
                    found: actual.to_string(),
                },
                span.clone(),
            ));
        }
    }
    Ok(())
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Number(_) => Type::Scalar,
        Literal::String(_) => Type::String,
        Literal::Boolean(_) => Type::Boolean,
    }
}

/// Recursively infers an expression's type, raising every validation error
/// the walk can detect along the way. `func` is `None` while walking the
/// main script, `Some(name)` while walking a UDF body (distinguishes the
/// `_IN_FUNC` error variants).
fn infer_checked(
    expr: &Expr,
    scope: &HashMap<String, Type>,
    table: &SymbolTable,
    func: Option<&str>,
) -> Result<Type, CompileError> {
    match expr {
        Expr::Literal(lit, _) => Ok(literal_type(lit)),
        Expr::Identifier(name, span) => {
            if let Some(t) = scope.get(name) {
                return Ok(t.clone());
            }
            if func.is_none() {
                if let Some(g) = table.global_variables.get(name) {
                    return Ok(g.inferred_type.clone().unwrap_or(Type::Any));
                }
            }
            let kind = match func {
                Some(f) => ErrorKind::UndefinedVariableInFunc { name: name.clone(), func: f.to_string() },
                None => ErrorKind::UndefinedVariable { name: name.clone() },
            };
            Err(CompileError::at(kind, span.clone()))
        }
        Expr::Vector(items, span) => {
            let mut item_type: Option<Type> = None;
            for item in items {
                let t = infer_checked(item, scope, table, func)?;
                match &item_type {
                    None => item_type = Some(t),
                    Some(prev) if *prev != t => {
                        return Err(CompileError::at(ErrorKind::MixedTypesInVector, span.clone()));
                    }
                    _ => {}
                }
            }
            Ok(Type::Vector)
        }
        Expr::Tuple(items, _) => {
            let mut types = Vec::with_capacity(items.len());
            for item in items {
                types.push(infer_checked(item, scope, table, func)?);
            }
            Ok(Type::Tuple(types))
        }
        Expr::ElementAccess { target, index, span } => {
            let target_t = infer_checked(target, scope, table, func)?;
            if target_t != Type::Vector {
                return Err(CompileError::at(
                    ErrorKind::ArgumentTypeMismatch {
                        func: "GetElement".to_string(),
                        index: 1,
                        expected: "vector".to_string(),
                        found: target_t.to_string(),
                    },
                    span.clone(),
                ));
            }
            let index_t = infer_checked(index, scope, table, func)?;
            if index_t != Type::Scalar {
                return Err(CompileError::at(
                    ErrorKind::ArgumentTypeMismatch {
                        func: "GetElement".to_string(),
                        index: 2,
                        expected: "scalar".to_string(),
                        found: index_t.to_string(),
                    },
                    span.clone(),
                ));
            }
            Ok(Type::Scalar)
        }
        Expr::DeleteElement { target, index, span } => {
            let target_t = infer_checked(target, scope, table, func)?;
            if target_t != Type::Vector {
                return Err(CompileError::at(
                    ErrorKind::ArgumentTypeMismatch {
                        func: "DeleteElement".to_string(),
                        index: 1,
                        expected: "vector".to_string(),
                        found: target_t.to_string(),
                    },
                    span.clone(),
                ));
            }
            let index_t = infer_checked(index, scope, table, func)?;
            if index_t != Type::Scalar {
                return Err(CompileError::at(
                    ErrorKind::ArgumentTypeMismatch {
                        func: "DeleteElement".to_string(),
                        index: 2,
                        expected: "scalar".to_string(),
                        found: index_t.to_string(),
                    },
                    span.clone(),
                ));
            }
            Ok(Type::Vector)
        }
        Expr::Conditional { condition, then_expr, else_expr, span } => {
            let cond_t = infer_checked(condition, scope, table, func)?;
            if cond_t != Type::Boolean {
                return Err(CompileError::at(
                    ErrorKind::IfConditionNotBoolean { found: cond_t.to_string() },
                    span.clone(),
                ));
            }
            let then_t = infer_checked(then_expr, scope, table, func)?;
            let else_t = infer_checked(else_expr, scope, table, func)?;
            if then_t != else_t {
                return Err(CompileError::at(
                    ErrorKind::IfElseTypeMismatch {
                        then_type: then_t.to_string(),
                        else_type: else_t.to_string(),
                    },
                    span.clone(),
                ));
            }
            Ok(then_t)
        }
        Expr::Call { function, args, span } => {
            let mut arg_types = Vec::with_capacity(args.len());
            for a in args {
                arg_types.push(infer_checked(a, scope, table, func)?);
            }

            if let Some(sig) = builtins::lookup(function) {
                if !sig.variadic && arg_types.len() != sig.arg_types.len() {
                    return Err(CompileError::at(
                        ErrorKind::ArgumentCountMismatch {
                            func: function.clone(),
                            expected: sig.arg_types.len(),
                            found: arg_types.len(),
                        },
                        span.clone(),
                    ));
                }
                if MATH_OPERATORS.contains(&function.as_str()) {
                    for t in &arg_types {
                        if !t.is_numeric() {
                            return Err(CompileError::at(
                                ErrorKind::OperatorTypeMismatch {
                                    op: function.clone(),
                                    found: t.to_string(),
                                },
                                span.clone(),
                            ));
                        }
                    }
                } else if LOGICAL_OPERATORS.contains(&function.as_str()) {
                    for t in &arg_types {
                        if *t != Type::Boolean {
                            return Err(CompileError::at(
                                ErrorKind::LogicalOperatorTypeMismatch {
                                    op: function.clone(),
                                    found: t.to_string(),
                                },
                                span.clone(),
                            ));
                        }
                    }
                } else if !sig.variadic {
                    for (i, (expected, actual)) in sig.arg_types.iter().zip(&arg_types).enumerate() {
                        if !expected.is_any() && expected != actual {
                            return Err(CompileError::at(
                                ErrorKind::ArgumentTypeMismatch {
                                    func: function.clone(),
                                    index: i + 1,
                                    expected: expected.to_string(),
                                    found: actual.to_string(),
                                },
                                span.clone(),
                            ));
                        }
                    }
                }
                Ok(sig.return_type_for(&arg_types))
            } else if let Some(f) = table.user_defined_functions.get(function) {
                if arg_types.len() != f.params.len() {
                    return Err(CompileError::at(
                        ErrorKind::ArgumentCountMismatch {
                            func: function.clone(),
                            expected: f.params.len(),
                            found: arg_types.len(),
                        },
                        span.clone(),
                    ));
                }
                for (i, (param, actual)) in f.params.iter().zip(&arg_types).enumerate() {
                    let expected = resolve_type_name(&param.type_name);
                    if !expected.is_any() && &expected != actual {
                        return Err(CompileError::at(
                            ErrorKind::ArgumentTypeMismatch {
                                func: function.clone(),
                                index: i + 1,
                                expected: expected.to_string(),
                                found: actual.to_string(),
                            },
                            span.clone(),
                        ));
                    }
                }
                if f.return_types.len() == 1 {
                    Ok(resolve_type_name(&f.return_types[0]))
                } else {
                    Ok(Type::Tuple(f.return_types.iter().map(|n| resolve_type_name(n)).collect()))
                }
            } else {
                Err(CompileError::at(ErrorKind::UnknownFunction { name: function.clone() }, span.clone()))
            }
        }
    }
}

/// Builds the static UDF call graph and raises `RECURSIVE_CALL_DETECTED` on
/// the first cycle found.
fn check_recursion(table: &SymbolTable) -> Result<(), CompileError> {
    let mut graph: HashMap<&str, HashSet<&str>> = HashMap::new();
    for (name, func) in &table.user_defined_functions {
        let mut callees = HashSet::new();
        for stmt in &func.ast_body {
            collect_calls(stmt, table, &mut callees);
        }
        graph.insert(name.as_str(), callees);
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_path: Vec<&str> = Vec::new();

    for start in graph.keys() {
        if visited.contains(start) {
            continue;
        }
        if let Some(cycle) = visit(start, &graph, &mut visited, &mut on_path) {
            return Err(CompileError::new(
                ErrorKind::RecursiveCallDetected { cycle: cycle.into_iter().map(str::to_string).collect() },
                None,
            ));
        }
    }
    Ok(())
}

fn visit<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, HashSet<&'a str>>,
    visited: &mut HashSet<&'a str>,
    on_path: &mut Vec<&'a str>,
) -> Option<Vec<&'a str>> {
    on_path.push(node);
    visited.insert(node);
    if let Some(callees) = graph.get(node) {
        for &callee in callees {
            if on_path.contains(&callee) {
                let start = on_path.iter().position(|n| *n == callee).unwrap();
                let mut cycle: Vec<&str> = on_path[start..].to_vec();
                cycle.push(callee);
                return Some(cycle);
            }
            if !visited.contains(callee) {
                if let Some(cycle) = visit(callee, graph, visited, on_path) {
                    return Some(cycle);
                }
            }
        }
    }
    on_path.pop();
    None
}

fn collect_calls<'a>(stmt: &'a Statement, table: &'a SymbolTable, out: &mut HashSet<&'a str>) {
    match stmt {
        Statement::LiteralAssignment { .. } => {}
        Statement::ExecutionAssignment { expr, .. } | Statement::MultiAssignment { expr, .. } => {
            collect_calls_expr(expr, table, out)
        }
        Statement::ConditionalAssignment { condition, then_expr, else_expr, .. } => {
            collect_calls_expr(condition, table, out);
            collect_calls_expr(then_expr, table, out);
            collect_calls_expr(else_expr, table, out);
        }
        Statement::Return { values, .. } => {
            for v in values {
                collect_calls_expr(v, table, out);
            }
        }
    }
}

fn collect_calls_expr<'a>(expr: &'a Expr, table: &'a SymbolTable, out: &mut HashSet<&'a str>) {
    match expr {
        Expr::Literal(_, _) | Expr::Identifier(_, _) => {}
        Expr::Vector(items, _) | Expr::Tuple(items, _) => {
            for i in items {
                collect_calls_expr(i, table, out);
            }
        }
        Expr::ElementAccess { target, index, .. } | Expr::DeleteElement { target, index, .. } => {
            collect_calls_expr(target, table, out);
            collect_calls_expr(index, table, out);
        }
        Expr::Conditional { condition, then_expr, else_expr, .. } => {
            collect_calls_expr(condition, table, out);
            collect_calls_expr(then_expr, table, out);
            collect_calls_expr(else_expr, table, out);
        }
        Expr::Call { function, args, .. } => {
            if let Some(f) = table.user_defined_functions.get_key_value(function.as_str()) {
                out.insert(f.0.as_str());
            }
            for a in args {
                collect_calls_expr(a, table, out);
            }
        }
    }
}
