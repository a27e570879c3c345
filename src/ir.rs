//! The linear intermediate representation produced by the IR generator and
//! threaded through the optimizer, partitioner, and bytecode generator.
//!
//! `Expr` here is deliberately distinct from [`crate::ast::Expr`]: IR
//! expressions reference only built-ins (no UDF calls survive inlining) and
//! gain a `Variable` leaf (a bare name reference, as opposed to the source
//! AST's `Identifier`).

use crate::value::ConstValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(ConstValue),
    Variable(String),
    Call { function: String, args: Vec<Expr> },
    Conditional { condition: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr> },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }
}

/// One step of the linear IR. Order is significant: every step's inputs
/// must be defined by a strictly earlier step (property 1, §8).
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    LiteralAssignment { result: Vec<String>, value: ConstValue, line: usize },
    ExecutionAssignment { result: Vec<String>, function: String, args: Vec<Expr>, line: usize },
    ConditionalAssignment {
        result: Vec<String>,
        condition: Expr,
        then_expr: Expr,
        else_expr: Expr,
        line: usize,
    },
    /// Introduced by lowering (§4.8(8a)); `source` is a single name for a
    /// single-destination copy or a list for a multi-destination one
    /// (before the emitter splits it into one `copy` per destination).
    Copy { result: Vec<String>, source: CopySource, line: usize },
    Jump { target: String, line: usize },
    JumpIfFalse { condition: Expr, target: String, line: usize },
    Label { name: String, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CopySource {
    Single(String),
    Multi(Vec<String>),
}

impl Step {
    pub fn result(&self) -> &[String] {
        match self {
            Step::LiteralAssignment { result, .. }
            | Step::ExecutionAssignment { result, .. }
            | Step::ConditionalAssignment { result, .. }
            | Step::Copy { result, .. } => result,
            Step::Jump { .. } | Step::JumpIfFalse { .. } | Step::Label { .. } => &[],
        }
    }

    pub fn result_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            Step::LiteralAssignment { result, .. }
            | Step::ExecutionAssignment { result, .. }
            | Step::ConditionalAssignment { result, .. }
            | Step::Copy { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Step::LiteralAssignment { line, .. }
            | Step::ExecutionAssignment { line, .. }
            | Step::ConditionalAssignment { line, .. }
            | Step::Copy { line, .. }
            | Step::Jump { line, .. }
            | Step::JumpIfFalse { line, .. }
            | Step::Label { line, .. } => *line,
        }
    }

    /// Every variable name this step *reads*, recursing into nested
    /// expressions. Mirrors the reference IR validator's
    /// `_find_used_variables`.
    pub fn used_variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        match self {
            Step::LiteralAssignment { .. } => {}
            Step::ExecutionAssignment { args, .. } => {
                for a in args {
                    collect_vars(a, &mut out);
                }
            }
            Step::ConditionalAssignment { condition, then_expr, else_expr, .. } => {
                collect_vars(condition, &mut out);
                collect_vars(then_expr, &mut out);
                collect_vars(else_expr, &mut out);
            }
            Step::Copy { source, .. } => match source {
                CopySource::Single(name) => out.push(name.clone()),
                CopySource::Multi(names) => out.extend(names.iter().cloned()),
            },
            Step::Jump { .. } | Step::Label { .. } => {}
            Step::JumpIfFalse { condition, .. } => collect_vars(condition, &mut out),
        }
        out
    }
}

fn collect_vars(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Const(_) => {}
        Expr::Variable(name) => out.push(name.clone()),
        Expr::Call { args, .. } => {
            for a in args {
                collect_vars(a, out);
            }
        }
        Expr::Conditional { condition, then_expr, else_expr } => {
            collect_vars(condition, out);
            collect_vars(then_expr, out);
            collect_vars(else_expr, out);
        }
    }
}

pub type Ir = Vec<Step>;
