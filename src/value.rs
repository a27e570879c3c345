//! Literal values manipulated by constant folding and resource allocation.
//!
//! This is deliberately a small, closed value representation — it exists so
//! the optimizer can evaluate pure built-ins at compile time without
//! round-tripping through the AST's [`crate::ast::Literal`].

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Boolean(bool),
    String(String),
}

impl ConstValue {
    pub fn type_of(&self) -> Type {
        match self {
            ConstValue::Scalar(_) => Type::Scalar,
            ConstValue::Vector(_) => Type::Vector,
            ConstValue::Boolean(_) => Type::Boolean,
            ConstValue::String(_) => Type::String,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ConstValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ConstValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// The canonical dedup key used by the resource allocator (§4.8(8b)).
    pub fn canonical_key(&self) -> String {
        match self {
            ConstValue::Scalar(v) => format!("s_{v}"),
            ConstValue::Boolean(v) => format!("b_{v}"),
            ConstValue::String(v) => format!("str_{v}"),
            ConstValue::Vector(items) => {
                let joined: Vec<String> = items.iter().map(|v| format!("s_{v}")).collect();
                format!("v_{}", joined.join(","))
            }
        }
    }
}

/// Elementwise broadcast for a binary numeric operator: scalar/scalar,
/// vector/vector of equal length, or scalar broadcast against a vector in
/// either position. Returns `None` when vector lengths disagree.
pub fn elementwise_binary(
    lhs: &ConstValue,
    rhs: &ConstValue,
    op: impl Fn(f64, f64) -> f64,
) -> Option<ConstValue> {
    match (lhs, rhs) {
        (ConstValue::Scalar(a), ConstValue::Scalar(b)) => Some(ConstValue::Scalar(op(*a, *b))),
        (ConstValue::Vector(a), ConstValue::Vector(b)) => {
            if a.len() != b.len() {
                return None;
            }
            Some(ConstValue::Vector(a.iter().zip(b).map(|(x, y)| op(*x, *y)).collect()))
        }
        (ConstValue::Vector(a), ConstValue::Scalar(b)) => {
            Some(ConstValue::Vector(a.iter().map(|x| op(*x, *b)).collect()))
        }
        (ConstValue::Scalar(a), ConstValue::Vector(b)) => {
            Some(ConstValue::Vector(b.iter().map(|y| op(*a, *y)).collect()))
        }
        _ => None,
    }
}

/// Variadic fold of [`elementwise_binary`] over more than two operands,
/// left-to-right, seeded with `identity` (0.0 for `add`, 1.0 for
/// `multiply`).
pub fn elementwise_variadic(
    args: &[ConstValue],
    identity: f64,
    op: impl Fn(f64, f64) -> f64 + Copy,
) -> Option<ConstValue> {
    if args.is_empty() {
        return Some(ConstValue::Scalar(identity));
    }
    let mut acc = args[0].clone();
    for arg in &args[1..] {
        acc = elementwise_binary(&acc, arg, op)?;
    }
    Some(acc)
}
