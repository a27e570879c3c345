//! The closed built-in function registry (§6 of the specification).
//!
//! Every name here is reserved: a user-defined function with the same name
//! is rejected at symbol discovery time (`REDEFINE_BUILTIN_FUNCTION`).

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::types::Type;
use crate::value::{ConstValue, elementwise_binary, elementwise_variadic};

/// How a call's return type is computed from its argument types.
pub enum ReturnTypeRule {
    Fixed(Type),
    /// `add`/`subtract`/`multiply`/`divide`/`power` return `vector` if any
    /// argument is a vector, else `scalar`; `identity` returns its single
    /// argument's type verbatim.
    Computed(fn(&[Type]) -> Type),
}

pub struct Signature {
    pub variadic: bool,
    /// Declared fixed argument types; empty for ops whose arity is
    /// variadic/untyped-per-slot (`add`, `multiply`, `ComposeVector`).
    pub arg_types: Vec<Type>,
    pub return_type: ReturnTypeRule,
    pub is_stochastic: bool,
    pub const_folder: Option<fn(&[ConstValue]) -> Option<ConstValue>>,
}

impl Signature {
    pub fn return_type_for(&self, arg_types: &[Type]) -> Type {
        match &self.return_type {
            ReturnTypeRule::Fixed(t) => t.clone(),
            ReturnTypeRule::Computed(f) => f(arg_types),
        }
    }
}

fn math_return_type(types: &[Type]) -> Type {
    if types.iter().any(Type::is_any) {
        Type::Any
    } else if types.iter().any(|t| matches!(t, Type::Vector)) {
        Type::Vector
    } else {
        Type::Scalar
    }
}

fn identity_return_type(types: &[Type]) -> Type {
    types.first().cloned().unwrap_or(Type::Any)
}

fn fold_eq(args: &[ConstValue]) -> Option<ConstValue> {
    Some(ConstValue::Boolean(args[0] == args[1]))
}

fn fold_neq(args: &[ConstValue]) -> Option<ConstValue> {
    Some(ConstValue::Boolean(args[0] != args[1]))
}

fn fold_cmp(args: &[ConstValue], op: fn(f64, f64) -> bool) -> Option<ConstValue> {
    let a = args[0].as_scalar()?;
    let b = args[1].as_scalar()?;
    Some(ConstValue::Boolean(op(a, b)))
}

fn fold_and(args: &[ConstValue]) -> Option<ConstValue> {
    let mut all = true;
    for a in args {
        all &= a.as_boolean()?;
    }
    Some(ConstValue::Boolean(all))
}

fn fold_or(args: &[ConstValue]) -> Option<ConstValue> {
    let mut any = false;
    for a in args {
        any |= a.as_boolean()?;
    }
    Some(ConstValue::Boolean(any))
}

fn fold_not(args: &[ConstValue]) -> Option<ConstValue> {
    Some(ConstValue::Boolean(!args[0].as_boolean()?))
}

fn fold_add(args: &[ConstValue]) -> Option<ConstValue> {
    elementwise_variadic(args, 0.0, |a, b| a + b)
}

fn fold_multiply(args: &[ConstValue]) -> Option<ConstValue> {
    elementwise_variadic(args, 1.0, |a, b| a * b)
}

fn fold_subtract(args: &[ConstValue]) -> Option<ConstValue> {
    elementwise_binary(&args[0], &args[1], |a, b| a - b)
}

fn fold_divide(args: &[ConstValue]) -> Option<ConstValue> {
    // Broadcasting division by a zero element leaves the whole instruction
    // unfolded rather than producing a partial result.
    let has_zero = match &args[1] {
        ConstValue::Scalar(b) => *b == 0.0,
        ConstValue::Vector(bs) => bs.iter().any(|b| *b == 0.0),
        _ => return None,
    };
    if has_zero {
        return None;
    }
    elementwise_binary(&args[0], &args[1], |a, b| a / b)
}

fn fold_power(args: &[ConstValue]) -> Option<ConstValue> {
    elementwise_binary(&args[0], &args[1], f64::powf)
}

fn fold_unary_math(args: &[ConstValue], f: fn(f64) -> f64) -> Option<ConstValue> {
    Some(ConstValue::Scalar(f(args[0].as_scalar()?)))
}

fn fold_log(args: &[ConstValue]) -> Option<ConstValue> {
    let x = args[0].as_scalar()?;
    (x > 0.0).then(|| ConstValue::Scalar(x.ln()))
}

fn fold_log10(args: &[ConstValue]) -> Option<ConstValue> {
    let x = args[0].as_scalar()?;
    (x > 0.0).then(|| ConstValue::Scalar(x.log10()))
}

fn fold_exp(args: &[ConstValue]) -> Option<ConstValue> {
    fold_unary_math(args, f64::exp)
}

fn fold_sin(args: &[ConstValue]) -> Option<ConstValue> {
    fold_unary_math(args, f64::sin)
}

fn fold_cos(args: &[ConstValue]) -> Option<ConstValue> {
    fold_unary_math(args, f64::cos)
}

fn fold_tan(args: &[ConstValue]) -> Option<ConstValue> {
    fold_unary_math(args, f64::tan)
}

pub static SIGNATURES: LazyLock<HashMap<&'static str, Signature>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    m.insert("__eq__", Signature {
        variadic: false,
        arg_types: vec![Type::Any, Type::Any],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(fold_eq),
    });
    m.insert("__neq__", Signature {
        variadic: false,
        arg_types: vec![Type::Any, Type::Any],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(fold_neq),
    });
    m.insert("__gt__", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(|a| fold_cmp(a, |x, y| x > y)),
    });
    m.insert("__lt__", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(|a| fold_cmp(a, |x, y| x < y)),
    });
    m.insert("__gte__", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(|a| fold_cmp(a, |x, y| x >= y)),
    });
    m.insert("__lte__", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(|a| fold_cmp(a, |x, y| x <= y)),
    });
    m.insert("__and__", Signature {
        variadic: true,
        arg_types: vec![Type::Boolean],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(fold_and),
    });
    m.insert("__or__", Signature {
        variadic: true,
        arg_types: vec![Type::Boolean],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(fold_or),
    });
    m.insert("__not__", Signature {
        variadic: false,
        arg_types: vec![Type::Boolean],
        return_type: ReturnTypeRule::Fixed(Type::Boolean),
        is_stochastic: false,
        const_folder: Some(fold_not),
    });

    m.insert("add", Signature {
        variadic: true,
        arg_types: vec![],
        return_type: ReturnTypeRule::Computed(math_return_type),
        is_stochastic: false,
        const_folder: Some(fold_add),
    });
    m.insert("subtract", Signature {
        variadic: false,
        arg_types: vec![Type::Any, Type::Any],
        return_type: ReturnTypeRule::Computed(math_return_type),
        is_stochastic: false,
        const_folder: Some(fold_subtract),
    });
    m.insert("multiply", Signature {
        variadic: true,
        arg_types: vec![],
        return_type: ReturnTypeRule::Computed(math_return_type),
        is_stochastic: false,
        const_folder: Some(fold_multiply),
    });
    m.insert("divide", Signature {
        variadic: false,
        arg_types: vec![Type::Any, Type::Any],
        return_type: ReturnTypeRule::Computed(math_return_type),
        is_stochastic: false,
        const_folder: Some(fold_divide),
    });
    m.insert("power", Signature {
        variadic: false,
        arg_types: vec![Type::Any, Type::Any],
        return_type: ReturnTypeRule::Computed(math_return_type),
        is_stochastic: false,
        const_folder: Some(fold_power),
    });
    m.insert("identity", Signature {
        variadic: false,
        arg_types: vec![Type::Any],
        return_type: ReturnTypeRule::Computed(identity_return_type),
        is_stochastic: false,
        const_folder: None,
    });

    for (name, folder) in [
        ("log", fold_log as fn(&[ConstValue]) -> Option<ConstValue>),
        ("log10", fold_log10),
        ("exp", fold_exp),
        ("sin", fold_sin),
        ("cos", fold_cos),
        ("tan", fold_tan),
    ] {
        m.insert(name, Signature {
            variadic: false,
            arg_types: vec![Type::Scalar],
            return_type: ReturnTypeRule::Fixed(Type::Scalar),
            is_stochastic: false,
            const_folder: Some(folder),
        });
    }

    for (name, arity) in [
        ("Normal", 2),
        ("Lognormal", 2),
        ("Uniform", 2),
        ("Beta", 2),
        ("Pert", 3),
        ("Triangular", 3),
        ("Bernoulli", 1),
    ] {
        m.insert(name, Signature {
            variadic: false,
            arg_types: vec![Type::Scalar; arity],
            return_type: ReturnTypeRule::Fixed(Type::Scalar),
            is_stochastic: true,
            const_folder: None,
        });
    }

    m.insert("Npv", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Vector],
        return_type: ReturnTypeRule::Fixed(Type::Scalar),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("CapitalizeExpenses", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Vector, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Tuple(vec![Type::Scalar, Type::Scalar])),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("BlackScholes", Signature {
        variadic: false,
        arg_types: vec![
            Type::Scalar,
            Type::Scalar,
            Type::Scalar,
            Type::Scalar,
            Type::Scalar,
            Type::String,
        ],
        return_type: ReturnTypeRule::Fixed(Type::Scalar),
        is_stochastic: false,
        const_folder: None,
    });

    m.insert("GrowSerie", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Scalar, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Vector),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("InterpolateSerie", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Scalar, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Vector),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("CompoundSerie", Signature {
        variadic: false,
        arg_types: vec![Type::Scalar, Type::Vector],
        return_type: ReturnTypeRule::Fixed(Type::Vector),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("VectorDelta", Signature {
        variadic: false,
        arg_types: vec![Type::Vector],
        return_type: ReturnTypeRule::Fixed(Type::Vector),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("SumVector", Signature {
        variadic: false,
        arg_types: vec![Type::Vector],
        return_type: ReturnTypeRule::Fixed(Type::Scalar),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("GetElement", Signature {
        variadic: false,
        arg_types: vec![Type::Vector, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Scalar),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("DeleteElement", Signature {
        variadic: false,
        arg_types: vec![Type::Vector, Type::Scalar],
        return_type: ReturnTypeRule::Fixed(Type::Vector),
        is_stochastic: false,
        const_folder: None,
    });
    m.insert("ComposeVector", Signature {
        variadic: true,
        arg_types: vec![Type::Any],
        return_type: ReturnTypeRule::Fixed(Type::Vector),
        is_stochastic: false,
        const_folder: None,
    });

    m
});

pub fn lookup(name: &str) -> Option<&'static Signature> {
    SIGNATURES.get(name)
}

pub fn is_builtin(name: &str) -> bool {
    SIGNATURES.contains_key(name)
}

pub fn is_stochastic_builtin(name: &str) -> bool {
    SIGNATURES.get(name).is_some_and(|s| s.is_stochastic)
}
