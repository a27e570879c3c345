//! The closed type system ValuaScript values can carry.

use std::fmt;

/// A ValuaScript type. `Any` is an inference placeholder only: it can appear
/// while types are being resolved (e.g. a forward reference to an undefined
/// name) but must never reach the final recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar,
    Vector,
    Boolean,
    String,
    Any,
    /// The type of a multi-return function call or a `let a, b = ...`
    /// target list.
    Tuple(Vec<Type>),
}

impl Type {
    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Scalar | Type::Vector)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar => write!(f, "scalar"),
            Type::Vector => write!(f, "vector"),
            Type::Boolean => write!(f, "boolean"),
            Type::String => write!(f, "string"),
            Type::Any => write!(f, "any"),
            Type::Tuple(types) => {
                write!(f, "(")?;
                for (i, t) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
        }
    }
}
