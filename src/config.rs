//! Static grammar-adjacent tables: directive rules and operator-to-function
//! name maps. Kept separate from [`crate::builtins`] because these tables
//! describe surface syntax, not callable signatures.

/// Per-directive validation rule, consulted by the semantic validator
/// (§4.4 item 1).
pub struct DirectiveRule {
    pub name: &'static str,
    /// Required in a non-module (runnable) file.
    pub required: bool,
    /// Allowed to appear at all in a `@module` file.
    pub allowed_in_module: bool,
}

pub const DIRECTIVES: &[DirectiveRule] = &[
    DirectiveRule { name: "iterations", required: true, allowed_in_module: false },
    DirectiveRule { name: "output", required: true, allowed_in_module: false },
    DirectiveRule { name: "output_file", required: false, allowed_in_module: false },
    DirectiveRule { name: "module", required: false, allowed_in_module: true },
    DirectiveRule { name: "import", required: false, allowed_in_module: true },
];

pub fn directive_rule(name: &str) -> Option<&'static DirectiveRule> {
    DIRECTIVES.iter().find(|d| d.name == name)
}

/// Maps an infix arithmetic operator token to the built-in function it
/// desugars to.
pub fn math_operator_function(op: &str) -> Option<&'static str> {
    match op {
        "+" => Some("add"),
        "-" => Some("subtract"),
        "*" => Some("multiply"),
        "/" => Some("divide"),
        "^" => Some("power"),
        _ => None,
    }
}

/// Maps a comparison operator token to its built-in function.
pub fn comparison_operator_function(op: &str) -> Option<&'static str> {
    match op {
        "==" => Some("__eq__"),
        "!=" => Some("__neq__"),
        ">" => Some("__gt__"),
        "<" => Some("__lt__"),
        ">=" => Some("__gte__"),
        "<=" => Some("__lte__"),
        _ => None,
    }
}

/// Maps a logical operator keyword to its built-in function.
pub fn logical_operator_function(op: &str) -> Option<&'static str> {
    match op {
        "and" => Some("__and__"),
        "or" => Some("__or__"),
        "not" => Some("__not__"),
        _ => None,
    }
}

pub const RESERVED_KEYWORDS: &[&str] =
    &["let", "if", "then", "else", "true", "false", "and", "or", "not", "func", "return"];

/// `[A-Za-z_][A-Za-z0-9_]*`, checked without pulling in the `regex` crate
/// since the rule is this simple.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Non-functional knobs that do not change compiled bytecode semantics:
/// which optimizer passes run, and which pipeline stage to stop after for
/// `--compile <stage>`-style artifact dumps. Loadable from TOML via serde.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub run_copy_propagation: bool,
    pub run_tuple_forwarding: bool,
    pub run_alias_resolution: bool,
    pub run_constant_folding: bool,
    pub run_dead_code_elimination: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            run_copy_propagation: true,
            run_tuple_forwarding: true,
            run_alias_resolution: true,
            run_constant_folding: true,
            run_dead_code_elimination: true,
        }
    }
}
