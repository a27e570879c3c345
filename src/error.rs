//! Compiler error model.
//!
//! [`CompileError`] is the only way a user-visible failure leaves the
//! pipeline. It carries a closed [`ErrorKind`], an optional [`Span`], and
//! renders to a single line. [`InternalError`] is deliberately a distinct
//! type: it signals a compiler bug (a broken invariant), never a mistake in
//! the user's script, and must never be converted into a [`CompileError`].

use std::fmt;

use crate::span::Span;

/// Closed enumeration of every user-visible failure the pipeline can
/// produce. Each variant carries exactly the data its message needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // --- Syntax ---
    MissingValueAfterEquals,
    IncompleteAssignment,
    UnmatchedBracket { bracket: char },
    UnclosedString,
    ReservedKeywordAsIdentifier { name: String },
    InvalidIdentifier { name: String },
    UnexpectedToken { expected: String, found: String },
    InvalidCharacter { ch: char },
    ParsingError { detail: String },

    // --- Directives ---
    MissingRequiredDirective { name: &'static str },
    UnknownDirective { name: String },
    DuplicateDirective { name: String },
    InvalidDirectiveValue { name: String, detail: String },
    DirectiveNotAllowedInModule { name: String },
    ModuleDirectiveWithValue,
    DuplicateModuleDirective,

    // --- Module / import ---
    GlobalLetInModule,
    ImportFileNotFound { path: String },
    ImportNotAModule { path: String },
    CircularImport { cycle: Vec<String> },
    CannotImportFromStdin,

    // --- Definition / scope ---
    UndefinedVariable { name: String },
    UndefinedVariableInFunc { name: String, func: String },
    DuplicateVariable { name: String },
    DuplicateVariableInFunc { name: String, func: String },
    DuplicateFunction { name: String, other_file: String },
    RedefineBuiltinFunction { name: String },
    FunctionNameCollision { name: String, other_file: String },
    MixedTypesInVector,
    AssignmentArityMismatch { targets: usize, values: usize },

    // --- Call / type ---
    UnknownFunction { name: String },
    ArgumentCountMismatch { func: String, expected: usize, found: usize },
    ArgumentTypeMismatch { func: String, index: usize, expected: String, found: String },
    ReturnTypeMismatch { func: String, expected: String, found: String },
    MissingReturnStatement { func: String },
    IfConditionNotBoolean { found: String },
    IfElseTypeMismatch { then_type: String, else_type: String },
    OperatorTypeMismatch { op: String, found: String },
    LogicalOperatorTypeMismatch { op: String, found: String },

    // --- Recursion ---
    RecursiveCallDetected { cycle: Vec<String> },
}

impl ErrorKind {
    /// Stable, machine-checkable code, independent of the rendered message.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::MissingValueAfterEquals => "SYNTAX_MISSING_VALUE_AFTER_EQUALS",
            ErrorKind::IncompleteAssignment => "SYNTAX_INCOMPLETE_ASSIGNMENT",
            ErrorKind::UnmatchedBracket { .. } => "SYNTAX_UNMATCHED_BRACKET",
            ErrorKind::UnclosedString => "SYNTAX_UNCLOSED_STRING",
            ErrorKind::ReservedKeywordAsIdentifier { .. } => "SYNTAX_RESERVED_KEYWORD_AS_IDENTIFIER",
            ErrorKind::InvalidIdentifier { .. } => "SYNTAX_INVALID_IDENTIFIER",
            ErrorKind::UnexpectedToken { .. } => "SYNTAX_UNEXPECTED_TOKEN",
            ErrorKind::InvalidCharacter { .. } => "SYNTAX_INVALID_CHARACTER",
            ErrorKind::ParsingError { .. } => "SYNTAX_PARSING_ERROR",
            ErrorKind::MissingRequiredDirective { .. } => "MISSING_REQUIRED_DIRECTIVE",
            ErrorKind::UnknownDirective { .. } => "UNKNOWN_DIRECTIVE",
            ErrorKind::DuplicateDirective { .. } => "DUPLICATE_DIRECTIVE",
            ErrorKind::InvalidDirectiveValue { .. } => "INVALID_DIRECTIVE_VALUE",
            ErrorKind::DirectiveNotAllowedInModule { .. } => "DIRECTIVE_NOT_ALLOWED_IN_MODULE",
            ErrorKind::ModuleDirectiveWithValue => "MODULE_DIRECTIVE_WITH_VALUE",
            ErrorKind::DuplicateModuleDirective => "DUPLICATE_MODULE_DIRECTIVE",
            ErrorKind::GlobalLetInModule => "GLOBAL_LET_IN_MODULE",
            ErrorKind::ImportFileNotFound { .. } => "IMPORT_FILE_NOT_FOUND",
            ErrorKind::ImportNotAModule { .. } => "IMPORT_NOT_A_MODULE",
            ErrorKind::CircularImport { .. } => "CIRCULAR_IMPORT",
            ErrorKind::CannotImportFromStdin => "CANNOT_IMPORT_FROM_STDIN",
            ErrorKind::UndefinedVariable { .. } => "UNDEFINED_VARIABLE",
            ErrorKind::UndefinedVariableInFunc { .. } => "UNDEFINED_VARIABLE_IN_FUNC",
            ErrorKind::DuplicateVariable { .. } => "DUPLICATE_VARIABLE",
            ErrorKind::DuplicateVariableInFunc { .. } => "DUPLICATE_VARIABLE_IN_FUNC",
            ErrorKind::DuplicateFunction { .. } => "DUPLICATE_FUNCTION",
            ErrorKind::RedefineBuiltinFunction { .. } => "REDEFINE_BUILTIN_FUNCTION",
            ErrorKind::FunctionNameCollision { .. } => "FUNCTION_NAME_COLLISION",
            ErrorKind::MixedTypesInVector => "MIXED_TYPES_IN_VECTOR",
            ErrorKind::AssignmentArityMismatch { .. } => "ASSIGNMENT_ARITY_MISMATCH",
            ErrorKind::UnknownFunction { .. } => "UNKNOWN_FUNCTION",
            ErrorKind::ArgumentCountMismatch { .. } => "ARGUMENT_COUNT_MISMATCH",
            ErrorKind::ArgumentTypeMismatch { .. } => "ARGUMENT_TYPE_MISMATCH",
            ErrorKind::ReturnTypeMismatch { .. } => "RETURN_TYPE_MISMATCH",
            ErrorKind::MissingReturnStatement { .. } => "MISSING_RETURN_STATEMENT",
            ErrorKind::IfConditionNotBoolean { .. } => "IF_CONDITION_NOT_BOOLEAN",
            ErrorKind::IfElseTypeMismatch { .. } => "IF_ELSE_TYPE_MISMATCH",
            ErrorKind::OperatorTypeMismatch { .. } => "OPERATOR_TYPE_MISMATCH",
            ErrorKind::LogicalOperatorTypeMismatch { .. } => "LOGICAL_OPERATOR_TYPE_MISMATCH",
            ErrorKind::RecursiveCallDetected { .. } => "RECURSIVE_CALL_DETECTED",
        }
    }

    fn message(&self) -> String {
        match self {
            ErrorKind::MissingValueAfterEquals => {
                "expected a value after '=', but found nothing".to_string()
            }
            ErrorKind::IncompleteAssignment => "'let' statement is missing '='".to_string(),
            ErrorKind::UnmatchedBracket { bracket } => {
                format!("unmatched or unclosed bracket '{bracket}'")
            }
            ErrorKind::UnclosedString => "unclosed string literal".to_string(),
            ErrorKind::ReservedKeywordAsIdentifier { name } => {
                format!("'{name}' is a reserved keyword and cannot be used as an identifier")
            }
            ErrorKind::InvalidIdentifier { name } => format!("'{name}' is not a valid identifier"),
            ErrorKind::UnexpectedToken { expected, found } => {
                format!("expected one of: {expected}, but found '{found}' instead")
            }
            ErrorKind::InvalidCharacter { ch } => format!("invalid character '{ch}'"),
            ErrorKind::ParsingError { detail } => detail.clone(),
            ErrorKind::MissingRequiredDirective { name } => {
                format!("the @{name} directive is mandatory")
            }
            ErrorKind::UnknownDirective { name } => format!("unknown directive '@{name}'"),
            ErrorKind::DuplicateDirective { name } => {
                format!("directive '@{name}' is declared more than once")
            }
            ErrorKind::InvalidDirectiveValue { name, detail } => {
                format!("invalid value for @{name}: {detail}")
            }
            ErrorKind::DirectiveNotAllowedInModule { name } => {
                format!("directive '@{name}' is not allowed in a module file")
            }
            ErrorKind::ModuleDirectiveWithValue => "@module takes no value".to_string(),
            ErrorKind::DuplicateModuleDirective => {
                "@module is declared more than once".to_string()
            }
            ErrorKind::GlobalLetInModule => {
                "module files cannot declare top-level 'let' statements".to_string()
            }
            ErrorKind::ImportFileNotFound { path } => format!("imported file not found: '{path}'"),
            ErrorKind::ImportNotAModule { path } => {
                format!("imported file '{path}' does not declare @module")
            }
            ErrorKind::CircularImport { cycle } => {
                format!("circular import detected: {}", cycle.join(" -> "))
            }
            ErrorKind::CannotImportFromStdin => {
                "cannot resolve a relative import while reading from stdin".to_string()
            }
            ErrorKind::UndefinedVariable { name } => format!("undefined variable '{name}'"),
            ErrorKind::UndefinedVariableInFunc { name, func } => {
                format!("undefined variable '{name}' in function '{func}'")
            }
            ErrorKind::DuplicateVariable { name } => {
                format!("variable '{name}' is already defined")
            }
            ErrorKind::DuplicateVariableInFunc { name, func } => {
                format!("variable '{name}' is already defined in function '{func}'")
            }
            ErrorKind::DuplicateFunction { name, other_file } => {
                format!("function '{name}' is already defined (first defined in '{other_file}')")
            }
            ErrorKind::RedefineBuiltinFunction { name } => {
                format!("'{name}' is a built-in function and cannot be redefined")
            }
            ErrorKind::FunctionNameCollision { name, other_file } => {
                format!(
                    "function '{name}' collides with a function of the same name imported from '{other_file}'"
                )
            }
            ErrorKind::MixedTypesInVector => {
                "all items in a vector literal must have the same type".to_string()
            }
            ErrorKind::AssignmentArityMismatch { targets, values } => {
                format!("assignment has {targets} target(s) but the expression yields {values} value(s)")
            }
            ErrorKind::UnknownFunction { name } => format!("unknown function '{name}'"),
            ErrorKind::ArgumentCountMismatch { func, expected, found } => {
                format!("function '{func}' expects {expected} argument(s), found {found}")
            }
            ErrorKind::ArgumentTypeMismatch { func, index, expected, found } => {
                format!(
                    "function '{func}' expects argument {index} to be {expected}, found {found}"
                )
            }
            ErrorKind::ReturnTypeMismatch { func, expected, found } => {
                format!(
                    "function '{func}' declares return type {expected} but returns {found}"
                )
            }
            ErrorKind::MissingReturnStatement { func } => {
                format!("function '{func}' has a path with no return statement")
            }
            ErrorKind::IfConditionNotBoolean { found } => {
                format!("'if' condition must be boolean, found {found}")
            }
            ErrorKind::IfElseTypeMismatch { then_type, else_type } => {
                format!("'if' branches have mismatched types: {then_type} vs {else_type}")
            }
            ErrorKind::OperatorTypeMismatch { op, found } => {
                format!("operator '{op}' requires numeric operands, found {found}")
            }
            ErrorKind::LogicalOperatorTypeMismatch { op, found } => {
                format!("operator '{op}' requires boolean operands, found {found}")
            }
            ErrorKind::RecursiveCallDetected { cycle } => {
                format!("recursive call detected: {}", cycle.join(" -> "))
            }
        }
    }
}

/// A user-visible compilation failure: a kind, where it happened, and the
/// file it happened in (when not already implied by the span).
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, span: Option<Span>) -> Self {
        Self { kind, span }
    }

    pub fn at(kind: ErrorKind, span: Span) -> Self {
        Self::new(kind, Some(span))
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{span}: {} [{}]", self.kind.message(), self.kind.code()),
            None => write!(f, "{} [{}]", self.kind.message(), self.kind.code()),
        }
    }
}

impl std::error::Error for CompileError {}

/// A broken compiler invariant: the allocator can't find a variable's type,
/// the emitter can't resolve an opcode, an optimizer pass left a dangling
/// reference. Never shown to a user as a script mistake.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalError {
    pub detail: String,
}

impl InternalError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal compiler error: {}", self.detail)
    }
}

impl std::error::Error for InternalError {}
