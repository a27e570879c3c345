//! Symbol discovery (§4.2): resolves `@import`, merges user-defined
//! function namespaces across files, and records every global variable and
//! UDF-local variable declared in the program.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::ast::{FunctionDef, Root, Statement};
use crate::builtins::is_builtin;
use crate::error::{CompileError, ErrorKind};
use crate::parser::parse;
use crate::span::Span;
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub line: usize,
    pub source_path: PathBuf,
    pub inferred_type: Option<Type>,
    pub is_stochastic: Option<bool>,
}

/// Whether a UDF-local name was a declared parameter or a `let` inside the
/// body; both are valid to reference, but only `let`s can collide with a
/// later `let` of the same name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalKind {
    Param,
    Let,
}

#[derive(Debug, Clone)]
pub struct UserFunction {
    pub params: Vec<crate::ast::Parameter>,
    pub return_types: Vec<String>,
    pub docstring: Option<String>,
    pub ast_body: Vec<Statement>,
    pub discovered_body: HashMap<String, LocalKind>,
    pub source_path: PathBuf,
    pub is_stochastic: bool,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    pub main_file_path: PathBuf,
    pub processed_files: HashSet<PathBuf>,
    pub processed_asts: HashMap<PathBuf, Root>,
    pub global_variables: HashMap<String, GlobalVariable>,
    pub user_defined_functions: HashMap<String, UserFunction>,
    /// Filled in by the type inferrer's Pass B: `function name -> (local
    /// variable name -> (type, is_stochastic))`, covering both parameters
    /// and `let`-bound locals.
    pub local_types: HashMap<String, HashMap<String, (Type, bool)>>,
}

struct Discoverer {
    table: SymbolTable,
    visiting: Vec<PathBuf>,
}

/// Lexically normalizes a path (resolves `.`/`..` components without
/// touching the filesystem), so two textually different but equivalent
/// paths to the same file — e.g. `lib/common.vsm` and
/// `lib/sub/../common.vsm` reached via different importers — collapse to
/// the same dedup key. Mirrors the reference resolver's use of
/// `os.path.abspath` to normalize before using a path as a map key.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Entry point: discover all symbols reachable from `root`, recursively
/// resolving `@import`. `root` must already have been parsed from
/// `main_path`.
pub fn discover_symbols(root: Root, main_path: &Path) -> Result<SymbolTable, CompileError> {
    let main_path = normalize_path(main_path);
    let mut d = Discoverer {
        table: SymbolTable { main_file_path: main_path.clone(), ..Default::default() },
        visiting: Vec::new(),
    };
    d.process_file(&main_path, root, true)?;

    let func_names: HashSet<&str> = d.table.user_defined_functions.keys().map(String::as_str).collect();
    for name in &func_names {
        if d.table.global_variables.contains_key(*name) {
            let other_file = d.table.user_defined_functions[*name].source_path.display().to_string();
            return Err(CompileError::at(
                ErrorKind::FunctionNameCollision { name: name.to_string(), other_file },
                Span::point(main_path, 1, 1),
            ));
        }
    }

    Ok(d.table)
}

impl Discoverer {
    fn process_file(&mut self, path: &Path, root: Root, is_main: bool) -> Result<(), CompileError> {
        let canonical = normalize_path(path);
        if self.table.processed_files.contains(&canonical) {
            return Ok(());
        }
        self.table.processed_files.insert(canonical.clone());
        self.visiting.push(canonical.clone());

        if !is_main && !root.is_module() {
            return Err(CompileError::at(
                ErrorKind::ImportNotAModule { path: canonical.display().to_string() },
                Span::point(&canonical, 1, 1),
            ));
        }
        if !is_main {
            for step in &root.execution_steps {
                return Err(CompileError::at(ErrorKind::GlobalLetInModule, step.span().clone()));
            }
        }

        for import in &root.imports {
            let base_dir = canonical.parent().ok_or_else(|| {
                CompileError::at(ErrorKind::CannotImportFromStdin, import.span.clone())
            })?;
            let import_path = normalize_path(&base_dir.join(&import.path));
            if self.visiting.contains(&import_path) {
                let mut cycle: Vec<String> =
                    self.visiting.iter().map(|p| p.display().to_string()).collect();
                cycle.push(import_path.display().to_string());
                return Err(CompileError::at(ErrorKind::CircularImport { cycle }, import.span.clone()));
            }
            if self.table.processed_files.contains(&import_path) {
                continue;
            }
            let source = fs::read_to_string(&import_path).map_err(|_| {
                CompileError::at(
                    ErrorKind::ImportFileNotFound { path: import_path.display().to_string() },
                    import.span.clone(),
                )
            })?;
            let imported_root = parse(&source, &import_path)?;
            self.process_file(&import_path, imported_root, false)?;
        }

        for func in &root.function_definitions {
            self.register_function(func, &canonical)?;
        }

        if is_main {
            self.discover_global_variables(&root)?;
        }

        self.table.processed_asts.insert(canonical, root);
        self.visiting.pop();
        Ok(())
    }

    fn register_function(&mut self, func: &FunctionDef, source_path: &Path) -> Result<(), CompileError> {
        if is_builtin(&func.name) {
            return Err(CompileError::at(
                ErrorKind::RedefineBuiltinFunction { name: func.name.clone() },
                func.span.clone(),
            ));
        }
        if let Some(existing) = self.table.user_defined_functions.get(&func.name) {
            let other_file = existing.source_path.display().to_string();
            let kind = if existing.source_path == source_path {
                ErrorKind::DuplicateFunction { name: func.name.clone(), other_file }
            } else {
                ErrorKind::FunctionNameCollision { name: func.name.clone(), other_file }
            };
            return Err(CompileError::at(kind, func.span.clone()));
        }

        let mut discovered_body = HashMap::new();
        for p in &func.params {
            discovered_body.insert(p.name.clone(), LocalKind::Param);
        }
        for stmt in &func.body {
            let mut seen_in_stmt = HashSet::new();
            for name in stmt.targets() {
                if discovered_body.contains_key(name) || !seen_in_stmt.insert(name) {
                    return Err(CompileError::at(
                        ErrorKind::DuplicateVariableInFunc { name: name.clone(), func: func.name.clone() },
                        stmt.span().clone(),
                    ));
                }
            }
            for name in stmt.targets() {
                discovered_body.insert(name.clone(), LocalKind::Let);
            }
        }

        self.table.user_defined_functions.insert(
            func.name.clone(),
            UserFunction {
                params: func.params.clone(),
                return_types: func.return_types.clone(),
                docstring: func.docstring.clone(),
                ast_body: func.body.clone(),
                discovered_body,
                source_path: source_path.to_path_buf(),
                is_stochastic: false,
            },
        );
        Ok(())
    }

    fn discover_global_variables(&mut self, root: &Root) -> Result<(), CompileError> {
        for stmt in &root.execution_steps {
            let mut seen_in_stmt = HashSet::new();
            for name in stmt.targets() {
                if !seen_in_stmt.insert(name) || self.table.global_variables.contains_key(name) {
                    return Err(CompileError::at(
                        ErrorKind::DuplicateVariable { name: name.clone() },
                        stmt.span().clone(),
                    ));
                }
                self.table.global_variables.insert(
                    name.clone(),
                    GlobalVariable {
                        line: stmt.span().start_line,
                        source_path: root.file_path.clone(),
                        inferred_type: None,
                        is_stochastic: None,
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    /// A diamond import reached via two textually different but equivalent
    /// relative paths (`common.vsm` from the root, `../common.vsm` from a
    /// file one directory deeper) must resolve to the same file, not be
    /// parsed and registered twice.
    #[test]
    fn a_diamond_import_reached_by_two_equivalent_paths_is_only_processed_once() {
        let dir = tempfile::tempdir().unwrap();
        let root_path = dir.path();
        fs::create_dir(root_path.join("sub")).unwrap();

        fs::write(
            root_path.join("common.vsm"),
            "@module\nfunc shared() -> scalar {\n    return 1\n}\n",
        )
        .unwrap();
        fs::write(root_path.join("a.vs"), "@module\n@import \"common.vsm\"\n").unwrap();
        fs::write(root_path.join("sub").join("b.vs"), "@module\n@import \"../common.vsm\"\n").unwrap();

        let main_path = root_path.join("main.vs");
        let main_source = "@iterations = 10\n@output = x\n@import \"a.vs\"\n@import \"sub/b.vs\"\nlet x = 1\n";
        fs::write(&main_path, main_source).unwrap();

        let root = parse(main_source, &main_path).unwrap();
        let table = discover_symbols(root, &main_path).unwrap();

        assert!(table.user_defined_functions.contains_key("shared"));
        assert_eq!(table.processed_files.len(), 4);
    }
}
