//! vsc CLI
//!
//! Command-line interface for compiling `.vs` ValuaScript programs to
//! recipe JSON.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;

use vsc::config::CompilerConfig;

#[derive(ClapParser)]
#[command(name = "vsc")]
#[command(about = "ValuaScript compiler - compile .vs programs to recipe JSON", long_about = None)]
struct Cli {
    /// Input .vs source file. Reads stdin when omitted (no `@import` is
    /// resolvable in that case).
    input: Option<PathBuf>,

    /// Output recipe path. Prints to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the IR after a given pipeline stage instead of compiling to a
    /// recipe: `ir` (post IR-generation) or `optimized` (post-optimizer,
    /// pre-partition).
    #[arg(long, value_name = "STAGE")]
    compile: Option<String>,

    /// Path to a TOML file overriding which optimizer passes run.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("vsc=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let (source, path) = read_input(cli.input.as_deref())?;
    let config = read_config(cli.config.as_deref())?;

    if let Some(stage) = cli.compile.as_deref() {
        let dump = compile_to_stage(&source, &path, &config, stage)?;
        return write_output(cli.output.as_deref(), &dump);
    }

    let recipe = vsc::compile(&source, &path, &config).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&recipe).map_err(|e| e.to_string())?;
    write_output(cli.output.as_deref(), &json)
}

fn read_input(input: Option<&std::path::Path>) -> Result<(String, PathBuf), String> {
    match input {
        Some(path) => {
            let source = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            Ok((source, path.to_path_buf()))
        }
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source).map_err(|e| format!("cannot read stdin: {e}"))?;
            Ok((source, PathBuf::from("<stdin>")))
        }
    }
}

fn read_config(path: Option<&std::path::Path>) -> Result<CompilerConfig, String> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            toml::from_str(&text).map_err(|e| format!("invalid config at {}: {e}", path.display()))
        }
        None => Ok(CompilerConfig::default()),
    }
}

fn write_output(path: Option<&std::path::Path>, contents: &str) -> Result<(), String> {
    match path {
        Some(path) => fs::write(path, contents).map_err(|e| format!("cannot write {}: {e}", path.display())),
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

/// Runs the pipeline up to and including `stage`, serializing the
/// intermediate representation instead of the final recipe.
fn compile_to_stage(
    source: &str,
    path: &std::path::Path,
    config: &CompilerConfig,
    stage: &str,
) -> Result<String, String> {
    let root = vsc::parser::parse(source, path).map_err(|e| e.to_string())?;
    let mut table = vsc::symbols::discover_symbols(root, path).map_err(|e| e.to_string())?;
    vsc::type_inferrer::infer(&mut table);
    vsc::validator::validate(&table).map_err(|e| e.to_string())?;
    let ir = vsc::ir_generator::generate_ir(&table);

    match stage {
        "ir" => serde_json::to_string_pretty(&format!("{ir:#?}")).map_err(|e| e.to_string()),
        "optimized" => {
            let ir = vsc::optimizer::optimize(ir, &table, config).map_err(|e| e.to_string())?;
            serde_json::to_string_pretty(&format!("{ir:#?}")).map_err(|e| e.to_string())
        }
        other => Err(format!("unknown --compile stage '{other}', expected 'ir' or 'optimized'")),
    }
}
