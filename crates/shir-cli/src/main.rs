use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use shir_ast::SyntaxTree;
use shir_frontend::Settings;
use shir_ir::Diagnostics;
use shir_resolve::ResolverRegistry;

/// SHIR: shader syntax tree to SPIR-V shaped IR translator
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input syntax tree (JSON)
    input: PathBuf,

    /// Translator settings (JSON, default: built-in settings)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump IR to stderr even when translation fails
    #[arg(long)]
    emit_ir: bool,

    /// Skip the stage requirement and recursion checks
    #[arg(long)]
    no_validate: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    // 1. Read the syntax tree.
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;
    let tree: SyntaxTree = serde_json::from_str(&source)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse {}", cli.input.display()))?;
    tree.check_references()
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("malformed syntax tree")?;

    // 2. Load and finalize settings.
    let settings = match &cli.settings {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<Settings>(&text)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to parse {}", path.display()))?
        }
        None => Settings::default(),
    };
    let settings = settings
        .finalize()
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("invalid settings")?;

    // 3. Register the core intrinsics.
    let mut registry = ResolverRegistry::new();
    shir_resolve::register_core(&mut registry, &tree.symbols)
        .ok_or_else(|| miette::miette!("the syntax tree does not declare the core types"))?;

    // 4. Translate.
    let mut diagnostics = Diagnostics::new();
    let mut module = shir_frontend::translate_with(&tree, &registry, &settings, &mut diagnostics);

    // 5. Validate.
    if cli.no_validate {
        log::debug!("validation skipped");
    } else {
        shir_validate::validate(&tree, &registry, &settings, &mut module, &mut diagnostics);
    }

    // 6. Print diagnostics.
    for diag in diagnostics.iter() {
        eprintln!("{diag}");
    }

    let dump = shir_ir::dump_module(&module);
    if cli.emit_ir {
        eprintln!("{dump}");
    }

    if !module.translated {
        return Err(miette::miette!(
            "translation failed with {} error(s)",
            diagnostics.len()
        ));
    }

    // 7. Write output.
    match &cli.output {
        Some(path) => std::fs::write(path, &dump)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{dump}"),
    }

    Ok(())
}
