use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use flowcheck_analyzer::error::ErrorKind;
use flowcheck_analyzer::ir::Module;
use flowcheck_analyzer::report::{write_remaining, write_uninit_reports};
use flowcheck_analyzer::{Analyzer, Config, FlatConfig};

mod logger;

#[derive(Debug, Parser)]
#[command(name = "flowcheck", about = "Uninitialized read and dead function analysis")]
struct Cli {
    #[arg(long, global = true, default_value = "warn")]
    log_level: log::LevelFilter,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report slots read before being assigned
    Uninit {
        file: PathBuf,
        #[command(flatten)]
        uninit: UninitArgs,
    },
    /// Remove functions unreachable from the entry
    DeadFunc {
        file: PathBuf,
        #[command(flatten)]
        dead_func: DeadFuncArgs,
    },
    /// Run both analyses on one module
    All {
        file: PathBuf,
        #[command(flatten)]
        uninit: UninitArgs,
        #[command(flatten)]
        dead_func: DeadFuncArgs,
    },
}

#[derive(Debug, Args)]
struct UninitArgs {
    /// Iterate block lattices to a fixpoint instead of a single pass
    #[arg(long)]
    fixpoint: bool,
    /// Print the module after naming anonymous allocas
    #[arg(long)]
    emit_ir: bool,
}

#[derive(Debug, Args)]
struct DeadFuncArgs {
    /// Keep everything reachable over the call graph, not just two hops
    #[arg(long)]
    transitive: bool,
    #[arg(long, default_value = "main")]
    entry: String,
    /// Write the pruned module here
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn build_config(uninit: Option<&UninitArgs>, dead_func: Option<&DeadFuncArgs>) -> Config {
    let flat = FlatConfig {
        fixpoint: uninit.is_some_and(|args| args.fixpoint),
        transitive: dead_func.is_some_and(|args| args.transitive),
    };
    let mut config = Config::from(flat);
    if let Some(args) = dead_func {
        config.entry_name = args.entry.clone();
    }
    config
}

fn load(analyzer: &Analyzer, file: &Path) -> anyhow::Result<Module> {
    let input = std::fs::read_to_string(file)?;
    let module = analyzer.load_module(&input)?;
    Ok(module)
}

fn run_uninit(analyzer: &Analyzer, module: &mut Module, args: &UninitArgs) -> anyhow::Result<()> {
    let reports = analyzer.check_uninit(module);
    let mut out = String::new();
    write_uninit_reports(&mut out, &reports)?;
    if args.emit_ir {
        write!(out, "{}", module.display())?;
    }
    print!("{}", out);
    Ok(())
}

fn run_dead_func(
    analyzer: &Analyzer,
    module: &mut Module,
    args: &DeadFuncArgs,
) -> anyhow::Result<()> {
    let report = match analyzer.eliminate_dead_funcs(module) {
        Ok(report) => report,
        Err(e) if e.kind == ErrorKind::MissingEntry => {
            println!("error: {} function not found", args.entry);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut out = String::new();
    write_remaining(&mut out, &report)?;
    print!("{}", out);

    if let Some(output) = &args.output {
        std::fs::write(output, module.display().to_string())?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.log_level)?;

    match &cli.command {
        Command::Uninit { file, uninit } => {
            let analyzer = Analyzer::new(build_config(Some(uninit), None));
            let mut module = load(&analyzer, file)?;
            run_uninit(&analyzer, &mut module, uninit)?;
        }
        Command::DeadFunc { file, dead_func } => {
            let analyzer = Analyzer::new(build_config(None, Some(dead_func)));
            let mut module = load(&analyzer, file)?;
            run_dead_func(&analyzer, &mut module, dead_func)?;
        }
        Command::All {
            file,
            uninit,
            dead_func,
        } => {
            let analyzer = Analyzer::new(build_config(Some(uninit), Some(dead_func)));
            let mut module = load(&analyzer, file)?;
            run_uninit(&analyzer, &mut module, uninit)?;
            run_dead_func(&analyzer, &mut module, dead_func)?;
        }
    }

    Ok(())
}
