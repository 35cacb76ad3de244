mod fixture;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use interpreter::{ElementSource, Interpreter, InterpreterConfig, InterpretError, MarkerProvider};

use crate::fixture::Fixture;

#[derive(Parser)]
#[command(name = "wm", version, about = "Document command interpreter")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log filter (e.g. `debug`, `interpreter=trace`); defaults to RUST_LOG or `warn`
    #[arg(long, global = true)]
    log: Option<String>,

    /// Interpreter settings (TOML) overriding the fixture's `[interpreter]` table
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the command tree and visibility groups of a fixture document
    Tree { fixture: PathBuf },

    /// Report malformed and conflicting document commands
    Check { fixture: PathBuf },

    /// Interpret a fixture document and print its final marker names
    Run { fixture: PathBuf },

    /// Run .test.toml fixtures
    Test(TestArgs),
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.toml file or a directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    let code = match cli.command {
        Command::Tree { ref fixture } => with_fixture(&cli, fixture, print_tree),
        Command::Check { ref fixture } => with_fixture(&cli, fixture, check),
        Command::Run { ref fixture } => with_fixture(&cli, fixture, run),
        Command::Test(ref args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                0
            } else {
                test_runner::run_tests(&args.path, cli.no_color, &args.category)
            }
        }
    };
    process::exit(code);
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the fixture and the effective interpreter settings, then hand off.
fn with_fixture(cli: &Cli, path: &Path, action: fn(&Cli, &Fixture, InterpreterConfig) -> i32) -> i32 {
    let fixture = match Fixture::load(path) {
        Ok(fixture) => fixture,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        },
        None => fixture.interpreter.clone(),
    };
    action(cli, &fixture, config)
}

fn load_config(path: &Path) -> Result<InterpreterConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
}

fn print_tree(_: &Cli, fixture: &Fixture, config: InterpreterConfig) -> i32 {
    let document = match fixture.document() {
        Ok(document) => document,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    let mut interpreter = Interpreter::new(config);
    interpreter.scan(&document);

    print!("{}", interpreter.tree());
    let groups = interpreter.groups();
    if !groups.is_empty() {
        println!();
        for element in groups.elements() {
            let source = match &element.source {
                ElementSource::Command(id) => interpreter
                    .tree()
                    .command(*id)
                    .map(|c| c.marker_name().to_string())
                    .unwrap_or_default(),
                ElementSource::Region { name, .. } => name.clone(),
            };
            let groups: Vec<&str> = element.groups.iter().map(String::as_str).collect();
            println!("groups {} {} [{}]", element.span, source, groups.join(", "));
        }
    }
    0
}

fn check(cli: &Cli, fixture: &Fixture, config: InterpreterConfig) -> i32 {
    let document = match fixture.document() {
        Ok(document) => document,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    let mut interpreter = Interpreter::new(config);
    interpreter.scan(&document);

    let writer = StandardStream::stderr(color_choice(cli.no_color));
    let config = term::Config::default();
    let mut files = SimpleFiles::new();
    let mut problems = 0;

    let tree = interpreter.tree();
    for id in tree.depth_first(false) {
        let Some(command) = tree.command(id) else {
            continue;
        };
        let Some(error) = command.diagnostic() else {
            continue;
        };
        let file_id = files.add(
            format!("{} {}", document.display_name(), command.span()),
            command.marker_name().to_string(),
        );
        let diagnostic = error.clone().in_file(file_id).to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
        problems += 1;
    }

    if problems == 0 {
        eprintln!("ok: {} document commands", tree.len());
        0
    } else {
        eprintln!("{} problem(s) in {} document commands", problems, tree.len());
        1
    }
}

fn run(_: &Cli, fixture: &Fixture, config: InterpreterConfig) -> i32 {
    let outcome = match fixture.run(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };

    for name in outcome.document.names() {
        println!("{}", name);
    }
    for annotation in outcome.document.annotations() {
        eprintln!(
            "annotation {}..{}: {}",
            annotation.range.start, annotation.range.end, annotation.message
        );
    }

    match outcome.result {
        Ok(report) => {
            eprintln!(
                "ok: {} executed, {} renamed, {} iteration(s), {} comparisons",
                report.executed, report.renames, report.iterations, report.comparisons
            );
            0
        }
        Err(error @ InterpretError::CommandsFailed(_)) => {
            eprintln!("warning: {}", error);
            1
        }
        Err(error) => {
            eprintln!("error: {}", error);
            1
        }
    }
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}
