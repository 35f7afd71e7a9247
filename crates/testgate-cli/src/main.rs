use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Test orchestration and coverage gating.
///
/// Collects documentation examples and structured test cases, runs them
/// serially or across worker processes, and reports one merged result.
/// The coverage command runs a program's tests under a coverage tool and
/// fails unless coverage is complete.
///
/// EXAMPLES:
///     testgate test                        Run every configured test
///     testgate test testBlob               Run one test by name
///     testgate test -P 1 -v 2              Run serially with progress lines
///     testgate test --cases 'cases/*.toml' Run case files without a config
///     testgate coverage --program tools/binman/binman
///
/// ENVIRONMENT VARIABLES:
///     TESTGATE_PROCESSES      Default worker count
///     TESTGATE_VERBOSITY      Default verbosity (0-4)
///     TESTGATE_DEBUG          Set to '1' to run without output capture
///     TESTGATE_TOOLPATH       Extra tool search paths (path-list)
///     TESTGATE_COVERAGE_TOOL  Coverage tool executable
///     TESTGATE_JSON           Set to '1' for JSON output by default
///     NO_COLOR                Set to disable colored output
///     RUST_LOG                Log filter (overrides the verbosity mapping)
#[derive(Parser)]
#[command(name = "testgate")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the test and worker commands
#[derive(Args, Debug, Clone, Default)]
pub struct RunOptions {
    /// Run only this test: a case name, Class.case, or a module name
    pub test_name: Option<String>,

    /// Number of worker processes (0 = one per CPU, 1 = serial)
    #[arg(long, short = 'P')]
    pub processes: Option<usize>,

    /// Verbosity level (0-4)
    #[arg(long, short = 'v', value_parser = clap::value_parser!(u8).range(0..=4))]
    pub verbosity: Option<u8>,

    /// Run units without output capture and show full error detail
    #[arg(long, short = 'D')]
    pub debug: bool,

    /// Preserve test input directories (and output directories for one test)
    #[arg(long = "test-preserve-dirs", short = 'X')]
    pub preserve_dirs: bool,

    /// Extra search path for tools used by tests (repeatable)
    #[arg(long)]
    pub toolpath: Vec<PathBuf>,

    #[command(flatten)]
    pub sources: SourceOptions,
}

/// Where test units come from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceOptions {
    /// Project config file (default: testgate.toml found upwards)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Markdown documents holding examples (glob, repeatable)
    #[arg(long)]
    pub docs: Vec<String>,

    /// TOML case files (glob, repeatable)
    #[arg(long)]
    pub cases: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests
    ///
    /// Assembles the suite from the configured sources, runs it serially or
    /// across worker processes and prints the merged report. Exits with 1
    /// when any test errored or failed.
    ///
    /// EXAMPLES:
    ///     testgate test                    Run all tests
    ///     testgate test testFill           Run tests named testFill
    ///     testgate test -P 4               Use four worker processes
    ///     testgate test --json             Print the result as JSON
    #[command(visible_alias = "t")]
    Test {
        #[command(flatten)]
        run: RunOptions,
        /// Name printed in the summary line
        #[arg(long)]
        tool_name: Option<String>,
        /// Disable colored output
        #[arg(long, env = "NO_COLOR")]
        no_color: bool,
        /// Output the result in JSON format
        #[arg(long, env = "TESTGATE_JSON")]
        json: bool,
    },

    /// Check test coverage
    ///
    /// Runs the program's tests under the coverage tool, then reads its
    /// report. Fails when coverage is below 100% or a required module has
    /// no tests.
    ///
    /// EXAMPLES:
    ///     testgate coverage --program tools/binman/binman
    ///     testgate coverage --program tools/dtoc/dtoc --filter _test
    ///     testgate coverage --require blob --require fill
    Coverage {
        /// Project config file (default: testgate.toml found upwards)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// Program whose tests are measured
        #[arg(long)]
        program: Option<PathBuf>,
        /// Omit the program's files whose path contains this text
        #[arg(long)]
        filter: Option<String>,
        /// Extra omit pattern (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Build directory holding sandbox_spl/tools
        #[arg(long)]
        build_dir: Option<PathBuf>,
        /// Module that must appear in the report (repeatable)
        #[arg(long = "require")]
        required: Vec<String>,
        /// Extra arguments for the program, placed before its test command
        #[arg(long, allow_hyphen_values = true)]
        extra_args: Option<String>,
        /// Coverage tool executable
        #[arg(long)]
        tool: Option<String>,
    },

    /// Run one partition of a suite and print its result (internal)
    #[command(hide = true)]
    Worker {
        /// Partition index
        #[arg(long)]
        partition: usize,
        /// Total number of partitions
        #[arg(long)]
        partitions: usize,
        #[command(flatten)]
        run: RunOptions,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     testgate completions bash > ~/.local/share/bash-completion/completions/testgate
    ///     testgate completions zsh > ~/.zfunc/_testgate
    ///     testgate completions fish > ~/.config/fish/completions/testgate.fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Commands {
    fn verbosity(&self) -> u8 {
        match self {
            Commands::Test { run, .. } | Commands::Worker { run, .. } => run.verbosity.unwrap_or(0),
            _ => 0,
        }
    }
}

/// Install the log subscriber; RUST_LOG wins over the verbosity mapping
fn init_tracing(verbosity: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbosity {
            0 | 1 => EnvFilter::new("warn"),
            2 => EnvFilter::new("info"),
            3 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.command.verbosity());

    let status = match cli.command {
        Commands::Test {
            run,
            tool_name,
            no_color,
            json,
        } => commands::test::run(commands::test::TestArgs {
            run,
            tool_name,
            no_color,
            json,
        })?,
        Commands::Coverage {
            config,
            program,
            filter,
            exclude,
            build_dir,
            required,
            extra_args,
            tool,
        } => commands::coverage::run(commands::coverage::CoverageArgs {
            config,
            program,
            filter,
            exclude,
            build_dir,
            required,
            extra_args,
            tool,
        })?,
        Commands::Worker {
            partition,
            partitions,
            run,
        } => {
            commands::worker::run(commands::worker::WorkerArgs {
                partition,
                partitions,
                run,
            })?;
            0
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "testgate", &mut io::stdout());
            0
        }
    };

    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
