//! CLI entry and dispatch.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Parser;
use ryl_core::config::Config;
use ryl_core::{
    AwakeStatus, CommandEvaluator, EchoEvaluator, EvalIo, EvalResult, Evaluator, ProtocolClient,
    StreamKind, WorkerHost, interrupt, logging,
};
use ryl_tui::TuiRuntime;

#[derive(Parser)]
#[command(name = "ryl")]
#[command(version = "0.1")]
#[command(about = "Interactive shell for single-shot language runtimes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Pre-load this snippet into the first input surface
    #[arg(long, value_name = "SNIPPET")]
    code: Option<String>,

    /// Submit the pre-loaded snippet immediately on startup
    #[arg(long, requires = "code")]
    run: bool,

    /// Override the configured runtime command
    #[arg(long = "command", value_name = "CMD")]
    runtime: Option<String>,

    /// Use the built-in echo evaluator instead of a runtime command
    #[arg(long, conflicts_with = "runtime")]
    echo: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Evaluate one source block synchronously and exit
    Exec {
        /// The source to evaluate
        source: String,

        /// Override the configured runtime command
        #[arg(long = "command", value_name = "CMD")]
        runtime: Option<String>,

        /// Use the built-in echo evaluator instead of a runtime command
        #[arg(long, conflicts_with = "runtime")]
        echo: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Print the effective configuration
    Show,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Some(Commands::Exec {
            source,
            runtime,
            echo,
        }) => run_exec(&config, &source, runtime.as_deref(), echo),
        Some(Commands::Config { command }) => run_config(&config, &command),
        None => run_interactive(&config, &cli),
    }
}

fn run_interactive(config: &Config, cli: &Cli) -> Result<()> {
    let _log_guard = logging::init(&Config::logs_dir())?;
    interrupt::init();
    tracing::info!(command = %config.runtime.command, "starting interactive session");

    let client = build_client(config, cli.runtime.as_deref(), cli.echo);
    let mut runtime = TuiRuntime::new(config, client)?;

    let snippet = cli
        .code
        .clone()
        .or_else(|| config.session.bootstrap.clone());
    if let Some(snippet) = snippet {
        runtime.bootstrap(&snippet, cli.run || config.session.auto_submit);
    }
    runtime.run()
}

fn build_client(config: &Config, runtime: Option<&str>, echo: bool) -> ProtocolClient {
    if echo {
        ProtocolClient::new(WorkerHost::spawn(EchoEvaluator))
    } else {
        let command = runtime.unwrap_or(&config.runtime.command).to_string();
        ProtocolClient::new(WorkerHost::spawn(CommandEvaluator::new(command)))
    }
}

/// The synchronous one-shot path: no worker thread, no protocol. The
/// evaluator runs in-process with stdout/stderr wired straight through.
fn run_exec(config: &Config, source: &str, runtime: Option<&str>, echo: bool) -> Result<()> {
    let mut io = DirectIo;
    let result = if echo {
        EchoEvaluator.evaluate(source, &mut io)
    } else {
        let command = runtime.unwrap_or(&config.runtime.command).to_string();
        CommandEvaluator::new(command).evaluate(source, &mut io)
    };
    match result {
        EvalResult::Value(value) => {
            println!(" => {value}");
            Ok(())
        }
        EvalResult::NoValue => Ok(()),
        EvalResult::Error(text) => bail!("{text}"),
    }
}

fn run_config(config: &Config, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => println!("{}", Config::config_path().display()),
        ConfigCommands::Show => {
            let rendered =
                toml::to_string_pretty(config).context("failed to render configuration")?;
            print!("{rendered}");
        }
    }
    Ok(())
}

/// Blocking pass-through I/O for `exec`.
struct DirectIo;

impl EvalIo for DirectIo {
    fn emit(&mut self, kind: StreamKind, text: &str) {
        match kind {
            StreamKind::Out => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            StreamKind::Err => {
                eprint!("{text}");
                let _ = std::io::stderr().flush();
            }
        }
    }

    fn request_input(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok()?;
        Some(line.trim_end_matches('\n').to_string())
    }

    fn awake(&self) -> AwakeStatus {
        AwakeStatus::Running
    }
}
