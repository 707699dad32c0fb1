use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hermes_orchestrator::app::{App, StatusIndicator};
use hermes_orchestrator::config::OrchestratorConfig;
use hermes_orchestrator::constitution::ConstitutionFetcher;
use hermes_orchestrator::discovery::discover_interpreter;
use hermes_orchestrator::orchestrator::{run_outcome, OutputLine};
use hermes_orchestrator::runner::ProcessRunner;
use hermes_orchestrator::ui::ui;
use hermes_orchestrator::WorkflowOrchestrator;
use hermes_sdk::OutputStream;

#[derive(Parser)]
#[command(name = "hermes", version, about = "Run the Hermes coding agent and follow its progress")]
struct Cli {
    /// Config file (default: <config dir>/hermes/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project the agent works on
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Python interpreter used for the agent
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one workflow and stream its output
    Run {
        /// What the agent should build
        #[arg(required = true, num_args = 1..)]
        description: Vec<String>,

        /// Print the final run snapshot as JSON instead of streaming output
        #[arg(long)]
        json: bool,
    },
    /// Print the project constitution
    Constitution,
    /// Print the effective configuration
    Config,
    /// Interactive terminal UI (default)
    Tui,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let mut config = OrchestratorConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.project_root {
        config.project_root = root;
    }
    if let Some(python) = cli.python {
        config.interpreter = Some(python);
    }

    match cli.command.unwrap_or(Command::Tui) {
        Command::Run { description, json } => {
            init_tracing(None)?;
            run_workflow(&config, &description.join(" "), json).await
        }
        Command::Constitution => {
            init_tracing(None)?;
            print_constitution(&config).await
        }
        Command::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Command::Tui => {
            let log_file = config
                .log_file
                .clone()
                .unwrap_or_else(OrchestratorConfig::default_log_file);
            init_tracing(Some(&log_file))?;
            run_tui(config).await
        }
    }
}

/// `HERMES_LOG` filter, default `info`. Logs go to `log_file` when given so
/// they don't corrupt the TUI.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env("HERMES_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run_workflow(config: &OrchestratorConfig, description: &str, json: bool) -> Result<()> {
    let orchestrator = WorkflowOrchestrator::from_config(config, Arc::new(ProcessRunner::new()))?;

    if !json {
        let last = Mutex::new(String::new());
        orchestrator.board().on_change(move |run| {
            let text = StatusIndicator::from_run(run).text;
            if let Ok(mut last) = last.lock() {
                if *last != text {
                    eprintln!("==> {}", text);
                    *last = text;
                }
            }
        });
    }

    // Subscribe before starting so no line is missed
    let mut output = orchestrator.subscribe_output();
    orchestrator.start_workflow(description).await?;

    let wait = orchestrator.wait_for_completion();
    tokio::pin!(wait);
    let finished = loop {
        tokio::select! {
            biased;
            line = output.recv() => match line {
                Ok(line) => {
                    if !json {
                        print_output(&line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output lines dropped"),
                Err(RecvError::Closed) => break (&mut wait).await,
            },
            run = &mut wait => break run,
        }
    };
    while let Ok(line) = output.try_recv() {
        if !json {
            print_output(&line);
        }
    }

    let run = finished.context("Workflow run disappeared before finishing")?;
    info!(run_id = %run.id, status = %run.status, "workflow finished");
    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    }
    run_outcome(&run)?;
    Ok(())
}

fn print_output(line: &OutputLine) {
    match line.stream {
        OutputStream::Stdout => println!("{}", line.line),
        OutputStream::Stderr => eprintln!("{}", line.line),
    }
}

async fn print_constitution(config: &OrchestratorConfig) -> Result<()> {
    let interpreter = discover_interpreter(config.interpreter.as_deref())?;
    let fetcher = ConstitutionFetcher::for_agent(interpreter, &config.agent_script_path());
    let document = fetcher.fetch(&config.project_root).await?;
    print!("{}", document);
    Ok(())
}

async fn run_tui(config: OrchestratorConfig) -> Result<()> {
    // Environment problems are reported before the terminal is taken over
    let orchestrator = WorkflowOrchestrator::from_config(&config, Arc::new(ProcessRunner::new()))?;
    let launch = orchestrator.launch_spec();
    let fetcher = ConstitutionFetcher::for_agent(launch.interpreter.clone(), &launch.agent_script);

    let mut app = App::new(
        orchestrator,
        fetcher,
        config.project_root.clone(),
        config.poll_interval(),
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    loop {
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            _ = tick.tick() => app.on_tick(),
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) => app.handle_key(key).await,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
