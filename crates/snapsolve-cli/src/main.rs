use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use snapsolve_contracts::{EventSink, EventWriter, FanoutSink, QueueKind};
use snapsolve_engine::{AppConfig, ProcessOutcome, Session};
use tracing_subscriber::EnvFilter;

mod commands;
mod console;

use commands::{help_lines, parse_command, Direction, ReplCommand};
use console::ConsoleSink;

#[derive(Debug, Parser)]
#[command(name = "snapsolve", version, about = "Screenshot-driven problem solver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Solve(SolveArgs),
    Session(SessionArgs),
}

#[derive(Debug, Parser)]
struct SolveArgs {
    #[arg(long = "screenshot", required = true)]
    screenshots: Vec<PathBuf>,
    #[arg(long = "debug-screenshot")]
    debug_screenshots: Vec<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    language: Option<String>,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    screenshot_dir: Option<PathBuf>,
}

const LOG_ENV: &str = "SNAPSOLVE_LOG";
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() {
    init_logging();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("snapsolve error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Solve(args) => run_solve(args),
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(
    api_base: Option<String>,
    language: Option<String>,
    screenshot_dir: Option<PathBuf>,
) -> AppConfig {
    let mut config = AppConfig::load();
    if let Some(api_base) = api_base {
        config.api_base = api_base;
    }
    if let Some(language) = language {
        config.language = language;
    }
    if screenshot_dir.is_some() {
        config.screenshot_dir = screenshot_dir;
    }
    config
}

fn build_sink(events_path: Option<&Path>) -> Arc<dyn EventSink> {
    let mut sink = FanoutSink::new(vec![Arc::new(ConsoleSink)]);
    if let Some(path) = events_path {
        let writer = EventWriter::new(path, uuid::Uuid::new_v4().to_string());
        tracing::info!(path = %path.display(), session_id = writer.session_id(), "writing events");
        sink.push(Arc::new(writer));
    }
    Arc::new(sink)
}

fn run_solve(args: SolveArgs) -> Result<i32> {
    let config = load_config(args.api_base, args.language, None);
    let mut session = Session::from_config(&config, build_sink(args.events.as_deref()));

    for shot in &args.screenshots {
        session.take_screenshot(shot)?;
    }
    let mut outcome = session.process();
    if outcome == ProcessOutcome::Solved && !args.debug_screenshots.is_empty() {
        for shot in &args.debug_screenshots {
            session.take_screenshot(shot)?;
        }
        outcome = session.process();
    }
    tracing::info!(?outcome, "solve finished");

    // Queued copies are private to this invocation.
    session.reset();
    Ok(match outcome {
        ProcessOutcome::Solved | ProcessOutcome::Debugged => 0,
        _ => 1,
    })
}

fn run_session(args: SessionArgs) -> Result<()> {
    let config = load_config(args.api_base, args.language, args.screenshot_dir);
    let mut session = Session::from_config(&config, build_sink(args.events.as_deref()));

    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("snapsolve-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;

    println!("snapsolve session started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Ok(line) = rx.recv() else { break };
        match parse_command(&line) {
            ReplCommand::Noop => {}
            ReplCommand::Help => println!("Commands: {}", help_lines().join(" ")),
            ReplCommand::Shot(path) => {
                if let Err(err) = session.take_screenshot(&path) {
                    println!("{err:#}");
                }
            }
            ReplCommand::List => print_screenshots(&session),
            ReplCommand::Delete(path) => match session.delete_screenshot(&path) {
                Ok(true) => {}
                Ok(false) => println!("Not queued: {}", path.display()),
                Err(err) => println!("{err:#}"),
            },
            ReplCommand::Process => {
                if process_interactive(&mut session, &rx)? {
                    break;
                }
            }
            ReplCommand::Cancel => {
                session.cancel();
                println!("Canceled. Back to the queue.");
            }
            ReplCommand::Reset => session.reset(),
            ReplCommand::Status => print_status(&session),
            ReplCommand::Move(direction) => {
                match direction {
                    Direction::Left => session.move_left(),
                    Direction::Right => session.move_right(),
                    Direction::Up => session.move_up(),
                    Direction::Down => session.move_down(),
                }
                let (x, y) = session.state().window().position();
                println!("Window at ({x}, {y})");
            }
            ReplCommand::Toggle => {
                let visible = session.toggle_window();
                println!("Window {}", if visible { "shown" } else { "hidden" });
            }
            ReplCommand::Resize { width, height } => {
                session.set_content_dimensions(width, height);
                let bounds = session.state().window().bounds();
                println!("Window is {}x{}", bounds.width, bounds.height);
            }
            ReplCommand::Quit => break,
            ReplCommand::Invalid { command, reason } => println!("/{command}: {reason}"),
            ReplCommand::Unknown(command) => {
                println!("Unknown command /{command}. Type /help for commands.")
            }
        }
    }

    session.cancel();
    Ok(())
}

/// Runs `process` on a worker thread while still reading input so `/cancel`
/// can abort it. Returns whether the user asked to quit.
fn process_interactive(session: &mut Session, rx: &mpsc::Receiver<String>) -> Result<bool> {
    let handle = session.cancel_handle();
    let mut quit = false;
    let mut canceled = false;

    let outcome = thread::scope(|scope| -> Result<ProcessOutcome> {
        let worker = thread::Builder::new()
            .name("snapsolve-process".to_string())
            .spawn_scoped(scope, || session.process())
            .context("failed to spawn processing thread")?;

        while !worker.is_finished() {
            match rx.recv_timeout(INPUT_POLL_INTERVAL) {
                Ok(line) => match parse_command(&line) {
                    ReplCommand::Cancel => {
                        canceled = true;
                        handle.cancel();
                    }
                    ReplCommand::Quit => {
                        quit = true;
                        canceled = true;
                        handle.cancel();
                    }
                    ReplCommand::Noop => {}
                    _ => println!("Still processing; only /cancel or /quit is accepted."),
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    quit = true;
                    canceled = true;
                    handle.cancel();
                    thread::sleep(INPUT_POLL_INTERVAL);
                }
            }
        }

        worker
            .join()
            .map_err(|_| anyhow!("processing thread panicked"))
    })?;

    tracing::info!(?outcome, "processing finished");
    // A cancel that lands after the run already finished still drops its result.
    if canceled && outcome != ProcessOutcome::Canceled {
        session.cancel();
    }
    Ok(quit)
}

fn print_screenshots(session: &Session) {
    let shots = session.screenshots();
    if shots.is_empty() {
        println!("No screenshots queued.");
        return;
    }
    for (index, shot) in shots.iter().enumerate() {
        println!(
            "{}. {} ({} byte preview)",
            index + 1,
            shot.path.display(),
            shot.preview.len()
        );
    }
}

fn print_status(session: &Session) {
    let state = session.state();
    let queues = state.screenshots().queues();
    println!("View: {}", state.view());
    println!(
        "Problem: {}",
        state
            .problem_info()
            .map(|problem| problem.display_title())
            .unwrap_or("none")
    );
    println!("Debugged: {}", state.has_debugged());
    println!(
        "Queued: {} main, {} extra",
        queues.len(QueueKind::Main),
        queues.len(QueueKind::Extra)
    );
    let bounds = state.window().bounds();
    println!(
        "Window: {}x{} at ({}, {}){}",
        bounds.width,
        bounds.height,
        bounds.x,
        bounds.y,
        if state.window().is_visible() {
            ""
        } else {
            " hidden"
        }
    );
}
