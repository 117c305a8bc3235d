use std::io::{self, Write};

use snapsolve_contracts::{EventSink, ProcessingEvent, SolutionSet};

/// Prints lifecycle events for a human at the terminal.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: &ProcessingEvent) -> anyhow::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", render_event(event))?;
        stdout.flush()?;
        Ok(())
    }
}

pub fn render_event(event: &ProcessingEvent) -> String {
    match event {
        ProcessingEvent::NoScreenshots => "No screenshots to process.".to_string(),
        ProcessingEvent::InitialStart => "Extracting problem...".to_string(),
        ProcessingEvent::ProblemExtracted(problem) => {
            format!("Problem: {}\nGenerating solution...", problem.display_title())
        }
        ProcessingEvent::SolutionSuccess(solution) => render_solution("Solution", solution),
        ProcessingEvent::InitialSolutionError(message) => format!("Error: {message}"),
        ProcessingEvent::DebugStart => "Debugging with extra screenshots...".to_string(),
        ProcessingEvent::DebugSuccess(solution) => render_solution("Debugged solution", solution),
        ProcessingEvent::DebugError(message) => format!("Debug error: {message}"),
        ProcessingEvent::ApiKeyOutOfCredits => {
            "Your API key is out of credits. Please refill and try again.".to_string()
        }
        ProcessingEvent::ApiKeyInvalid => {
            "Your API key is invalid. Set SNAPSOLVE_API_KEY and restart.".to_string()
        }
        ProcessingEvent::ResetView => "View reset.".to_string(),
        ProcessingEvent::ScreenshotTaken { path } => format!("Queued {}", path.display()),
        ProcessingEvent::ScreenshotDeleted { path } => format!("Deleted {}", path.display()),
    }
}

fn render_solution(heading: &str, solution: &SolutionSet) -> String {
    let mut lines = vec![format!("{heading}:")];
    if !solution.thoughts.is_empty() {
        lines.push("Thoughts:".to_string());
        lines.extend(solution.thoughts.iter().map(|thought| format!("  - {thought}")));
    }
    lines.push("Code:".to_string());
    lines.extend(solution.code.lines().map(|line| format!("  {line}")));
    if !solution.time_complexity.is_empty() {
        lines.push(format!("Time: {}", solution.time_complexity));
    }
    if !solution.space_complexity.is_empty() {
        lines.push(format!("Space: {}", solution.space_complexity));
    }
    lines.join("\n")
}
