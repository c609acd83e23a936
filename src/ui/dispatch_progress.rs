//! Wave dispatch progress UI.
//!
//! Renders [`DispatchEvent`]s from a [`crate::dag::WaveDispatcher`]. Output
//! modes:
//! - `full`: progress bars per task with wave headers
//! - `minimal`: single-line status updates
//! - `json`: one JSON event per line

use crate::dag::{DispatchEvent, DispatchSummary};
use crate::ui::icons::{CHECK, CLOCK, CROSS, RUNNING, SPARKLE, WARN, WAVE};
use console::{Term, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

/// Output mode for the dispatch UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiMode {
    #[default]
    Full,
    Minimal,
    Json,
}

impl std::str::FromStr for UiMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "minimal" => Self::Minimal,
            _ => Self::Full,
        })
    }
}

impl UiMode {
    pub fn parse(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// Terminal renderer for wave dispatch.
pub struct DispatchUI {
    mode: UiMode,
    multi: MultiProgress,
    /// Overall task counter
    header_bar: ProgressBar,
    /// Spinners for tasks still in flight
    task_bars: HashMap<String, ProgressBar>,
    verbose: bool,
    term: Term,
}

impl DispatchUI {
    pub fn new(total_tasks: usize, mode: UiMode, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let header_bar = if mode == UiMode::Full {
            let header_style = ProgressStyle::default_bar()
                .template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("progress bar template is a valid static string")
                .progress_chars("█▓▒░");
            let bar = multi.add(ProgressBar::new(total_tasks as u64));
            bar.set_style(header_style);
            bar.set_prefix("Tasks");
            bar.set_message("Starting...");
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            mode,
            multi,
            header_bar,
            task_bars: HashMap::new(),
            verbose,
            term: Term::stdout(),
        }
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    /// Print a line through the progress renderer, falling back to stderr.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn handle_event(&mut self, event: &DispatchEvent) {
        match self.mode {
            UiMode::Json => self.handle_json(event),
            UiMode::Minimal => self.handle_minimal(event),
            UiMode::Full => self.handle_full(event),
        }
    }

    fn handle_json(&self, event: &DispatchEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(&self.term, "{}", json);
        }
    }

    fn handle_minimal(&self, event: &DispatchEvent) {
        let line = match event {
            DispatchEvent::WaveStarted { wave, tasks } => {
                format!("Wave {}: {}", wave, tasks.join(", "))
            }
            DispatchEvent::ComplianceChecked {
                wave,
                compliant: false,
                spread_ms,
            } => format!("! wave {} spread {}ms outside the window", wave, spread_ms),
            DispatchEvent::TaskFinished { task, success } => {
                format!("{} {}", if *success { "✓" } else { "✗" }, task)
            }
            DispatchEvent::Finished { summary } => format!(
                "Done: {}/{} {}",
                summary.completed.len(),
                summary.total_tasks,
                if summary.all_success() { "✓" } else { "✗" }
            ),
            _ => return,
        };
        let _ = writeln!(&self.term, "{}", line);
    }

    fn handle_full(&mut self, event: &DispatchEvent) {
        match event {
            DispatchEvent::WaveStarted { wave, tasks } => self.on_wave_started(*wave, tasks),
            DispatchEvent::Spawned { task, handle, wave } => self.on_spawned(task, handle, *wave),
            DispatchEvent::ComplianceChecked {
                wave,
                compliant,
                spread_ms,
            } => self.on_compliance(*wave, *compliant, *spread_ms),
            DispatchEvent::TaskFinished { task, success } => self.on_task_finished(task, *success),
            DispatchEvent::WaveCompleted {
                wave,
                success_count,
                failed_count,
            } => self.on_wave_completed(*wave, *success_count, *failed_count),
            DispatchEvent::Finished { summary } => self.on_finished(summary),
        }
    }

    fn on_wave_started(&self, wave: usize, tasks: &[String]) {
        self.print_line("");
        self.print_line(format!(
            "{} {} Wave {} dispatching: {}",
            WAVE,
            style("═".repeat(40)).cyan(),
            style(wave).yellow().bold(),
            style(tasks.join(", ")).dim()
        ));
        self.header_bar
            .set_message(format!("Wave {} ({} tasks)", wave, tasks.len()));
    }

    fn on_spawned(&mut self, task: &str, handle: &str, wave: usize) {
        let spinner_style = ProgressStyle::default_spinner()
            .template("  {prefix:.bold} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix(format!("[{}]", task));
        bar.set_message(format!("{}running", RUNNING));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.task_bars.insert(task.to_string(), bar);

        if self.verbose {
            self.print_line(format!(
                "  {} {} spawned as {} in wave {}",
                style("▶").cyan(),
                style(task).yellow(),
                style(handle).dim(),
                wave
            ));
        }
    }

    fn on_compliance(&self, wave: usize, compliant: bool, spread_ms: u64) {
        if compliant {
            if self.verbose {
                self.print_line(format!(
                    "  {}Wave {} spawned within {}ms",
                    CHECK, wave, spread_ms
                ));
            }
        } else {
            self.print_line(format!(
                "  {}Wave {} {}: spawn spread {}ms",
                WARN,
                wave,
                style("not parallel").yellow().bold(),
                spread_ms
            ));
        }
    }

    fn on_task_finished(&mut self, task: &str, success: bool) {
        if let Some(bar) = self.task_bars.remove(task) {
            if success {
                bar.finish_with_message(format!("{}{}", CHECK, style("completed").green()));
            } else {
                bar.finish_with_message(format!("{}{}", CROSS, style("failed").red()));
            }
        }
        self.header_bar.inc(1);
    }

    fn on_wave_completed(&self, wave: usize, success_count: usize, failed_count: usize) {
        let emoji = if failed_count == 0 { CHECK } else { CROSS };
        let failed = if failed_count > 0 {
            style(format!("{} failed", failed_count)).red().to_string()
        } else {
            style("0 failed").dim().to_string()
        };
        self.print_line(format!(
            "{}Wave {} resolved: {} succeeded, {}",
            emoji,
            wave,
            style(success_count).green(),
            failed
        ));
    }

    fn on_finished(&mut self, summary: &DispatchSummary) {
        for (_, bar) in self.task_bars.drain() {
            bar.finish_and_clear();
        }
        self.header_bar.finish_and_clear();

        self.print_line("");
        if summary.all_success() {
            self.print_line(format!(
                "{}Dispatch {} {}",
                SPARKLE,
                style("COMPLETE").green().bold(),
                SPARKLE
            ));
        } else if summary.halted {
            self.print_line(format!(
                "{}Dispatch {} after failures: {}",
                CROSS,
                style("HALTED").red().bold(),
                summary.failed.join(", ")
            ));
        } else {
            self.print_line(format!(
                "{}Dispatch finished with {} failed task(s)",
                CROSS,
                style(summary.failed.len()).red().bold()
            ));
        }

        self.print_line(format!(
            "{} Tasks: {}/{} completed in {} wave(s)",
            CLOCK,
            style(summary.completed.len()).green().bold(),
            summary.total_tasks,
            summary.waves_run
        ));
        if !summary.non_compliant_waves.is_empty() {
            self.print_line(format!(
                "   Non-parallel waves: {:?}",
                summary.non_compliant_waves
            ));
        }
        self.print_line(format!(
            "   Duration: {}",
            style(format_duration(summary.duration)).cyan()
        ));
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_mode_parse() {
        assert_eq!(UiMode::parse("json"), UiMode::Json);
        assert_eq!(UiMode::parse("JSON"), UiMode::Json);
        assert_eq!(UiMode::parse("minimal"), UiMode::Minimal);
        assert_eq!(UiMode::parse("full"), UiMode::Full);
        assert_eq!(UiMode::parse("anything_else"), UiMode::Full);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0ms");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_full_mode_tracks_task_bars() {
        let mut ui = DispatchUI::new(2, UiMode::Full, false);
        ui.handle_event(&DispatchEvent::Spawned {
            task: "a".into(),
            handle: "h-a".into(),
            wave: 0,
        });
        assert!(ui.task_bars.contains_key("a"));

        ui.handle_event(&DispatchEvent::TaskFinished {
            task: "a".into(),
            success: true,
        });
        assert!(ui.task_bars.is_empty());
    }

    #[test]
    fn test_dispatch_event_json_serialization() {
        let event = DispatchEvent::TaskFinished {
            task: "research".to_string(),
            success: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"task_finished\""));
        assert!(json.contains("\"task\":\"research\""));
    }
}
