// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Terminal rendering of a run.
//!
//! [`Presenter`] has a single primitive, [`Presenter::line`]; every report
//! element is a provided method built on it, so implementations only decide
//! how a [`Tone`] looks.

use std::{
    io::{IsTerminal, Write},
    sync::Arc,
    time::Duration,
};

use colored::Colorize;
use filesyncer_sync::{
    OutcomeStatus, ProgressEntry, ProgressObserver, ReconcileOutcome, RunSummary,
};
use parking_lot::Mutex;
use strum_macros::{Display, EnumString};

/// Width of the progress bar in columns
pub const PROGRESS_BAR_WIDTH: usize = 40;

const RULE: &str = "==================================================";

/// Semantic style of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Heading,
    Info,
    Success,
    Created,
    Changed,
    Failure,
    Warning,
    Added,
    Removed,
    Hunk,
    Emphasis,
}

/// Renders the run report
pub trait Presenter: Send + Sync {
    /// Write one line of output in the given tone
    fn line(&self, tone: Tone, text: &str);

    /// Called before each progress frame
    fn begin_frame(&self) {}

    fn banner(&self) {
        self.line(Tone::Heading, "FileSyncer");
        self.line(Tone::Plain, RULE);
    }

    fn last_sync(&self, last: Option<&RunSummary>) {
        match last {
            Some(run) => self.line(Tone::Info, &format!("last sync: {}", run.timestamp)),
            None => self.line(Tone::Info, "first sync"),
        }
        self.line(Tone::Plain, "");
    }

    fn progress_frame(&self, entries: &[ProgressEntry]) {
        self.begin_frame();
        for entry in entries {
            self.line(Tone::Info, &progress_bar(entry));
            if entry.total_bytes > 0 {
                self.line(
                    Tone::Plain,
                    &format!(
                        "  downloaded: {}/{} bytes",
                        entry.downloaded_bytes, entry.total_bytes
                    ),
                );
            }
            self.line(Tone::Plain, "");
        }
    }

    /// One target's result, with at most `preview_lines` lines of its diff
    fn outcome(&self, outcome: &ReconcileOutcome, preview_lines: usize) {
        let (symbol, tone) = match outcome.status {
            OutcomeStatus::Unchanged => ('✓', Tone::Success),
            OutcomeStatus::New => ('+', Tone::Created),
            OutcomeStatus::Updated => ('↑', Tone::Changed),
            OutcomeStatus::Error => ('✗', Tone::Failure),
        };
        self.line(
            tone,
            &format!("{symbol} {}: {}", outcome.target_name, outcome.message),
        );

        if outcome.status != OutcomeStatus::Updated || outcome.diff_lines.is_empty() {
            return;
        }
        self.line(Tone::Plain, "  diff preview:");
        for diff_line in outcome.diff_lines.iter().take(preview_lines) {
            let tone = match diff_line.chars().next() {
                Some('+') => Tone::Added,
                Some('-') => Tone::Removed,
                Some('@') => Tone::Hunk,
                _ => Tone::Plain,
            };
            self.line(tone, &format!("    {}", diff_line.trim_end()));
        }
        let hidden = outcome.diff_lines.len().saturating_sub(preview_lines);
        if hidden > 0 {
            self.line(Tone::Info, &format!("    ... {hidden} more diff lines"));
        }
    }

    fn closing(&self, elapsed: Duration, recent: &[RunSummary]) {
        self.line(Tone::Plain, RULE);
        self.line(
            Tone::Emphasis,
            &format!("sync finished in {:.2}s", elapsed.as_secs_f64()),
        );
        self.line(Tone::Plain, "");
        self.line(Tone::Plain, "recent syncs:");
        for run in recent {
            self.line(Tone::Plain, &format!("  {}", run_summary_line(run)));
        }
    }

    fn warning(&self, text: &str) { self.line(Tone::Warning, text); }

    fn failure(&self, text: &str) { self.line(Tone::Failure, text); }
}

/// `name: |████----| NN% phase`
#[must_use]
pub fn progress_bar(entry: &ProgressEntry) -> String {
    let percent = usize::from(entry.percent());
    let filled = PROGRESS_BAR_WIDTH * percent / 100;
    format!(
        "{}: |{}{}| {percent}% {}",
        entry.target_name,
        "█".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled),
        entry.phase,
    )
}

/// `<timestamp to the second> - new:N updated:N unchanged:N error:N`
#[must_use]
pub fn run_summary_line(run: &RunSummary) -> String {
    let counts = run.counts();
    let timestamp = run.timestamp.get(..19).unwrap_or(&run.timestamp);
    format!(
        "{timestamp} - new:{} updated:{} unchanged:{} error:{}",
        counts.new, counts.updated, counts.unchanged, counts.error
    )
}

/// Writes lines as they are, ignoring tone
pub struct PlainPresenter<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> PlainPresenter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W { self.writer.into_inner() }
}

impl<W: Write + Send> Presenter for PlainPresenter<W> {
    fn line(&self, _tone: Tone, text: &str) {
        // A closed stdout must not take the run down with it.
        let _ = writeln!(self.writer.lock(), "{text}");
    }
}

/// Styles lines with ANSI colors and redraws progress frames in place
pub struct ColoredPresenter<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> ColoredPresenter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W { self.writer.into_inner() }
}

impl<W: Write + Send> Presenter for ColoredPresenter<W> {
    fn line(&self, tone: Tone, text: &str) {
        let styled = match tone {
            Tone::Plain => text.normal(),
            Tone::Heading => text.cyan().bold(),
            Tone::Info => text.cyan(),
            Tone::Success | Tone::Added => text.green(),
            Tone::Created => text.blue(),
            Tone::Changed | Tone::Warning => text.yellow(),
            Tone::Failure | Tone::Removed => text.red(),
            Tone::Hunk => text.magenta(),
            Tone::Emphasis => text.green().bold(),
        };
        let _ = writeln!(self.writer.lock(), "{styled}");
    }

    fn begin_frame(&self) {
        // Clear screen, cursor home.
        let mut writer = self.writer.lock();
        let _ = write!(writer, "\x1B[2J\x1B[1;1H");
        let _ = writer.flush();
    }
}

/// When to use [`ColoredPresenter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ColorChoice {
    /// Colored when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// A presenter writing to stdout according to this choice
    #[must_use]
    pub fn stdout_presenter(self) -> Arc<dyn Presenter> {
        let colored = match self {
            Self::Always => {
                colored::control::set_override(true);
                true
            }
            Self::Never => false,
            Self::Auto => std::io::stdout().is_terminal(),
        };
        if colored {
            Arc::new(ColoredPresenter::new(std::io::stdout()))
        } else {
            Arc::new(PlainPresenter::new(std::io::stdout()))
        }
    }
}

/// Feeds progress snapshots to a [`Presenter`]
pub struct ProgressView {
    presenter: Arc<dyn Presenter>,
}

impl ProgressView {
    #[must_use]
    pub fn new(presenter: Arc<dyn Presenter>) -> Self { Self { presenter } }
}

impl ProgressObserver for ProgressView {
    fn render(&self, entries: &[ProgressEntry]) { self.presenter.progress_frame(entries); }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use filesyncer_sync::{Fingerprint, TaskPhase, fingerprint};

    use super::*;

    fn render(f: impl FnOnce(&PlainPresenter<Vec<u8>>)) -> String {
        let presenter = PlainPresenter::new(Vec::new());
        f(&presenter);
        String::from_utf8(presenter.into_inner()).unwrap()
    }

    fn entry(downloaded: u64, total: u64, finished: bool, phase: TaskPhase) -> ProgressEntry {
        ProgressEntry {
            target_name: "A".to_string(),
            total_bytes: total,
            downloaded_bytes: downloaded,
            finished,
            phase,
        }
    }

    #[test]
    fn test_progress_bar() {
        let half = progress_bar(&entry(50, 100, false, TaskPhase::Fetching));
        assert_eq!(
            half,
            format!("A: |{}{}| 50% fetching", "█".repeat(20), "-".repeat(20))
        );

        let unknown = progress_bar(&entry(10, 0, false, TaskPhase::Fetching));
        assert!(unknown.ends_with(&format!("|{}| 0% fetching", "-".repeat(40))));

        let done = progress_bar(&entry(10, 0, true, TaskPhase::Done));
        assert!(done.ends_with(&format!("|{}| 100% done", "█".repeat(40))));
    }

    #[test]
    fn test_progress_frame_shows_bytes_only_when_total_known() {
        let out = render(|p| {
            p.progress_frame(&[
                entry(5, 10, false, TaskPhase::Fetching),
                entry(3, 0, false, TaskPhase::Fetching),
            ]);
        });
        assert_eq!(out.matches("downloaded:").count(), 1);
        assert!(out.contains("  downloaded: 5/10 bytes"));
    }

    #[test]
    fn test_outcome_lines() {
        let digest: Fingerprint = fingerprint(b"hello");
        let out = render(|p| {
            p.outcome(&ReconcileOutcome::unchanged("a"), 10);
            p.outcome(&ReconcileOutcome::new_file("b", &digest), 10);
            p.outcome(&ReconcileOutcome::error("c", "boom"), 10);
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec![
            "✓ a: content unchanged".to_string(),
            format!("+ b: new file (sha256: {digest})"),
            "✗ c: update failed: boom".to_string(),
        ]);
    }

    #[test]
    fn test_diff_preview_is_truncated() {
        let diff: Vec<String> = (0..13).map(|i| format!("+line {i}")).collect();
        let outcome =
            ReconcileOutcome::updated("a", &fingerprint(b"x"), &fingerprint(b"y"), diff);

        let out = render(|p| p.outcome(&outcome, 10));

        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("↑ a: updated (old sha256: "));
        assert_eq!(lines[1], "  diff preview:");
        assert_eq!(lines[2], "    +line 0");
        assert_eq!(lines[11], "    +line 9");
        assert_eq!(lines[12], "    ... 3 more diff lines");
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn test_last_sync_and_closing() {
        let run = RunSummary {
            timestamp: "2025-03-04T05:06:07.891011Z".to_string(),
            outcomes:  vec![
                ReconcileOutcome::unchanged("a"),
                ReconcileOutcome::error("b", "boom"),
            ],
        };
        let out = render(|p| {
            p.last_sync(None);
            p.last_sync(Some(&run));
            p.closing(Duration::from_millis(1234), std::slice::from_ref(&run));
        });
        assert!(out.contains("first sync\n"));
        assert!(out.contains("last sync: 2025-03-04T05:06:07.891011Z\n"));
        assert!(out.contains("sync finished in 1.23s\n"));
        assert!(out.contains("recent syncs:\n  2025-03-04T05:06:07 - new:0 updated:0 unchanged:1 error:1\n"));
    }

    #[test]
    fn test_short_timestamp_is_kept_whole() {
        let run = RunSummary {
            timestamp: "run-1".to_string(),
            outcomes:  Vec::new(),
        };
        assert_eq!(
            run_summary_line(&run),
            "run-1 - new:0 updated:0 unchanged:0 error:0"
        );
    }

    #[test]
    fn test_colored_presenter_styles_and_clears() {
        colored::control::set_override(true);
        let presenter = ColoredPresenter::new(Vec::new());
        presenter.progress_frame(&[entry(1, 2, false, TaskPhase::Fetching)]);
        presenter.line(Tone::Failure, "bad");
        let out = String::from_utf8(presenter.into_inner()).unwrap();

        assert!(out.starts_with("\x1B[2J\x1B[1;1H"));
        assert!(out.contains("\x1B[31mbad\x1B[0m"));
    }

    #[test]
    fn test_color_choice_parsing() {
        assert_eq!(ColorChoice::from_str("always").unwrap(), ColorChoice::Always);
        assert_eq!(ColorChoice::from_str("never").unwrap(), ColorChoice::Never);
        assert_eq!(ColorChoice::default().to_string(), "auto");
        assert!(ColorChoice::from_str("sometimes").is_err());
    }
}
