//! Single-line progress display, redrawn in place once per tick.
//!
//! ```text
//! | Work            12:04 [#########---------------------]  30% 47:56
//! ```

use std::io::{self, Stdout, Write};
use std::time::Duration;

use killtimer_core::{format_duration, PhaseProgress, RunReporter};

const BAR_WIDTH: usize = 30;
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub struct TerminalProgress<W: Write> {
    out: W,
    label: String,
    frame: usize,
    line_open: bool,
}

impl TerminalProgress<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            label: String::new(),
            frame: 0,
            line_open: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn close_line(&mut self) {
        if self.line_open {
            let _ = writeln!(self.out);
            self.line_open = false;
        }
    }

    fn draw(&mut self, spinner: char, progress: PhaseProgress) {
        let line = render_line(spinner, &self.label, progress);
        let _ = write!(self.out, "\r{line}");
        let _ = self.out.flush();
        self.line_open = true;
    }
}

/// Format one progress line (without carriage return).
pub fn render_line(spinner: char, label: &str, progress: PhaseProgress) -> String {
    let fraction = progress.fraction();
    let filled = ((fraction * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!(
        "{spinner} {label:<15} {elapsed:>6} [{done}{todo}] {pct:>3}% {left}",
        elapsed = format_duration(progress.elapsed, false),
        done = "#".repeat(filled),
        todo = "-".repeat(BAR_WIDTH - filled),
        pct = (fraction * 100.0).floor() as u32,
        left = format_duration(progress.remaining, true),
    )
}

impl<W: Write> RunReporter for TerminalProgress<W> {
    fn announce(&mut self, line: &str) {
        self.close_line();
        let _ = writeln!(self.out, "{line}");
    }

    fn phase_started(&mut self, label: &str, total: Duration) {
        self.close_line();
        self.label = label.to_string();
        self.frame = 0;
        self.draw(
            SPINNER[0],
            PhaseProgress {
                elapsed: Duration::ZERO,
                remaining: total,
                total,
            },
        );
    }

    fn phase_tick(&mut self, progress: PhaseProgress) {
        self.frame = (self.frame + 1) % SPINNER.len();
        self.draw(SPINNER[self.frame], progress);
    }

    fn phase_finished(&mut self, progress: PhaseProgress) {
        self.draw('*', progress);
        self.close_line();
    }
}
