use std::io::{self, Write};
use std::sync::Mutex;

use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};
use serde::Serialize;

use crate::progress::{ProgressEvent, ProgressSink};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TerminalProgress {
    state: Mutex<ProgressState>,
}

#[derive(Default)]
struct ProgressState {
    label: String,
    last_percent: Option<u64>,
    last_bytes: u64,
}

const INDETERMINATE_STEP: u64 = 1024 * 1024;
const BAR_WIDTH: usize = 30;

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn redraw(&self, line: String) {
        let mut stderr = io::stderr();
        let _ = queue!(stderr, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine));
        let _ = write!(stderr, "{line}");
        let _ = stderr.flush();
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match event {
            ProgressEvent::Started { url, .. } => {
                state.label = url.rsplit('/').next().unwrap_or(url.as_str()).to_string();
                state.last_percent = None;
                state.last_bytes = 0;
            }
            ProgressEvent::Advanced {
                bytes_written,
                total: Some(total),
            } if total > 0 => {
                let percent = (bytes_written.min(total) * 100) / total;
                if state.last_percent == Some(percent) {
                    return;
                }
                state.last_percent = Some(percent);
                let filled = (percent as usize * BAR_WIDTH) / 100;
                let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
                self.redraw(format!(
                    "{} [{}] {percent:>3}% {}/{}",
                    state.label,
                    bar,
                    human_bytes(bytes_written),
                    human_bytes(total)
                ));
            }
            ProgressEvent::Advanced { bytes_written, .. } => {
                if bytes_written < state.last_bytes + INDETERMINATE_STEP {
                    return;
                }
                state.last_bytes = bytes_written;
                self.redraw(format!("{} {}", state.label, human_bytes(bytes_written)));
            }
            ProgressEvent::Finished {
                bytes_written,
                elapsed,
            } => {
                let line = format!(
                    "{} {} in {:.1}s",
                    state.label,
                    human_bytes(bytes_written),
                    elapsed.as_secs_f64()
                );
                self.redraw(format!("{}\n", line.green()));
            }
            ProgressEvent::Failed { message } => {
                self.redraw(format!("{}\n", format!("{}: {message}", state.label).red()));
            }
        }
    }
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_readable_sizes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
