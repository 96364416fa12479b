use std::io::{self, Write};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

pub const COLOR_RESET: &str = "\x1b[0m";
pub const COLOR_RED: &str = "\x1b[31m";
pub const COLOR_CYAN: &str = "\x1b[36m";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second]");

/// Abbreviation used in log prefixes for well-known runner types.
pub fn abbreviate(runner_type: &str) -> &str {
    match runner_type {
        "javascript" => "js",
        "python" => "py",
        other => other,
    }
}

/// Formatted prefix for a runner's own output lines.
pub fn runner_prefix(runner_type: &str) -> String {
    format!("[runner:{}] ", abbreviate(runner_type))
}

/// Wraps runner output with a timestamp, level tag, colour, and prefix.
///
/// Line oriented: each chunk is split on newlines and empty lines are
/// dropped.
pub struct RunnerWriter<W> {
    out: W,
    prefix: String,
    level: &'static str,
    color: &'static str,
    use_color: bool,
}

impl<W: Write> RunnerWriter<W> {
    pub fn new(
        out: W,
        prefix: String,
        level: &'static str,
        color: &'static str,
        use_color: bool,
    ) -> Self {
        Self {
            out,
            prefix,
            level,
            color,
            use_color,
        }
    }

    /// Write a chunk of runner output, one decorated line per non-empty
    /// input line.
    pub fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
        for line in chunk.lines() {
            if line.trim().is_empty() {
                continue;
            }
            self.write_line(line)?;
        }
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let timestamp = OffsetDateTime::now_utc()
            .format(TIMESTAMP_FORMAT)
            .map_err(|e| io::Error::other(e.to_string()))?;

        if self.use_color {
            writeln!(
                self.out,
                "{timestamp} {}{} {}{line}{}",
                self.color, self.level, self.prefix, COLOR_RESET
            )
        } else {
            writeln!(self.out, "{timestamp} {} {}{line}", self.level, self.prefix)
        }
    }
}

/// Pump lines from a child pipe into a [`RunnerWriter`] until EOF.
pub async fn forward_lines<R, W>(reader: R, mut writer: RunnerWriter<W>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        writer.write_chunk(&line)?;
    }
    Ok(())
}
