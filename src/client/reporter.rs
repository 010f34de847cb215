use crate::client::constants::{ACCEPTABLE_DELAY_MS, EXCELLENT_DELAY_MS, REPORT_PRECISION};
use crate::client::error::Result;
use crate::client::session::Session;
use crate::client::statistics::Statistics;
use colored::*;
use std::io::Write;
use tracing::debug;

/// Reporter for printing session results
pub struct Reporter;

impl Reporter {
    /// One line per sequence, in order: `"<seq>: <offset> <delay>"` or `"<seq>: Dropped"`
    pub fn report_lines(session: &Session) -> Vec<String> {
        session
            .entries()
            .map(|(sequence, entry)| match entry.estimate {
                Some(estimate) => format!(
                    "{}: {:.prec$} {:.prec$}",
                    sequence,
                    estimate.offset,
                    estimate.round_trip_delay,
                    prec = REPORT_PRECISION
                ),
                None => format!("{}: Dropped", sequence),
            })
            .collect()
    }

    /// Writes the report and flushes so harnesses see it immediately
    pub fn write_report<W: Write>(session: &Session, out: &mut W) -> Result<()> {
        for line in Self::report_lines(session) {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        debug!(lines = session.count(), "Report written");
        Ok(())
    }

    /// Formats the aggregate summary shown with `--summary`
    pub fn summary(session: &Session) -> Result<String> {
        let expected = session.count();
        let received = session.received();
        let dropped = expected - received;
        let loss_pct = f64::from(dropped) / f64::from(expected.max(1)) * 100.0;

        let mut lines = vec![
            format!("{}", "Clockprobe Summary".cyan().bold()),
            format!(
                "Probes:   {} sent, {} received, {} dropped ({})",
                expected,
                received,
                dropped,
                Self::colorize_loss(loss_pct)
            ),
        ];

        if received == 0 {
            lines.push(format!("{}", "No echoes received".red()));
            return Ok(lines.join("\n"));
        }

        let stats = Statistics::new(session.estimates())?;
        lines.push(format!("Offset:   mean {:+.6}s", stats.mean_offset()));
        lines.push(format!(
            "Delay:    min {} / mean {} / max {}",
            Self::format_delay(stats.min_delay()),
            Self::colorize_delay(stats.mean_delay()),
            Self::format_delay(stats.max_delay()),
        ));
        lines.push(format!(
            "          p50 {} / p99 {}",
            Self::format_delay(stats.delay_percentile(0.5)),
            Self::format_delay(stats.delay_percentile(0.99)),
        ));
        Ok(lines.join("\n"))
    }

    fn format_delay(seconds: f64) -> String {
        format!("{:.3}ms", seconds * 1000.0)
    }

    fn colorize_delay(seconds: f64) -> ColoredString {
        let ms = seconds * 1000.0;
        let text = Self::format_delay(seconds);
        if ms < EXCELLENT_DELAY_MS {
            text.green()
        } else if ms < ACCEPTABLE_DELAY_MS {
            text.yellow()
        } else {
            text.red()
        }
    }

    fn colorize_loss(loss_pct: f64) -> ColoredString {
        let text = format!("{:.1}% loss", loss_pct);
        if loss_pct == 0.0 {
            text.green()
        } else if loss_pct < 10.0 {
            text.yellow()
        } else {
            text.red()
        }
    }
}
