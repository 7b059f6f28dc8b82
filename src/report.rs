//! Summary output: counters with right-aligned 24-wide values.

use std::io::{self, Write};
use std::time::Duration;

use crate::types::Counters;
use crate::utils::config::COLUMN_WIDTH;

const UNITS: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// Whole binary-prefixed units: the largest unit the value reaches, truncated.
pub fn format_size(bytes: u128) -> String {
    let mut unit = 0;
    let mut value = bytes;
    while value >= 1024 && unit + 1 < UNITS.len() {
        value /= 1024;
        unit += 1;
    }
    format!("{} {}", value, UNITS[unit])
}

/// Write the summary lines for `counters` and `elapsed` to `out`.
pub fn write_summary<W: Write>(out: &mut W, counters: &Counters, elapsed: Duration) -> io::Result<()> {
    let w = COLUMN_WIDTH;
    writeln!(out, "{:>w$} records seen", counters.rows)?;
    writeln!(out, "{:>w$} directories", counters.directories)?;
    writeln!(out, "{:>w$} files", counters.files)?;
    writeln!(out, "{:>w$} bytes grand total", counters.bytes)?;
    writeln!(out, "{:>w$} grand total", format_size(counters.bytes))?;
    if counters.malformed > 0 {
        writeln!(out, "{:>w$} malformed", counters.malformed)?;
    }
    if counters.commands > 0 {
        writeln!(out, "{:>w$} commands", counters.commands)?;
    }
    if counters.statements > 0 {
        writeln!(out, "{:>w$} statements", counters.statements)?;
    }
    let secs = elapsed.as_secs();
    if secs == 0 {
        writeln!(out, "{:>w$} Finished in less than a second", "n/a")?;
    } else {
        let rate = counters.bytes / u128::from(secs);
        writeln!(out, "{:>w$} seconds duration", secs)?;
        writeln!(out, "{:>w$} bytes/s", rate)?;
        writeln!(out, "{:>w$} / second", format_size(rate))?;
    }
    Ok(())
}

/// Print the summary to stdout.
pub fn print_summary(counters: &Counters, elapsed: Duration) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_summary(&mut out, counters, elapsed) {
        log::warn!("Cannot print summary: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_truncate_to_whole_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1 KiB");
        assert_eq!(format_size(3 * 1024 * 1024 - 1), "2 MiB");
        assert_eq!(format_size(5 << 40), "5 TiB");
    }

    #[test]
    fn summary_has_aligned_columns() {
        let counters = Counters {
            rows: 5,
            directories: 2,
            files: 3,
            bytes: 2048,
            ..Default::default()
        };
        let mut out = Vec::new();
        write_summary(&mut out, &counters, Duration::from_millis(10)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("{:>24} directories", 2)));
        assert!(text.contains(&format!("{:>24} grand total", "2 KiB")));
        assert!(text.contains("Finished in less than a second"));
        assert!(!text.contains("malformed"));
    }
}
