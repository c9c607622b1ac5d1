//! Formatting helpers for human-readable byte sizes and durations.

use std::time::Duration;

const SI_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Formats a byte count with SI (base 1000) units.
///
/// Values below 10 in their unit keep one decimal place, larger values are
/// rounded to whole units: `1500` is `"1.5 kB"`, `82_854_982` is `"83 MB"`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < SI_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else if value < 10.0 {
        format!("{value:.1} {}", SI_UNITS[unit])
    } else {
        format!("{value:.0} {}", SI_UNITS[unit])
    }
}

/// Formats run time for the summary line.
///
/// Under a minute this is seconds with one truncated decimal (`"4.2s"`),
/// otherwise compact clock units such as `"1m05s"` or `"2h00m13s"`.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}.{}s", d.subsec_millis() / 100),
        (0, _) => format!("{minutes}m{seconds:02}s"),
        _ => format!("{hours}h{minutes:02}m{seconds:02}s"),
    }
}
