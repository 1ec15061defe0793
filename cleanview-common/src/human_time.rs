//! Human-readable time formatting for reports and CLI output
//!
//! Two formats are used across cleanview:
//! - Timecodes (`H:MM:SS.mmm`) for positions on a media timeline
//! - Durations, whose format is picked by magnitude

/// Duration format selection thresholds (seconds)
const SHORT_FORMAT_MAX: f64 = 100.0; // < 100s → X.XXs
const MEDIUM_FORMAT_MAX: f64 = 6000.0; // < 100m → M:SS.Xs
                                       // >= 100m → H:MM:SS

/// Format a timeline position as `H:MM:SS.mmm`.
///
/// Negative and non-finite inputs are clamped to zero; positions on a media
/// timeline are never negative.
///
/// # Examples
///
/// ```
/// use cleanview_common::human_time::format_timecode;
///
/// assert_eq!(format_timecode(0.0), "0:00:00.000");
/// assert_eq!(format_timecode(75.25), "0:01:15.250");
/// assert_eq!(format_timecode(3725.5), "1:02:05.500");
/// ```
pub fn format_timecode(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let total_millis = (seconds * 1000.0).round() as u64;

    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    format!("{}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Format a duration with a format chosen by its magnitude.
///
/// - Short (`X.XXs`): under 100 seconds
/// - Medium (`M:SS.Xs`): under 100 minutes
/// - Long (`H:MM:SS`): everything else
///
/// # Examples
///
/// ```
/// use cleanview_common::human_time::format_duration;
///
/// assert_eq!(format_duration(4.5), "4.50s");
/// assert_eq!(format_duration(330.0), "5:30.0s");
/// assert_eq!(format_duration(7200.0), "2:00:00");
/// assert_eq!(format_duration(-2.0), "-2.00s");
/// ```
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "?".to_string();
    }

    let is_negative = seconds < 0.0;
    let abs_seconds = seconds.abs();

    let formatted = if abs_seconds < SHORT_FORMAT_MAX {
        format!("{:.2}s", abs_seconds)
    } else if abs_seconds < MEDIUM_FORMAT_MAX {
        let tenths = (abs_seconds * 10.0).round() as u64;
        let minutes = tenths / 600;
        let secs = (tenths % 600) as f64 / 10.0;
        format!("{}:{:04.1}s", minutes, secs)
    } else {
        let whole = abs_seconds.round() as u64;
        format!("{}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60)
    };

    if is_negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Percentage of `part` in `whole`, 0.0 when `whole` is not positive
pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timecode_rounds_millis() {
        assert_eq!(format_timecode(1.0004), "0:00:01.000");
        assert_eq!(format_timecode(1.0006), "0:00:01.001");
    }

    #[test]
    fn test_timecode_clamps_negative() {
        assert_eq!(format_timecode(-3.0), "0:00:00.000");
        assert_eq!(format_timecode(f64::NAN), "0:00:00.000");
    }

    #[test]
    fn test_duration_boundaries() {
        assert_eq!(format_duration(99.994), "99.99s");
        assert_eq!(format_duration(100.0), "1:40.0s");
        assert_eq!(format_duration(6000.0), "1:40:00");
    }

    #[test]
    fn test_duration_rounding_carries_into_minutes() {
        assert_eq!(format_duration(119.97), "2:00.0s");
        assert_eq!(format_duration(179.94), "2:59.9s");
        assert_eq!(format_duration(-119.97), "-2:00.0s");
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(15.0, 60.0), 25.0);
        assert_eq!(percent_of(1.0, 0.0), 0.0);
    }
}
