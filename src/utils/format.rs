//! Countdown formatting

/// Format a millisecond duration as `MM:SS`.
///
/// Minutes are not wrapped into hours, so an hour renders as `60:00`.
/// Both fields are floored to whole seconds; negative input renders as `00:00`.
pub fn format_time(milliseconds: i64) -> String {
    let milliseconds = milliseconds.max(0);
    let minutes = milliseconds / 60_000;
    let seconds = (milliseconds % 60_000) / 1_000;
    format!("{:02}:{:02}", minutes, seconds)
}
