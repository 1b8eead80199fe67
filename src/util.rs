use std::time::Duration;

/// `"{m}m {s}s"`, the way session lengths are shown to the user.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Share of `done` in `total` as a whole percentage, 0 for an empty total.
pub fn percent(done: u64, total: u64) -> u16 {
    match total {
        0 => 0,
        total => ((done.min(total) as f64 / total as f64) * 100.0).round() as u16,
    }
}
