//! Human-readable progress text.

const SIZE_LABELS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// 1024-based size rounded to two decimals, e.g. `1.5 KB`, `512 B`.
pub fn format_bytes(bytes: f64) -> String {
    let mut value = bytes.max(0.0);
    let mut idx = 0;
    while value >= 1024.0 && idx < SIZE_LABELS.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_LABELS[idx])
}

/// `Ns`, `Nm Ns` or `Nh Nm`; `?` when unknown.
pub fn format_eta(eta_secs: Option<f64>) -> String {
    let Some(secs) = eta_secs.filter(|s| s.is_finite() && *s >= 0.0) else {
        return "?".to_string();
    };
    let secs = secs.round() as u64;
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}

/// Status line shown next to a downloading job.
pub fn status_line(percent: f64, downloaded: u64, total: u64, speed: f64, eta: Option<f64>) -> String {
    format!(
        "{:.2}% ({}/{}) • {}/s • {}",
        percent,
        format_bytes(downloaded as f64),
        format_bytes(total as f64),
        format_bytes(speed),
        format_eta(eta)
    )
}
