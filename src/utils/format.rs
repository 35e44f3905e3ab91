use anyhow::{Result, bail};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Format reading time in minutes to "Xh Ym" or "Ym"
pub fn format_minutes(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// Create a simple ASCII progress bar
pub fn progress_bar(filled: u32, total: u32, width: usize) -> String {
    if total == 0 {
        return "░".repeat(width);
    }
    let ratio = (filled as f64 / total as f64).min(1.0);
    let filled_count = (ratio * width as f64).round() as usize;
    let empty_count = width.saturating_sub(filled_count);
    format!("{}{}", "█".repeat(filled_count), "░".repeat(empty_count))
}

/// Fit a title into `width` terminal columns, truncating with "…" and padding with spaces
pub fn fit_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        let pad = width - text.width();
        return format!("{}{}", text, " ".repeat(pad));
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

/// Parse a UTC offset string into total minutes.
/// Accepts: "5:30", "+5:30", "-5:30", "5", "+5", "5.5"
pub fn parse_tz_offset(s: &str) -> Result<i32> {
    let s = s.trim().trim_start_matches('+');
    let negative = s.starts_with('-');
    let s = s.trim_start_matches('-');
    let sign = if negative { -1 } else { 1 };
    if s.is_empty() {
        bail!("Empty timezone offset");
    }

    let minutes = if s.contains(':') {
        let mut parts = s.splitn(2, ':');
        let hours: i32 = parts.next().unwrap_or("0").parse()?;
        let mins: i32 = parts.next().unwrap_or("0").parse()?;
        hours.checked_mul(60).and_then(|h| h.checked_add(mins))
    } else if s.contains('.') {
        let hours: f64 = s.parse()?;
        let minutes = (hours * 60.0).round();
        (minutes.is_finite() && minutes.abs() <= f64::from(i32::MAX)).then_some(minutes as i32)
    } else {
        let hours: i32 = s.parse()?;
        hours.checked_mul(60)
    };

    match minutes.and_then(|m| m.checked_mul(sign)) {
        Some(minutes) => Ok(minutes),
        None => bail!("Timezone offset '{}' is out of range", s),
    }
}

/// Format total minutes as "+H:MM" string
pub fn format_tz_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { "-" } else { "+" };
    let abs = minutes.abs();
    let h = abs / 60;
    let m = abs % 60;
    if m == 0 {
        format!("{}{}", sign, h)
    } else {
        format!("{}{}:{:02}", sign, h, m)
    }
}
