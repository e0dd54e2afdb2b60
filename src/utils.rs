/// First 8 characters of a commit hash
pub fn short_sha(sha: &str) -> &str {
    &sha[..8.min(sha.len())]
}

/// Clip a score into [0, 1]. NaN becomes 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Arithmetic mean, 0 for no values.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Shorten text for a table cell, marking the cut with `...`.
pub fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Locate the JSON object in a model answer.
///
/// A fenced block (```` ```json ```` or a bare fence) wins; otherwise the span
/// from the first `{` to the last `}` is taken. Returns `None` when neither
/// exists.
pub fn extract_json_str(response: &str) -> Option<&str> {
    if let Some(fenced) = fenced_block(response) {
        return Some(fenced);
    }
    let open = response.find('{')?;
    let close = response.rfind('}')?;
    (open < close).then(|| response[open..=close].trim())
}

fn fenced_block(response: &str) -> Option<&str> {
    let fence = response.find("```")?;
    let after = &response[fence + 3..];
    // The info string (`json`, `JSON`, ...) runs to the end of the fence line.
    let body_start = after.find('\n').map(|n| n + 1).unwrap_or(0);
    let body = &after[body_start..];
    let body_end = body.find("```")?;
    Some(body[..body_end].trim())
}
