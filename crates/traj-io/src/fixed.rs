//! Helpers for punch-card style text records.

/// Trimmed `[start, end)` slice, clipped to the line; `None` if the line
/// ends before `start`.
pub fn slice_trim_opt(line: &str, start: usize, end: usize) -> Option<&str> {
    if line.len() < start || !line.is_char_boundary(start) {
        return None;
    }
    let mut end = end.min(line.len());
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    Some(line[start..end].trim())
}

pub fn parse_f64_field(line: &str, start: usize, end: usize, label: &str) -> Result<f64, String> {
    let raw = slice_trim_opt(line, start, end).ok_or_else(|| format!("missing {label} field"))?;
    if raw.is_empty() {
        return Err(format!("missing {label} field"));
    }
    raw.parse::<f64>()
        .map_err(|_| format!("invalid {label} '{raw}'"))
}

/// Blank fields are `None`; malformed ones are an error.
pub fn parse_int_opt(line: &str, start: usize, end: usize, label: &str) -> Result<Option<i64>, String> {
    match slice_trim_opt(line, start, end) {
        None => Ok(None),
        Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("invalid {label} '{raw}'")),
    }
}

/// Value of a `t=<float>` token in a comment line.
///
/// `Ok(None)` when no `t=` is present, `Err` when one is present but the
/// number after it does not parse.
pub fn find_time(comment: &str) -> Result<Option<f64>, String> {
    let Some(pos) = comment.match_indices("t=").map(|(i, _)| i).find(|&i| {
        comment[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    }) else {
        return Ok(None);
    };
    let rest = comment[pos + 2..].trim_start();
    let token = rest.split_whitespace().next().unwrap_or("");
    token
        .trim_end_matches(',')
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("invalid time '{token}' after t="))
}
