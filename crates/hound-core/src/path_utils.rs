/// Replaces every character that is not alphanumeric, `.`, `-` or `_` with `_`
/// so the value can be used as a single path segment. Non-ASCII letters are
/// kept because chat channel names may be written in any script. Never
/// returns an empty string.
pub fn sanitize_path_segment(raw: &str) -> String {
    let sanitized = raw
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() || trimmed.chars().all(|ch| ch == '.') {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
