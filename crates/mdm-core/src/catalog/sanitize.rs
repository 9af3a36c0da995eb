//! Filesystem-safe mod names.

const NAME_MAX: usize = 255;
const FALLBACK: &str = "untitled";

fn is_reserved_device_name(base: &str) -> bool {
    let lower = base.to_ascii_lowercase();
    match lower.as_str() {
        "con" | "prn" | "aux" | "nul" => true,
        _ => lower
            .strip_prefix("com")
            .or_else(|| lower.strip_prefix("lpt"))
            .is_some_and(|rest| rest.len() == 1 && rest.as_bytes()[0].is_ascii_digit()),
    }
}

fn trim_dots(s: &str) -> &str {
    s.trim().trim_matches('.')
}

/// Sanitizes a mod's display name for use as a directory name on any desktop OS.
///
/// - Replaces `<>:"/\|?*` and control characters with `_`
/// - Prefixes reserved device names (`CON`, `COM1`, ...) with `_`
/// - Trims surrounding whitespace and dots
/// - Limits length to 255 bytes; empty results become `untitled`
pub fn sanitize_mod_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let base = out.split('.').next().unwrap_or_default();
    if is_reserved_device_name(base) {
        out.insert(0, '_');
    }

    let mut trimmed = trim_dots(&out).to_string();
    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed.truncate(take);
        trimmed = trim_dots(&trimmed).to_string();
    }

    if trimmed.is_empty() {
        FALLBACK.to_string()
    } else {
        trimmed
    }
}
