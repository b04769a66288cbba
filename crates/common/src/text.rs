use sha2::{Digest, Sha256};

/// Separator between digest parts; cannot appear inside a URL path segment.
const PART_SEPARATOR: &[u8] = b"\n";

/// Lowercase hex SHA-256 of `parts` joined by a newline.
pub fn digest_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            hasher.update(PART_SEPARATOR);
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

pub fn truncate_chars(value: &str, limit: usize) -> String {
    if value.is_empty() {
        return String::new();
    }
    let mut truncated: String = value.chars().take(limit).collect();
    if truncated.len() < value.len() {
        truncated.push('…');
    }
    truncated
}

/// Lossy UTF-8 preview of a response body for log lines.
pub fn body_preview(body: &[u8], limit: usize) -> String {
    if body.is_empty() {
        return String::new();
    }
    truncate_chars(&String::from_utf8_lossy(body), limit)
}
