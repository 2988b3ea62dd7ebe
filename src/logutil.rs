//! Keeps free-form model replies and error chains on a single log line.

const MAX_PREVIEW: usize = 300;

/// Escape control characters and cap the length of a string destined for the log.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::escape_log;

    #[test]
    fn reply_stays_on_one_line() {
        assert_eq!(escape_log("Too low.\nTry again\t!"), "Too low.\\nTry again\\t!");
    }

    #[test]
    fn long_reply_is_truncated() {
        let long = "a".repeat(400);
        let out = escape_log(&long);
        assert_eq!(out.chars().count(), 301);
        assert!(out.ends_with('…'));
    }
}
