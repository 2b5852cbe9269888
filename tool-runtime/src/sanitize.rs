//! Scrubbing of caller-facing error text.

use std::sync::LazyLock;

use regex::Regex;

/// Replacement for messages that are empty or leak internals.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred during processing";

/// Longest message, in characters, returned before truncation.
pub const MAX_MESSAGE_CHARS: usize = 200;

static SENSITIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // source locations
        r"[A-Za-z0-9_./\\-]+\.(rs|go|py|js|ts):\d+",
        // panic output
        r"(?i)panic:",
        r"panicked at",
        r"thread '[^']*' panicked",
        // runtime internals
        r"\bruntime\.",
        r"\breflect\.",
        r"\b(std|core|alloc|tokio)::",
        r"0x[0-9a-fA-F]{8,}",
        r"\bgoroutine \d+",
        r"\btask \d+",
        r"\(\*[A-Za-z]+\)",
        // home and system paths
        r"/Users/",
        r"/home/",
        r"/root/",
        r"(?i)\b[A-Z]:\\",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Returns a message that is safe to show to a caller.
///
/// Blank input and anything matching a sensitive pattern become
/// [`GENERIC_ERROR_MESSAGE`]; other text is truncated to
/// [`MAX_MESSAGE_CHARS`] characters with a trailing `...`.
#[must_use]
pub fn sanitize(message: &str) -> String {
    if message.trim().is_empty() {
        return GENERIC_ERROR_MESSAGE.to_owned();
    }
    if SENSITIVE_PATTERNS.iter().any(|regex| regex.is_match(message)) {
        return GENERIC_ERROR_MESSAGE.to_owned();
    }
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_messages_become_generic() {
        assert_eq!(sanitize(""), GENERIC_ERROR_MESSAGE);
        assert_eq!(sanitize(" \t "), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn leaks_become_generic() {
        for leak in [
            "panic: runtime error: index out of range",
            "thread 'main' panicked at src/lib.rs:10:5",
            "called `Option::unwrap()` at src/handler.rs:42",
            "failed in /home/alice/project",
            "open /Users/bob/.ssh/id_rsa",
            "cannot read /root/.config",
            r"C:\Windows\system32 missing",
            "pointer 0xdeadbeef01 was null",
            "goroutine 17 [running]",
            "task 42 was cancelled",
            "std::io::Error: broken pipe",
            "reflect.Value.Interface failed",
            "nil map in (*Server)",
        ] {
            assert_eq!(sanitize(leak), GENERIC_ERROR_MESSAGE, "{leak}");
        }
    }

    #[test]
    fn safe_messages_are_kept() {
        assert_eq!(sanitize("quota exceeded"), "quota exceeded");
        assert_eq!(sanitize("value must be at least 3"), "value must be at least 3");
    }

    #[test]
    fn long_messages_are_truncated() {
        let long = "a".repeat(250);
        let sanitized = sanitize(&long);
        assert_eq!(sanitized.len(), MAX_MESSAGE_CHARS + 3);
        assert!(sanitized.ends_with("..."));
        assert_eq!(sanitize(&"b".repeat(200)), "b".repeat(200));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(201);
        let sanitized = sanitize(&long);
        assert_eq!(sanitized.chars().count(), MAX_MESSAGE_CHARS + 3);
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(SENSITIVE_PATTERNS.len(), 15);
    }

    proptest! {
        #[test]
        fn output_is_bounded(message in ".{0,400}") {
            let sanitized = sanitize(&message);
            prop_assert!(sanitized.chars().count() <= MAX_MESSAGE_CHARS + 3);
            prop_assert!(!sanitized.trim().is_empty());
        }

        #[test]
        fn panic_prefix_always_hidden(suffix in "[a-z ]{0,50}") {
            let message = format!("panic: {suffix}");
            prop_assert_eq!(sanitize(&message), GENERIC_ERROR_MESSAGE);
        }
    }
}
