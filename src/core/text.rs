use chrono::{SecondsFormat, Utc};

/// Current UTC time as ISO-8601 with a `Z` suffix.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Cuts `text` to at most `max_chars` characters, appending `...` when
/// anything was removed. The suffix counts toward the limit.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    const SUFFIX: &str = "...";
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(SUFFIX.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(SUFFIX);
    truncated
}

/// Hard cut without a suffix, on a char boundary.
pub fn clip_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_adds_suffix_only_when_cut() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 8), "abcde...");
        assert_eq!(truncate_chars("ありがとうございます", 6).chars().count(), 6);
    }

    #[test]
    fn clip_respects_multibyte() {
        assert_eq!(clip_chars("₹12,345", 2), "₹1");
    }

    #[test]
    fn timestamp_is_utc_z() {
        assert!(timestamp().ends_with('Z'));
    }
}
