//! Emoji-only content filter for chat messages

use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

const EMOJI_ONLY_PATTERN: &str = concat!(
    r"^[ \t\n",
    r"\p{So}\p{Sk}\p{Sm}",
    r"\x{1F300}-\x{1FAFF}\x{2600}-\x{27BF}\x{FE00}-\x{FE0F}\x{1F1E0}-\x{1F1FF}",
    r"\x{200D}\x{20E3}\x{00A9}\x{00AE}",
    r"]+$",
);

fn emoji_only_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(EMOJI_ONLY_PATTERN) {
        Ok(re) => Some(re),
        Err(e) => {
            error!(error = %e, "Emoji filter pattern failed to compile, rejecting all chat content");
            None
        }
    })
    .as_ref()
}

/// True when `text`, after trimming, is non-empty and made only of emoji,
/// symbol characters and spaces/tabs/newlines.
pub fn is_emoji_only(text: &str) -> bool {
    let trimmed = text.trim();
    match emoji_only_regex() {
        Some(re) => !trimmed.is_empty() && re.is_match(trimmed),
        None => false,
    }
}
