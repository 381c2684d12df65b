//! Emoji detection on grapheme clusters.

use unicode_segmentation::UnicodeSegmentation;

const KEYCAP: char = '\u{20E3}';

/// Code point ranges whose characters render as pictographs.
const PICTOGRAPHIC: &[(u32, u32)] = &[
    (0x00A9, 0x00A9),
    (0x00AE, 0x00AE),
    (0x203C, 0x203C),
    (0x2049, 0x2049),
    (0x2122, 0x2122),
    (0x2139, 0x2139),
    (0x2194, 0x21AA),
    (0x231A, 0x23FF),
    (0x24C2, 0x24C2),
    (0x25AA, 0x25FE),
    (0x2600, 0x27BF),
    (0x2934, 0x2935),
    (0x2B05, 0x2B55),
    (0x3030, 0x3030),
    (0x303D, 0x303D),
    (0x3297, 0x3297),
    (0x3299, 0x3299),
    (0x1F000, 0x1FAFF),
];

fn is_pictographic(c: char) -> bool {
    let cp = c as u32;
    PICTOGRAPHIC
        .iter()
        .any(|&(start, end)| (start..=end).contains(&cp))
}

/// Whether a single grapheme cluster is an emoji.
fn is_emoji_grapheme(grapheme: &str) -> bool {
    let mut chars = grapheme.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    // 1️⃣ #️⃣ *️⃣
    if matches!(first, '0'..='9' | '#' | '*') {
        return grapheme.contains(KEYCAP);
    }

    is_pictographic(first)
}

/// Whether the text consists of one or more emoji and nothing else.
pub fn is_emoji(text: &str) -> bool {
    let mut graphemes = text.graphemes(true).peekable();
    graphemes.peek().is_some() && graphemes.all(is_emoji_grapheme)
}

/// Split an emoji-only string into individual emoji.
///
/// Returns None if any grapheme is not an emoji.
pub fn split_emoji(text: &str) -> Option<Vec<String>> {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.is_empty() || !graphemes.iter().all(|g| is_emoji_grapheme(g)) {
        return None;
    }
    Some(graphemes.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_emoji() {
        assert!(is_emoji("😺"));
        assert!(is_emoji("❤️"));
        assert!(is_emoji("⭐"));
        assert!(is_emoji("😺😸"));
    }

    #[test]
    fn test_sequences_are_single_emoji() {
        // ZWJ family, skin tone modifier, flag
        assert_eq!(split_emoji("👨‍👩‍👧").unwrap().len(), 1);
        assert_eq!(split_emoji("👍🏽").unwrap().len(), 1);
        assert_eq!(split_emoji("🇯🇵").unwrap().len(), 1);
    }

    #[test]
    fn test_keycaps() {
        assert!(is_emoji("1️⃣"));
        assert!(!is_emoji("1"));
        assert!(!is_emoji("#"));
    }

    #[test]
    fn test_text_is_not_emoji() {
        assert!(!is_emoji(""));
        assert!(!is_emoji("cat"));
        assert!(!is_emoji("cat😺"));
        assert!(!is_emoji("ü"));
        assert!(split_emoji("😺a").is_none());
    }

    #[test]
    fn test_split_keeps_order() {
        let parts = split_emoji("🔥😺🔥").unwrap();
        assert_eq!(parts, vec!["🔥", "😺", "🔥"]);
    }
}
