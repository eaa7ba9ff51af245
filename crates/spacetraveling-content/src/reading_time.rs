// File: spacetraveling-content/src/reading_time.rs
// Purpose: Estimated reading time of a post body

use crate::model::Block;

/// Average reading speed used for the estimate.
pub const WORDS_PER_MINUTE: usize = 200;

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '.' | '?' | '$')
}

fn count_words(text: &str) -> usize {
    text.split(is_delimiter).filter(|token| !token.is_empty()).count()
}

/// Number of words in the headings and bodies of `content`.
pub fn word_count(content: &[Block]) -> usize {
    content
        .iter()
        .map(|block| count_words(&block.heading) + count_words(&block.body_text()))
        .sum()
}

/// Estimated reading time in whole minutes.
///
/// Halves round away from zero, so 300 words is 2 minutes.
pub fn estimate(content: &[Block]) -> u32 {
    let minutes = (word_count(content) + WORDS_PER_MINUTE / 2) / WORDS_PER_MINUTE;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RichTextSpan;
    use rstest::rstest;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn block_with_words(n: usize) -> Block {
        Block::new("", vec![RichTextSpan::paragraph(words(n))])
    }

    #[test]
    fn test_short_post_rounds_to_zero() {
        let content = vec![Block::new(
            "Intro",
            vec![RichTextSpan::paragraph(
                "This is a simple test with nine words here",
            )],
        )];

        assert_eq!(word_count(&content), 10);
        assert_eq!(estimate(&content), 0);
    }

    #[test]
    fn test_four_hundred_words_is_two_minutes() {
        let content = vec![
            Block::new("Part one", vec![RichTextSpan::paragraph(words(148))]),
            block_with_words(50),
            Block::new("Part two", vec![RichTextSpan::list_item(words(198))]),
        ];

        assert_eq!(word_count(&content), 400);
        assert_eq!(estimate(&content), 2);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(99, 0)]
    #[case(100, 1)]
    #[case(299, 1)]
    #[case(300, 2)]
    #[case(500, 3)]
    fn test_rounding_boundaries(#[case] total: usize, #[case] minutes: u32) {
        assert_eq!(estimate(&[block_with_words(total)]), minutes);
    }

    #[test]
    fn test_punctuation_is_a_delimiter() {
        let content = vec![Block::new(
            "Why?Really",
            vec![RichTextSpan::paragraph("costs $5,00.\tnow\r\nor never...")],
        )];

        // Why Really | costs 5 00 now or never
        assert_eq!(word_count(&content), 8);
    }

    #[test]
    fn test_empty_heading_and_body_count_nothing() {
        let content = vec![
            Block::new("   ", vec![]),
            Block::new("", vec![RichTextSpan::paragraph(" , . ")]),
        ];
        assert_eq!(word_count(&content), 0);
        assert_eq!(estimate(&content), 0);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let content = vec![block_with_words(321), Block::new("Heading here", vec![])];
        assert_eq!(estimate(&content), estimate(&content));
    }
}
