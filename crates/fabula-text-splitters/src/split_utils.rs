//! Span-scanning helpers shared by the splitters.

/// Largest char boundary not greater than `index`.
#[must_use]
pub(crate) fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest char boundary not less than `index`.
#[must_use]
pub(crate) fn ceil_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Find the best cut position in `(window_start, window_end]`.
///
/// Separators are tried in order; the first one with an occurrence in the
/// window wins, and the cut lands just after its last occurrence so the
/// separator text stays in the left span. Empty separators are skipped.
#[must_use]
pub(crate) fn find_break(
    text: &str,
    window_start: usize,
    window_end: usize,
    separators: &[String],
) -> Option<usize> {
    let window = &text[window_start..window_end];
    for separator in separators {
        if separator.is_empty() {
            continue;
        }
        if let Some(offset) = window.rfind(separator.as_str()) {
            let cut = window_start + offset + separator.len();
            if cut > window_start && cut <= window_end {
                return Some(cut);
            }
        }
    }
    None
}

/// Split `text` into spans of at most `max_length` bytes, preferring to cut
/// just after a sentence-ending `.`, `!` or `?`.
///
/// Spans are contiguous and cover the whole text. Used for chapterless
/// long-document fallback splitting.
#[must_use]
pub fn split_by_length(text: &str, max_length: usize) -> Vec<(usize, usize)> {
    let max_length = max_length.max(1);
    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < text.len() {
        let hard_end = floor_char_boundary(text, start + max_length);
        let mut end = if hard_end <= start {
            ceil_char_boundary(text, start + 1)
        } else {
            hard_end
        };
        if end < text.len() {
            let window = &text[start..end];
            if let Some(sentence_end) = window.rfind(['.', '!', '?']) {
                let cut = start + sentence_end + 1;
                if cut > start {
                    end = cut;
                }
            }
        }
        spans.push((start, end));
        start = end;
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_break_prefers_earlier_separator() {
        let text = "para one\n\nmore text. and words";
        let cut = find_break(text, 0, text.len(), &["\n\n".to_string(), ". ".to_string()]);
        assert_eq!(cut, Some(10)); // after the paragraph break
    }

    #[test]
    fn test_find_break_falls_through_to_later_separator() {
        let text = "one sentence. another sentence";
        let cut = find_break(text, 0, text.len(), &["\n\n".to_string(), ". ".to_string()]);
        assert_eq!(cut, Some(14)); // after ". "
    }

    #[test]
    fn test_find_break_none_when_no_separator() {
        assert_eq!(
            find_break("abcdef", 0, 6, &["\n\n".to_string()]),
            None
        );
    }

    #[test]
    fn test_split_by_length_cuts_after_sentences() {
        let text = "First sentence. Second sentence! Third?";
        let spans = split_by_length(text, 20);
        assert_eq!(spans[0], (0, 15)); // "First sentence."
        let rebuilt: String = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_split_by_length_hard_cut_without_sentences() {
        let text = "abcdefghij";
        let spans = split_by_length(text, 4);
        assert_eq!(spans, vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn test_split_by_length_respects_char_boundaries() {
        let text = "가나다라마바사"; // 3 bytes per char
        let spans = split_by_length(text, 4);
        for &(s, e) in &spans {
            assert!(text.is_char_boundary(s) && text.is_char_boundary(e));
        }
        let rebuilt: String = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(rebuilt, text);
    }
}
