//! Chapter boundary detection.
//!
//! Purely heuristic: an ordered list of heading patterns is tried against
//! the text, and the first pattern with at least two matches wins. Chapter
//! markers vary wildly across novels, so this is best-effort by design;
//! a text with no detectable boundaries is treated as a single chapter by
//! the extractor.

use fabula::{Error, Result};
use regex::{Regex, RegexBuilder};

/// Upper bound for compiled pattern size, same spirit as the splitter's
/// bounded separators.
const REGEX_SIZE_LIMIT: usize = 1 << 18;

/// A heading pattern and where the chapter starts relative to its matches.
struct ChapterPattern {
    pattern: &'static str,
    case_insensitive: bool,
    /// When true the chapter begins after the match (blank-line runs);
    /// otherwise at the match start (headings).
    boundary_at_end: bool,
}

/// Heading styles in priority order, most specific first.
const CHAPTER_PATTERNS: &[ChapterPattern] = &[
    // 제1장 / 제 1 장
    ChapterPattern {
        pattern: r"제\s*\d+\s*장",
        case_insensitive: false,
        boundary_at_end: false,
    },
    // Chapter 1
    ChapterPattern {
        pattern: r"Chapter\s*\d+",
        case_insensitive: true,
        boundary_at_end: false,
    },
    // 챕터1 / 챕터 1
    ChapterPattern {
        pattern: r"챕터\s*\d+",
        case_insensitive: false,
        boundary_at_end: false,
    },
    // 1장
    ChapterPattern {
        pattern: r"\d+\s*장",
        case_insensitive: false,
        boundary_at_end: false,
    },
    // Numbered heading on its own line: "1." / " 12."
    ChapterPattern {
        pattern: r"(?m)^\s*\d+\.",
        case_insensitive: false,
        boundary_at_end: false,
    },
    // A run of blank lines as a section break.
    ChapterPattern {
        pattern: r"\n\s*\n\s*\n",
        case_insensitive: false,
        boundary_at_end: true,
    },
];

fn bounded_regex(pattern: &str, case_insensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| Error::Configuration(format!("invalid chapter pattern {pattern:?}: {e}")))
}

/// Detect chapter spans as `(start, end)` byte offsets into `text`.
///
/// Returns an empty vector when no pattern matches at least twice. The
/// first winning pattern defines every boundary; text before the first
/// boundary (front matter) is not part of any chapter.
pub fn detect_chapter_spans(text: &str) -> Result<Vec<(usize, usize)>> {
    for candidate in CHAPTER_PATTERNS {
        let regex = bounded_regex(candidate.pattern, candidate.case_insensitive)?;
        let boundaries: Vec<usize> = regex
            .find_iter(text)
            .map(|m| if candidate.boundary_at_end { m.end() } else { m.start() })
            .collect();
        // One heading could be a stray number; two or more is a structure.
        if boundaries.len() < 2 {
            continue;
        }
        tracing::debug!(
            pattern = candidate.pattern,
            chapters = boundaries.len(),
            "chapter pattern matched"
        );
        let mut spans = Vec::with_capacity(boundaries.len());
        for (i, &start) in boundaries.iter().enumerate() {
            let end = boundaries.get(i + 1).copied().unwrap_or(text.len());
            if start < end {
                spans.push((start, end));
            }
        }
        return Ok(spans);
    }
    Ok(Vec::new())
}
