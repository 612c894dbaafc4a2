//! Span-level splitting shared by the markdown and plain-text strategies.
//!
//! Every unit is a byte range into the normalized document text, so packed
//! chunks are always contiguous slices of the source and nothing between
//! units except whitespace is ever dropped.

use crate::models::ChunkKind;

/// A half-open byte range into the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn join(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

/// A span labeled with the unit it was cut at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Piece {
    pub span: Span,
    pub kind: ChunkKind,
}

/// Granularity of a split, from coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    Paragraph,
    Line,
    Sentence,
    Word,
}

/// Number of characters in `text[span]`.
pub(crate) fn char_len(text: &str, span: Span) -> usize {
    text[span.start..span.end].chars().count()
}

/// Iterate the lines inside `span` as `(start, end)` byte offsets, with the
/// trailing newline excluded from `end`.
pub(crate) fn line_spans(text: &str, span: Span) -> Vec<Span> {
    let mut out = Vec::new();
    let mut pos = span.start;
    for line in text[span.start..span.end].split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        out.push(Span::new(pos, pos + content.len()));
        pos += line.len();
    }
    out
}

pub(crate) fn is_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// Paragraphs are maximal runs of non-blank lines. With `fence_aware`,
/// blank lines inside a fenced code block do not end the paragraph.
pub(crate) fn paragraph_spans(text: &str, span: Span, fence_aware: bool) -> Vec<Span> {
    let mut out = Vec::new();
    let mut current: Option<Span> = None;
    let mut in_fence = false;

    for line in line_spans(text, span) {
        let content = &text[line.start..line.end];
        if fence_aware && is_fence(content) {
            in_fence = !in_fence;
        }
        if content.trim().is_empty() && !in_fence {
            if let Some(p) = current.take() {
                out.push(p);
            }
            continue;
        }
        current = Some(match current {
            Some(p) => p.join(line),
            None => line,
        });
    }
    if let Some(p) = current {
        out.push(p);
    }
    out
}

/// Sentences end at `.`, `!` or `?` followed by whitespace or the end of
/// the span. Trailing text without a terminator forms a final sentence.
pub(crate) fn sentence_spans(text: &str, span: Span) -> Vec<Span> {
    let slice = &text[span.start..span.end];
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = slice.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if start.is_none() {
            if c.is_whitespace() {
                continue;
            }
            start = Some(i);
        }
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                if let Some(s) = start.take() {
                    out.push(Span::new(span.start + s, span.start + i + c.len_utf8()));
                }
            }
        }
    }
    if let Some(s) = start {
        let end = slice.trim_end().len();
        if end > s {
            out.push(Span::new(span.start + s, span.start + end));
        }
    }
    out
}

/// Whitespace-separated words.
pub(crate) fn word_spans(text: &str, span: Span) -> Vec<Span> {
    let slice = &text[span.start..span.end];
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in slice.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push(Span::new(span.start + s, span.start + i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(Span::new(span.start + s, span.end));
    }
    out
}

enum Packed {
    Group(Span),
    Oversized(Span),
}

/// Greedily merge neighbouring units while the merged span stays within
/// `limit` characters. Units that alone exceed the limit are reported
/// separately so the caller can split them further.
fn pack(text: &str, units: &[Span], limit: usize) -> Vec<Packed> {
    let mut out = Vec::new();
    let mut current: Option<Span> = None;

    for &unit in units {
        if char_len(text, unit) > limit {
            if let Some(c) = current.take() {
                out.push(Packed::Group(c));
            }
            out.push(Packed::Oversized(unit));
            continue;
        }
        current = match current {
            None => Some(unit),
            Some(c) => {
                let merged = c.join(unit);
                if char_len(text, merged) <= limit {
                    Some(merged)
                } else {
                    out.push(Packed::Group(c));
                    Some(unit)
                }
            }
        };
    }
    if let Some(c) = current {
        out.push(Packed::Group(c));
    }
    out
}

/// Split `span` into pieces of at most `limit` characters, preferring the
/// largest unit that fits: paragraph, then sentence, then word. Oversized
/// fenced blocks fall back to lines before sentences. A single word longer
/// than the limit is kept whole.
pub(crate) fn split_recursive<F>(
    text: &str,
    span: Span,
    limit: usize,
    level: Level,
    fence_aware: bool,
    kind_for: &F,
    out: &mut Vec<Piece>,
) where
    F: Fn(Level) -> ChunkKind,
{
    let units = match level {
        Level::Paragraph => paragraph_spans(text, span, fence_aware),
        Level::Line => line_spans(text, span)
            .into_iter()
            .filter(|l| !text[l.start..l.end].trim().is_empty())
            .collect(),
        Level::Sentence => sentence_spans(text, span),
        Level::Word => word_spans(text, span),
    };

    for packed in pack(text, &units, limit) {
        match packed {
            Packed::Group(s) => out.push(Piece {
                span: s,
                kind: kind_for(level),
            }),
            Packed::Oversized(s) => {
                let next = match level {
                    Level::Paragraph if fence_aware && is_fence(&text[s.start..s.end]) => {
                        Level::Line
                    }
                    Level::Paragraph | Level::Line => Level::Sentence,
                    Level::Sentence => Level::Word,
                    Level::Word => {
                        out.push(Piece {
                            span: s,
                            kind: kind_for(Level::Word),
                        });
                        continue;
                    }
                };
                split_recursive(text, s, limit, next, fence_aware, kind_for, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts<'a>(text: &'a str, spans: &[Span]) -> Vec<&'a str> {
        spans.iter().map(|s| &text[s.start..s.end]).collect()
    }

    #[test]
    fn test_paragraphs() {
        let text = "one\ntwo\n\nthree\n\n\nfour";
        let spans = paragraph_spans(text, Span::new(0, text.len()), false);
        assert_eq!(texts(text, &spans), vec!["one\ntwo", "three", "four"]);
    }

    #[test]
    fn test_paragraphs_keep_fenced_block_whole() {
        let text = "intro\n\n```\nlet a = 1;\n\nlet b = 2;\n```\n\nafter";
        let spans = paragraph_spans(text, Span::new(0, text.len()), true);
        assert_eq!(spans.len(), 3);
        assert!(texts(text, &spans)[1].contains("let b = 2;"));
    }

    #[test]
    fn test_sentences() {
        let text = "First one. Second one! Is it 3.5? trailing words";
        let spans = sentence_spans(text, Span::new(0, text.len()));
        assert_eq!(
            texts(text, &spans),
            vec!["First one.", "Second one!", "Is it 3.5?", "trailing words"]
        );
    }

    #[test]
    fn test_words() {
        let text = "  alpha beta\tgamma ";
        let spans = word_spans(text, Span::new(0, text.len()));
        assert_eq!(texts(text, &spans), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_split_recursive_falls_back_to_words() {
        let text = "aaaa bbbb cccc dddd";
        let mut out = Vec::new();
        split_recursive(
            text,
            Span::new(0, text.len()),
            9,
            Level::Paragraph,
            false,
            &|level| match level {
                Level::Word => ChunkKind::WordGroup,
                _ => ChunkKind::TextBlock,
            },
            &mut out,
        );
        let pieces: Vec<&str> = out.iter().map(|p| &text[p.span.start..p.span.end]).collect();
        assert_eq!(pieces, vec!["aaaa bbbb", "cccc dddd"]);
        assert!(out.iter().all(|p| p.kind == ChunkKind::WordGroup));
    }

    #[test]
    fn test_oversized_word_kept_whole() {
        let text = "supercalifragilistic";
        let mut out = Vec::new();
        split_recursive(
            text,
            Span::new(0, text.len()),
            5,
            Level::Paragraph,
            false,
            &|_| ChunkKind::WordGroup,
            &mut out,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].span, Span::new(0, text.len()));
    }
}
