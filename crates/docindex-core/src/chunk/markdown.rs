//! Header-aware markdown strategy.
//!
//! Sections start at ATX header lines outside fenced code. A section that
//! fits in `chunk_size` is emitted whole; larger sections are split by
//! paragraph, then sentence, then word.

use super::split::{char_len, is_fence, line_spans, split_recursive, Level, Piece, Span};
use crate::models::ChunkKind;

struct Section {
    header: Option<String>,
    span: Span,
}

/// Returns the header text if `line` is an ATX header (`#` through `######`).
pub(crate) fn header_text(line: &str) -> Option<String> {
    let t = line.trim_start();
    let hashes = t.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &t[hashes..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim();
    Some(title.to_string())
}

fn sections(text: &str) -> Vec<Section> {
    let mut out: Vec<Section> = Vec::new();
    let mut current: Option<Section> = None;
    let mut in_fence = false;

    for line in line_spans(text, Span::new(0, text.len())) {
        let content = &text[line.start..line.end];
        if is_fence(content) {
            in_fence = !in_fence;
        }
        let header = if in_fence { None } else { header_text(content) };

        if let Some(h) = header {
            if let Some(done) = current.take() {
                out.push(done);
            }
            current = Some(Section {
                header: Some(h),
                span: line,
            });
            continue;
        }
        if let Some(section) = current.as_mut() {
            section.span = section.span.join(line);
            continue;
        }
        if !content.trim().is_empty() {
            current = Some(Section { header: None, span: line });
        }
    }
    if let Some(done) = current {
        out.push(done);
    }

    // Trailing blank lines belong to no section.
    for section in &mut out {
        let trimmed = text[section.span.start..section.span.end].trim_end().len();
        section.span.end = section.span.start + trimmed;
    }
    out
}

pub(crate) fn chunk_markdown(text: &str, chunk_size: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();

    for section in sections(text) {
        if char_len(text, section.span) <= chunk_size {
            pieces.push(Piece {
                span: section.span,
                kind: ChunkKind::Section {
                    header: section.header,
                },
            });
            continue;
        }

        let header = section.header.clone();
        let kind_for = move |level: Level| match level {
            Level::Paragraph | Level::Line => ChunkKind::PartialSection {
                header: header.clone(),
            },
            Level::Sentence => ChunkKind::SentenceGroup,
            Level::Word => ChunkKind::WordGroup,
        };
        split_recursive(
            text,
            section.span,
            chunk_size,
            Level::Paragraph,
            true,
            &kind_for,
            &mut pieces,
        );
    }
    pieces
}
