//! Paragraph-packing strategy for plain text.

use super::split::{split_recursive, Level, Piece, Span};
use crate::models::ChunkKind;

pub(crate) fn chunk_plain(text: &str, chunk_size: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let kind_for = |level: Level| match level {
        Level::Paragraph | Level::Line => ChunkKind::TextBlock,
        Level::Sentence => ChunkKind::SentenceGroup,
        Level::Word => ChunkKind::WordGroup,
    };
    split_recursive(
        text,
        Span::new(0, text.len()),
        chunk_size,
        Level::Paragraph,
        false,
        &kind_for,
        &mut pieces,
    );
    pieces
}

/// Prefix each piece after the first with the last `overlap` words of the
/// piece before it. Returns `(content, overlap_words)` per piece.
pub(crate) fn apply_overlap(text: &str, pieces: &[Piece], overlap: usize) -> Vec<(String, usize)> {
    let mut out = Vec::with_capacity(pieces.len());
    let mut previous: Option<&str> = None;

    for piece in pieces {
        let body = &text[piece.span.start..piece.span.end];
        match previous {
            Some(prev) if overlap > 0 => {
                let words: Vec<&str> = prev.split_whitespace().collect();
                let tail = &words[words.len().saturating_sub(overlap)..];
                out.push((format!("{} {}", tail.join(" "), body), tail.len()));
            }
            _ => out.push((body.to_string(), 0)),
        }
        previous = Some(body);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packs_paragraphs() {
        let text = "One.\n\nTwo.\n\nThree.";
        let pieces = chunk_plain(text, 1000);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].kind, ChunkKind::TextBlock);
    }

    #[test]
    fn test_oversized_paragraph_uses_sentences() {
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota.";
        let pieces = chunk_plain(text, 20);
        assert_eq!(pieces.len(), 3);
        assert!(pieces.iter().all(|p| p.kind == ChunkKind::SentenceGroup));
    }

    #[test]
    fn test_overlap_prefixes_previous_tail() {
        let text = "a b c d\n\ne f g h";
        let pieces = vec![
            Piece {
                span: Span::new(0, 7),
                kind: ChunkKind::TextBlock,
            },
            Piece {
                span: Span::new(9, 16),
                kind: ChunkKind::TextBlock,
            },
        ];
        let out = apply_overlap(text, &pieces, 2);
        assert_eq!(out[0], ("a b c d".to_string(), 0));
        assert_eq!(out[1], ("c d e f g h".to_string(), 2));
    }

    #[test]
    fn test_overlap_larger_than_previous_chunk() {
        let text = "a b\n\nc d";
        let pieces = vec![
            Piece {
                span: Span::new(0, 3),
                kind: ChunkKind::TextBlock,
            },
            Piece {
                span: Span::new(5, 8),
                kind: ChunkKind::TextBlock,
            },
        ];
        let out = apply_overlap(text, &pieces, 50);
        assert_eq!(out[1], ("a b c d".to_string(), 2));
    }
}
