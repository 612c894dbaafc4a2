//! Brace-depth code strategy.
//!
//! Lines accumulate until the next one would push the chunk past
//! `chunk_size`. The cut happens at the first line boundary where brace
//! depth is back to zero; if the chunk grows past `max_chunk_size` first,
//! it is cut anyway and tagged as forced.

use super::split::{char_len, line_spans, Piece, Span};
use crate::models::ChunkKind;

/// Keywords that may precede a declaration keyword on the same line.
const MODIFIERS: &[&str] = &[
    "pub ", "pub(crate) ", "async ", "export ", "default ", "static ", "public ", "private ",
    "protected ", "abstract ", "final ", "unsafe ", "extern ",
];

/// Declaration keywords whose following identifier names the block.
const DECLARATIONS: &[&str] = &[
    "fn ", "def ", "function ", "class ", "struct ", "enum ", "trait ", "impl ", "interface ",
    "func ", "module ", "type ",
];

/// Name declared on `line`, if it opens a function, type, or impl block.
pub(crate) fn declared_name(line: &str) -> Option<String> {
    let mut rest = line.trim_start();
    loop {
        match MODIFIERS.iter().find(|m| rest.starts_with(*m)) {
            Some(m) => rest = rest[m.len()..].trim_start(),
            None => break,
        }
    }
    let keyword = DECLARATIONS.iter().find(|d| rest.starts_with(*d))?;
    let after = rest[keyword.len()..].trim_start();
    // Go methods: `func (r *Recv) Name(`
    let after = match after.strip_prefix('(') {
        Some(recv) => recv.split_once(')').map(|(_, tail)| tail.trim_start())?,
        None => after,
    };
    let name: String = after
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Advisory language guess from keyword presence.
pub(crate) fn detect_language(text: &str) -> Option<String> {
    let has = |needle: &str| text.contains(needle);
    let language = if has("fn ") && (has("let ") || has("impl ") || has("pub ")) {
        "rust"
    } else if has("def ") && (has("import ") || has("self") || has("):")) {
        "python"
    } else if has("func ") && has("package ") {
        "go"
    } else if has("public class ") || has("private static ") {
        "java"
    } else if has("#include") {
        "c"
    } else if has("interface ") && has(": ") && (has("const ") || has("export ")) {
        "typescript"
    } else if has("function ") || has("=> ") || has("const ") {
        "javascript"
    } else {
        return None;
    };
    Some(language.to_string())
}

fn brace_delta(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

pub(crate) fn chunk_code(text: &str, chunk_size: usize, max_chunk_size: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut current: Option<Span> = None;
    let mut function: Option<String> = None;
    let mut depth: i64 = 0;

    let flush = |span: Span, forced: bool, function: Option<String>, out: &mut Vec<Piece>| {
        let end = span.start + text[span.start..span.end].trim_end().len();
        if end == span.start {
            return;
        }
        let kind = if forced {
            ChunkKind::CodeBlockForced { function }
        } else {
            ChunkKind::CodeBlock { function }
        };
        out.push(Piece {
            span: Span::new(span.start, end),
            kind,
        });
    };

    for line in line_spans(text, Span::new(0, text.len())) {
        let content = &text[line.start..line.end];

        if let Some(cur) = current {
            let candidate = char_len(text, cur.join(line));
            if candidate > chunk_size {
                if depth == 0 {
                    flush(cur, false, function.take(), &mut pieces);
                    current = None;
                } else if candidate > max_chunk_size {
                    flush(cur, true, function.take(), &mut pieces);
                    current = None;
                }
            }
        }

        depth = (depth + brace_delta(content)).max(0);

        if current.is_none() && content.trim().is_empty() {
            continue;
        }
        current = Some(match current {
            Some(cur) => cur.join(line),
            None => line,
        });
        if function.is_none() {
            function = declared_name(content);
        }
    }
    if let Some(cur) = current {
        flush(cur, false, function.take(), &mut pieces);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str, pieces: &[Piece]) -> Vec<String> {
        pieces
            .iter()
            .map(|p| text[p.span.start..p.span.end].to_string())
            .collect()
    }

    #[test]
    fn test_declared_name() {
        assert_eq!(declared_name("pub fn parse(input: &str)"), Some("parse".into()));
        assert_eq!(declared_name("def handler(event):"), Some("handler".into()));
        assert_eq!(declared_name("export async function load() {"), Some("load".into()));
        assert_eq!(declared_name("class Widget:"), Some("Widget".into()));
        assert_eq!(declared_name("func (s *Server) Start() {"), Some("Start".into()));
        assert_eq!(declared_name("let x = 1;"), None);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("pub fn a() { let x = 1; }").as_deref(), Some("rust"));
        assert_eq!(
            detect_language("import os\ndef main():\n    pass").as_deref(),
            Some("python")
        );
        assert_eq!(detect_language("plain words"), None);
    }

    #[test]
    fn test_cuts_at_depth_zero() {
        let text = "fn a() {\n    one();\n}\n\nfn b() {\n    two();\n}";
        let pieces = chunk_code(text, 25, 1000);
        let rendered = render(text, &pieces);
        assert_eq!(rendered.len(), 2);
        assert!(rendered[0].starts_with("fn a()"));
        assert!(rendered[1].starts_with("fn b()"));
        assert_eq!(pieces[0].kind.function(), Some("a"));
        assert_eq!(pieces[1].kind.function(), Some("b"));
        assert!(matches!(pieces[0].kind, ChunkKind::CodeBlock { .. }));
    }

    #[test]
    fn test_keeps_open_block_together_until_max() {
        let body: String = (0..10).map(|i| format!("    step_{}();\n", i)).collect();
        let text = format!("fn long() {{\n{}}}", body);
        // Larger than chunk_size but below max: one block, never cut mid-body.
        let pieces = chunk_code(&text, 40, 10_000);
        assert_eq!(pieces.len(), 1);
        assert!(matches!(pieces[0].kind, ChunkKind::CodeBlock { .. }));
    }

    #[test]
    fn test_force_cut_when_max_exceeded() {
        let body: String = (0..30).map(|i| format!("    step_{}();\n", i)).collect();
        let text = format!("fn long() {{\n{}}}", body);
        let pieces = chunk_code(&text, 40, 80);
        assert!(pieces.len() > 1);
        assert!(matches!(
            pieces[0].kind,
            ChunkKind::CodeBlockForced { .. }
        ));
        assert_eq!(pieces[0].kind.function(), Some("long"));
    }
}
