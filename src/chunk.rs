//! Heading-boundary Markdown chunker.
//!
//! Splits a converted ontology document on `#`, `##`, and `###` heading
//! markers. Each chunk inherits the nearest enclosing heading text at
//! every level, so a chunk under `# A` / `## B` carries both. Heading
//! lines themselves are not part of chunk content.
//!
//! Chunks are totally ordered by document position with contiguous
//! indices starting at 0; no two chunks overlap.

use crate::models::{Chunk, HeaderContext};

/// Split a Markdown document into heading-scoped chunks.
pub fn split_by_headers(document: &str) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut headers = HeaderContext::default();
    let mut buffer: Vec<&str> = Vec::new();
    let mut chunk_index: i64 = 0;

    let flush = |headers: &HeaderContext, buffer: &mut Vec<&str>, chunk_index: &mut i64, chunks: &mut Vec<Chunk>| {
        let text = buffer.join("\n").trim().to_string();
        buffer.clear();
        if text.is_empty() {
            return;
        }
        chunks.push(Chunk {
            chunk_index: *chunk_index,
            text,
            headers: headers.clone(),
        });
        *chunk_index += 1;
    };

    for line in document.lines() {
        match heading_level(line) {
            Some((level, title)) => {
                flush(&headers, &mut buffer, &mut chunk_index, &mut chunks);
                match level {
                    1 => {
                        headers.h1 = Some(title.to_string());
                        headers.h2 = None;
                        headers.h3 = None;
                    }
                    2 => {
                        headers.h2 = Some(title.to_string());
                        headers.h3 = None;
                    }
                    _ => headers.h3 = Some(title.to_string()),
                }
            }
            None => buffer.push(line),
        }
    }
    flush(&headers, &mut buffer, &mut chunk_index, &mut chunks);

    chunks
}

/// Recognize a heading line of level 1–3; returns `(level, title)`.
///
/// Deeper headings (`####`+) are treated as content, matching the three
/// split levels used for header context.
fn heading_level(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((hashes, rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_headings_three_chunks() {
        let doc = "# A\ncontent a\n## B\ncontent b\n# C\ncontent c";
        let chunks = split_by_headers(doc);
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].headers.h1.as_deref(), Some("A"));
        assert_eq!(chunks[0].headers.h2, None);

        // Second chunk carries both enclosing headings.
        assert_eq!(chunks[1].headers.h1.as_deref(), Some("A"));
        assert_eq!(chunks[1].headers.h2.as_deref(), Some("B"));
        assert_eq!(chunks[1].text, "content b");

        // A new level-1 heading resets the deeper levels.
        assert_eq!(chunks[2].headers.h1.as_deref(), Some("C"));
        assert_eq!(chunks[2].headers.h2, None);
    }

    #[test]
    fn test_indices_contiguous_from_zero() {
        let doc = "# A\none\n## B\ntwo\n### C\nthree\n## D\nfour";
        let chunks = split_by_headers(doc);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn test_preamble_has_empty_context() {
        let doc = "preamble text\n# A\ncontent";
        let chunks = split_by_headers(doc);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].headers, HeaderContext::default());
        assert_eq!(chunks[0].headers.primary(), "");
    }

    #[test]
    fn test_heading_only_document_produces_no_chunks() {
        let doc = "# A\n## B";
        assert!(split_by_headers(doc).is_empty());
    }

    #[test]
    fn test_empty_document() {
        assert!(split_by_headers("").is_empty());
    }

    #[test]
    fn test_level_three_context() {
        let doc = "# A\n## B\n### C\ndeep content";
        let chunks = split_by_headers(doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].headers.h3.as_deref(), Some("C"));
        assert_eq!(
            chunks[0].headers.pairs(),
            vec![
                ("Header 1".to_string(), "A".to_string()),
                ("Header 2".to_string(), "B".to_string()),
                ("Header 3".to_string(), "C".to_string()),
            ]
        );
    }

    #[test]
    fn test_primary_prefers_shallowest() {
        let doc = "# A\n## B\ncontent";
        let chunks = split_by_headers(doc);
        assert_eq!(chunks[0].headers.primary(), "A");
    }

    #[test]
    fn test_deeper_headings_are_content() {
        let doc = "# A\n#### not a split point\ncontent";
        let chunks = split_by_headers(doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("#### not a split point"));
    }

    #[test]
    fn test_hash_without_space_is_content() {
        let doc = "# A\n#hashtag line\ncontent";
        let chunks = split_by_headers(doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("#hashtag"));
    }
}
