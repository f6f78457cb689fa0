//! Paragraph-based chunker for documents without usable structure.
//!
//! Paragraphs (blank-line separated) are merged up to the character budget;
//! a paragraph that alone exceeds the budget is split at line boundaries.

use super::{budget_chars, ChunkOutput, CHAR_BUDGET};

/// Chunk content at paragraph boundaries.
pub fn chunk_fallback(content: &str) -> Vec<ChunkOutput> {
    let lines: Vec<&str> = content.lines().collect();
    chunk_lines(&lines, 0)
}

/// Chunk a slice of lines whose first line sits at `offset` (0-based) in the
/// original document. Line numbers in the output are 1-based.
pub(crate) fn chunk_lines(lines: &[&str], offset: usize) -> Vec<ChunkOutput> {
    let mut chunks = Vec::new();
    let mut acc: Option<(usize, usize)> = None;
    let mut acc_chars = 0usize;

    for (start, end) in paragraphs(lines) {
        let chars: usize = lines[start..=end].iter().map(|l| budget_chars(l)).sum();

        if chars > CHAR_BUDGET {
            if let Some((s, e)) = acc.take() {
                chunks.push(make_chunk(lines, s, e, offset));
                acc_chars = 0;
            }
            split_by_lines(lines, start, end, offset, &mut chunks);
            continue;
        }

        match acc {
            Some((s, e)) if acc_chars + chars > CHAR_BUDGET => {
                chunks.push(make_chunk(lines, s, e, offset));
                acc = Some((start, end));
                acc_chars = chars;
            }
            Some((s, _)) => {
                acc = Some((s, end));
                acc_chars += chars;
            }
            None => {
                acc = Some((start, end));
                acc_chars = chars;
            }
        }
    }

    if let Some((s, e)) = acc {
        chunks.push(make_chunk(lines, s, e, offset));
    }

    chunks
}

fn make_chunk(lines: &[&str], start: usize, end: usize, offset: usize) -> ChunkOutput {
    ChunkOutput {
        content: lines[start..=end].join("\n"),
        start_line: offset + start + 1,
        end_line: offset + end + 1,
    }
}

/// Inclusive (start, end) line ranges of blank-line separated paragraphs.
fn paragraphs(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                out.push((s, i - 1));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        out.push((s, lines.len() - 1));
    }

    out
}

fn split_by_lines(
    lines: &[&str],
    start: usize,
    end: usize,
    offset: usize,
    chunks: &mut Vec<ChunkOutput>,
) {
    let mut chunk_start = start;
    let mut chars = 0usize;

    for i in start..=end {
        let line_chars = budget_chars(lines[i]);
        if chars + line_chars > CHAR_BUDGET && i > chunk_start {
            chunks.push(make_chunk(lines, chunk_start, i - 1, offset));
            chunk_start = i;
            chars = line_chars;
        } else {
            chars += line_chars;
        }
    }

    chunks.push(make_chunk(lines, chunk_start, end, offset));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_empty() {
        assert!(chunk_fallback("").is_empty());
        assert!(chunk_fallback("   \n\n  ").is_empty());
    }

    #[test]
    fn test_fallback_small_file() {
        let chunks = chunk_fallback("line 1\nline 2\n\nline 4");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 4);
    }

    #[test]
    fn test_fallback_splits_at_blank_lines() {
        let block1: String = (0..50).map(|i| format!("sentence number {i} here.")).collect::<Vec<_>>().join("\n");
        let block2: String = (0..50).map(|i| format!("another line {i} there.")).collect::<Vec<_>>().join("\n");
        let content = format!("{block1}\n\n{block2}");

        let chunks = chunk_fallback(&content);
        assert!(chunks.len() >= 2, "Should split at blank line, got {} chunks", chunks.len());
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 50);
        assert_eq!(chunks[1].start_line, 52);
    }

    #[test]
    fn test_fallback_splits_oversized_paragraph() {
        let long_line = "x".repeat(1000);
        let content = format!("{long_line}\n{long_line}\n{long_line}");
        let chunks = chunk_fallback(&content);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].start_line, 2);
        assert_eq!(chunks[1].end_line, 2);
    }

    #[test]
    fn test_chunk_lines_applies_offset() {
        let lines = vec!["alpha", "beta"];
        let chunks = chunk_lines(&lines, 10);
        assert_eq!(chunks[0].start_line, 11);
        assert_eq!(chunks[0].end_line, 12);
    }
}
