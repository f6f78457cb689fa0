//! Heading-aware markdown chunker.
//!
//! Sections start at ATX headings outside fenced code blocks. Neighbouring
//! sections are merged while they fit the budget; oversized sections go
//! through the paragraph chunker.

use super::fallback::chunk_lines;
use super::{budget_chars, ChunkOutput, CHAR_BUDGET};

pub fn chunk_markdown(content: &str) -> Vec<ChunkOutput> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut acc: Option<(usize, usize)> = None;
    let mut acc_chars = 0usize;

    for (start, end) in sections(&lines) {
        let chars: usize = lines[start..=end].iter().map(|l| budget_chars(l)).sum();
        if chars == 0 {
            continue;
        }

        if chars > CHAR_BUDGET {
            if let Some((s, e)) = acc.take() {
                push_trimmed(&lines, s, e, &mut chunks);
                acc_chars = 0;
            }
            chunks.extend(chunk_lines(&lines[start..=end], start));
            continue;
        }

        match acc {
            Some((s, e)) if acc_chars + chars > CHAR_BUDGET => {
                push_trimmed(&lines, s, e, &mut chunks);
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
        push_trimmed(&lines, s, e, &mut chunks);
    }

    chunks
}

/// Push lines[start..=end] without leading/trailing blank lines.
fn push_trimmed(lines: &[&str], mut start: usize, mut end: usize, chunks: &mut Vec<ChunkOutput>) {
    while start < end && lines[start].trim().is_empty() {
        start += 1;
    }
    while end > start && lines[end].trim().is_empty() {
        end -= 1;
    }
    chunks.push(ChunkOutput {
        content: lines[start..=end].join("\n"),
        start_line: start + 1,
        end_line: end + 1,
    });
}

/// Inclusive (start, end) line ranges, one per heading section. Text before
/// the first heading forms its own section.
fn sections(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut in_fence = false;

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence && is_heading(trimmed) && i > start {
            out.push((start, i - 1));
            start = i;
        }
    }

    if !lines.is_empty() {
        out.push((start, lines.len() - 1));
    }

    out
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_heading() {
        assert!(is_heading("# Title"));
        assert!(is_heading("### Sub"));
        assert!(!is_heading("#hashtag"));
        assert!(!is_heading("####### seven"));
        assert!(!is_heading("plain"));
    }

    #[test]
    fn test_sections_ignore_fenced_hashes() {
        let lines = vec!["# A", "text", "```python", "# comment", "```", "## B", "more"];
        let secs = sections(&lines);
        assert_eq!(secs, vec![(0, 4), (5, 6)]);
    }

    #[test]
    fn test_large_sections_stay_separate() {
        let body_a = "alpha words here. ".repeat(60);
        let body_b = "beta words there. ".repeat(60);
        let content = format!("# A\n\n{body_a}\n\n# B\n\n{body_b}\n");
        let chunks = chunk_markdown(&content);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("# A"));
        assert!(chunks[1].content.starts_with("# B"));
        assert_eq!(chunks[1].start_line, 5);
    }

    #[test]
    fn test_oversized_section_is_split() {
        let para = "word ".repeat(400);
        let content = format!("# Big\n\n{para}\n\n{para}\n");
        let chunks = chunk_markdown(&content);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].start_line, 1);
    }

    #[test]
    fn test_preamble_before_first_heading() {
        let content = "intro line\n\n# Heading\n\nbody";
        let chunks = chunk_markdown(content);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 5);
    }
}
