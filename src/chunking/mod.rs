//! Document chunking: heading-aware for markdown, paragraph/line-based for the rest.

pub mod fallback;
pub mod markdown;

/// Maximum non-whitespace characters per chunk.
pub const CHAR_BUDGET: usize = 1500;

/// Output of the chunking process.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub content: String,
    /// 1-based start line in the original document.
    pub start_line: usize,
    /// 1-based end line in the original document.
    pub end_line: usize,
}

/// Source format of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Markdown,
    /// HTML with tags already stripped by the loader.
    Html,
    Plain,
}

/// Chunk a document according to its format.
pub fn chunk_document(content: &str, format: DocFormat) -> Vec<ChunkOutput> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    match format {
        DocFormat::Markdown => markdown::chunk_markdown(content),
        DocFormat::Html | DocFormat::Plain => fallback::chunk_fallback(content),
    }
}

/// Count of non-whitespace characters, the unit of the chunk budget.
pub(crate) fn budget_chars(s: &str) -> usize {
    s.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_document_empty() {
        assert!(chunk_document("", DocFormat::Markdown).is_empty());
        assert!(chunk_document("  \n  ", DocFormat::Plain).is_empty());
    }

    #[test]
    fn test_chunk_document_markdown_small() {
        let source = "# Title\n\nSome text.\n\n## Section\n\nMore text.\n";
        let chunks = chunk_document(source, DocFormat::Markdown);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("## Section"));
    }

    #[test]
    fn test_chunk_document_plain_uses_fallback() {
        let chunks = chunk_document("some plain text\nmore text\n", DocFormat::Plain);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn test_budget_chars_ignores_whitespace() {
        assert_eq!(budget_chars(" a b\n c "), 3);
    }
}
