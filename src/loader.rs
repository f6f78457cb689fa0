use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::chunking::DocFormat;

/// Files larger than this are skipped.
const MAX_FILE_BYTES: u64 = 1_048_576;

/// A document read from the documents directory
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the documents directory
    pub path: String,
    pub title: String,
    pub content: String,
    pub format: DocFormat,
}

/// Read every indexable document under `docs_dir`, recursively.
///
/// A missing directory or a directory with no readable documents is an error:
/// there is nothing to answer questions about.
pub fn load_documents(docs_dir: &Path) -> Result<Vec<Document>> {
    if !docs_dir.is_dir() {
        anyhow::bail!("Documents directory {} does not exist", docs_dir.display());
    }

    let mut docs = Vec::new();

    for entry in WalkDir::new(docs_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_or_ignored(e))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", docs_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(format) = detect_format(path) else {
            continue;
        };

        if let Ok(meta) = entry.metadata() {
            if meta.len() > MAX_FILE_BYTES {
                tracing::debug!("Skipping large file {}", path.display());
                continue;
            }
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("Skipping unreadable file {}: {e}", path.display());
                continue;
            }
        };

        let content = match format {
            DocFormat::Html => strip_html(&raw),
            _ => raw,
        };
        if content.trim().is_empty() {
            continue;
        }

        let relative = path
            .strip_prefix(docs_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let title = extract_title(&content, format).unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| relative.clone())
        });

        docs.push(Document {
            path: relative,
            title,
            content,
            format,
        });
    }

    if docs.is_empty() {
        anyhow::bail!("No documents found in {}", docs_dir.display());
    }

    tracing::info!("Loaded {} documents from {}", docs.len(), docs_dir.display());
    Ok(docs)
}

fn is_hidden_or_ignored(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || matches!(name.as_ref(), "node_modules" | "__pycache__" | "target")
}

fn detect_format(path: &Path) -> Option<DocFormat> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "md" | "markdown" | "mdx" => Some(DocFormat::Markdown),
        "html" | "htm" => Some(DocFormat::Html),
        "txt" | "rst" | "adoc" | "text" => Some(DocFormat::Plain),
        _ => None,
    }
}

/// First level-1/2 heading of a markdown document.
fn extract_title(content: &str, format: DocFormat) -> Option<String> {
    if format != DocFormat::Markdown {
        return None;
    }
    content
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("# ") || l.starts_with("## "))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Drop tags, scripts and styles; keep text and line structure.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tag = &rest[start..];
        let lower: String = tag.chars().take(8).collect::<String>().to_ascii_lowercase();

        let skip_until = if lower.starts_with("<script") {
            Some("</script>")
        } else if lower.starts_with("<style") {
            Some("</style>")
        } else {
            None
        };

        match skip_until {
            Some(close) => match tag.to_ascii_lowercase().find(close) {
                Some(end) => rest = &tag[end + close.len()..],
                None => rest = "",
            },
            None => match tag.find('>') {
                Some(end) => {
                    let name = &tag[1..end];
                    if name.starts_with("br") || name.starts_with("/p") || name.starts_with("/h") {
                        out.push('\n');
                    }
                    rest = &tag[end + 1..];
                }
                None => rest = "",
            },
        }
    }
    out.push_str(rest);

    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_is_error() {
        let err = load_documents(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_documents(dir.path()).unwrap_err();
        assert!(err.to_string().contains("No documents found"));
    }

    #[test]
    fn test_loads_recursively_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("api/charts")).unwrap();
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("intro.md"), "# Intro\n\nWelcome.").unwrap();
        std::fs::write(dir.path().join("api/charts/line.md"), "# st.line_chart\n\nDraws lines.").unwrap();
        std::fs::write(dir.path().join(".cache/junk.md"), "# Junk").unwrap();
        std::fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();

        let docs = load_documents(dir.path()).unwrap();
        let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["api/charts/line.md", "intro.md"]);
        assert_eq!(docs[0].title, "st.line_chart");
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("caching.txt"), "Use st.cache_data for data.").unwrap();
        let docs = load_documents(dir.path()).unwrap();
        assert_eq!(docs[0].title, "caching");
        assert_eq!(docs[0].format, DocFormat::Plain);
    }

    #[test]
    fn test_strip_html() {
        let html = "<html><head><style>p{}</style></head><body><p>A &amp; B</p><script>x()</script>done</body></html>";
        let text = strip_html(html);
        assert!(text.contains("A & B"));
        assert!(text.contains("done"));
        assert!(!text.contains("x()"));
        assert!(!text.contains('<'));
    }
}
