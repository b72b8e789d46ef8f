//! Document loading
//!
//! Turns fetched bytes into `Document`s according to the requested file type.

use crate::errors::IngestionError;
use crate::fetch::FetchedFile;
use crate::pdf;
use qa_agent_common::document::{Document, Metadata, CONTENT_HASH_KEY};
use regex_lite::{Captures, Regex};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// File types with a parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Text,
    Markdown,
    Html,
    Pdf,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Text => "txt",
            FileType::Markdown => "md",
            FileType::Html => "html",
            FileType::Pdf => "pdf",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(FileType::Text),
            "md" | "markdown" => Ok(FileType::Markdown),
            "html" | "htm" => Ok(FileType::Html),
            "pdf" => Ok(FileType::Pdf),
            _ => Err(IngestionError::UnsupportedFileType(s.to_string())),
        }
    }
}

/// Parses fetched files of allow-listed types
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    allowed_types: Vec<String>,
}

impl DocumentLoader {
    pub fn new(allowed_types: &[String]) -> Self {
        Self {
            allowed_types: allowed_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Resolve `file_type`, failing when it is not allow-listed or has no parser
    pub fn check_file_type(&self, file_type: &str) -> Result<FileType, IngestionError> {
        let normalized = file_type.trim().to_ascii_lowercase();
        if !self.allowed_types.contains(&normalized) {
            return Err(IngestionError::UnsupportedFileType(file_type.to_string()));
        }
        normalized
            .parse()
            .map_err(|_| IngestionError::UnsupportedFileType(file_type.to_string()))
    }

    /// Parse a fetched file. Whitespace-only documents are dropped.
    pub fn load(
        &self,
        file_type: FileType,
        file: &FetchedFile,
        content_hash: &str,
    ) -> Result<Vec<Document>, IngestionError> {
        let mut base = Metadata::new();
        base.insert("source".into(), Value::String(file.filename.clone()));
        base.insert("file_type".into(), Value::String(file_type.to_string()));
        base.insert(CONTENT_HASH_KEY.into(), Value::String(content_hash.to_string()));

        let documents: Vec<Document> = match file_type {
            FileType::Text | FileType::Markdown => {
                vec![Document::new(String::from_utf8_lossy(&file.bytes), base)]
            }
            FileType::Html => {
                let html = String::from_utf8_lossy(&file.bytes);
                vec![Document::new(html_to_text(&html), base)]
            }
            FileType::Pdf => pdf::extract_pages(&file.bytes, &file.filename)?
                .into_iter()
                .map(|page| {
                    let mut metadata = base.clone();
                    metadata.insert("page_number".into(), Value::from(page.number));
                    Document::new(page.text, metadata)
                })
                .collect(),
        };

        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|d| !d.content.trim().is_empty())
            .collect();

        if documents.is_empty() {
            return Err(IngestionError::EmptyDocument(file.filename.clone()));
        }

        debug!(
            filename = %file.filename,
            file_type = %file_type,
            documents = documents.len(),
            "Documents loaded"
        );

        Ok(documents)
    }
}

struct HtmlPatterns {
    hidden: Vec<Regex>,
    comments: Regex,
    breaks: Regex,
    tags: Regex,
    numeric_entity: Regex,
    blank_lines: Regex,
}

fn html_patterns() -> &'static HtmlPatterns {
    static PATTERNS: OnceLock<HtmlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("static HTML pattern");
        HtmlPatterns {
            // One pattern per element; head last so it ends at its own closing tag
            hidden: ["script", "style", "noscript", "head"]
                .iter()
                .map(|tag| compile(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")))
                .collect(),
            comments: compile(r"(?s)<!--.*?-->"),
            breaks: compile(r"(?i)<(br|/p|/div|/li|/h[1-6]|/tr)\b[^>]*>"),
            tags: compile(r"<[^>]+>"),
            numeric_entity: compile(r"&#(x[0-9a-fA-F]+|[0-9]+);"),
            blank_lines: compile(r"\n\s*\n+"),
        }
    })
}

/// Strip markup from an HTML page, keeping paragraph breaks
pub fn html_to_text(html: &str) -> String {
    let patterns = html_patterns();

    let mut text = patterns.comments.replace_all(html, " ").into_owned();
    for hidden in &patterns.hidden {
        text = hidden.replace_all(&text, " ").into_owned();
    }
    let text = patterns.breaks.replace_all(&text, "\n");
    let text = patterns.tags.replace_all(&text, " ");
    let text = decode_entities(&text);

    let lines: Vec<String> = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    let joined = lines.join("\n");

    patterns
        .blank_lines
        .replace_all(joined.trim(), "\n\n")
        .into_owned()
}

fn decode_entities(text: &str) -> String {
    let decoded = html_patterns()
        .numeric_entity
        .replace_all(text, |caps: &Captures| {
            let code = &caps[1];
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse::<u32>().ok(),
            };
            value
                .and_then(char::from_u32)
                .filter(|c| !c.is_control() || c.is_whitespace())
                .map(String::from)
                .unwrap_or_default()
        });

    decoded
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> DocumentLoader {
        DocumentLoader::new(&["txt".into(), "md".into(), "html".into(), "pdf".into()])
    }

    fn fetched(filename: &str, bytes: &[u8]) -> FetchedFile {
        FetchedFile {
            url: format!("http://localhost/{}", filename),
            filename: filename.to_string(),
            content_type: None,
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_check_file_type_allow_list() {
        let loader = loader();
        assert_eq!(loader.check_file_type("txt").unwrap(), FileType::Text);
        assert_eq!(loader.check_file_type(" PDF ").unwrap(), FileType::Pdf);
        assert!(matches!(
            loader.check_file_type("exe"),
            Err(IngestionError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_check_file_type_respects_configured_list() {
        let loader = DocumentLoader::new(&["txt".into()]);
        assert!(loader.check_file_type("txt").is_ok());
        assert!(matches!(
            loader.check_file_type("pdf"),
            Err(IngestionError::UnsupportedFileType(t)) if t == "pdf"
        ));
    }

    #[test]
    fn test_allowed_type_without_parser_is_unsupported() {
        let loader = DocumentLoader::new(&["docx".into()]);
        assert!(matches!(
            loader.check_file_type("docx"),
            Err(IngestionError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_load_text_tags_source() {
        let file = fetched("dolphin.txt", b"A dolphin named Jian-Jian-tun exists.");
        let docs = loader().load(FileType::Text, &file, "abc").unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "A dolphin named Jian-Jian-tun exists.");
        assert_eq!(docs[0].metadata["source"], "dolphin.txt");
        assert_eq!(docs[0].metadata["file_type"], "txt");
        assert_eq!(docs[0].metadata[CONTENT_HASH_KEY], "abc");
    }

    #[test]
    fn test_load_whitespace_only_fails() {
        let file = fetched("blank.txt", b"  \n\t ");
        assert!(matches!(
            loader().load(FileType::Text, &file, "abc"),
            Err(IngestionError::EmptyDocument(name)) if name == "blank.txt"
        ));
    }

    #[test]
    fn test_load_html_strips_markup() {
        let html = br#"<html><head><title>x</title><style>p { color: red; }</style></head>
<body><h1>Dolphins</h1><script>alert("hi")</script>
<p>Jian-Jian-tun &amp; friends &lt;swim&gt;&#33;</p><!-- hidden --></body></html>"#;
        let docs = loader().load(FileType::Html, &fetched("page.html", html), "abc").unwrap();

        let text = &docs[0].content;
        assert!(text.contains("Dolphins"));
        assert!(text.contains("Jian-Jian-tun & friends <swim>!"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn test_html_to_text_keeps_paragraphs() {
        let text = html_to_text("<p>One</p><p>Two</p>");
        assert_eq!(text, "One\nTwo");
    }

    #[test]
    fn test_html_head_dropped_after_nested_style() {
        let html = r#"<html><head><style>p{}</style><title>Secret Title</title><script>x()</script><meta charset="utf-8"></head><body><p>Body</p></body></html>"#;
        assert_eq!(html_to_text(html), "Body");
    }

    #[test]
    fn test_script_containing_other_closing_tags() {
        let html = r#"<body><p>Before</p><script>document.write("</style>")</script><p>After</p></body>"#;
        assert_eq!(html_to_text(html), "Before\nAfter");
    }

    #[test]
    fn test_control_entities_are_dropped() {
        assert_eq!(decode_entities("a&#0;b&#x7;c&#10;d&#x1F42C;"), "abc\nd\u{1F42C}");
    }

    #[test]
    fn test_load_invalid_pdf_fails() {
        let result = loader().load(FileType::Pdf, &fetched("bad.pdf", b"nope"), "abc");
        assert!(matches!(result, Err(IngestionError::PdfParseError { .. })));
    }
}
