//! Plain-text extraction from uploaded files.

use std::path::Path;

use crate::core::errors::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Html,
    Unsupported,
}

impl FileKind {
    /// Resolve from the declared content type, falling back to the
    /// file extension.
    pub fn detect(file_type: &str, file_name: &str) -> Self {
        let file_type = file_type.to_ascii_lowercase();
        let file_name = file_name.to_ascii_lowercase();

        if file_type == "application/pdf" || file_name.ends_with(".pdf") {
            FileKind::Pdf
        } else if file_type == "text/html"
            || file_name.ends_with(".html")
            || file_name.ends_with(".htm")
        {
            FileKind::Html
        } else {
            FileKind::Unsupported
        }
    }
}

pub fn extract_text(path: &Path, kind: FileKind) -> Result<String, RagError> {
    match kind {
        FileKind::Pdf => extract_pdf(path),
        FileKind::Html => extract_html(path),
        FileKind::Unsupported => {
            Err(RagError::UnsupportedFormat(path.display().to_string()))
        }
    }
}

/// Concatenate per-page text. A page that fails extraction contributes
/// nothing instead of failing the whole document.
fn extract_pdf(path: &Path) -> Result<String, RagError> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| RagError::UnsupportedFormat(format!("unreadable pdf: {}", e)))?;

    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => {
                tracing::warn!("skipping pdf page {}: {}", page_number, e);
            }
        }
    }
    Ok(text)
}

fn extract_html(path: &Path) -> Result<String, RagError> {
    let html = std::fs::read_to_string(path)
        .map_err(|e| RagError::UnsupportedFormat(format!("unreadable html: {}", e)))?;
    Ok(strip_html(&html))
}

/// Drop tags plus script/style bodies, then collapse whitespace.
fn strip_html(html: &str) -> String {
    let mut text = String::new();
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        rest = &rest[open..];

        let lower = rest.to_ascii_lowercase();
        let skip_to = if lower.starts_with("<script") {
            lower.find("</script>").map(|p| p + "</script>".len())
        } else if lower.starts_with("<style") {
            lower.find("</style>").map(|p| p + "</style>".len())
        } else {
            rest.find('>').map(|p| p + 1)
        };

        match skip_to {
            Some(end) => {
                // tags act as word boundaries
                text.push(' ');
                rest = &rest[end..];
            }
            None => {
                rest = "";
            }
        }
    }
    text.push_str(rest);

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn detects_kind_from_type_or_extension() {
        assert_eq!(FileKind::detect("application/pdf", "a"), FileKind::Pdf);
        assert_eq!(FileKind::detect("", "report.PDF"), FileKind::Pdf);
        assert_eq!(FileKind::detect("text/html", "x"), FileKind::Html);
        assert_eq!(FileKind::detect("", "page.htm"), FileKind::Html);
        assert_eq!(FileKind::detect("text/plain", "notes.txt"), FileKind::Unsupported);
    }

    #[test]
    fn unsupported_kind_is_an_error() {
        let err = extract_text(Path::new("notes.txt"), FileKind::Unsupported).unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn strips_markup_and_collapses_whitespace() {
        let html = r#"
            <html>
            <head><style>body { color: red; }</style>
            <script>var x = 1;</script></head>
            <body>
                <h1>Hello</h1>
                <p>World   again</p>
            </body>
            </html>
        "#;
        let text = strip_html(html);
        assert_eq!(text, "Hello World again");
    }

    #[test]
    fn extracts_text_from_html_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".html")
            .tempfile()
            .expect("tempfile");
        write!(file, "<p>X is a thing.</p>").expect("write");

        let text = extract_text(file.path(), FileKind::Html).expect("extract");
        assert_eq!(text, "X is a thing.");
    }
}
