//! Web page loading for the retrieval index.

use std::path::Path;

use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};

use crate::core::config::validation::is_valid_url;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: String,
    pub title: Option<String>,
    pub content: String,
}

/// URLs from `urls_file` (one per line, `#` comments and blank lines
/// ignored) followed by `additional`, de-duplicated in first-seen order.
/// Malformed entries are skipped.
pub fn collect_urls(urls_file: &Path, additional: &[String]) -> Vec<String> {
    let from_file = match std::fs::read_to_string(urls_file) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!("Could not read URLs file {}: {}", urls_file.display(), err);
            String::new()
        }
    };

    let mut urls: Vec<String> = Vec::new();
    let candidates = from_file
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .chain(additional.iter().map(|url| url.trim()));

    for candidate in candidates {
        if !is_valid_url(candidate) {
            tracing::warn!("Skipping malformed URL: {}", candidate);
            continue;
        }
        if !urls.iter().any(|existing| existing == candidate) {
            urls.push(candidate.to_string());
        }
    }
    urls
}

pub async fn fetch_document(client: &Client, url: &str) -> Result<Document, ApiError> {
    let response = client.get(url).send().await.map_err(ApiError::internal)?;
    if !response.status().is_success() {
        return Err(ApiError::Internal(format!(
            "Fetch of {} failed: {}",
            url,
            response.status()
        )));
    }
    let html = response.text().await.map_err(ApiError::internal)?;

    Ok(Document {
        source: url.to_string(),
        title: extract_title(&html),
        content: html_to_text(&html),
    })
}

/// Elements whose text never reaches the index.
const INVISIBLE: [&str; 7] = ["head", "script", "style", "noscript", "template", "svg", "iframe"];

/// Elements that end a line of visible text.
const BLOCKS: [&str; 22] = [
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "footer", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "li", "nav", "p", "pre", "section", "tr",
];

pub fn extract_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    let title = document
        .select(&selector)
        .next()
        .map(|element| squash(&element.text().collect::<String>()))?;
    (!title.is_empty()).then_some(title)
}

/// Visible text of an HTML page: invisible elements dropped, block
/// elements on their own lines, whitespace normalized.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);

    let mut text = String::new();
    let mut blank_run = 0;
    for line in raw.lines().map(squash) {
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !text.is_empty() {
            text.push_str(if blank_run > 1 { "\n\n" } else { "\n" });
        }
        text.push_str(&line);
        blank_run = 0;
    }
    text
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                if INVISIBLE.contains(&name) {
                    continue;
                }
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCKS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child_element, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_reduced_to_visible_text() {
        let html = r#"
            <html>
            <head><title>LangSmith &amp; You</title><script>var x = 1;</script></head>
            <body>
                <!-- nav -->
                <h1>Overview</h1>
                <p>Trace&nbsp;runs, <b>evaluate</b> prompts.</p>
                <style>.a { color: red }</style>
                <ul><li>One</li><li>Two</li></ul>
            </body>
            </html>
        "#;

        assert_eq!(extract_title(html).as_deref(), Some("LangSmith & You"));
        let text = html_to_text(html);
        assert!(text.contains("Overview"));
        assert!(text.contains("Trace runs, evaluate prompts."));
        assert!(text.contains("One\n"));
        assert!(!text.contains('<'));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn named_and_numeric_entities_are_decoded() {
        let text = html_to_text("<p>LangSmith&#8217;s tracing &copy; 2024 &mdash; caf&#233;</p>");
        assert_eq!(text, "LangSmith\u{2019}s tracing \u{a9} 2024 \u{2014} caf\u{e9}");
        assert_eq!(
            extract_title("<html><head><title> Runs &amp;\n traces </title></head></html>").as_deref(),
            Some("Runs & traces")
        );
        assert_eq!(extract_title("<p>untitled</p>"), None);
    }

    #[test]
    fn line_breaks_follow_block_structure() {
        let text = html_to_text("<div>first<br>second</div><p>third <span>inline</span></p>");
        assert_eq!(text, "first\nsecond\nthird inline");
    }

    #[test]
    fn url_list_skips_comments_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("urls.txt");
        std::fs::write(
            &file,
            "# docs\nhttps://docs.smith.langchain.com/\n\nnot-a-url\nhttps://docs.smith.langchain.com/\n",
        )
        .unwrap();

        let urls = collect_urls(
            &file,
            &[
                "https://docs.smith.langchain.com/".to_string(),
                " https://python.langchain.com/docs ".to_string(),
            ],
        );
        assert_eq!(
            urls,
            vec![
                "https://docs.smith.langchain.com/".to_string(),
                "https://python.langchain.com/docs".to_string(),
            ]
        );
    }

    #[test]
    fn missing_url_file_uses_additional_only() {
        let urls = collect_urls(
            Path::new("/nonexistent/urls.txt"),
            &["https://example.com".to_string()],
        );
        assert_eq!(urls, vec!["https://example.com".to_string()]);
    }
}
