//! `<trans-md>` expansion.
//!
//! The markdown comes from the element's own text, or from the file named
//! by `src` when the element is empty. An element with neither is left
//! as it is.

use super::{collect_tags, read_relative, replace_tags};
use crate::dom;
use crate::error::RenderError;
use futures::future::try_join_all;
use std::path::Path;

pub const MARKDOWN_TAG: &str = "trans-md";

enum MarkdownSource {
    Inline(String),
    File(String),
}

/// Replace every `<trans-md>` block of `html` with rendered HTML.
pub async fn expand_markdown(html: String, output_dir: &Path) -> Result<String, RenderError> {
    let sources = collect_tags(&html, MARKDOWN_TAG, |element| {
        let text = dom::text_content(element);
        if !text.trim().is_empty() {
            Some(MarkdownSource::Inline(text))
        } else {
            dom::attr(element, "src")
                .filter(|src| !src.is_empty())
                .map(MarkdownSource::File)
        }
    });
    if sources.is_empty() {
        return Ok(html);
    }

    let rendered = try_join_all(sources.into_iter().map(|source| async move {
        let text = match source {
            Some(MarkdownSource::Inline(text)) => text,
            Some(MarkdownSource::File(src)) => read_relative(output_dir, &src).await?,
            None => return Ok::<_, RenderError>(None),
        };
        Ok(Some(render(&text)))
    }))
    .await?;

    Ok(replace_tags(&html, MARKDOWN_TAG, rendered))
}

/// Render CommonMark to HTML after removing the indentation shared by
/// every line, so blocks indented to match the surrounding markup do not
/// turn into code blocks.
pub fn render(text: &str) -> String {
    markdown::to_html(&dedent(text))
}

fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| line.get(indent..).unwrap_or(line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
