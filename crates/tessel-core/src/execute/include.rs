//! `<trans-inc src>` expansion: the element is replaced by the contents
//! of the file it names, read relative to the output directory.

use super::{collect_tags, read_relative, replace_tags};
use crate::dom;
use crate::error::RenderError;
use futures::future::try_join_all;
use std::path::Path;

pub const INCLUDE_TAG: &str = "trans-inc";

/// Replace every `<trans-inc>` of `html` with the file it names.
///
/// # Errors
///
/// Returns [`RenderError::MissingInclude`] if a named file does not exist.
pub async fn expand_includes(html: String, output_dir: &Path) -> Result<String, RenderError> {
    let sources = collect_tags(&html, INCLUDE_TAG, |element| {
        dom::attr(element, "src").filter(|src| !src.is_empty())
    });
    if sources.is_empty() {
        return Ok(html);
    }

    let contents = try_join_all(sources.into_iter().map(|src| async move {
        match src {
            Some(src) => read_relative(output_dir, &src).await.map(Some),
            None => Ok(None),
        }
    }))
    .await?;

    Ok(replace_tags(&html, INCLUDE_TAG, contents))
}
