//! Server-side script execution.
//!
//! Scripts whose `side` attribute contains `server` run before the page
//! is served. Execution is a two-phase stage around a [`ScriptRuntime`]:
//!
//! 1. [`prepare_for_execution`] turns every `<script>` into an inert
//!    `<template data-tessel-script>` placeholder. Attributes are kept and
//!    inline code moves into the `data-tessel-inline` attribute, so the
//!    placeholder survives any HTML serializer untouched and stays where
//!    it was (templates are allowed in `<head>`).
//! 2. The runtime loads the prepared page with scripting enabled and runs
//!    exactly the server-targeted placeholders, then serializes the
//!    resulting document with scripting disabled.
//! 3. [`reconcile`] turns placeholders back into scripts: exclusively
//!    server-side ones are dropped, dual-target ones become plain client
//!    scripts, everything else is restored unchanged.
//!
//! Pages without server-side scripts skip the runtime entirely.

use crate::dom::{self, Document};
use crate::error::RenderError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Element used for placeholders.
pub const PLACEHOLDER_TAG: &str = "template";

/// Marker attribute distinguishing placeholders from authored templates.
pub const PLACEHOLDER_ATTR: &str = "data-tessel-script";

/// Placeholder attribute holding inline script code.
pub const INLINE_ATTR: &str = "data-tessel-inline";

/// Where a script runs, parsed from its `side` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptTarget {
    pub client: bool,
    pub server: bool,
}

impl ScriptTarget {
    /// `None` and values without `server` target the client only.
    pub fn parse(side: Option<&str>) -> Self {
        let Some(side) = side else {
            return Self {
                client: true,
                server: false,
            };
        };
        let server = side.contains("server");
        Self {
            server,
            client: !server || side.contains("client"),
        }
    }

    pub fn is_server_only(&self) -> bool {
        self.server && !self.client
    }
}

/// A page ready for a [`ScriptRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Prepared HTML (scripts replaced by placeholders)
    pub html: String,
    /// Directory the page's relative URLs resolve against
    pub output_dir: PathBuf,
    /// Site-relative page path, if the page came from the site
    pub page: Option<String>,
}

/// Executes the server-targeted placeholders of a prepared page.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    /// Run the page and return the serialized document afterwards.
    ///
    /// # Errors
    ///
    /// [`RenderError::ServerScript`] if a server script throws or fails
    /// to load, [`RenderError::Runtime`] if the runtime itself fails.
    async fn run(&self, request: ExecutionRequest) -> Result<String, RenderError>;
}

/// Replace every `<script>` with a placeholder.
///
/// # Returns
///
/// The prepared HTML and the number of server-targeted scripts.
pub fn prepare_for_execution(html: &str) -> (String, usize) {
    let doc = Document::parse(html);
    let mut server_scripts = 0;

    for script in doc.elements_by_tag("script") {
        let attributes = dom::attributes(&script);
        if ScriptTarget::parse(dom::attr(&script, "side").as_deref()).server {
            server_scripts += 1;
        }

        let placeholder = dom::create_element(PLACEHOLDER_TAG, &[(PLACEHOLDER_ATTR, "")]);
        for (name, value) in &attributes {
            dom::set_attr(&placeholder, name, value);
        }
        let code = dom::text_content(&script);
        if !code.is_empty() {
            dom::set_attr(&placeholder, INLINE_ATTR, &code);
        }
        dom::replace_with(&script, vec![placeholder]);
    }

    (doc.to_html(), server_scripts)
}

/// Turn placeholders back into scripts after execution.
pub fn reconcile(html: &str) -> String {
    let doc = Document::parse(html);

    let placeholders = doc
        .elements_by_tag(PLACEHOLDER_TAG)
        .into_iter()
        .filter(|el| dom::has_attr(el, PLACEHOLDER_ATTR));

    for placeholder in placeholders {
        let target = ScriptTarget::parse(dom::attr(&placeholder, "side").as_deref());
        if target.is_server_only() {
            dom::remove(&placeholder);
            continue;
        }

        let script = dom::create_element("script", &[]);
        for (name, value) in dom::attributes(&placeholder) {
            let dual_target_side = target.server && name == "side";
            if name != INLINE_ATTR && name != PLACEHOLDER_ATTR && !dual_target_side {
                dom::set_attr(&script, &name, &value);
            }
        }
        if let Some(code) = dom::attr(&placeholder, INLINE_ATTR) {
            dom::append_text(&script, &code);
        }
        dom::replace_with(&placeholder, vec![script]);
    }

    doc.to_html()
}

/// Execute the server-side scripts of `html`, if it has any.
pub async fn run_server_scripts(
    html: String,
    output_dir: &Path,
    page: Option<&str>,
    runtime: Option<&dyn ScriptRuntime>,
) -> Result<String, RenderError> {
    let (prepared, server_scripts) = prepare_for_execution(&html);
    if server_scripts == 0 {
        return Ok(html);
    }

    let runtime = runtime.ok_or(RenderError::NoRuntime)?;
    debug!("Executing {} server scripts", server_scripts);
    let executed = runtime
        .run(ExecutionRequest {
            html: prepared,
            output_dir: output_dir.to_path_buf(),
            page: page.map(str::to_string),
        })
        .await?;

    Ok(reconcile(&executed))
}
