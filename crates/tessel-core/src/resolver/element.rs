//! Lifecycle of a `<bundle-script>` element on the on-demand path.
//!
//! The element is modelled as an explicit state machine fed with
//! [`ElementEvent`]s. Once connected and given a `src` it resolves the
//! module through a [`ModuleResolver`] and exposes the loader snippet a
//! page injects to import the published artifact. A `defer` element waits
//! for [`ElementEvent::DocumentReady`] first.

use super::{ArtifactHandle, ModuleResolver};
use crate::error::ResolutionError;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEvent {
    /// Inserted into a document
    Connected,
    /// Removed from its document
    Disconnected,
    /// An attribute was set (`Some`) or removed (`None`)
    AttributeChanged { name: String, value: Option<String> },
    /// The document finished parsing
    DocumentReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementState {
    Unattached,
    Attached,
    Rendering,
    Rendered {
        handle: ArtifactHandle,
        loader: String,
    },
    Failed(ResolutionError),
}

#[derive(Debug, Clone)]
pub struct BundleScriptElement {
    src: Option<String>,
    defer: bool,
    document_ready: bool,
    state: ElementState,
}

impl BundleScriptElement {
    pub fn new(src: Option<String>, defer: bool) -> Self {
        Self {
            src,
            defer,
            document_ready: false,
            state: ElementState::Unattached,
        }
    }

    pub fn state(&self) -> &ElementState {
        &self.state
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    /// Loader snippet of a rendered element.
    pub fn loader(&self) -> Option<&str> {
        match &self.state {
            ElementState::Rendered { loader, .. } => Some(loader),
            _ => None,
        }
    }

    /// Apply `event`, rendering when the element becomes ready.
    ///
    /// `base` is the URL of the containing document; `src` resolves
    /// against it. Resolution failures land in [`ElementState::Failed`]
    /// and are retried when `src` changes or the element reconnects.
    pub async fn handle(
        &mut self,
        event: ElementEvent,
        resolver: &ModuleResolver,
        base: &Url,
    ) -> &ElementState {
        match event {
            ElementEvent::Connected => {
                if self.state == ElementState::Unattached {
                    self.state = ElementState::Attached;
                }
            }
            ElementEvent::Disconnected => self.state = ElementState::Unattached,
            ElementEvent::DocumentReady => self.document_ready = true,
            ElementEvent::AttributeChanged { name, value } => match name.as_str() {
                "src" => {
                    let changed = self.src != value;
                    self.src = value;
                    let settled = matches!(
                        self.state,
                        ElementState::Rendered { .. } | ElementState::Failed(_)
                    );
                    if changed && settled {
                        self.state = ElementState::Attached;
                    }
                }
                "defer" => self.defer = value.is_some(),
                _ => {}
            },
        }

        if self.state == ElementState::Attached && self.ready() {
            self.render(resolver, base).await;
        }
        &self.state
    }

    fn ready(&self) -> bool {
        self.src.is_some() && (!self.defer || self.document_ready)
    }

    async fn render(&mut self, resolver: &ModuleResolver, base: &Url) {
        let Some(src) = self.src.clone() else {
            return;
        };
        self.state = ElementState::Rendering;
        debug!("Rendering bundle-script {}", src);

        self.state = match resolver.resolve(&src, base).await {
            Ok(handle) => {
                let loader = loader_snippet(resolver.bootstrap().as_deref(), &handle);
                ElementState::Rendered { handle, loader }
            }
            Err(err) => ElementState::Failed(err),
        };
    }
}

fn loader_snippet(bootstrap: Option<&str>, handle: &ArtifactHandle) -> String {
    let specifier = serde_json::to_string(handle.as_str())
        .unwrap_or_else(|_| format!("\"{handle}\""));
    match bootstrap {
        Some(bootstrap) => format!("{bootstrap}\nimport({specifier});"),
        None => format!("import({specifier});"),
    }
}
