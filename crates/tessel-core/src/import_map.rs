//! Import maps: ordered package declarations collected from a page.
//!
//! A page declares its npm dependencies either through linked JSON
//! documents (`<link rel="importmap" href="deps.json">`) or one package at
//! a time (`<link rel="package" name global version href>`). Every source
//! becomes an [`ImportMap`]; the page's effective map is the left-to-right
//! [`fold`](ImportMap::fold) of all of them, later sources winning on key
//! collision.

use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One declared package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Global name the package is exposed under
    #[serde(default)]
    pub global: String,
    /// npm version or range
    pub version: String,
    /// URL the package can be loaded from without bundling
    #[serde(default)]
    pub url: String,
}

/// Ordered `name → package` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportMap(IndexMap<String, PackageSpec>);

impl ImportMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an import map document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidImportMap`] if `text` is not a JSON
    /// object of package specs; `href` is only used for the message.
    pub fn from_json(href: &str, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::InvalidImportMap {
            href: href.to_string(),
            source,
        })
    }

    /// Single-entry map, as declared by one `<link rel="package">` tag.
    pub fn single(name: impl Into<String>, spec: PackageSpec) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert(name.into(), spec);
        Self(map)
    }

    /// Fold maps left to right; later maps override earlier ones.
    ///
    /// A key keeps the position of its first appearance and takes the
    /// value of its last.
    pub fn fold<I>(maps: I) -> Self
    where
        I: IntoIterator<Item = ImportMap>,
    {
        maps.into_iter().fold(Self::new(), |mut acc, map| {
            acc.0.extend(map.0);
            acc
        })
    }

    pub fn get(&self, name: &str) -> Option<&PackageSpec> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PackageSpec)> {
        self.0.iter()
    }

    /// Install specifiers in declaration order (`name@version`).
    pub fn dependencies(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(name, spec)| format!("{name}@{}", spec.version))
            .collect()
    }

    /// Script that publishes every package's URL and global name on
    /// `window.__tessel_globals`, for pages that load modules on demand.
    pub fn global_bootstrap(&self) -> String {
        let table: IndexMap<&str, serde_json::Value> = self
            .0
            .iter()
            .map(|(name, spec)| {
                (
                    name.as_str(),
                    serde_json::json!({ "global": spec.global, "url": spec.url }),
                )
            })
            .collect();
        let json = serde_json::to_string(&table).unwrap_or_else(|_| "{}".to_string());
        // Keep a literal "</script>" inside JSON from closing the tag.
        let json = json.replace("</", "<\\/");
        format!("window.__tessel_globals = Object.assign(window.__tessel_globals || {{}}, {json});")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(version: &str) -> PackageSpec {
        PackageSpec {
            global: String::new(),
            version: version.to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_fold_later_wins() {
        let folded = ImportMap::fold([ImportMap::single("x", spec("1")), ImportMap::single("x", spec("2"))]);
        assert_eq!(folded, ImportMap::single("x", spec("2")));
    }

    #[test]
    fn test_fold_disjoint_keys_union() {
        let folded = ImportMap::fold([ImportMap::single("x", spec("1")), ImportMap::single("y", spec("2"))]);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded.dependencies(), vec!["x@1", "y@2"]);
    }

    #[test]
    fn test_fold_keeps_first_position() {
        let first = ImportMap::fold([ImportMap::single("a", spec("1")), ImportMap::single("b", spec("1"))]);
        let folded = ImportMap::fold([first, ImportMap::single("a", spec("3"))]);
        assert_eq!(folded.dependencies(), vec!["a@3", "b@1"]);
    }

    #[test]
    fn test_from_json() {
        let map = ImportMap::from_json(
            "deps.json",
            r#"{"react": {"global": "React", "version": "18.2.0", "url": "https://esm.sh/react"}}"#,
        )
        .unwrap();
        let react = map.get("react").unwrap();
        assert_eq!(react.global, "React");
        assert_eq!(map.dependencies(), vec!["react@18.2.0"]);
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = ImportMap::from_json("deps.json", "{not json").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidImportMap { ref href, .. } if href == "deps.json"));
    }

    #[test]
    fn test_global_bootstrap() {
        let map = ImportMap::single(
            "lodash",
            PackageSpec {
                global: "_".into(),
                version: "4".into(),
                url: "https://cdn/lodash.js".into(),
            },
        );
        let script = map.global_bootstrap();
        assert!(script.starts_with("window.__tessel_globals"));
        assert!(script.contains(r#""lodash":{"global":"_","url":"https://cdn/lodash.js"}"#));
    }
}
