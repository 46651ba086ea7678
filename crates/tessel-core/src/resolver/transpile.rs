//! Transpiling on-demand modules with oxc.
//!
//! TypeScript syntax is stripped and the generated code is scanned for the
//! static module specifiers the resolver must rewrite: `import ... from`,
//! `export ... from` and `export * from`. Dynamic `import()` expressions
//! are left alone.

use crate::error::ResolutionError;
use oxc_allocator::Allocator;
use oxc_ast::ast::{ModuleDeclaration, Program};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// A static module specifier inside transpiled code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    /// Specifier as written
    pub specifier: String,
    /// Byte offset of the opening quote
    pub start: usize,
    /// Byte offset just past the closing quote
    pub end: usize,
}

/// Transpiled code plus the import sites found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspiledModule {
    pub code: String,
    pub imports: Vec<ImportSite>,
}

impl TranspiledModule {
    /// Replace import specifiers using `replacements` (specifier → new
    /// specifier). Specifiers without a replacement are kept.
    pub fn rewrite_imports(&self, replacements: &HashMap<String, String>) -> String {
        let mut sites: Vec<&ImportSite> = self.imports.iter().collect();
        sites.sort_by_key(|site| site.start);

        let mut out = String::with_capacity(self.code.len());
        let mut cursor = 0;
        for site in sites {
            let Some(replacement) = replacements.get(&site.specifier) else {
                continue;
            };
            out.push_str(&self.code[cursor..site.start]);
            out.push_str(&quote(replacement));
            cursor = site.end;
        }
        out.push_str(&self.code[cursor..]);
        out
    }
}

/// Source-to-module transpiler boundary.
pub trait Transpiler: Send + Sync {
    fn transpile(&self, url: &Url, source: &str) -> Result<TranspiledModule, ResolutionError>;
}

/// [`Transpiler`] built on oxc's TypeScript transform.
#[derive(Debug, Clone, Default)]
pub struct OxcTranspiler;

impl OxcTranspiler {
    pub fn new() -> Self {
        Self
    }
}

impl Transpiler for OxcTranspiler {
    fn transpile(&self, url: &Url, source: &str) -> Result<TranspiledModule, ResolutionError> {
        let failed = |message: String| ResolutionError::Transpile {
            url: url.to_string(),
            message,
        };

        let path = Path::new(url.path());
        let source_type = SourceType::from_path(path).unwrap_or(SourceType::mjs());

        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type).parse();
        if !parsed.errors.is_empty() {
            return Err(failed(join_errors(&parsed.errors)));
        }

        let mut program = parsed.program;
        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
        let transformed = Transformer::new(&allocator, path, &TransformOptions::default())
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(failed(join_errors(&transformed.errors)));
        }

        let code = Codegen::new().build(&program).code;
        let imports = scan_imports(&code).map_err(failed)?;
        Ok(TranspiledModule { code, imports })
    }
}

/// Find the static module specifiers of plain JavaScript `code`.
pub fn scan_imports(code: &str) -> Result<Vec<ImportSite>, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if !parsed.errors.is_empty() {
        return Err(join_errors(&parsed.errors));
    }
    Ok(collect_sites(&parsed.program))
}

fn collect_sites(program: &Program<'_>) -> Vec<ImportSite> {
    let mut sites = Vec::new();
    for statement in program.body.iter() {
        let source = match statement.as_module_declaration() {
            Some(ModuleDeclaration::ImportDeclaration(import)) => Some(&import.source),
            Some(ModuleDeclaration::ExportAllDeclaration(all)) => Some(&all.source),
            Some(ModuleDeclaration::ExportNamedDeclaration(named)) => named.source.as_ref(),
            _ => None,
        };
        if let Some(source) = source {
            sites.push(ImportSite {
                specifier: source.value.to_string(),
                start: source.span.start as usize,
                end: source.span.end as usize,
            });
        }
    }
    sites
}

fn join_errors<E: ToString>(errors: &[E]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

fn quote(specifier: &str) -> String {
    serde_json::to_string(specifier).unwrap_or_else(|_| format!("\"{specifier}\""))
}
