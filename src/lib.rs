//! Component-template to TSX lowering.
//!
//! Compiles a component template into a typed render function so a
//! standard TypeScript checker can validate template expressions against
//! the component's declared context. The output is never executed; it
//! exists to carry types and byte-accurate mappings back to the template.
//!
//! Pipeline: parse the template into IR nodes, resolve component tags
//! against the caller-supplied registry, lower directives and control flow
//! into element-tree expressions with every template expression qualified
//! against `_ctx`, then assemble the render function around the body.

mod codegen;
mod ir;
mod parse;
mod resolve;
mod rewrite;
mod transform;


pub use ir::{
    AttributeNode, CommentNode, Diagnostic, DiagnosticKind, DirectiveArgument, DirectiveNode,
    ElementNode, InterpolationNode, Mapping, RawExpression, SourceSpan, TemplateNode, TextNode,
};
pub use parse::{parse_template, ParseError};
pub use resolve::{ComponentBinding, ComponentImport, ComponentRegistry};
pub use rewrite::{
    collect_alias_names, is_handler_reference, rewrite_expression, RewrittenExpression, Scope,
    CONTEXT_REFERENCE,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Path of the component file; the basename feeds the context-type
    /// import in the generated header.
    pub filename: String,
    /// Declared components, keyed by their declared name.
    #[serde(default)]
    pub components: HashMap<String, ComponentImport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    /// Template spans of every standalone expression the rewriter
    /// consumed, in emission order.
    pub expressions: Vec<SourceSpan>,
    /// Generated-to-source byte-range correspondences, in emission order.
    pub mappings: Vec<Mapping>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles a template into a typed TSX render function.
///
/// Unrecoverable syntax errors in the template markup fail the compile;
/// everything else (malformed expressions, misplaced or incomplete
/// directives) degrades to a placeholder plus a diagnostic.
pub fn compile(template: &str, options: &CompileOptions) -> Result<CompileResult, ParseError> {
    let nodes = parse::parse_template(template)?;
    Ok(codegen::generate(&nodes, options))
}
