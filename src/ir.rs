//! Template IR for the TSX lowering pipeline.
//!
//! The external template parser produces these nodes; the directive
//! transform pipeline and code generator consume them. Every node carries
//! the exact byte range of the template text it came from so the emitter
//! can produce bidirectional mappings.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE SPANS
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte range into the original template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpan {
    pub offset: u32,
    pub length: u32,
}

impl SourceSpan {
    pub fn new(offset: usize, length: usize) -> Self {
        SourceSpan {
            offset: offset as u32,
            length: length as u32,
        }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        let start = self.offset as usize;
        let end = start + self.length as usize;
        &source[start..end]
    }
}

/// Correlates a generated-output byte range with the template byte range it
/// was derived from. Entries are recorded in emission order, never sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub generated_offset: u32,
    pub generated_length: u32,
    pub source_offset: u32,
    pub source_length: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE NODES
// ═══════════════════════════════════════════════════════════════════════════════

/// A raw (not yet rewritten) expression substring extracted by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExpression {
    pub text: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Interpolation(InterpolationNode),
    Comment(CommentNode),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub tag_span: SourceSpan,
    pub attributes: Vec<AttributeNode>,
    pub directives: Vec<DirectiveNode>,
    pub children: Vec<TemplateNode>,
    pub span: SourceSpan,
    pub self_closing: bool,
}

impl ElementNode {
    pub fn directive(&self, name: &str) -> Option<&DirectiveNode> {
        self.directives.iter().find(|d| d.name == name)
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directive(name).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub content: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationNode {
    pub expression: RawExpression,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub content: String,
    pub span: SourceSpan,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES & DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

/// A plain markup attribute with an optional literal value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeNode {
    pub name: String,
    pub value: Option<String>,
    pub value_span: Option<SourceSpan>,
    pub span: SourceSpan,
}

/// A directive argument. The dynamic form carries the bracketed expression;
/// consumers must handle both variants explicitly instead of sniffing
/// strings for brackets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DirectiveArgument {
    None,
    Static { name: String, span: SourceSpan },
    Dynamic { expression: RawExpression },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveNode {
    pub name: String,
    pub argument: DirectiveArgument,
    /// Order-preserving, duplicates removed.
    pub modifiers: Vec<String>,
    pub expression: Option<RawExpression>,
    pub span: SourceSpan,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    MalformedExpression,
    UnsupportedDirectiveCombination,
    InvalidDirectiveArgument,
}

/// A recoverable compile problem. The offending node is lowered to a
/// placeholder and compilation continues; callers wanting strict mode treat
/// any diagnostic as fatal themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: SourceSpan,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: SourceSpan) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            span,
        }
    }
}
