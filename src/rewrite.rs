//! Expression rewriting and scope tracking.
//!
//! Every expression bound in the template is parsed as a standalone
//! JS/TS expression and each free identifier is qualified against the
//! render-function context parameter (`foo` -> `_ctx.foo`). Identifiers
//! bound by an active scope frame (loop aliases), bound inside the
//! expression itself (arrow parameters, destructuring), or present in the
//! globals whitelist are left untouched. Member chains qualify only the
//! root identifier: a property-position name is never an identifier
//! reference in the oxc AST.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use std::collections::HashSet;

use crate::ir::{RawExpression, SourceSpan};

/// The context parameter of the generated render function.
pub const CONTEXT_REFERENCE: &str = "_ctx";

lazy_static! {
    /// Standard JS globals that must never be qualified, plus `$event`,
    /// the implicit parameter of generated event handlers.
    static ref JS_GLOBALS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Math");
        s.insert("console");
        s.insert("JSON");
        s.insert("Date");
        s.insert("String");
        s.insert("Number");
        s.insert("Boolean");
        s.insert("Array");
        s.insert("Object");
        s.insert("Promise");
        s.insert("Map");
        s.insert("Set");
        s.insert("Error");
        s.insert("undefined");
        s.insert("NaN");
        s.insert("Infinity");
        s.insert("parseInt");
        s.insert("parseFloat");
        s.insert("$event");
        s
    };

    /// A bare reference path: identifier or dot-separated member chain with
    /// no call, index, or assignment.
    static ref REFERENCE_PATH_RE: Regex =
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$").unwrap();

    /// Identifier tokens, used to collect binding names out of a loop
    /// alias list (handles destructuring aliases).
    static ref IDENT_RE: Regex = Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered stack of binding frames. A frame is pushed when entering a node
/// that introduces bindings (a loop body) and popped on leaving it; the
/// push/pop pair lives at the single call site that owns the frame.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frames: Vec<Vec<String>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn push_frame(&mut self, names: Vec<String>) {
        self.frames.push(names);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames
            .iter()
            .rev()
            .any(|frame| frame.iter().any(|n| n == name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// The resolved form of a template expression. Immutable once produced;
/// the span is the exact source range the rewriter consumed.
#[derive(Debug, Clone)]
pub struct RewrittenExpression {
    pub code: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct ExpressionError {
    pub message: String,
    pub span: SourceSpan,
}

pub fn rewrite_expression(
    raw: &RawExpression,
    scope: &Scope,
) -> Result<RewrittenExpression, ExpressionError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(true)
        .with_module(true);
    let parsed = Parser::new(&allocator, &raw.text, source_type).parse_expression();

    let expr = match parsed {
        Ok(expr) => expr,
        Err(errors) => {
            return Err(ExpressionError {
                message: format!("invalid expression syntax: {:?}", errors),
                span: raw.span,
            });
        }
    };

    let mut collector = IdentifierCollector {
        references: Vec::new(),
        bindings: HashSet::new(),
        shorthand_starts: HashSet::new(),
    };
    collector.visit_expression(&expr);
    collector.references.sort_by_key(|(_, span)| span.start);

    let source = &raw.text;
    let mut code = String::with_capacity(source.len() + 16);
    let mut last = 0usize;
    for (name, span) in &collector.references {
        if scope.contains(name)
            || collector.bindings.contains(name)
            || JS_GLOBALS.contains(name.as_str())
        {
            continue;
        }
        let start = span.start as usize;
        code.push_str(&source[last..start]);
        // A shorthand property cannot take the qualifier in place
        // (`{ _ctx.foo }` is not valid syntax); expand it to an explicit
        // key first.
        if collector.shorthand_starts.contains(&span.start) {
            code.push_str(name);
            code.push_str(": ");
        }
        code.push_str(CONTEXT_REFERENCE);
        code.push('.');
        last = start;
    }
    code.push_str(&source[last..]);

    Ok(RewrittenExpression {
        code,
        span: raw.span,
    })
}

/// True when an event-directive expression is a bare reference path that
/// can be passed through as a handler instead of being wrapped in an arrow.
pub fn is_handler_reference(text: &str) -> bool {
    REFERENCE_PATH_RE.is_match(text)
}

/// Collects the names bound by a loop alias list such as `item`,
/// `(item, index)`, or `({ id, label }, index)`.
pub fn collect_alias_names(aliases: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for m in IDENT_RE.find_iter(aliases) {
        if !names.iter().any(|n| n == m.as_str()) {
            names.push(m.as_str().to_string());
        }
    }
    names
}

/// Collects identifier references and locally-bound names from a parsed
/// expression, in source order.
struct IdentifierCollector {
    references: Vec<(String, oxc_span::Span)>,
    bindings: HashSet<String>,
    /// Start offsets of identifiers that are shorthand object-property
    /// values; these must be expanded to `name: _ctx.name` when qualified.
    shorthand_starts: HashSet<u32>,
}

impl<'a> Visit<'a> for IdentifierCollector {
    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference) {
        self.references.push((ident.name.to_string(), ident.span));
    }

    fn visit_binding_identifier(&mut self, ident: &oxc_ast::ast::BindingIdentifier) {
        self.bindings.insert(ident.name.to_string());
    }

    fn visit_object_property(&mut self, prop: &oxc_ast::ast::ObjectProperty<'a>) {
        if prop.shorthand {
            if let oxc_ast::ast::Expression::Identifier(ident) = &prop.value {
                self.shorthand_starts.insert(ident.span.start);
            }
        }
        oxc_ast_visit::walk::walk_object_property(self, prop);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> RawExpression {
        RawExpression {
            text: text.to_string(),
            span: SourceSpan::new(0, text.len()),
        }
    }

    fn rewrite(text: &str) -> String {
        rewrite_expression(&raw(text), &Scope::new()).unwrap().code
    }

    #[test]
    fn qualifies_free_identifiers() {
        assert_eq!(rewrite("count"), "_ctx.count");
        assert_eq!(rewrite("a + b"), "_ctx.a + _ctx.b");
    }

    #[test]
    fn qualifies_only_the_root_of_member_chains() {
        assert_eq!(rewrite("item.label.length"), "_ctx.item.label.length");
        assert_eq!(rewrite("a[b]"), "_ctx.a[_ctx.b]");
    }

    #[test]
    fn respects_scope_frames_at_every_depth() {
        let mut scope = Scope::new();
        scope.push_frame(vec!["item".to_string(), "index".to_string()]);
        scope.push_frame(vec!["inner".to_string()]);
        let result = rewrite_expression(&raw("item.id + inner + other"), &scope).unwrap();
        assert_eq!(result.code, "item.id + inner + _ctx.other");
        scope.pop_frame();
        let result = rewrite_expression(&raw("inner"), &scope).unwrap();
        assert_eq!(result.code, "_ctx.inner");
    }

    #[test]
    fn leaves_expression_local_bindings_alone() {
        assert_eq!(
            rewrite("items.filter(x => x > min)"),
            "_ctx.items.filter(x => x > _ctx.min)"
        );
    }

    #[test]
    fn skips_js_globals_and_event_parameter() {
        assert_eq!(rewrite("Math.max(count, 1)"), "Math.max(_ctx.count, 1)");
        assert_eq!(rewrite("bar = $event"), "_ctx.bar = $event");
        assert_eq!(rewrite("value === undefined"), "_ctx.value === undefined");
    }

    #[test]
    fn skips_literal_property_keys() {
        assert_eq!(rewrite("fn({ label: title })"), "_ctx.fn({ label: _ctx.title })");
    }

    #[test]
    fn expands_shorthand_object_properties() {
        assert_eq!(rewrite("{ foo }"), "{ foo: _ctx.foo }");
        assert_eq!(
            rewrite("{ foo, bar: baz }"),
            "{ foo: _ctx.foo, bar: _ctx.baz }"
        );
    }

    #[test]
    fn scoped_shorthand_properties_stay_shorthand() {
        let mut scope = Scope::new();
        scope.push_frame(vec!["item".to_string()]);
        let result = rewrite_expression(&raw("{ item, total }"), &scope).unwrap();
        assert_eq!(result.code, "{ item, total: _ctx.total }");
    }

    #[test]
    fn malformed_expression_carries_its_span() {
        let input = RawExpression {
            text: "foo +".to_string(),
            span: SourceSpan::new(12, 5),
        };
        let err = rewrite_expression(&input, &Scope::new()).unwrap_err();
        assert_eq!(err.span, SourceSpan::new(12, 5));
    }

    #[test]
    fn detects_bare_handler_references() {
        assert!(is_handler_reference("handleHover"));
        assert!(is_handler_reference("form.submit"));
        assert!(!is_handler_reference("bar = $event"));
        assert!(!is_handler_reference("submit()"));
        assert!(!is_handler_reference("items[0]"));
    }

    #[test]
    fn collects_alias_names_from_destructuring() {
        assert_eq!(collect_alias_names("item"), vec!["item"]);
        assert_eq!(collect_alias_names("(item, index)"), vec!["item", "index"]);
        assert_eq!(
            collect_alias_names("({ id, label }, index)"),
            vec!["id", "label", "index"]
        );
    }
}
