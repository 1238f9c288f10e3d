//! Directive transform pipeline.
//!
//! Lowers template nodes into TSX element-tree text through the
//! `SourceBuilder`, grouping conditional sibling chains, expanding loops
//! into `_renderList` calls with a fresh scope frame, and turning each
//! directive into the prop shape the downstream type checker consumes.

use crate::codegen::SourceBuilder;
use crate::ir::{
    AttributeNode, Diagnostic, DiagnosticKind, DirectiveArgument, DirectiveNode, ElementNode,
    RawExpression, SourceSpan, TemplateNode, TextNode,
};
use crate::resolve::{ComponentBinding, ComponentRegistry};
use crate::rewrite::{
    collect_alias_names, is_handler_reference, rewrite_expression, RewrittenExpression, Scope,
};

/// Runtime helper imported from the framework package when a directive
/// needs it.
pub const HELPER_RENDER_LIST: &str = "renderList";

pub struct TransformContext {
    pub registry: ComponentRegistry,
    pub scope: Scope,
    pub diagnostics: Vec<Diagnostic>,
    /// Requested runtime helpers, first-encounter order.
    pub helpers: Vec<&'static str>,
}

impl TransformContext {
    pub fn new(registry: ComponentRegistry) -> Self {
        TransformContext {
            registry,
            scope: Scope::new(),
            diagnostics: Vec::new(),
            helpers: Vec::new(),
        }
    }

    fn request_helper(&mut self, name: &'static str) {
        if !self.helpers.contains(&name) {
            self.helpers.push(name);
        }
    }

    fn report(&mut self, kind: DiagnosticKind, message: String, span: SourceSpan) {
        self.diagnostics.push(Diagnostic::new(kind, message, span));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIBLING GROUPING
// ═══════════════════════════════════════════════════════════════════════════════

/// A unit of sibling content: either a single node or a maximal
/// `if` / `else-if` / `else` chain of adjacent elements.
enum Group<'a> {
    Node(&'a TemplateNode),
    Chain(Vec<&'a ElementNode>),
}

fn is_branch_continuation(el: &ElementNode) -> bool {
    el.has_directive("else-if") || el.has_directive("else")
}

fn group_children<'a>(nodes: &'a [TemplateNode], cx: &mut TransformContext) -> Vec<Group<'a>> {
    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut chain: Vec<&'a ElementNode> = Vec::new();
    let mut chain_closed = false;

    for node in nodes {
        if let TemplateNode::Comment(_) = node {
            continue;
        }
        if let TemplateNode::Element(el) = node {
            if el.has_directive("if") {
                if !chain.is_empty() {
                    groups.push(Group::Chain(std::mem::take(&mut chain)));
                }
                chain.push(el);
                chain_closed = false;
                continue;
            }
            if is_branch_continuation(el) {
                if chain.is_empty() || chain_closed {
                    cx.report(
                        DiagnosticKind::UnsupportedDirectiveCombination,
                        format!(
                            "v-{} has no preceding v-if sibling",
                            if el.has_directive("else") { "else" } else { "else-if" }
                        ),
                        el.span,
                    );
                    if !chain.is_empty() {
                        groups.push(Group::Chain(std::mem::take(&mut chain)));
                    }
                    chain_closed = false;
                    groups.push(Group::Node(node));
                } else {
                    let is_else = el.has_directive("else");
                    chain.push(el);
                    if is_else {
                        chain_closed = true;
                    }
                }
                continue;
            }
        }
        if !chain.is_empty() {
            groups.push(Group::Chain(std::mem::take(&mut chain)));
        }
        chain_closed = false;
        groups.push(Group::Node(node));
    }
    if !chain.is_empty() {
        groups.push(Group::Chain(chain));
    }
    groups
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lowers the template roots into the body of the render function's
/// `return`. A single element, chain, or loop is emitted bare; anything
/// else is wrapped in an implicit fragment.
pub fn lower_root(nodes: &[TemplateNode], cx: &mut TransformContext, out: &mut SourceBuilder) {
    let groups = group_children(nodes, cx);
    match groups.as_slice() {
        [] => out.push("null"),
        [Group::Chain(branches)] => emit_chain(branches, cx, out),
        [Group::Node(TemplateNode::Element(el))] => emit_element_expression(el, cx, out),
        _ => {
            out.push("<>");
            for group in &groups {
                emit_group_child(group, cx, out);
            }
            out.push("</>");
        }
    }
}

fn emit_group_child(group: &Group, cx: &mut TransformContext, out: &mut SourceBuilder) {
    match group {
        Group::Chain(branches) => {
            out.push("{");
            emit_chain(branches, cx, out);
            out.push("}");
        }
        Group::Node(node) => match node {
            TemplateNode::Element(el) if el.has_directive("for") => {
                out.push("{");
                emit_for(el, cx, out);
                out.push("}");
            }
            TemplateNode::Element(el) => emit_element(el, cx, out),
            TemplateNode::Text(text) => emit_text(text, out),
            TemplateNode::Interpolation(node) => {
                out.push("{");
                emit_expression(&node.expression, cx, out);
                out.push("}");
            }
            TemplateNode::Comment(_) => {}
        },
    }
}

fn lower_children(nodes: &[TemplateNode], cx: &mut TransformContext, out: &mut SourceBuilder) {
    let groups = group_children(nodes, cx);
    for group in &groups {
        emit_group_child(group, cx, out);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROL FLOW
// ═══════════════════════════════════════════════════════════════════════════════

/// Lowers an `if`/`else-if`/`else` chain to a right-associated ternary with
/// a `null` fallback when the chain has no `else` branch.
fn emit_chain(branches: &[&ElementNode], cx: &mut TransformContext, out: &mut SourceBuilder) {
    let mut has_else = false;
    for el in branches.iter().copied() {
        let condition = el.directive("if").or_else(|| el.directive("else-if"));
        match condition {
            Some(directive) => {
                emit_required_expression(directive, cx, out);
                out.push(" ? ");
                emit_element_expression(el, cx, out);
                out.push(" : ");
            }
            None => {
                emit_element_expression(el, cx, out);
                has_else = true;
            }
        }
    }
    if !has_else {
        out.push("null");
    }
}

/// An element in expression position: loops take precedence over the plain
/// element form.
fn emit_element_expression(el: &ElementNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    if el.has_directive("for") {
        emit_for(el, cx, out);
    } else {
        emit_element(el, cx, out);
    }
}

/// Lowers `v-for` to a `_renderList` call whose callback parameters are the
/// loop aliases; the alias scope frame is active for the callback body only.
fn emit_for(el: &ElementNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    let directive = match el.directive("for") {
        Some(d) => d,
        None => return,
    };
    let raw = match &directive.expression {
        Some(raw) => raw,
        None => {
            cx.report(
                DiagnosticKind::InvalidDirectiveArgument,
                "v-for requires an expression of the form `alias of iterable`".to_string(),
                directive.span,
            );
            out.push("null");
            return;
        }
    };
    let split = match split_for_expression(&raw.text) {
        Some(split) => split,
        None => {
            cx.report(
                DiagnosticKind::InvalidDirectiveArgument,
                format!("cannot split v-for expression `{}`", raw.text),
                raw.span,
            );
            out.push("null");
            return;
        }
    };

    let alias_text = raw.text[..split.0].trim();
    let alias_offset = raw.span.offset as usize + (raw.text[..split.0].len() - raw.text[..split.0].trim_start().len());
    let alias_span = SourceSpan::new(alias_offset, alias_text.len());
    let iter_raw = subexpression(raw, split.1);

    cx.request_helper(HELPER_RENDER_LIST);
    out.push("_renderList(");
    emit_expression(&iter_raw, cx, out);
    out.push(", ");
    if alias_text.starts_with('(') {
        out.push_mapped(alias_text, alias_span);
    } else {
        out.push("(");
        out.push_mapped(alias_text, alias_span);
        out.push(")");
    }
    out.push(" => { return ");

    cx.scope.push_frame(collect_alias_names(alias_text));
    emit_element(el, cx, out);
    cx.scope.pop_frame();

    out.push(" })");
}

/// Finds the top-level ` of ` / ` in ` separator. Returns the byte index of
/// the separator and the offset where the iterable starts.
fn split_for_expression(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut string_char = 0u8;
    for i in 0..bytes.len() {
        let c = bytes[i];
        if i > 0 && bytes[i - 1] == b'\\' {
            continue;
        }
        if !in_string && (c == b'"' || c == b'\'' || c == b'`') {
            in_string = true;
            string_char = c;
            continue;
        }
        if in_string && c == string_char {
            in_string = false;
            continue;
        }
        if in_string {
            continue;
        }
        if c == b'(' || c == b'{' || c == b'[' {
            depth += 1;
        }
        if c == b')' || c == b'}' || c == b']' {
            depth -= 1;
        }
        if depth == 0 && i > 0 {
            if text[i..].starts_with(" of ") || text[i..].starts_with(" in ") {
                return Some((i, i + 4));
            }
        }
    }
    None
}

/// A trimmed sub-range of a parsed expression, with its span re-anchored to
/// the template source.
fn subexpression(raw: &RawExpression, from: usize) -> RawExpression {
    let slice = &raw.text[from..];
    let leading = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    RawExpression {
        text: trimmed.to_string(),
        span: SourceSpan::new(raw.span.offset as usize + from + leading, trimmed.len()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS & PROPS
// ═══════════════════════════════════════════════════════════════════════════════

fn emit_element(el: &ElementNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    let binding = cx.registry.resolve(&el.tag);
    let tag_name = match &binding {
        ComponentBinding::LocalImport { name, .. } | ComponentBinding::NamedImport { name, .. } => {
            name.clone()
        }
        _ => el.tag.clone(),
    };

    out.push("<");
    out.push_mapped(&tag_name, el.tag_span);

    for prop in ordered_props(el) {
        match prop {
            Prop::Attribute(attr) => emit_attribute(attr, out),
            Prop::Directive(directive) => emit_directive(directive, cx, out),
        }
    }

    if el.self_closing {
        out.push(" />");
        return;
    }
    out.push(">");

    let wrap_slot = is_component_binding(&binding, &el.tag) && !el.children.is_empty();
    if wrap_slot {
        out.push("{{ default: () => <>");
        lower_children(&el.children, cx, out);
        out.push("</> }}");
    } else {
        lower_children(&el.children, cx, out);
    }

    out.push("</");
    out.push(&tag_name);
    out.push(">");
}

/// Component children become a default-slot object; native elements and
/// plain markup keep their children inline.
fn is_component_binding(binding: &ComponentBinding, tag: &str) -> bool {
    match binding {
        ComponentBinding::LocalImport { .. } | ComponentBinding::NamedImport { .. } => true,
        ComponentBinding::NativeElement => false,
        ComponentBinding::Unresolved => tag
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false),
    }
}

enum Prop<'a> {
    Attribute(&'a AttributeNode),
    Directive(&'a DirectiveNode),
}

/// Attributes and directives interleaved in source order.
fn ordered_props(el: &ElementNode) -> Vec<Prop<'_>> {
    let mut props: Vec<(u32, Prop<'_>)> = el
        .attributes
        .iter()
        .map(|a| (a.span.offset, Prop::Attribute(a)))
        .chain(el.directives.iter().map(|d| (d.span.offset, Prop::Directive(d))))
        .collect();
    props.sort_by_key(|(offset, _)| *offset);
    props.into_iter().map(|(_, prop)| prop).collect()
}

fn emit_attribute(attr: &AttributeNode, out: &mut SourceBuilder) {
    out.push(" ");
    out.push(&attr.name);
    if let Some(value) = &attr.value {
        out.push("=\"");
        match attr.value_span {
            Some(span) => out.push_mapped(value, span),
            None => out.push(value),
        }
        out.push("\"");
    }
}

fn emit_directive(directive: &DirectiveNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    match directive.name.as_str() {
        // Handled at the sibling / loop level.
        "if" | "else-if" | "else" | "for" => {}
        "bind" => emit_bind(directive, cx, out),
        "on" => emit_on(directive, cx, out),
        "model" => emit_model(directive, cx, out),
        "show" => emit_directive_tuple(directive, "Show", cx, out),
        "text" => emit_directive_tuple(directive, "Text", cx, out),
        "html" => emit_directive_tuple(directive, "Html", cx, out),
        _ => emit_custom(directive, cx, out),
    }
}

fn emit_bind(directive: &DirectiveNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    match &directive.argument {
        DirectiveArgument::Static { name, span } => {
            out.push(" ");
            out.push_mapped(name, *span);
            out.push("={");
            emit_required_expression(directive, cx, out);
            out.push("}");
        }
        // The output format has no syntax for a dynamic attribute name, so
        // the binding becomes a computed-property spread.
        DirectiveArgument::Dynamic { expression } => {
            out.push(" {...{[");
            emit_expression(expression, cx, out);
            out.push("]: ");
            emit_required_expression(directive, cx, out);
            out.push("}}");
        }
        // `v-bind="object"` spreads the whole object.
        DirectiveArgument::None => {
            out.push(" {...");
            emit_required_expression(directive, cx, out);
            out.push("}");
        }
    }
}

fn emit_on(directive: &DirectiveNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    match &directive.argument {
        DirectiveArgument::Static { name, span } => {
            out.push(" on");
            out.push_mapped(&pascal_case(name), *span);
            out.push("={");
            emit_handler(directive, cx, out);
            out.push("}");
        }
        DirectiveArgument::Dynamic { expression } => {
            out.push(" {...{['on' + ");
            emit_expression(expression, cx, out);
            out.push("]: ");
            emit_handler(directive, cx, out);
            out.push("}}");
        }
        // `v-on="handlers"` spreads the listener object.
        DirectiveArgument::None => {
            out.push(" {...");
            emit_required_expression(directive, cx, out);
            out.push("}");
        }
    }
}

/// A bare reference path passes through as a handler reference; any other
/// expression is wrapped as an arrow taking the event parameter. A
/// directive with no expression compiles to a no-op handler.
fn emit_handler(directive: &DirectiveNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    match &directive.expression {
        None => out.push("() => {}"),
        Some(raw) if is_handler_reference(&raw.text) => emit_expression(raw, cx, out),
        Some(raw) => {
            out.push("$event => (");
            emit_expression(raw, cx, out);
            out.push(")");
        }
    }
}

/// `v-model` expands to a value-binding prop and a companion
/// `onUpdate:` handler that assigns the event value back into the bound
/// expression. A dynamic argument cannot produce a literal prop name, so
/// both keys live in one computed-property spread.
fn emit_model(directive: &DirectiveNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    let raw = match &directive.expression {
        Some(raw) => raw,
        None => {
            cx.report(
                DiagnosticKind::InvalidDirectiveArgument,
                "v-model requires a writable expression".to_string(),
                directive.span,
            );
            return;
        }
    };
    let value = match rewrite_or_report(raw, cx) {
        Some(value) => value,
        None => return,
    };

    match &directive.argument {
        DirectiveArgument::Dynamic { expression } => {
            let arg = match rewrite_or_report(expression, cx) {
                Some(arg) => arg,
                None => return,
            };
            out.push(" {...{[");
            out.push_expression(&arg);
            out.push("]: ");
            out.push_expression(&value);
            out.push(", ['onUpdate:' + ");
            out.push_mapped(&arg.code, arg.span);
            out.push("]: $event => (");
            out.push_mapped(&value.code, value.span);
            out.push(" = $event)}}");
        }
        argument => {
            let (name, name_span) = match argument {
                DirectiveArgument::Static { name, span } => (name.as_str(), Some(*span)),
                _ => ("modelValue", None),
            };
            out.push(" ");
            match name_span {
                Some(span) => out.push_mapped(name, span),
                None => out.push(name),
            }
            out.push("={");
            out.push_expression(&value);
            out.push("}");

            out.push(" {...{'onUpdate:");
            out.push(name);
            out.push("': $event => (");
            out.push_mapped(&value.code, value.span);
            out.push(" = $event)}}");
        }
    }
}

/// `v-show` / `v-text` / `v-html` each become one synthetic prop carrying a
/// one-element tuple; the element's children are left untouched.
fn emit_directive_tuple(
    directive: &DirectiveNode,
    pascal_name: &str,
    cx: &mut TransformContext,
    out: &mut SourceBuilder,
) {
    out.push(" __directive");
    out.push(pascal_name);
    out.push("={[");
    emit_required_expression(directive, cx, out);
    out.push("]}");
}

/// Custom directives encode their static argument into the synthetic prop
/// name; a dynamic argument gets a fixed placeholder suffix and the
/// argument expression rides in the value tuple instead. Modifiers are
/// consumed for dedup but never encoded into the name.
fn emit_custom(directive: &DirectiveNode, cx: &mut TransformContext, out: &mut SourceBuilder) {
    out.push(" __directive");
    out.push(&pascal_case(&directive.name));
    match &directive.argument {
        DirectiveArgument::Static { name, span } => {
            out.push("_");
            out.push_mapped(name, *span);
        }
        DirectiveArgument::Dynamic { .. } => out.push("__arg_"),
        DirectiveArgument::None => {}
    }
    out.push("={[");
    if let DirectiveArgument::Dynamic { expression } = &directive.argument {
        emit_expression(expression, cx, out);
        if directive.expression.is_some() {
            out.push(", ");
        }
    }
    if let Some(raw) = &directive.expression {
        emit_expression(raw, cx, out);
    }
    out.push("]}");
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT & EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Literal text is emitted verbatim, except that a trailing whitespace run
/// containing a newline would be silently collapsed by the output format;
/// it is re-emitted as an explicit single-space string-literal segment.
fn emit_text(text: &TextNode, out: &mut SourceBuilder) {
    let content = text.content.as_str();
    let trimmed = content.trim_end();
    let trailing = &content[trimmed.len()..];
    if !trailing.is_empty() && trailing.contains('\n') {
        out.push(trimmed);
        out.push("{' '}");
    } else {
        out.push(content);
    }
}

/// Rewrites and emits an expression, registering its extracted range and
/// mapping; a malformed expression becomes a placeholder plus a diagnostic.
fn emit_expression(raw: &RawExpression, cx: &mut TransformContext, out: &mut SourceBuilder) {
    match rewrite_or_report(raw, cx) {
        Some(rewritten) => out.push_expression(&rewritten),
        None => out.push("undefined"),
    }
}

fn emit_required_expression(
    directive: &DirectiveNode,
    cx: &mut TransformContext,
    out: &mut SourceBuilder,
) {
    match &directive.expression {
        Some(raw) => emit_expression(raw, cx, out),
        None => {
            cx.report(
                DiagnosticKind::InvalidDirectiveArgument,
                format!("v-{} requires an expression", directive.name),
                directive.span,
            );
            out.push("undefined");
        }
    }
}

fn rewrite_or_report(
    raw: &RawExpression,
    cx: &mut TransformContext,
) -> Option<RewrittenExpression> {
    match rewrite_expression(raw, &cx.scope) {
        Ok(rewritten) => Some(rewritten),
        Err(error) => {
            cx.report(
                DiagnosticKind::MalformedExpression,
                error.message,
                error.span,
            );
            None
        }
    }
}

fn pascal_case(name: &str) -> String {
    name.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}
