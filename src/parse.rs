//! Template parser stub.
//!
//! Tokenizes raw markup into the template IR. This is the external
//! collaborator assumed by the lowering pipeline; it is deliberately a
//! hand-rolled byte cursor rather than an HTML5 DOM parser so every tag
//! name, attribute value, directive argument, and embedded expression keeps
//! its exact byte range in the source text.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::ir::{
    AttributeNode, CommentNode, DirectiveArgument, DirectiveNode, ElementNode, InterpolationNode,
    RawExpression, SourceSpan, TemplateNode, TextNode,
};

lazy_static! {
    /// Elements that never take children and need no closing tag.
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ]
    .iter()
    .cloned()
    .collect();
}

/// Fatal parse failure. Raised only when the template is structurally
/// broken before the core pipeline can run; recoverable problems inside
/// expressions are reported as diagnostics instead.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub offset: u32,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        ParseError {
            message: message.into(),
            offset: offset as u32,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

pub fn parse_template(source: &str) -> Result<Vec<TemplateNode>, ParseError> {
    let mut cursor = Cursor { source, pos: 0 };
    let nodes = cursor.parse_nodes()?;
    if cursor.pos < source.len() {
        return Err(ParseError::new("unexpected closing tag", cursor.pos));
    }
    Ok(nodes)
}

struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    fn skip_whitespace(&mut self) {
        while self
            .peek()
            .map(|b| b.is_ascii_whitespace())
            .unwrap_or(false)
        {
            self.pos += 1;
        }
    }

    /// Parses sibling nodes until a closing tag or end of input.
    fn parse_nodes(&mut self) -> Result<Vec<TemplateNode>, ParseError> {
        let mut nodes = Vec::new();
        while self.pos < self.source.len() {
            if self.starts_with("</") {
                break;
            }
            if self.starts_with("<!--") {
                nodes.push(self.parse_comment()?);
            } else if self.starts_with("{{") {
                nodes.push(self.parse_interpolation()?);
            } else if self.starts_with("<") {
                nodes.push(TemplateNode::Element(self.parse_element()?));
            } else if let Some(text) = self.parse_text() {
                nodes.push(text);
            }
        }
        Ok(nodes)
    }

    /// Consumes raw text up to the next markup construct. Whitespace-only
    /// runs containing a newline are dropped (condense mode); everything
    /// else is kept verbatim.
    fn parse_text(&mut self) -> Option<TemplateNode> {
        let start = self.pos;
        while self.pos < self.source.len() {
            if self.starts_with("<") || self.starts_with("{{") {
                break;
            }
            self.pos += 1;
        }
        let content = &self.source[start..self.pos];
        if content.is_empty() {
            return None;
        }
        if content.trim().is_empty() && content.contains('\n') {
            return None;
        }
        Some(TemplateNode::Text(TextNode {
            content: content.to_string(),
            span: SourceSpan::new(start, content.len()),
        }))
    }

    fn parse_comment(&mut self) -> Result<TemplateNode, ParseError> {
        let start = self.pos;
        self.pos += 4;
        let end = self
            .rest()
            .find("-->")
            .ok_or_else(|| ParseError::new("unterminated comment", start))?;
        let content = &self.source[self.pos..self.pos + end];
        self.pos += end + 3;
        Ok(TemplateNode::Comment(CommentNode {
            content: content.to_string(),
            span: SourceSpan::new(start, self.pos - start),
        }))
    }

    fn parse_interpolation(&mut self) -> Result<TemplateNode, ParseError> {
        let start = self.pos;
        self.pos += 2;
        let end = self
            .rest()
            .find("}}")
            .ok_or_else(|| ParseError::new("unterminated interpolation", start))?;
        let inner_start = self.pos;
        let inner = &self.source[inner_start..inner_start + end];
        self.pos = inner_start + end + 2;
        let expression = trim_expression(inner, inner_start);
        Ok(TemplateNode::Interpolation(InterpolationNode {
            expression,
            span: SourceSpan::new(start, self.pos - start),
        }))
    }

    fn parse_element(&mut self) -> Result<ElementNode, ParseError> {
        let start = self.pos;
        self.pos += 1; // consume '<'
        let tag_start = self.pos;
        let tag = self.scan_name();
        if tag.is_empty() {
            return Err(ParseError::new("expected tag name", tag_start));
        }
        let tag_span = SourceSpan::new(tag_start, tag.len());

        let mut attributes = Vec::new();
        let mut directives = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::new("unterminated tag", start)),
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.starts_with("/>") => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                _ => self.parse_attribute(&mut attributes, &mut directives)?,
            }
        }

        let is_void = VOID_ELEMENTS.contains(tag.to_ascii_lowercase().as_str());
        let mut children = Vec::new();
        if !self_closing && !is_void {
            children = self.parse_nodes()?;
            self.consume_closing_tag(tag, start)?;
        }
        if is_void {
            self_closing = true;
        }

        Ok(ElementNode {
            tag: tag.to_string(),
            tag_span,
            attributes,
            directives,
            children,
            span: SourceSpan::new(start, self.pos - start),
            self_closing,
        })
    }

    fn consume_closing_tag(&mut self, tag: &str, open_start: usize) -> Result<(), ParseError> {
        if !self.starts_with("</") {
            return Err(ParseError::new(
                format!("missing closing tag for <{}>", tag),
                open_start,
            ));
        }
        self.pos += 2;
        let name = self.scan_name();
        if !name.eq_ignore_ascii_case(tag) {
            return Err(ParseError::new(
                format!(
                    "mismatched closing tag: expected </{}>, found </{}>",
                    tag, name
                ),
                self.pos - name.len(),
            ));
        }
        self.skip_whitespace();
        if self.peek() != Some(b'>') {
            return Err(ParseError::new("malformed closing tag", self.pos));
        }
        self.pos += 1;
        Ok(())
    }

    fn scan_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    fn parse_attribute(
        &mut self,
        attributes: &mut Vec<AttributeNode>,
        directives: &mut Vec<DirectiveNode>,
    ) -> Result<(), ParseError> {
        let name_start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || b == b'=' || b == b'>' || b == b'/' {
                break;
            }
            self.pos += 1;
        }
        let name = &self.source[name_start..self.pos];
        if name.is_empty() {
            return Err(ParseError::new("expected attribute name", name_start));
        }
        let name_span = SourceSpan::new(name_start, name.len());

        let mut value: Option<&str> = None;
        let mut value_span: Option<SourceSpan> = None;
        self.skip_whitespace();
        if self.peek() == Some(b'=') {
            self.pos += 1;
            self.skip_whitespace();
            let (v, vs) = self.parse_attribute_value(name_start)?;
            value = Some(v);
            value_span = Some(vs);
        }
        let span = SourceSpan::new(name_start, self.pos - name_start);

        if let Some(prefix_len) = directive_prefix_len(name) {
            let expression = value
                .map(|v| {
                    let vs = value_span.unwrap_or(name_span);
                    trim_expression(v, vs.offset as usize)
                })
                .filter(|e| !e.text.is_empty());
            directives.push(build_directive(name, name_span, prefix_len, expression, span));
        } else {
            attributes.push(AttributeNode {
                name: name.to_string(),
                value: value.map(|v| v.to_string()),
                value_span,
                span,
            });
        }
        Ok(())
    }

    fn parse_attribute_value(
        &mut self,
        attr_start: usize,
    ) -> Result<(&'a str, SourceSpan), ParseError> {
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                self.pos += 1;
                let value_start = self.pos;
                let end = self
                    .rest()
                    .find(q as char)
                    .ok_or_else(|| ParseError::new("unterminated attribute value", attr_start))?;
                let value = &self.source[value_start..value_start + end];
                self.pos = value_start + end + 1;
                Ok((value, SourceSpan::new(value_start, value.len())))
            }
            _ => {
                let value_start = self.pos;
                while let Some(b) = self.peek() {
                    if b.is_ascii_whitespace() || b == b'>' {
                        break;
                    }
                    self.pos += 1;
                }
                let value = &self.source[value_start..self.pos];
                if value.is_empty() {
                    return Err(ParseError::new("expected attribute value", attr_start));
                }
                Ok((value, SourceSpan::new(value_start, value.len())))
            }
        }
    }
}

/// Returns the length of the directive prefix (`:`, `@`, `v-`) when the
/// attribute name is a directive.
fn directive_prefix_len(name: &str) -> Option<usize> {
    if name.starts_with(':') || name.starts_with('@') {
        Some(1)
    } else if name.starts_with("v-") && name.len() > 2 {
        Some(2)
    } else {
        None
    }
}

fn build_directive(
    name: &str,
    name_span: SourceSpan,
    prefix_len: usize,
    expression: Option<RawExpression>,
    span: SourceSpan,
) -> DirectiveNode {
    let base = name_span.offset as usize + prefix_len;
    let rest = &name[prefix_len..];

    // Shorthand prefixes carry the directive name implicitly; `v-` names run
    // until the argument or the first modifier.
    let (directive_name, after_name) = if name.starts_with(':') {
        ("bind".to_string(), rest)
    } else if name.starts_with('@') {
        ("on".to_string(), rest)
    } else {
        let end = rest.find([':', '.']).unwrap_or(rest.len());
        (rest[..end].to_string(), &rest[end..])
    };

    let arg_base = base + (rest.len() - after_name.len());
    let (arg_text, arg_offset) = if let Some(stripped) = after_name.strip_prefix(':') {
        (stripped, arg_base + 1)
    } else if name.starts_with(':') || name.starts_with('@') {
        (after_name, arg_base)
    } else {
        ("", arg_base)
    };

    let (argument, modifier_text) = split_argument(arg_text, arg_offset);
    let modifiers = parse_modifiers(modifier_text);

    DirectiveNode {
        name: directive_name,
        argument,
        modifiers,
        expression,
        span,
    }
}

/// Splits `arg.mod1.mod2` (or `[expr].mod1`) into the argument and the
/// trailing modifier text.
fn split_argument(text: &str, offset: usize) -> (DirectiveArgument, &str) {
    if text.is_empty() || text.starts_with('.') {
        return (DirectiveArgument::None, text);
    }
    if let Some(inner) = text.strip_prefix('[') {
        let close = match inner.find(']') {
            Some(i) => i,
            None => return (DirectiveArgument::None, ""),
        };
        let expr = &inner[..close];
        let argument = DirectiveArgument::Dynamic {
            expression: RawExpression {
                text: expr.to_string(),
                span: SourceSpan::new(offset + 1, expr.len()),
            },
        };
        (argument, &inner[close + 1..])
    } else {
        let end = text.find('.').unwrap_or(text.len());
        let argument = DirectiveArgument::Static {
            name: text[..end].to_string(),
            span: SourceSpan::new(offset, end),
        };
        (argument, &text[end..])
    }
}

fn parse_modifiers(text: &str) -> Vec<String> {
    let mut modifiers: Vec<String> = Vec::new();
    for part in text.split('.') {
        if part.is_empty() {
            continue;
        }
        if !modifiers.iter().any(|m| m == part) {
            modifiers.push(part.to_string());
        }
    }
    modifiers
}

/// Trims an expression substring, keeping the span aligned with the
/// non-whitespace text.
fn trim_expression(text: &str, offset: usize) -> RawExpression {
    let trimmed_start = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    RawExpression {
        text: trimmed.to_string(),
        span: SourceSpan::new(offset + trimmed_start, trimmed.len()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn element(source: &str) -> ElementNode {
        let nodes = parse_template(source).unwrap();
        match nodes.into_iter().next().unwrap() {
            TemplateNode::Element(el) => el,
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn parses_element_with_static_attributes() {
        let source = r#"<input type="text" />"#;
        let el = element(source);
        assert_eq!(el.tag, "input");
        assert!(el.self_closing);
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attributes[0].name, "type");
        assert_eq!(el.attributes[0].value.as_deref(), Some("text"));
        let vs = el.attributes[0].value_span.unwrap();
        assert_eq!(vs.text(source), "text");
    }

    #[test]
    fn parses_interpolation_with_trimmed_span() {
        let source = "<div>{{ count }}</div>";
        let el = element(source);
        match &el.children[0] {
            TemplateNode::Interpolation(node) => {
                assert_eq!(node.expression.text, "count");
                assert_eq!(node.expression.span.text(source), "count");
            }
            other => panic!("expected interpolation, got {:?}", other),
        }
    }

    #[test]
    fn parses_directive_shorthands() {
        let el = element(r#"<div :style="style" @hover="handle" v-if="ok"></div>"#);
        assert_eq!(el.directives.len(), 3);
        assert_eq!(el.directives[0].name, "bind");
        assert!(matches!(
            el.directives[0].argument,
            DirectiveArgument::Static { ref name, .. } if name == "style"
        ));
        assert_eq!(el.directives[1].name, "on");
        assert_eq!(el.directives[2].name, "if");
        assert!(matches!(el.directives[2].argument, DirectiveArgument::None));
        assert_eq!(el.directives[2].expression.as_ref().unwrap().text, "ok");
    }

    #[test]
    fn parses_dynamic_arguments_and_modifiers() {
        let source = r#"<div :[key]="value" v-model:[checked].lazy.lazy="foo"></div>"#;
        let el = element(source);
        match &el.directives[0].argument {
            DirectiveArgument::Dynamic { expression } => {
                assert_eq!(expression.text, "key");
                assert_eq!(expression.span.text(source), "key");
            }
            other => panic!("expected dynamic argument, got {:?}", other),
        }
        let model = &el.directives[1];
        assert_eq!(model.name, "model");
        assert!(matches!(model.argument, DirectiveArgument::Dynamic { .. }));
        assert_eq!(model.modifiers, vec!["lazy".to_string()]);
    }

    #[test]
    fn parses_else_if_directive_name() {
        let el = element(r#"<div v-else-if="bar"></div>"#);
        assert_eq!(el.directives[0].name, "else-if");
    }

    #[test]
    fn directive_without_value_has_no_expression() {
        let el = element("<input @focus />");
        assert_eq!(el.directives[0].name, "on");
        assert!(el.directives[0].expression.is_none());
        assert!(matches!(
            el.directives[0].argument,
            DirectiveArgument::Static { ref name, .. } if name == "focus"
        ));
    }

    #[test]
    fn void_elements_need_no_closing_tag() {
        let nodes = parse_template(r#"<input type="text"><br>"#).unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn drops_whitespace_only_text_with_newlines() {
        let nodes = parse_template("<div>a</div>\n  <div>b</div>").unwrap();
        assert_eq!(nodes.len(), 2);
        let nodes = parse_template("<div>{{ a }} {{ b }}</div>").unwrap();
        match &nodes[0] {
            TemplateNode::Element(el) => {
                assert_eq!(el.children.len(), 3);
                assert!(matches!(&el.children[1], TemplateNode::Text(t) if t.content == " "));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_closing_tag_is_fatal() {
        let err = parse_template("<div>foo</span>").unwrap_err();
        assert!(err.message.contains("mismatched"));
    }

    #[test]
    fn unterminated_tag_is_fatal() {
        assert!(parse_template("<div foo").is_err());
    }

    #[test]
    fn preserves_document_order_of_children() {
        let nodes = parse_template("<ul><li>a</li><li>b</li><li>c</li></ul>").unwrap();
        match &nodes[0] {
            TemplateNode::Element(el) => {
                let texts: Vec<_> = el
                    .children
                    .iter()
                    .map(|c| match c {
                        TemplateNode::Element(li) => match &li.children[0] {
                            TemplateNode::Text(t) => t.content.clone(),
                            _ => panic!("expected text"),
                        },
                        _ => panic!("expected element"),
                    })
                    .collect();
                assert_eq!(texts, vec!["a", "b", "c"]);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }
}
