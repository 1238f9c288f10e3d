//! TSX emission.
//!
//! The `SourceBuilder` accumulates generated text and records a mapping
//! for every range derived from the template. The header (helper imports,
//! the context-type import, component imports) is assembled after the body
//! so component imports collected during lowering are complete; body
//! mappings are then shifted by the header length in one pass.

use crate::ir::{Mapping, SourceSpan, TemplateNode};
use crate::resolve::ComponentRegistry;
use crate::rewrite::RewrittenExpression;
use crate::transform::{lower_root, TransformContext};
use crate::{CompileOptions, CompileResult};

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct SourceBuilder {
    code: String,
    mappings: Vec<Mapping>,
    /// Spans of every standalone expression the rewriter consumed, in
    /// emission order.
    expressions: Vec<SourceSpan>,
}

impl SourceBuilder {
    pub fn new() -> Self {
        SourceBuilder::default()
    }

    /// Plain generated text, no source correspondence.
    pub fn push(&mut self, text: &str) {
        self.code.push_str(text);
    }

    /// Generated text derived from a template range.
    pub fn push_mapped(&mut self, text: &str, span: SourceSpan) {
        self.mappings.push(Mapping {
            generated_offset: self.code.len() as u32,
            generated_length: text.len() as u32,
            source_offset: span.offset,
            source_length: span.length,
        });
        self.code.push_str(text);
    }

    /// A rewritten expression: mapped, and registered in the extracted
    /// expression list.
    pub fn push_expression(&mut self, expression: &RewrittenExpression) {
        self.expressions.push(expression.span);
        self.push_mapped(&expression.code, expression.span);
    }

    fn finish(self) -> (String, Vec<Mapping>, Vec<SourceSpan>) {
        (self.code, self.mappings, self.expressions)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER FUNCTION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn generate(nodes: &[TemplateNode], options: &CompileOptions) -> CompileResult {
    let registry = ComponentRegistry::new(&options.components);
    let mut cx = TransformContext::new(registry);
    let mut body = SourceBuilder::new();
    lower_root(nodes, &mut cx, &mut body);

    let mut header = String::new();
    for helper in &cx.helpers {
        header.push_str(&format!("import {{ {} as _{} }} from 'vue'\n", helper, helper));
    }
    header.push_str(&format!(
        "import _Ctx from './{}?internal'\n",
        basename(&options.filename)
    ));
    for line in cx.registry.import_lines() {
        header.push_str(line);
        header.push('\n');
    }
    header.push_str("\nexport function render(_ctx: InstanceType<typeof _Ctx>) {\n  return ");

    let (body_code, mut mappings, expressions) = body.finish();
    let shift = header.len() as u32;
    for mapping in &mut mappings {
        mapping.generated_offset += shift;
    }

    let mut code = header;
    code.push_str(&body_code);
    code.push_str("\n}\n");

    CompileResult {
        code,
        expressions,
        mappings,
        diagnostics: cx.diagnostics,
    }
}

fn basename(filename: &str) -> &str {
    filename.rsplit('/').next().unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_strips_directories() {
        assert_eq!(basename("component.vue"), "component.vue");
        assert_eq!(basename("src/pages/component.vue"), "component.vue");
    }

    #[test]
    fn mapped_pushes_record_generated_ranges() {
        let mut builder = SourceBuilder::new();
        builder.push("<div>");
        builder.push_mapped("_ctx.foo", SourceSpan::new(10, 3));
        let (code, mappings, _) = builder.finish();
        assert_eq!(code, "<div>_ctx.foo");
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].generated_offset, 5);
        assert_eq!(mappings[0].generated_length, 8);
        assert_eq!(mappings[0].source_offset, 10);
        assert_eq!(mappings[0].source_length, 3);
    }
}
