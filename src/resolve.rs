//! Component reference resolution.
//!
//! Classifies each element tag against the registry supplied by the
//! caller and decides how the tag is referenced and imported in the
//! generated output. Bindings are cached for the duration of one compile
//! call; the first resolution of an imported component appends exactly one
//! import statement, in first-encountered order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registry entry for a declared component name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentImport {
    pub path: String,
    #[serde(default)]
    pub named: bool,
}

/// How a tag is referenced in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ComponentBinding {
    /// Default import from the component file.
    LocalImport { name: String, path: String },
    /// Named export from a package or module.
    NamedImport { name: String, path: String },
    /// Hyphenated tag with no registry entry: emitted verbatim, no import,
    /// no prop-casing transform.
    NativeElement,
    /// Referenced by name and assumed to exist in a runtime global
    /// registry; no import.
    Unresolved,
}

pub struct ComponentRegistry {
    /// Declared name + entry, keyed by the normalized spelling.
    declared: HashMap<String, (String, ComponentImport)>,
    /// Per-compile cache; one entry per distinct tag.
    resolved: HashMap<String, ComponentBinding>,
    /// Deduplicated import statements in first-encountered order.
    imports: Vec<String>,
}

impl ComponentRegistry {
    pub fn new(components: &HashMap<String, ComponentImport>) -> Self {
        let declared = components
            .iter()
            .map(|(name, entry)| (normalize_tag(name), (name.clone(), entry.clone())))
            .collect();
        ComponentRegistry {
            declared,
            resolved: HashMap::new(),
            imports: Vec::new(),
        }
    }

    /// Resolves a tag, caching the result. PascalCase, camelCase, and
    /// kebab-case spellings of the same declared name resolve identically.
    pub fn resolve(&mut self, tag: &str) -> ComponentBinding {
        if let Some(binding) = self.resolved.get(tag) {
            return binding.clone();
        }
        let binding = match self.declared.get(&normalize_tag(tag)) {
            Some((name, entry)) => {
                let binding = if entry.named {
                    ComponentBinding::NamedImport {
                        name: name.clone(),
                        path: entry.path.clone(),
                    }
                } else {
                    ComponentBinding::LocalImport {
                        name: name.clone(),
                        path: entry.path.clone(),
                    }
                };
                self.register_import(&binding);
                binding
            }
            None if tag.contains('-') => ComponentBinding::NativeElement,
            None => ComponentBinding::Unresolved,
        };
        self.resolved.insert(tag.to_string(), binding.clone());
        binding
    }

    fn register_import(&mut self, binding: &ComponentBinding) {
        let line = match binding {
            ComponentBinding::LocalImport { name, path } => {
                format!("import {} from '{}'", name, path)
            }
            ComponentBinding::NamedImport { name, path } => {
                format!("import {{ {} }} from '{}'", name, path)
            }
            _ => return,
        };
        if !self.imports.contains(&line) {
            self.imports.push(line);
        }
    }

    pub fn import_lines(&self) -> &[String] {
        &self.imports
    }
}

/// Case/format-insensitive tag spelling: `MyFoo`, `myFoo`, and `my-foo`
/// normalize to the same key.
fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
