//! HTML template assembly.
//!
//! Templates are plain HTML with `{{name}}` placeholders. Assembly replaces
//! every placeholder whose name is in the context and leaves the others
//! untouched. After substitution, a fixed set of sections can be hidden by
//! tagging their opening element with an inline `display:none` style.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use thiserror::Error;
use tracing::debug;

/// Template errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template not found.
    #[error("template not found: {0}")]
    NotFound(String),

    /// IO error while loading templates.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Sections of the layout that can be hidden per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Specs,
    Errores,
    Mantenimiento,
    Modelos,
}

impl Section {
    /// Every suppressible section.
    pub const ALL: [Section; 4] = [
        Section::Specs,
        Section::Errores,
        Section::Mantenimiento,
        Section::Modelos,
    ];

    /// The `id` attribute value of the section element.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Specs => "specs",
            Self::Errores => "errores",
            Self::Mantenimiento => "mantenimiento",
            Self::Modelos => "modelos",
        }
    }
}

const HIDDEN_STYLE: &str = r#" style="display:none;""#;

/// Template context with variables for interpolation.
///
/// Backed by an ordered map so that iteration, and anything derived from it,
/// is the same on every run.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    variables: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable into the context.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Create context with initial variables.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a variable value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Check if a variable exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// A named template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    content: String,
}

impl Template {
    /// Create a new template with the given name and content.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Get the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw template text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Substitute context variables into the template.
    ///
    /// Text is scanned once from left to right. Inserted values are never
    /// scanned again, so a value that itself contains `{{...}}` is copied
    /// as-is. Placeholders with no matching variable stay in the output.
    #[must_use]
    pub fn assemble(&self, context: &TemplateContext) -> String {
        let src = self.content.as_str();
        let mut out = String::with_capacity(src.len());
        let mut pos = 0;

        while let Some(offset) = src[pos..].find("{{") {
            let start = pos + offset;
            let Some(close) = src[start + 2..].find("}}") else {
                break;
            };
            let end = start + 2 + close + 2;
            let name = src[start + 2..end - 2].trim();

            out.push_str(&src[pos..start]);
            match context.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(&src[start..end]),
            }
            pos = end;
        }

        out.push_str(&src[pos..]);
        out
    }
}

/// Hide the given sections by injecting an inline style into their opening tag.
///
/// Occurrences that are already hidden are left alone, so applying this twice
/// gives the same result as applying it once.
#[must_use]
pub fn suppress_sections(html: &str, sections: &[Section]) -> String {
    let mut result = html.to_string();
    for section in sections {
        let needle = format!(r#"id="{}""#, section.id());
        result = hide_attribute(&result, &needle);
    }
    result
}

fn hide_attribute(html: &str, needle: &str) -> String {
    let mut out = String::with_capacity(html.len() + HIDDEN_STYLE.len());
    let mut rest = html;

    while let Some(idx) = rest.find(needle) {
        let after = idx + needle.len();
        out.push_str(&rest[..after]);
        rest = &rest[after..];
        if !rest.starts_with(HIDDEN_STYLE) {
            out.push_str(HIDDEN_STYLE);
        }
    }

    out.push_str(rest);
    out
}

/// Insert `block` immediately before the first occurrence of `marker`.
///
/// Returns `None` when the marker is absent.
#[must_use]
pub fn insert_before(html: &str, marker: &str, block: &str) -> Option<String> {
    let idx = html.find(marker)?;
    let mut out = String::with_capacity(html.len() + block.len() + 10);
    out.push_str(&html[..idx]);
    out.push_str(block);
    out.push_str("\n\n        ");
    out.push_str(&html[idx..]);
    Some(out)
}

/// Placeholder names still present in assembled text, in order of appearance.
#[must_use]
pub fn unresolved_placeholders(html: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut pos = 0;

    while let Some(offset) = html[pos..].find("{{") {
        let start = pos + offset;
        let Some(close) = html[start + 2..].find("}}") else {
            break;
        };
        let name = html[start + 2..start + 2 + close].trim();
        if is_placeholder_name(name) && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        pos = start + 2 + close + 2;
    }

    names
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Registry of templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    /// Create a new registry with default templates.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(Template::new("layout", DEFAULT_LAYOUT_TEMPLATE));
        self.register(Template::new("repair", DEFAULT_REPAIR_TEMPLATE));
        self.register(Template::new("home", DEFAULT_HOME_TEMPLATE));
    }

    /// Register a template, replacing any with the same name.
    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Load every `*.html` file in `dir` as a template named after its file stem.
    ///
    /// Returns the number of templates loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path)?;
            debug!(name, path = %path.display(), "loaded template");
            self.register(Template::new(name, content));
            count += 1;
        }
        Ok(count)
    }

    /// Get a template by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Get a template by name or fail.
    pub fn require(&self, name: &str) -> Result<&Template> {
        self.get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    /// Assemble a named template with the given context.
    pub fn assemble(&self, name: &str, context: &TemplateContext) -> Result<String> {
        Ok(self.require(name)?.assemble(context))
    }
}

/// Marker comment the spare-parts block is inserted in front of.
pub const MAINTENANCE_MARKER: &str = "<!-- SECCIÓN 7: Plan de Mantenimiento";

/// Default layout for brand index and model pages.
pub const DEFAULT_LAYOUT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="{{lang}}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{pageTitle}}</title>
    <meta name="description" content="{{pageDescription}}">
    <link rel="canonical" href="{{currentUrl}}">
    <script src="https://cdn.tailwindcss.com"></script>
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css">
    {{extraHead}}
</head>
<body class="bg-gray-50 text-gray-800">
    <nav class="bg-white shadow-sm">
        <div class="max-w-6xl mx-auto px-4 py-3 text-sm text-gray-500">
            <a href="/index.html" class="hover:text-blue-600">Inicio</a>
            <span class="mx-2">/</span>
            <a href="/{{brandSlug}}/index.html" class="hover:text-blue-600">{{brandName}}</a>
            <span class="mx-2">/</span>
            <span class="text-gray-800">{{currentPageTitle}}</span>
        </div>
    </nav>

    <header class="bg-gradient-to-r from-blue-600 to-indigo-700 text-white py-12">
        <div class="max-w-6xl mx-auto px-4">
            <h1 class="text-4xl font-bold">{{h1Title}}</h1>
            <p class="mt-2 text-blue-100">{{subtitle}}</p>
        </div>
    </header>

    <main class="max-w-6xl mx-auto px-4 py-10">
        <!-- SECCIÓN 1: Introducción -->
        <section id="intro" class="mb-12">
            {{introContent}}
        </section>

        <!-- SECCIÓN 2: Modelos -->
        <section id="modelos" class="mb-12">
            <h2 class="text-2xl font-bold mb-6">Modelos {{brandName}}</h2>
            <div class="grid grid-cols-1 md:grid-cols-2 lg:grid-cols-3 gap-6">
                {{modelListHtml}}
            </div>
        </section>

        <!-- SECCIÓN 3: Especificaciones -->
        <section id="specs" class="mb-12">
            <h2 class="text-2xl font-bold mb-6">Especificaciones Técnicas</h2>
            <dl class="grid grid-cols-1 md:grid-cols-2 gap-4">
                <div><dt class="font-semibold">Resistencia</dt><dd>{{specResistencia}}</dd></div>
                <div><dt class="font-semibold">Termostato</dt><dd>{{specTermostato}}</dd></div>
                <div><dt class="font-semibold">Ánodo</dt><dd>{{specAnodo}}</dd></div>
                <div><dt class="font-semibold">Herramientas</dt><dd>{{specHerramientas}}</dd></div>
            </dl>
        </section>

        <!-- SECCIÓN 4: Diagnóstico -->
        <section id="diagnostico" class="mb-12">
            <h2 class="text-2xl font-bold mb-6">Diagnóstico de Fallas</h2>
            <div class="grid grid-cols-1 md:grid-cols-3 gap-6">
                {{diagnosisCards}}
            </div>
        </section>

        <!-- SECCIÓN 5: Guías de Reparación -->
        <section id="reparaciones" class="mb-12">
            <h2 class="text-2xl font-bold mb-6">Guías de Reparación</h2>
            <div class="grid grid-cols-1 md:grid-cols-2 gap-6">
                {{repairGuides}}
            </div>
        </section>

        <!-- SECCIÓN 6: Códigos de Error -->
        <section id="errores" class="mb-12">
            <h2 class="text-2xl font-bold mb-6">Códigos de Error</h2>
            <table class="w-full bg-white rounded-xl shadow-sm">
                <thead>
                    <tr><th class="p-4 text-left">Código</th><th class="p-4 text-left">Descripción</th><th class="p-4 text-left">Solución</th></tr>
                </thead>
                <tbody>
                    {{errorTableRows}}
                </tbody>
            </table>
        </section>

        <!-- SECCIÓN 7: Plan de Mantenimiento -->
        <section id="mantenimiento" class="mb-12">
            <h2 class="text-2xl font-bold mb-6">Plan de Mantenimiento</h2>
            <ul class="space-y-2">
                <li><strong>Ánodo de magnesio:</strong> {{maintAnodo}}</li>
                <li><strong>Limpieza del tanque:</strong> {{maintLimpieza}}</li>
                <li><strong>Válvula de seguridad:</strong> {{maintValvula}}</li>
            </ul>
        </section>
    </main>

    <footer class="bg-gray-800 text-gray-300 py-8">
        <div class="max-w-6xl mx-auto px-4 text-sm">
            <p>{{siteTitle}}</p>
        </div>
    </footer>
</body>
</html>
"##;

/// Default layout for repair guide pages.
pub const DEFAULT_REPAIR_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="{{lang}}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{pageTitle}}</title>
    <meta name="description" content="{{pageDescription}}">
    <link rel="canonical" href="{{currentUrl}}">
    <script src="https://cdn.tailwindcss.com"></script>
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css">
</head>
<body class="bg-gray-50 text-gray-800">
    <nav class="bg-white shadow-sm">
        <div class="max-w-4xl mx-auto px-4 py-3 text-sm text-gray-500">
            <a href="/index.html" class="hover:text-blue-600">Inicio</a>
            <span class="mx-2">/</span>
            <a href="../index.html" class="hover:text-blue-600">{{brandName}}</a>
            <span class="mx-2">/</span>
            <span class="text-gray-800">{{repairTitle}}</span>
        </div>
    </nav>

    <header class="bg-gradient-to-r from-green-600 to-teal-700 text-white py-10">
        <div class="max-w-4xl mx-auto px-4">
            <h1 class="text-3xl font-bold">{{h1Title}}</h1>
            <p class="mt-2 text-green-100">{{subtitle}}</p>
        </div>
    </header>

    <main class="max-w-4xl mx-auto px-4 py-10">
        <article class="prose prose-lg max-w-none">
            {{repairContent}}
        </article>

        <section id="otras-reparaciones" class="mt-12">
            <h2 class="text-2xl font-bold mb-4">Otras reparaciones {{brandName}}</h2>
            <ul class="space-y-2">
                {{otherRepairs}}
            </ul>
        </section>

        <aside class="mt-12 bg-blue-50 border border-blue-200 rounded-xl p-6">
            <p>¿Necesitás repuestos? <a href="{{storeUrl}}" target="_blank" class="text-blue-600 font-semibold">Visitá la tienda</a>.</p>
        </aside>
    </main>

    <footer class="bg-gray-800 text-gray-300 py-8">
        <div class="max-w-4xl mx-auto px-4 text-sm">
            <p>{{siteTitle}}</p>
        </div>
    </footer>
</body>
</html>
"##;

/// Default root index listing every brand.
pub const DEFAULT_HOME_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="{{lang}}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{pageTitle}}</title>
    <meta name="description" content="{{pageDescription}}">
    <link rel="canonical" href="{{currentUrl}}">
    <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-gray-50 text-gray-800">
    <header class="bg-gradient-to-r from-blue-600 to-indigo-700 text-white py-12">
        <div class="max-w-6xl mx-auto px-4">
            <h1 class="text-4xl font-bold">{{siteTitle}}</h1>
            <p class="mt-2 text-blue-100">Guías técnicas de reparación por marca y modelo</p>
        </div>
    </header>

    <main class="max-w-6xl mx-auto px-4 py-10">
        <ul class="grid grid-cols-2 md:grid-cols-4 gap-4">
            {{brandListHtml}}
        </ul>
    </main>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let template = Template::new("test", "<p>{{name}}</p>");
        let ctx = TemplateContext::new().with_var("name", "Acme");

        assert_eq!(template.assemble(&ctx), "<p>Acme</p>");
    }

    #[test]
    fn test_assemble_empty_context_unchanged() {
        let template = Template::new("test", "<p>{{name}}</p>");
        assert_eq!(template.assemble(&TemplateContext::new()), "<p>{{name}}</p>");
    }

    #[test]
    fn test_assemble_silent_miss() {
        let template = Template::new("test", "{{a}} and {{b}} and {{a}}");
        let ctx = TemplateContext::new().with_var("a", "1");

        assert_eq!(template.assemble(&ctx), "1 and {{b}} and 1");
    }

    #[test]
    fn test_assemble_does_not_rescan_values() {
        let template = Template::new("test", "{{outer}}|{{inner}}");
        let ctx = TemplateContext::new()
            .with_var("outer", "{{inner}}")
            .with_var("inner", "x");

        assert_eq!(template.assemble(&ctx), "{{inner}}|x");
    }

    #[test]
    fn test_assemble_unclosed_brace() {
        let template = Template::new("test", "{{a}} {{broken");
        let ctx = TemplateContext::new().with_var("a", "ok");

        assert_eq!(template.assemble(&ctx), "ok {{broken");
    }

    #[test]
    fn test_assemble_deterministic() {
        let template = Template::new("test", DEFAULT_LAYOUT_TEMPLATE);
        let ctx = TemplateContext::new()
            .with_var("brandName", "Ariston")
            .with_var("pageTitle", "T");

        assert_eq!(template.assemble(&ctx), template.assemble(&ctx));
    }

    #[test]
    fn test_suppress_sections() {
        let html = r#"<section id="specs"><section id="intro"><section id="errores">"#;
        let out = suppress_sections(html, &[Section::Specs, Section::Errores]);

        assert_eq!(
            out,
            r#"<section id="specs" style="display:none;"><section id="intro"><section id="errores" style="display:none;">"#
        );
    }

    #[test]
    fn test_suppress_sections_idempotent() {
        let once = suppress_sections(DEFAULT_LAYOUT_TEMPLATE, &Section::ALL);
        let twice = suppress_sections(&once, &Section::ALL);

        assert_eq!(once, twice);
        assert_eq!(once.matches("display:none;").count(), 4);
    }

    #[test]
    fn test_insert_before() {
        let html = "<main>\n<!-- SECCIÓN 7: Plan de Mantenimiento -->\n</main>";
        let out = insert_before(html, MAINTENANCE_MARKER, "<div>parts</div>").unwrap();

        let block = out.find("<div>parts</div>").unwrap();
        let marker = out.find(MAINTENANCE_MARKER).unwrap();
        assert!(block < marker);
        assert!(insert_before("<main></main>", MAINTENANCE_MARKER, "x").is_none());
    }

    #[test]
    fn test_unresolved_placeholders() {
        let names = unresolved_placeholders("{{a}} {{ b }} {{a}} {{not a name}} {{}}");
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert!(unresolved_placeholders("<p>done</p>").is_empty());
    }

    #[test]
    fn test_template_registry() {
        let registry = TemplateRegistry::new();

        assert!(registry.get("layout").is_some());
        assert!(registry.get("repair").is_some());
        assert!(registry.get("home").is_some());
        assert!(matches!(
            registry.require("nonexistent"),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn test_registry_load_dir_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("layout.html"), "<h1>{{h1Title}}</h1>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = TemplateRegistry::new();
        let loaded = registry.load_dir(dir.path()).unwrap();
        let ctx = TemplateContext::new().with_var("h1Title", "James");

        assert_eq!(loaded, 1);
        assert_eq!(registry.assemble("layout", &ctx).unwrap(), "<h1>James</h1>");
        assert!(registry.get("repair").is_some());
    }

    #[test]
    fn test_default_layout_has_sections() {
        for section in Section::ALL {
            assert!(DEFAULT_LAYOUT_TEMPLATE.contains(&format!(r#"id="{}""#, section.id())));
        }
        assert!(DEFAULT_LAYOUT_TEMPLATE.contains(MAINTENANCE_MARKER));
    }
}
