//! Narrative text generation.
//!
//! Intro and guide paragraphs come from a [`TextGenerator`]. The [`Narrator`]
//! puts the content cache in front of it: stored fragments are reused,
//! external output is cleaned and stored before use, and any failure falls
//! back to deterministic local text.

use std::{
    fmt,
    sync::{
        LazyLock,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use calefon_core::{Brand, Model};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheKey, ContentCache, Lookup},
    fragments::escape_html,
    repairs::{self, RepairType},
};

/// Text generation errors.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response.
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response had no usable text.
    #[error("empty response")]
    EmptyResponse,

    /// API key environment variable is not set.
    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    /// Every attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<GenerationError>,
    },
}

impl GenerationError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MissingApiKey(_) | Self::Exhausted { .. })
    }
}

/// What a fragment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarrativeKind {
    BrandIntro,
    ModelIntro,
    RepairGuide,
}

impl NarrativeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrandIntro => "brand_intro",
            Self::ModelIntro => "model_intro",
            Self::RepairGuide => "repair_guide",
        }
    }
}

impl fmt::Display for NarrativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for one fragment.
#[derive(Debug, Clone)]
pub struct NarrativeRequest {
    pub kind: NarrativeKind,
    pub brand: String,
    pub slug: String,
    /// Model or repair id.
    pub item_id: Option<String>,
    /// Model name or repair title.
    pub item_name: Option<String>,
    /// Model description.
    pub description: String,
    /// Labelled spec lines fed to the prompt.
    pub facts: Vec<(String, String)>,
}

impl NarrativeRequest {
    /// Intro for a brand index page.
    #[must_use]
    pub fn brand_intro(brand: &Brand) -> Self {
        Self {
            kind: NarrativeKind::BrandIntro,
            brand: brand.name.clone(),
            slug: brand.slug().to_string(),
            item_id: None,
            item_name: None,
            description: String::new(),
            facts: Vec::new(),
        }
    }

    /// Intro for a model page.
    #[must_use]
    pub fn model_intro(brand: &Brand, model: &Model) -> Self {
        let specs = &model.specs;
        let facts = vec![
            ("Resistencia".to_string(), or_na(specs.resistance.as_deref())),
            ("Termostato".to_string(), or_na(specs.thermostat.as_deref())),
            ("Ánodo".to_string(), or_na(specs.anode.as_deref())),
            ("Herramientas".to_string(), specs.tools.join(", ")),
        ];
        Self {
            kind: NarrativeKind::ModelIntro,
            brand: brand.name.clone(),
            slug: brand.slug().to_string(),
            item_id: Some(model.id.clone()),
            item_name: Some(model.name.clone()),
            description: model.description.clone(),
            facts,
        }
    }

    /// Body of a repair guide page.
    #[must_use]
    pub fn repair_guide(brand: &Brand, repair: &RepairType) -> Self {
        Self {
            kind: NarrativeKind::RepairGuide,
            brand: brand.name.clone(),
            slug: brand.slug().to_string(),
            item_id: Some(repair.id.to_string()),
            item_name: Some(repair.title.to_string()),
            description: String::new(),
            facts: vec![
                ("Dificultad".to_string(), repair.difficulty.to_string()),
                ("Tiempo".to_string(), repair.duration.to_string()),
            ],
        }
    }

    /// Cache key for the fragment.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        match (self.kind, self.item_id.as_deref()) {
            (NarrativeKind::ModelIntro, Some(id)) => CacheKey::model(&self.slug, id),
            (NarrativeKind::RepairGuide, Some(id)) => CacheKey::repair(&self.slug, id),
            _ => CacheKey::brand(&self.slug),
        }
    }

    /// Prompt text for an external generator.
    #[must_use]
    pub fn prompt(&self) -> String {
        let subject = match &self.item_name {
            Some(name) => format!("{} {}", self.brand, name),
            None => self.brand.clone(),
        };
        let mut prompt = String::from(
            "Eres un técnico experto en reparación de calefones eléctricos en Uruguay.\n\n",
        );

        match self.kind {
            NarrativeKind::BrandIntro => prompt.push_str(&format!(
                "Genera SOLO el contenido HTML para la introducción de la marca **{subject}**: \
                 un párrafo con clase \"lead\", una lista de 4 o 5 características técnicas \
                 y un párrafo sobre las reparaciones más comunes.\n"
            )),
            NarrativeKind::ModelIntro => prompt.push_str(&format!(
                "Genera SOLO fragmentos HTML para el modelo **{subject}**: posicionamiento \
                 del modelo, ventajas técnicas en una lista y mantenimiento frecuente.\n"
            )),
            NarrativeKind::RepairGuide => prompt.push_str(&format!(
                "Genera una guía PASO A PASO en HTML para **{subject}**: herramientas, \
                 medidas de seguridad y procedimiento numerado.\n"
            )),
        }

        if !self.description.is_empty() {
            prompt.push_str(&format!("\nDescripción: {}\n", self.description));
        }
        for (label, value) in &self.facts {
            prompt.push_str(&format!("- {label}: {value}\n"));
        }

        prompt.push_str(
            "\nIMPORTANTE: NO incluyas ```html, <!DOCTYPE>, <html>, <head>, <body> ni <section>. \
             Solo el fragmento HTML directo. LONGITUD: 180-250 palabras.",
        );
        prompt
    }
}

fn or_na(value: Option<&str>) -> String {
    value.unwrap_or("N/A").to_string()
}

/// Something that turns a request into HTML text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, request: &NarrativeRequest) -> Result<String, GenerationError>;

    /// Whether output comes from outside the process and should be cached.
    fn is_external(&self) -> bool {
        true
    }
}

/// Deterministic text built from the request alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGenerator;

impl LocalGenerator {
    /// Infallible form of [`TextGenerator::generate`].
    #[must_use]
    pub fn text(&self, request: &NarrativeRequest) -> String {
        let brand = escape_html(&request.brand);
        match request.kind {
            NarrativeKind::BrandIntro => format!(
                "<p class=\"lead\">Encuentra guías técnicas especializadas para la reparación y \
                 mantenimiento de calefones eléctricos <strong>{brand}</strong>.</p>\n\
                 <p>Las reparaciones más comunes en calefones {brand} incluyen el reemplazo de \
                 resistencias quemadas, termostatos descalibrados y el mantenimiento del ánodo \
                 de magnesio.</p>"
            ),
            NarrativeKind::ModelIntro => {
                let name = escape_html(request.item_name.as_deref().unwrap_or_default());
                let mut html = format!(
                    "<p class=\"lead\">{}</p>\n",
                    escape_html(&request.description)
                );
                html.push_str(&format!(
                    "<p>A continuación encontrarás las especificaciones técnicas completas y los \
                     repuestos compatibles para el modelo <strong>{name}</strong> de {brand}.</p>"
                ));
                html
            }
            NarrativeKind::RepairGuide => {
                let repair = request.item_id.as_deref().and_then(repairs::find);
                let title = escape_html(request.item_name.as_deref().unwrap_or_default());
                let mut html = format!("<h2>{title} - {brand}</h2>\n<ol>\n");
                for step in repair.map(|r| r.steps).unwrap_or_default() {
                    html.push_str(&format!("    <li>{}</li>\n", escape_html(step)));
                }
                html.push_str("</ol>");
                html
            }
        }
    }
}

impl TextGenerator for LocalGenerator {
    fn generate(&self, request: &NarrativeRequest) -> Result<String, GenerationError> {
        Ok(self.text(request))
    }

    fn is_external(&self) -> bool {
        false
    }
}

/// Retries a generator with exponential backoff.
#[derive(Debug)]
pub struct RetryingGenerator<G> {
    inner: G,
    max_attempts: u32,
    base_delay: Duration,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    /// Wrap `inner`, making at most `max_attempts` calls per request.
    #[must_use]
    pub fn new(inner: G, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    fn generate(&self, request: &NarrativeRequest) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(request) {
                Ok(text) => return Ok(text),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    warn!(
                        key = %request.cache_key(),
                        attempt,
                        error = %e,
                        "generation attempt failed"
                    );
                    if attempt >= self.max_attempts {
                        return Err(GenerationError::Exhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    thread::sleep(
                        self.base_delay
                            .saturating_mul(2u32.saturating_pow(attempt - 1)),
                    );
                }
            }
        }
    }

    fn is_external(&self) -> bool {
        self.inner.is_external()
    }
}

/// Counters for a build's narrative sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NarratorStats {
    /// Calls made to the external generator.
    pub external_calls: usize,
    pub cache_hits: usize,
    /// Sections that used local text after a failure.
    pub fallbacks: usize,
}

/// Cache-backed source of narrative sections.
pub struct Narrator {
    cache: ContentCache,
    primary: Box<dyn TextGenerator>,
    local: LocalGenerator,
    pause: Duration,
    external_calls: AtomicUsize,
    cache_hits: AtomicUsize,
    fallbacks: AtomicUsize,
}

impl fmt::Debug for Narrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Narrator")
            .field("external", &self.primary.is_external())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Narrator {
    /// Create a narrator over `cache` using `primary` on misses.
    #[must_use]
    pub fn new(cache: ContentCache, primary: Box<dyn TextGenerator>) -> Self {
        Self {
            cache,
            primary,
            local: LocalGenerator,
            pause: Duration::ZERO,
            external_calls: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
        }
    }

    /// Narrator that never leaves the process; cached fragments are still used.
    #[must_use]
    pub fn offline(cache: ContentCache) -> Self {
        Self::new(cache, Box::new(LocalGenerator))
    }

    /// Sleep this long after each successful external generation.
    #[must_use]
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// The underlying cache.
    #[must_use]
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// HTML for one section. Never fails.
    pub fn section(&self, request: &NarrativeRequest) -> String {
        self.narrate(request, true)
    }

    /// HTML for one section from the cache or local text, without calling
    /// the external generator.
    pub fn cached_section(&self, request: &NarrativeRequest) -> String {
        self.narrate(request, false)
    }

    /// One lookup path for every mode: only external output is stored.
    fn narrate(&self, request: &NarrativeRequest, allow_external: bool) -> String {
        let key = request.cache_key();
        let external = allow_external && self.primary.is_external();
        let generator: &dyn TextGenerator = if external {
            self.primary.as_ref()
        } else {
            &self.local
        };

        let generate = || -> Result<String, GenerationError> {
            if external {
                self.external_calls.fetch_add(1, Ordering::Relaxed);
                info!(key = %key, "generating content");
            }
            let text = generator.generate(request)?;
            let text = if external {
                clean_generated_html(&text)
            } else {
                text
            };
            if text.is_empty() {
                return Err(GenerationError::EmptyResponse);
            }
            Ok(text)
        };
        let lookup = if external {
            self.cache.get_or_generate(&key, generate)
        } else {
            self.cache.get_or_compute(&key, generate)
        };

        match lookup {
            Ok(Lookup::Hit(text)) => {
                debug!(key = %key, "cache hit");
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                text
            }
            Ok(Lookup::Generated(text)) => {
                if external && !self.pause.is_zero() {
                    thread::sleep(self.pause);
                }
                text
            }
            Ok(Lookup::Failed(e)) => {
                warn!(key = %key, error = %e, "generation failed, using local text");
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                self.local.text(request)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache unavailable, using local text");
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                self.local.text(request)
            }
        }
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> NarratorStats {
        NarratorStats {
            external_calls: self.external_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").expect("valid regex"));
static WRAPPER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:html|body|main|section)(?:\s[^>]*)?>").expect("valid regex")
});
static HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head>.*?</head>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style>.*?</style>").expect("valid regex"));

/// Strip code fences and document-structure markup from generated HTML.
#[must_use]
pub fn clean_generated_html(text: &str) -> String {
    let text = text.replace("```html", "").replace("```", "");
    let text = DOCTYPE_RE.replace_all(text.trim(), "");
    let text = HEAD_RE.replace_all(&text, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = WRAPPER_TAG_RE.replace_all(&text, "");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::cache::SqliteStore;

    /// Replays scripted results and counts calls.
    struct Scripted {
        results: Mutex<Vec<Result<String, GenerationError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(results: Vec<Result<String, GenerationError>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let scripted = Self {
                results: Mutex::new(results.into_iter().rev().collect()),
                calls: Arc::clone(&calls),
            };
            (scripted, calls)
        }
    }

    impl TextGenerator for Scripted {
        fn generate(&self, _request: &NarrativeRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(GenerationError::EmptyResponse))
        }
    }

    fn cache() -> ContentCache {
        ContentCache::new(SqliteStore::in_memory().unwrap())
    }

    fn brand() -> Brand {
        Brand::new("Thermo Star")
    }

    #[test]
    fn test_request_keys() {
        let model: Model = serde_json::from_value(serde_json::json!({
            "id": "ts-60", "name": "TS 60", "description": "60 litros"
        }))
        .unwrap();

        assert_eq!(
            NarrativeRequest::brand_intro(&brand()).cache_key().as_str(),
            "brand_intro_thermo-star"
        );
        assert_eq!(
            NarrativeRequest::model_intro(&brand(), &model)
                .cache_key()
                .as_str(),
            "model_intro_thermo-star_ts-60"
        );
        let repair = repairs::find("cambiar-anodo").unwrap();
        assert_eq!(
            NarrativeRequest::repair_guide(&brand(), repair)
                .cache_key()
                .as_str(),
            "repair_guide_thermo-star_cambiar-anodo"
        );
    }

    #[test]
    fn test_prompt_mentions_subject_and_facts() {
        let model: Model = serde_json::from_value(serde_json::json!({
            "id": "ts-60", "name": "TS 60",
            "specs": {"resistencia": "Brida 1500W", "herramientas": ["Tester"]}
        }))
        .unwrap();
        let prompt = NarrativeRequest::model_intro(&brand(), &model).prompt();

        assert!(prompt.contains("Thermo Star TS 60"));
        assert!(prompt.contains("- Resistencia: Brida 1500W"));
        assert!(prompt.contains("- Termostato: N/A"));
    }

    #[test]
    fn test_clean_generated_html() {
        let raw = "```html\n<!DOCTYPE html><html lang=\"es\"><head><title>x</title></head>\
                   <body><section class=\"a\"><style>p{}</style><p>Hola</p></section></body></html>\n```";
        assert_eq!(clean_generated_html(raw), "<p>Hola</p>");
        assert_eq!(clean_generated_html("<p>ok</p>"), "<p>ok</p>");
        assert_eq!(clean_generated_html("<mainframe>"), "<mainframe>");
    }

    #[test]
    fn test_local_repair_guide_lists_steps() {
        let repair = repairs::find("cambiar-valvula").unwrap();
        let text = LocalGenerator.text(&NarrativeRequest::repair_guide(&brand(), repair));

        assert!(text.contains("Cambiar Válvula de Seguridad - Thermo Star"));
        assert_eq!(text.matches("<li>").count(), repair.steps.len());
    }

    #[test]
    fn test_retry_then_success() {
        let (inner, calls) = Scripted::new(vec![
            Err(GenerationError::EmptyResponse),
            Ok("<p>ok</p>".to_string()),
        ]);
        let generator = RetryingGenerator::new(inner, 3, Duration::ZERO);

        let text = generator
            .generate(&NarrativeRequest::brand_intro(&brand()))
            .unwrap();
        assert_eq!(text, "<p>ok</p>");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retry_exhausted() {
        let (inner, calls) = Scripted::new(vec![]);
        let generator = RetryingGenerator::new(inner, 3, Duration::ZERO);

        let err = generator
            .generate(&NarrativeRequest::brand_intro(&brand()))
            .unwrap_err();
        assert!(matches!(err, GenerationError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_stops_on_missing_key() {
        let (inner, calls) =
            Scripted::new(vec![Err(GenerationError::MissingApiKey("KEY".into()))]);
        let generator = RetryingGenerator::new(inner, 3, Duration::ZERO);

        assert!(
            generator
                .generate(&NarrativeRequest::brand_intro(&brand()))
                .is_err()
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_narrator_caches_external_output_once() {
        let (primary, calls) = Scripted::new(vec![Ok("```html\n<p>Intro</p>\n```".to_string())]);
        let narrator = Narrator::new(cache(), Box::new(primary));
        let request = NarrativeRequest::brand_intro(&brand());

        assert_eq!(narrator.section(&request), "<p>Intro</p>");
        assert_eq!(narrator.section(&request), "<p>Intro</p>");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            narrator.stats(),
            NarratorStats {
                external_calls: 1,
                cache_hits: 1,
                fallbacks: 0
            }
        );
    }

    #[test]
    fn test_narrator_fallback_not_cached() {
        let (primary, _) = Scripted::new(vec![Err(GenerationError::EmptyResponse)]);
        let narrator = Narrator::new(cache(), Box::new(primary));
        let request = NarrativeRequest::brand_intro(&brand());

        let text = narrator.section(&request);
        assert!(text.contains("Thermo Star"));
        assert_eq!(narrator.stats().fallbacks, 1);
        assert!(
            narrator
                .cache()
                .get(request.cache_key().as_str())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_offline_narrator_uses_cache_but_never_stores() {
        let cache = cache();
        cache.put("brand_intro_thermo-star", "<p>stored</p>").unwrap();
        let narrator = Narrator::offline(cache);

        assert_eq!(
            narrator.section(&NarrativeRequest::brand_intro(&brand())),
            "<p>stored</p>"
        );
        let other = NarrativeRequest::brand_intro(&Brand::new("James"));
        assert!(narrator.section(&other).contains("James"));
        assert!(narrator.cache().get("brand_intro_james").unwrap().is_none());
        assert_eq!(narrator.stats().external_calls, 0);
    }

    #[test]
    fn test_cached_section_skips_external_generator() {
        let (primary, calls) = Scripted::new(vec![Ok("<p>remoto</p>".to_string())]);
        let narrator = Narrator::new(cache(), Box::new(primary));
        let request = NarrativeRequest::brand_intro(&brand());

        let text = narrator.cached_section(&request);
        assert!(text.contains("Thermo Star"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(
            narrator
                .cache()
                .get(request.cache_key().as_str())
                .unwrap()
                .is_none()
        );

        assert_eq!(narrator.section(&request), "<p>remoto</p>");
        assert_eq!(narrator.cached_section(&request), "<p>remoto</p>");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_local_text_is_escaped() {
        let model: Model = serde_json::from_value(serde_json::json!({
            "id": "ab-1", "name": "AB <1>", "description": "Tanque \"grande\" & fino"
        }))
        .unwrap();
        let brand = Brand::new("A&B");

        let intro = LocalGenerator.text(&NarrativeRequest::brand_intro(&brand));
        assert!(intro.contains("<strong>A&amp;B</strong>"));
        assert!(!intro.contains("A&B"));

        let model_intro = LocalGenerator.text(&NarrativeRequest::model_intro(&brand, &model));
        assert!(model_intro.contains("AB &lt;1&gt;"));
        assert!(model_intro.contains("Tanque &quot;grande&quot; &amp; fino"));
    }
}
