//! Build orchestration.
//!
//! Renders the root index, then every brand's index, model and repair pages,
//! and writes them under the output directory. A page that fails to render or
//! write is logged and skipped; the rest of the build continues.

use std::{
    fs,
    ops::{Add, Range},
    path::{Path, PathBuf},
    time::Instant,
};

use calefon_core::{Brand, Config, DataStore, Model, Page, PageKind, ResistanceKind};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    fragments::{self, escape_html},
    narrative::{NarrativeRequest, Narrator, NarratorStats},
    repairs::{REPAIR_TYPES, RepairType},
    template::{
        MAINTENANCE_MARKER, Section, TemplateContext, TemplateError, TemplateRegistry,
        insert_before, suppress_sections, unresolved_placeholders,
    },
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Template error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Data needed for a page is absent.
    #[error("missing input for {}: {reason}", path.display())]
    MissingInput { path: PathBuf, reason: String },

    /// A model page still has placeholders and strict mode is on.
    #[error("unresolved placeholders in {}: {}", path.display(), names.join(", "))]
    UnresolvedPlaceholder { path: PathBuf, names: Vec<String> },
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Brands processed.
    pub brands: usize,

    /// Brand index pages written.
    pub brand_pages: usize,

    /// Model pages written.
    pub model_pages: usize,

    /// Repair guide pages written.
    pub repair_pages: usize,

    /// Other pages written (root index).
    pub other_pages: usize,

    /// Pages skipped because of an error.
    pub failed_pages: usize,

    /// Model pages that still contained placeholders.
    pub unresolved_pages: usize,

    /// Brands outside the external generation window, built from cached
    /// and local text only.
    pub deferred_brands: usize,

    /// Index of the first brand after the window, when brands were deferred.
    pub next_start: Option<usize>,

    /// Narrative cache and generation counters.
    pub narrative: NarratorStats,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

impl BuildStats {
    /// Total pages written.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.brand_pages + self.model_pages + self.repair_pages + self.other_pages
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    brand_pages: usize,
    model_pages: usize,
    repair_pages: usize,
    other_pages: usize,
    failed: usize,
    unresolved: usize,
}

impl Tally {
    fn record(&mut self, kind: PageKind) {
        match kind {
            PageKind::BrandIndex => self.brand_pages += 1,
            PageKind::Model => self.model_pages += 1,
            PageKind::Repair => self.repair_pages += 1,
            PageKind::Other => self.other_pages += 1,
        }
    }
}

impl Add for Tally {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            brand_pages: self.brand_pages + other.brand_pages,
            model_pages: self.model_pages + other.model_pages,
            repair_pages: self.repair_pages + other.repair_pages,
            other_pages: self.other_pages + other.other_pages,
            failed: self.failed + other.failed,
            unresolved: self.unresolved + other.unresolved,
        }
    }
}

/// Site builder that orchestrates the build process.
#[derive(Debug)]
pub struct SiteBuilder {
    config: Config,
    store: DataStore,
    narrator: Narrator,
    templates: TemplateRegistry,
    output_dir: PathBuf,
    external_window: Range<usize>,
}

impl SiteBuilder {
    /// Create a new builder with the built-in templates.
    #[must_use]
    pub fn new(
        config: Config,
        store: DataStore,
        narrator: Narrator,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            store,
            narrator,
            templates: TemplateRegistry::new(),
            output_dir: output_dir.into(),
            external_window: 0..usize::MAX,
        }
    }

    /// Only brands `start..start + batch` (in list order) may call the
    /// external generator; the rest use cached or local text. Every brand is
    /// still written.
    #[must_use]
    pub fn with_generation_window(mut self, start: usize, batch: Option<usize>) -> Self {
        let end = batch.map_or(usize::MAX, |batch| start.saturating_add(batch));
        self.external_window = start..end;
        self
    }

    /// Use a different template registry.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    /// The narrator, for inspecting counters after a build.
    #[must_use]
    pub fn narrator(&self) -> &Narrator {
        &self.narrator
    }

    /// Execute the full build.
    ///
    /// Existing files are overwritten; files from earlier runs that are no
    /// longer produced are left in place.
    pub fn build(&self) -> Result<BuildStats> {
        let start = Instant::now();
        let brands = self.store.brands();

        info!(
            brands = brands.len(),
            models = self.store.model_count(),
            output = %self.output_dir.display(),
            "starting build"
        );

        fs::create_dir_all(&self.output_dir)?;

        let home = self.emit(self.render_home());
        let per_brand = if self.config.build.parallel {
            brands
                .par_iter()
                .enumerate()
                .map(|(i, brand)| self.build_brand(brand, self.external_window.contains(&i)))
                .reduce(Tally::default, Tally::add)
        } else {
            brands
                .iter()
                .enumerate()
                .map(|(i, brand)| self.build_brand(brand, self.external_window.contains(&i)))
                .fold(Tally::default(), Tally::add)
        };
        let tally = home + per_brand;
        let deferred_brands = (0..brands.len())
            .filter(|i| !self.external_window.contains(i))
            .count();
        let next_start = (self.external_window.end < brands.len())
            .then_some(self.external_window.end);

        let stats = BuildStats {
            brands: brands.len(),
            brand_pages: tally.brand_pages,
            model_pages: tally.model_pages,
            repair_pages: tally.repair_pages,
            other_pages: tally.other_pages,
            failed_pages: tally.failed,
            unresolved_pages: tally.unresolved,
            deferred_brands,
            next_start,
            narrative: self.narrator.stats(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            pages = stats.pages(),
            failed = stats.failed_pages,
            generated = stats.narrative.external_calls,
            cached = stats.narrative.cache_hits,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }

    fn build_brand(&self, brand: &Brand, external: bool) -> Tally {
        debug!(brand = %brand.name, external, "building brand");
        let models = self.store.models_for(&brand.id);

        let mut tally = self.emit(self.render_brand_index(brand, models, external));
        for model in models {
            tally = tally + self.emit(self.render_model(brand, model, external));
        }
        for repair in &REPAIR_TYPES {
            tally = tally + self.emit(self.render_repair(brand, repair, external));
        }
        tally
    }

    fn narrative(&self, request: &NarrativeRequest, external: bool) -> String {
        if external {
            self.narrator.section(request)
        } else {
            self.narrator.cached_section(request)
        }
    }

    /// Check and write one rendered page, counting the outcome.
    fn emit(&self, rendered: Result<Page>) -> Tally {
        let mut tally = Tally::default();
        let result = rendered
            .and_then(|page| self.check_placeholders(page, &mut tally))
            .and_then(|page| self.write_page(&page).map(|()| page.kind));

        match result {
            Ok(kind) => tally.record(kind),
            Err(e) => {
                warn!(error = %e, "failed to generate page");
                tally.failed += 1;
            }
        }
        tally
    }

    fn check_placeholders(&self, page: Page, tally: &mut Tally) -> Result<Page> {
        if !page.kind.is_model_bound() {
            return Ok(page);
        }
        let names = unresolved_placeholders(&page.content);
        if names.is_empty() {
            return Ok(page);
        }

        tally.unresolved += 1;
        if self.config.build.strict_placeholders {
            return Err(BuildError::UnresolvedPlaceholder {
                path: page.path,
                names,
            });
        }
        warn!(
            path = %page.path.display(),
            placeholders = %names.join(", "),
            "page has unresolved placeholders"
        );
        Ok(page)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let output_path = self.output_dir.join(&page.path);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output_path, &page.content)?;
        debug!(path = %output_path.display(), kind = page.kind.as_str(), "wrote page");
        Ok(())
    }

    fn base_context(&self, brand: &Brand) -> TemplateContext {
        TemplateContext::new()
            .with_var("lang", &self.config.site.language)
            .with_var("siteTitle", escape_html(&self.config.site.title))
            .with_var("storeUrl", &self.config.site.store_url)
            .with_var("brandName", escape_html(&brand.name))
            .with_var("brandSlug", brand.slug())
            .with_var("extraHead", "")
    }

    fn render_home(&self) -> Result<Page> {
        let title = escape_html(&self.config.site.title);
        let ctx = TemplateContext::new()
            .with_var("lang", &self.config.site.language)
            .with_var("pageTitle", title.as_str())
            .with_var(
                "pageDescription",
                format!("{title}: guías de reparación de calefones por marca y modelo."),
            )
            .with_var("currentUrl", self.config.url_for(""))
            .with_var("siteTitle", title.as_str())
            .with_var("brandListHtml", fragments::brand_list(self.store.brands()));

        let content = self.templates.assemble("home", &ctx)?;
        Ok(Page::new("index.html", content, PageKind::Other))
    }

    fn render_brand_index(&self, brand: &Brand, models: &[Model], external: bool) -> Result<Page> {
        let path = Page::brand_index_path(brand.slug());
        let name = escape_html(&brand.name);
        let intro = self.narrative(&NarrativeRequest::brand_intro(brand), external);
        let resistance = models
            .first()
            .map(|m| m.specs.resistance_kind)
            .unwrap_or(ResistanceKind::Standard);

        let mut ctx = self
            .base_context(brand)
            .with_var(
                "pageTitle",
                format!("Reparación de Calefones {name} - Guía Técnica Completa"),
            )
            .with_var(
                "pageDescription",
                format!(
                    "Guía completa de reparación para calefones {name}. Diagnóstico de fallas, \
                     reemplazo de resistencias, termostatos y mantenimiento preventivo."
                ),
            )
            .with_var("currentUrl", self.config.url_for(&format!("{}/", brand.slug())))
            .with_var("h1Title", format!("Calefones {name}"))
            .with_var("subtitle", "Reparación profesional y diagnóstico técnico")
            .with_var("currentPageTitle", "Inicio")
            .with_var("introContent", prose(&intro))
            .with_var("modelListHtml", fragments::model_list(models))
            .with_var("diagnosisCards", fragments::diagnosis_cards(&brand.name, resistance))
            .with_var("repairGuides", fragments::repair_guide_cards("./"));

        // Model-only sections are hidden on the index; blank their fields.
        for key in [
            "specResistencia",
            "specTermostato",
            "specAnodo",
            "specHerramientas",
            "errorTableRows",
            "maintAnodo",
            "maintLimpieza",
            "maintValvula",
        ] {
            ctx.insert(key, "");
        }

        let html = self.templates.assemble("layout", &ctx)?;
        let html = suppress_sections(
            &html,
            &[Section::Specs, Section::Errores, Section::Mantenimiento],
        );
        Ok(Page::new(path, html, PageKind::BrandIndex))
    }

    fn render_model(&self, brand: &Brand, model: &Model, external: bool) -> Result<Page> {
        if !model.has_safe_id() {
            return Err(BuildError::MissingInput {
                path: Path::new(brand.slug()).join("modelos"),
                reason: format!("model '{}' has no usable id ({:?})", model.name, model.id),
            });
        }

        let path = Page::model_path(brand.slug(), &model.id);
        let brand_name = escape_html(&brand.name);
        let model_name = escape_html(&model.name);
        let specs = &model.specs;
        let maintenance = model.maintenance_or_default();
        let intro = self.narrative(&NarrativeRequest::model_intro(brand, model), external);

        let ctx = self
            .base_context(brand)
            .with_var(
                "pageTitle",
                format!("Calefón {brand_name} {model_name} - Especificaciones y Reparación"),
            )
            .with_var(
                "pageDescription",
                format!(
                    "Guía técnica completa del calefón {brand_name} {model_name}. \
                     Especificaciones, códigos de error, repuestos y mantenimiento."
                ),
            )
            .with_var(
                "currentUrl",
                self.config
                    .url_for(&format!("{}/modelos/{}.html", brand.slug(), model.id)),
            )
            .with_var("h1Title", format!("{brand_name} {model_name}"))
            .with_var("subtitle", escape_html(&model.description))
            .with_var("currentPageTitle", model_name.as_str())
            .with_var("introContent", prose(&intro))
            .with_var("specResistencia", spec_or_na(specs.resistance.as_deref()))
            .with_var("specTermostato", spec_or_na(specs.thermostat.as_deref()))
            .with_var("specAnodo", spec_or_na(specs.anode.as_deref()))
            .with_var("specHerramientas", escape_html(&specs.tools.join(", ")))
            .with_var("errorTableRows", fragments::error_rows(&model.error_codes))
            .with_var("maintAnodo", escape_html(&maintenance.anodo))
            .with_var("maintLimpieza", escape_html(&maintenance.limpieza))
            .with_var("maintValvula", escape_html(&maintenance.valvula))
            .with_var(
                "diagnosisCards",
                fragments::diagnosis_cards(&brand.name, specs.resistance_kind),
            )
            .with_var("repairGuides", fragments::repair_guide_cards("../"))
            .with_var("modelListHtml", "");

        let html = self.templates.assemble("layout", &ctx)?;
        let parts = fragments::spare_parts(specs, &self.config.site.store_url);
        let html = match insert_before(&html, MAINTENANCE_MARKER, &parts) {
            Some(html) => html,
            None => {
                debug!(path = %path.display(), "layout has no maintenance marker, spare parts omitted");
                html
            }
        };
        let html = suppress_sections(&html, &[Section::Modelos]);
        Ok(Page::new(path, html, PageKind::Model))
    }

    fn render_repair(&self, brand: &Brand, repair: &RepairType, external: bool) -> Result<Page> {
        let path = Page::repair_path(brand.slug(), repair.id);
        let name = escape_html(&brand.name);
        let body = self.narrative(&NarrativeRequest::repair_guide(brand, repair), external);
        let store = self.config.site.store_url.trim_end_matches('/');

        let ctx = self
            .base_context(brand)
            .with_var(
                "pageTitle",
                format!("{} - Calefón {name} | Guía Paso a Paso", repair.title),
            )
            .with_var(
                "pageDescription",
                format!(
                    "Guía completa paso a paso para {} en calefones {name}. Herramientas, \
                     medidas de seguridad y procedimiento detallado.",
                    repair.title.to_lowercase()
                ),
            )
            .with_var(
                "currentUrl",
                self.config
                    .url_for(&format!("{}/reparaciones/{}.html", brand.slug(), repair.id)),
            )
            .with_var("h1Title", format!("{} - {name}", repair.title))
            .with_var(
                "subtitle",
                format!(
                    "Dificultad: {} · Tiempo estimado: {}",
                    repair.difficulty, repair.duration
                ),
            )
            .with_var("repairTitle", repair.title)
            .with_var("repairContent", body)
            .with_var("otherRepairs", fragments::other_repairs(repair.id))
            .with_var("storeUrl", format!("{store}/{}", repair.store_path));

        let html = self.templates.assemble("repair", &ctx)?;
        Ok(Page::new(path, html, PageKind::Repair))
    }
}

fn prose(inner: &str) -> String {
    format!("<div class=\"prose prose-lg max-w-none\">\n{inner}\n</div>")
}

fn spec_or_na(value: Option<&str>) -> String {
    value.map_or_else(|| "N/A".to_string(), escape_html)
}
