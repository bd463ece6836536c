//! End-to-end tests for the generator.
//!
//! These tests build complete sites into temporary directories, including the
//! sample data shipped with the repository.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use calefon_core::{CatalogEntry, Config, DataStore, config::SiteConfig};
use calefon_generator::{
    ContentCache, GenerationError, JsonFileStore, NarrativeRequest, Narrator, REPAIR_TYPES,
    RobotsGenerator, SiteBuilder, SitemapEmitter, TextGenerator,
};
use tempfile::TempDir;
use walkdir::WalkDir;

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// External generator that counts its calls.
struct Counting(Arc<AtomicUsize>);

impl TextGenerator for Counting {
    fn generate(&self, request: &NarrativeRequest) -> Result<String, GenerationError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "```html\n<section><p>Texto generado para {}</p></section>\n```",
            request.cache_key()
        ))
    }
}

fn fixture_store() -> DataStore {
    let catalog: Vec<CatalogEntry> = serde_json::from_value(serde_json::json!([
        {
            "brand": "James",
            "models": [{
                "id": "j-60",
                "name": "J 60",
                "description": "Calefón de 60 litros",
                "specs": {"resistencia": "Rosca 1500W", "termostato": "Contacto"}
            }]
        },
        {
            "brand": "Thermo Star",
            "models": [{
                "id": "ts-80",
                "name": "TS 80",
                "description": "Calefón de 80 litros",
                "specs": {"resistencia": "Brida 2000W", "termostato": "Digital"}
            }]
        }
    ]))
    .unwrap();
    DataStore::from_parts(
        vec!["James".into(), "Thermo Star".into(), "Orion".into()],
        catalog,
    )
    .unwrap()
}

fn config() -> Config {
    Config::new(SiteConfig::new("Calefones", "https://example.com"))
}

fn read_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().display().to_string();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

#[test]
fn test_sample_site_config_loads() {
    let config_path = workspace_root().join("calefon.toml");

    let config = Config::load(&config_path).expect("Config should load");
    assert_eq!(config.site.language, "es");
    assert!(!config.generation.enabled);
}

#[test]
fn test_sample_site_builds() {
    let data = workspace_root().join("data");

    let store = DataStore::load(&data.join("brands.json"), &data.join("catalog.json"))
        .expect("sample data should load");
    let brand_count = store.brands().len();
    let model_count = store.model_count();
    assert!(model_count > 0);

    let output = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = ContentCache::new(JsonFileStore::open(cache_dir.path().join("c.json")).unwrap());
    let stats = SiteBuilder::new(config(), store, Narrator::offline(cache), output.path())
        .build()
        .unwrap();

    assert_eq!(stats.failed_pages, 0);
    assert_eq!(stats.brand_pages, brand_count);
    assert_eq!(stats.model_pages, model_count);
    assert_eq!(stats.repair_pages, brand_count * REPAIR_TYPES.len());

    let urls = SitemapEmitter::new("https://example.com")
        .write(output.path())
        .unwrap();
    assert_eq!(urls, stats.pages());
}

#[test]
fn test_rebuild_after_restart_is_identical_without_new_calls() {
    let output = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache_path = cache_dir.path().join("generated_content.json");
    let calls = Arc::new(AtomicUsize::new(0));

    let first = {
        let cache = ContentCache::new(JsonFileStore::open(&cache_path).unwrap());
        let narrator = Narrator::new(cache, Box::new(Counting(Arc::clone(&calls))));
        let stats = SiteBuilder::new(config(), fixture_store(), narrator, output.path())
            .build()
            .unwrap();
        assert_eq!(stats.narrative.external_calls, calls.load(Ordering::SeqCst));
        read_tree(output.path())
    };

    // brand intros + model intros + repair guides
    let expected_calls = 3 + 2 + 3 * REPAIR_TYPES.len();
    assert_eq!(calls.load(Ordering::SeqCst), expected_calls);

    let cache = ContentCache::new(JsonFileStore::open(&cache_path).unwrap());
    assert_eq!(cache.keys().unwrap().len(), expected_calls);
    let narrator = Narrator::new(cache, Box::new(Counting(Arc::clone(&calls))));
    let stats = SiteBuilder::new(config(), fixture_store(), narrator, output.path())
        .build()
        .unwrap();

    assert_eq!(stats.narrative.external_calls, 0);
    assert_eq!(stats.narrative.cache_hits, expected_calls);
    assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    assert_eq!(read_tree(output.path()), first);
}

#[test]
fn test_generated_text_is_cleaned_before_use() {
    let output = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = ContentCache::new(JsonFileStore::open(cache_dir.path().join("c.json")).unwrap());
    let narrator = Narrator::new(cache, Box::new(Counting(Arc::new(AtomicUsize::new(0)))));
    SiteBuilder::new(config(), fixture_store(), narrator, output.path())
        .build()
        .unwrap();

    let html = fs::read_to_string(output.path().join("james/index.html")).unwrap();
    assert!(html.contains("<p>Texto generado para brand_intro_james</p>"));
    assert!(!html.contains("```"));
}

#[test]
fn test_brand_without_models_gets_index_and_repairs() {
    let output = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let cache = ContentCache::new(JsonFileStore::open(cache_dir.path().join("c.json")).unwrap());
    SiteBuilder::new(config(), fixture_store(), Narrator::offline(cache), output.path())
        .build()
        .unwrap();

    assert!(output.path().join("orion/index.html").exists());
    assert!(!output.path().join("orion/modelos").exists());
    for repair in &REPAIR_TYPES {
        let path = output
            .path()
            .join("orion/reparaciones")
            .join(format!("{}.html", repair.id));
        assert!(path.exists(), "missing {}", path.display());
    }
}

#[test]
fn test_robots_and_sitemap_together() {
    let output = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let config = config();
    let cache = ContentCache::new(JsonFileStore::open(cache_dir.path().join("c.json")).unwrap());
    SiteBuilder::new(
        config.clone(),
        fixture_store(),
        Narrator::offline(cache),
        output.path(),
    )
    .build()
    .unwrap();

    SitemapEmitter::new(&config.site.base_url)
        .write(output.path())
        .unwrap();
    RobotsGenerator::new(config.robots.clone(), &config.site)
        .generate(output.path())
        .unwrap();

    let sitemap = fs::read_to_string(output.path().join("sitemap.xml")).unwrap();
    assert!(sitemap.contains("<loc>https://example.com/</loc>"));
    assert!(sitemap.contains("<loc>https://example.com/james/modelos/j-60.html</loc>"));
    let robots = fs::read_to_string(output.path().join("robots.txt")).unwrap();
    assert!(robots.contains("Sitemap: https://example.com/sitemap.xml"));
}
