//! Brand and catalog loading.
//!
//! The [`DataStore`] reads the brand list and the catalog once per run,
//! joins each catalog record to its brand and classifies model specs.
//! It is read-only after loading.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    catalog::{Brand, BrandId, CatalogEntry, Model},
    error::{CoreError, Result},
};

/// Indexed brand and catalog data.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    brands: Vec<Brand>,
    catalog: HashMap<BrandId, CatalogEntry>,
}

impl DataStore {
    /// Load the brand list and catalog from JSON files.
    ///
    /// A missing brand list is an error. A missing catalog yields brands
    /// without models.
    pub fn load(brands_path: &Path, catalog_path: &Path) -> Result<Self> {
        if !brands_path.exists() {
            return Err(CoreError::missing_input(brands_path));
        }
        let names: Vec<String> = read_json(brands_path)?;

        let catalog: Vec<CatalogEntry> = if catalog_path.exists() {
            read_json(catalog_path)?
        } else {
            warn!(path = %catalog_path.display(), "catalog not found, brands will have no models");
            Vec::new()
        };

        Self::index(names, catalog, brands_path, catalog_path)
    }

    /// Build a store from in-memory data.
    pub fn from_parts(brand_names: Vec<String>, catalog: Vec<CatalogEntry>) -> Result<Self> {
        Self::index(
            brand_names,
            catalog,
            Path::new("<brands>"),
            Path::new("<catalog>"),
        )
    }

    fn index(
        brand_names: Vec<String>,
        catalog: Vec<CatalogEntry>,
        brands_source: &Path,
        catalog_source: &Path,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut brands = Vec::with_capacity(brand_names.len());
        for name in brand_names {
            let brand = Brand::new(name);
            if brand.slug().is_empty() {
                return Err(CoreError::data(brands_source, "empty brand name"));
            }
            if !seen.insert(brand.id.clone()) {
                return Err(CoreError::data(
                    brands_source,
                    format!("brand '{}' collides with slug '{}'", brand.name, brand.id),
                ));
            }
            brands.push(brand);
        }

        let by_name: HashMap<&str, &BrandId> =
            brands.iter().map(|b| (b.name.as_str(), &b.id)).collect();

        let mut joined: HashMap<BrandId, CatalogEntry> = HashMap::new();
        for mut entry in catalog {
            let id = match by_name.get(entry.brand.as_str()) {
                Some(id) => (*id).clone(),
                None => match entry.id.as_ref().filter(|id| seen.contains(*id)) {
                    Some(id) => id.clone(),
                    None => {
                        warn!(brand = %entry.brand, "catalog entry matches no listed brand");
                        continue;
                    }
                },
            };

            let mut model_ids = HashSet::new();
            for model in &mut entry.models {
                if !model_ids.insert(model.id.clone()) {
                    return Err(CoreError::data(
                        catalog_source,
                        format!("duplicate model id '{}' for brand '{}'", model.id, entry.brand),
                    ));
                }
                model.specs.classify();
            }

            if joined.contains_key(&id) {
                return Err(CoreError::data(
                    catalog_source,
                    format!("more than one catalog entry for brand '{id}'"),
                ));
            }
            joined.insert(id, entry);
        }

        debug!(
            brands = brands.len(),
            catalog = joined.len(),
            "data store indexed"
        );

        Ok(Self {
            brands,
            catalog: joined,
        })
    }

    /// Brands in input-list order.
    #[must_use]
    pub fn brands(&self) -> &[Brand] {
        &self.brands
    }

    /// Models bound to a brand; empty when the brand has no catalog entry.
    #[must_use]
    pub fn models_for(&self, id: &BrandId) -> &[Model] {
        self.catalog
            .get(id)
            .map(|entry| entry.models.as_slice())
            .unwrap_or(&[])
    }

    /// The catalog entry joined to a brand.
    #[must_use]
    pub fn catalog_entry(&self, id: &BrandId) -> Option<&CatalogEntry> {
        self.catalog.get(id)
    }

    /// Total number of models across all brands.
    #[must_use]
    pub fn model_count(&self) -> usize {
        self.catalog.values().map(|e| e.models.len()).sum()
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    let text = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
    serde_json::from_str(text).map_err(|e| CoreError::data(PathBuf::from(path), e.to_string()))
}
