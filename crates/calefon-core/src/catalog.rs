//! Catalog data model.
//!
//! Brands, models and their technical specifications, as read from the
//! brand list and catalog JSON files.

use std::{
    fmt,
    path::{Component, Path},
};

use serde::{Deserialize, Serialize};

/// Derive the URL slug for a brand display name.
///
/// Surrounding whitespace is dropped, inner whitespace runs become a single
/// hyphen and the result is lowercased. Applying it twice gives the same
/// result as applying it once.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Stable identifier for a brand, equal to its slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandId(String);

impl BrandId {
    /// Build the identifier from a display name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(slugify(name))
    }

    /// The slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A brand from the brand list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brand {
    /// Display name, exactly as listed.
    pub name: String,

    /// Slug derived from the name.
    pub id: BrandId,
}

impl Brand {
    /// Create a brand from its display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = BrandId::from_name(&name);
        Self { name, id }
    }

    /// The brand slug.
    #[must_use]
    pub fn slug(&self) -> &str {
        self.id.as_str()
    }
}

/// Heating element mounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResistanceKind {
    Rosca,
    Brida,
    #[default]
    Standard,
}

impl ResistanceKind {
    /// Classify free-form spec text. "rosca" wins over "brida" when both appear.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("rosca") {
            Self::Rosca
        } else if lower.contains("brida") {
            Self::Brida
        } else {
            Self::Standard
        }
    }
}

/// Thermostat type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermostatKind {
    Varilla,
    Contacto,
    Digital,
    #[default]
    Standard,
}

impl ThermostatKind {
    /// Classify free-form spec text.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("varilla") {
            Self::Varilla
        } else if lower.contains("contacto") {
            Self::Contacto
        } else if lower.contains("digital") {
            Self::Digital
        } else {
            Self::Standard
        }
    }
}

/// Technical specification of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specs {
    /// Heating element description.
    #[serde(rename = "resistencia", default)]
    pub resistance: Option<String>,

    /// Thermostat description.
    #[serde(rename = "termostato", default)]
    pub thermostat: Option<String>,

    /// Anode description.
    #[serde(rename = "anodo", default)]
    pub anode: Option<String>,

    /// Tools needed for repairs.
    #[serde(rename = "herramientas", default)]
    pub tools: Vec<String>,

    /// Assigned by [`Specs::classify`] at load time.
    #[serde(skip)]
    pub resistance_kind: ResistanceKind,

    #[serde(skip)]
    pub thermostat_kind: ThermostatKind,
}

impl Specs {
    /// Assign the enumerated kinds from the free-form descriptions.
    pub fn classify(&mut self) {
        self.resistance_kind = ResistanceKind::classify(self.resistance.as_deref().unwrap_or(""));
        self.thermostat_kind = ThermostatKind::classify(self.thermostat.as_deref().unwrap_or(""));
    }
}

/// A fault code shown by the appliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode {
    pub code: String,

    #[serde(rename = "desc")]
    pub description: String,

    #[serde(rename = "sol")]
    pub solution: String,
}

/// Maintenance intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintenance {
    #[serde(default = "default_anode_interval")]
    pub anodo: String,

    #[serde(default = "default_cleaning_interval")]
    pub limpieza: String,

    #[serde(default = "default_valve_interval")]
    pub valvula: String,
}

fn default_anode_interval() -> String {
    "Anualmente".to_string()
}

fn default_cleaning_interval() -> String {
    "Cada 2 años".to_string()
}

fn default_valve_interval() -> String {
    "Semestralmente".to_string()
}

impl Default for Maintenance {
    fn default() -> Self {
        Self {
            anodo: default_anode_interval(),
            limpieza: default_cleaning_interval(),
            valvula: default_valve_interval(),
        }
    }
}

/// A water-heater model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Identifier used as the page file stem.
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub specs: Specs,

    #[serde(default)]
    pub error_codes: Vec<ErrorCode>,

    #[serde(default)]
    pub maintenance: Option<Maintenance>,
}

impl Model {
    /// Maintenance schedule, falling back to the default intervals.
    #[must_use]
    pub fn maintenance_or_default(&self) -> Maintenance {
        self.maintenance.clone().unwrap_or_default()
    }

    /// Whether the id can name a single page file under `modelos/`.
    ///
    /// Rejects empty ids, separators and relative components, so a model
    /// page can never be written outside its brand directory.
    #[must_use]
    pub fn has_safe_id(&self) -> bool {
        let id = self.id.trim();
        !id.is_empty()
            && id == self.id
            && !id.contains(['/', '\\'])
            && matches!(
                Path::new(id).components().collect::<Vec<_>>().as_slice(),
                [Component::Normal(_)]
            )
    }
}

/// Catalog record binding a brand to its models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Brand display name.
    pub brand: String,

    /// Explicit brand slug, used when the display name does not match exactly.
    #[serde(default)]
    pub id: Option<BrandId>,

    #[serde(default)]
    pub models: Vec<Model>,
}
