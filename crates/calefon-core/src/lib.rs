//! Calefon Core Library
//!
//! Core types, configuration, and error handling for the calefon repair-guide site generator.

pub mod catalog;
pub mod config;
pub mod error;
pub mod page;
pub mod store;

pub use catalog::{
    Brand, BrandId, CatalogEntry, ErrorCode, Maintenance, Model, ResistanceKind, Specs,
    ThermostatKind, slugify,
};
pub use config::Config;
pub use error::{CoreError, Result};
pub use page::{Page, PageKind};
pub use store::DataStore;
