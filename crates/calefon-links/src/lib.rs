//! Calefon Links Library
//!
//! Post-build passes over the output tree: checking that every internal page
//! reference resolves to a file, and rewriting renamed link targets.

pub mod repair;
pub mod scan;
pub mod verify;

pub use repair::{LinkRepairer, RepairError, RepairReport, RewriteRule, default_rules};
pub use verify::{
    BrokenLink, LinkGraphVerifier, ReferenceKind, ResolveRule, Resolved, VerifyError,
    VerifyReport, classify_reference, resolve_reference, suggest_similar,
};
