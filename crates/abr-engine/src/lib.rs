//! ABR Engine - State Reconciliation
//!
//! Keeps a live scene of data impressions synchronized with declarative
//! state documents:
//! - Validates incoming documents against a JSON schema
//! - Diffs them against the last applied document
//! - Resolves dataset and vis asset references through the layered cache
//! - Rebuilds only changed impressions and applies the result atomically
//! - Serializes the live scene back into a canonical document
//!
//! # Example
//!
//! ```rust,ignore
//! use abr_engine::{EngineConfig, EngineContext, FileStateLoader, StateReconciler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::load("abr.toml".as_ref())?;
//! let reconciler = StateReconciler::new(EngineContext::from_config(config)?);
//!
//! let loader = FileStateLoader::new("states", "saved");
//! let report = reconciler.load_from(&loader, "Basic").await?;
//! println!("{} impressions created, {} skipped", report.created, report.skipped.len());
//!
//! reconciler.save_to(&loader).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod phase;
pub mod reconcile;
pub mod scene;
pub mod serialize;
pub mod validate;

pub use config::EngineConfig;
pub use context::EngineContext;
pub use error::{
    ConfigError, EngineError, LoaderError, SerializeError, SoftFailure, ValidationIssue,
};
pub use loader::{BundledStateLoader, FileStateLoader, HttpStateLoader, StateLoader};
pub use phase::{allowed_transitions, validate_transition, ReconcilePhase};
pub use reconcile::{LoadReport, StateReconciler};
pub use scene::{
    Group, ImpressionSummary, LightRig, LiveScene, SceneHandle, SceneSummary, DEFAULT_GROUP_NAME,
    LIGHT_PARENT,
};
pub use serialize::serialize_scene;
pub use validate::{AcceptAll, JsonSchemaValidator, SchemaValidator};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{
        EngineConfig, EngineContext, EngineError, LoadReport, SceneSummary, SoftFailure,
        StateLoader, StateReconciler,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn empty_document_round_trips() {
        let reconciler = StateReconciler::new(EngineContext::default());
        let report = reconciler
            .load_document(json!({ "impressions": {}, "uiData": { "tab": 2 } }))
            .await
            .unwrap();
        assert_eq!(report, LoadReport::default());

        let serialized = reconciler.serialize_value().await.unwrap();
        assert_eq!(serialized["version"], json!("0.2.0"));
        assert_eq!(serialized["uiData"], json!({ "tab": 2 }));
    }

    #[tokio::test]
    async fn unknown_plate_type_is_reported_not_fatal() {
        let reconciler = StateReconciler::new(EngineContext::default());
        let report = reconciler
            .load_document(json!({
                "impressions": {
                    "v": { "plateType": "Volumes" },
                    "g": { "plateType": "Glyphs" }
                }
            }))
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].impression().map(|id| id.as_str()),
            Some("v")
        );
    }
}
