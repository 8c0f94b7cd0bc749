//! Engine session context
//!
//! One [`EngineContext`] owns the collaborators a reconciler needs: the
//! plate registry, the resource resolver and the schema validator. It is
//! built once per session and passed to [`StateReconciler`](crate::StateReconciler).

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::validate::{AcceptAll, JsonSchemaValidator, SchemaValidator};
use abr_data::{HttpDataSource, LocalCacheSource, ResourceResolver};
use abr_registry::TypeRegistry;
use std::sync::Arc;

/// Shared engine collaborators
#[derive(Clone)]
pub struct EngineContext {
    config: EngineConfig,
    registry: Arc<TypeRegistry>,
    resolver: ResourceResolver,
    validator: Arc<dyn SchemaValidator>,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("config", &self.config)
            .field("plate_types", &self.registry.len())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: Arc::new(TypeRegistry::with_defaults()),
            resolver: ResourceResolver::default(),
            validator: Arc::new(AcceptAll),
        }
    }
}

impl EngineContext {
    /// Wire collaborators from configuration
    ///
    /// Layers are added local cache first, then the data server.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configured schema cannot be loaded
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        let mut builder = ResourceResolver::builder();
        if let Some(capacity) = config.cache_capacity {
            builder = builder.capacity(capacity);
        }
        if let Some(dir) = &config.cache_dir {
            builder = builder.layer(Arc::new(LocalCacheSource::new(dir.clone())));
        }
        if let Some(url) = &config.data_server {
            builder = builder.layer(Arc::new(HttpDataSource::new(url.clone())));
        }

        let validator: Arc<dyn SchemaValidator> = match &config.schema_path {
            Some(path) => Arc::new(JsonSchemaValidator::from_file(path)?),
            None => Arc::new(AcceptAll),
        };

        tracing::info!(
            "Engine context ready (local cache: {}, data server: {}, schema: {})",
            config.cache_dir.is_some(),
            config.data_server.is_some(),
            config.schema_path.is_some()
        );

        Ok(Self {
            config,
            registry: Arc::new(TypeRegistry::with_defaults()),
            resolver: builder.build(),
            validator,
        })
    }

    /// With custom plate registry
    #[must_use]
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// With custom resolver
    #[must_use]
    pub fn with_resolver(mut self, resolver: ResourceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// With custom validator
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn shared_registry(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry)
    }

    #[inline]
    #[must_use]
    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    #[inline]
    #[must_use]
    pub fn validator(&self) -> &dyn SchemaValidator {
        self.validator.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_has_builtin_plates() {
        let context = EngineContext::default();
        assert!(context.registry().contains("Surfaces"));
        assert!(context.registry().contains("Ribbons"));
        assert!(context.registry().contains("Glyphs"));
    }

    #[test]
    fn missing_schema_file_is_config_error() {
        let config = EngineConfig::new().with_schema_path("/definitely/not/here.json");
        assert!(matches!(
            EngineContext::from_config(config),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn schema_file_is_compiled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{ "type": "object", "required": ["impressions"] }"#).unwrap();

        let context = EngineContext::from_config(EngineConfig::new().with_schema_path(&path)).unwrap();
        assert!(context.validator().validate(&serde_json::json!({})).is_err());
        assert!(context
            .validator()
            .validate(&serde_json::json!({ "impressions": {} }))
            .is_ok());
    }
}
