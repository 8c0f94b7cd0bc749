//! ABR Data
//!
//! Datasets, vis assets, and the layered resolver that loads them.
//!
//! # Core Concepts
//!
//! - [`Dataset`]: key data and variables under one dataset path
//! - [`VisAsset`]: colormaps, glyphs and textures identified by uuid
//! - [`DataSource`]: one lookup layer (local cache, data server, test doubles)
//! - [`ResourceResolver`]: memory → embedded → sources, one load per key
//!
//! # Example
//!
//! ```rust,ignore
//! use abr_data::{LocalCacheSource, ResourceKey, ResourceResolver};
//! use std::sync::Arc;
//!
//! let resolver = ResourceResolver::builder()
//!     .layer(Arc::new(LocalCacheSource::new("~/.abr/cache")))
//!     .build();
//! let outcome = resolver.resolve(&ResourceKey::dataset("Org/Ocean")).await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod dataset;
mod resolver;
mod source;
mod visasset;

pub use dataset::{
    DataEntry, DataError, Dataset, KeyData, KeyDataKind, ScalarVariable, Topology, VariableRange,
    VectorVariable,
};
pub use resolver::{Resolution, ResolvedResource, ResolverBuilder, ResourceResolver, UnresolvedReason};
pub use source::{
    DataSource, FetchError, HttpDataSource, LocalCacheSource, Provenance, Resource, ResourceKey,
    ResourceKind,
};
pub use visasset::{VisAsset, VisAssetKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
