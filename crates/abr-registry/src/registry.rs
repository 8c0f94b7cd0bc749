//! Plate type registry
//!
//! Provides [`TypeRegistry`], the static table mapping plate-type tags to
//! impression constructors and their declared input slots.

use crate::impression::{Impression, PlateType};
use crate::slot::InputSlot;
use abr_document::ImpressionId;
use indexmap::IndexMap;

/// Builds a fresh impression of one plate type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpressionConstructor {
    plate: PlateType,
}

impl ImpressionConstructor {
    #[inline]
    #[must_use]
    pub const fn new(plate: PlateType) -> Self {
        Self { plate }
    }

    #[inline]
    #[must_use]
    pub fn plate(&self) -> PlateType {
        self.plate
    }

    /// New impression with every slot unassigned
    #[must_use]
    pub fn construct(&self, id: ImpressionId) -> Impression {
        Impression::new(id, self.plate)
    }
}

#[derive(Debug, Clone)]
struct Registration {
    constructor: ImpressionConstructor,
    slots: &'static [InputSlot],
}

/// Registry of known plate types
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, Registration>,
}

impl TypeRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Create registry with the built-in plate catalog
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for plate in [PlateType::Surfaces, PlateType::Ribbons, PlateType::Glyphs] {
            registry.register(plate.tag(), ImpressionConstructor::new(plate), plate.slots());
        }
        registry
    }

    /// Register a plate type; replaces any previous entry for the tag
    pub fn register(
        &mut self,
        tag: &str,
        constructor: ImpressionConstructor,
        slots: &'static [InputSlot],
    ) {
        tracing::debug!("Registered plate type {} ({} slots)", tag, slots.len());
        self.types.insert(
            tag.to_string(),
            Registration {
                constructor,
                slots,
            },
        );
    }

    /// Constructor for a tag
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` for unregistered tags
    pub fn resolve(&self, tag: &str) -> Result<ImpressionConstructor, RegistryError> {
        self.types
            .get(tag)
            .map(|reg| reg.constructor)
            .ok_or_else(|| RegistryError::NotFound(tag.to_string()))
    }

    /// Declared slots for a tag, in declaration order
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` for unregistered tags
    pub fn input_slots_of(&self, tag: &str) -> Result<&'static [InputSlot], RegistryError> {
        self.types
            .get(tag)
            .map(|reg| reg.slots)
            .ok_or_else(|| RegistryError::NotFound(tag.to_string()))
    }

    /// Reverse lookup: tag registered for a plate type
    #[must_use]
    pub fn tag_of(&self, plate: PlateType) -> Option<&str> {
        self.types
            .iter()
            .find(|(_, reg)| reg.constructor.plate() == plate)
            .map(|(tag, _)| tag.as_str())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    /// Registered tags in registration order
    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.types.keys().map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Errors related to the type registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Tag not registered
    #[error("plate type '{0}' is not registered")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::ValueType;

    #[test]
    fn defaults_cover_catalog() {
        let registry = TypeRegistry::with_defaults();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.tags().collect::<Vec<_>>(),
            vec!["Surfaces", "Ribbons", "Glyphs"]
        );

        let slots = registry.input_slots_of("Ribbons").unwrap();
        assert_eq!(slots[0].name, "Key Data");
        assert_eq!(slots[0].value_type, ValueType::LineKeyData);
        assert_eq!(slots.len(), 11);
    }

    #[test]
    fn resolve_and_reverse() {
        let registry = TypeRegistry::with_defaults();
        let ctor = registry.resolve("Glyphs").unwrap();
        let impression = ctor.construct(ImpressionId::from("x"));
        assert_eq!(impression.plate(), PlateType::Glyphs);
        assert_eq!(registry.tag_of(impression.plate()), Some("Glyphs"));
    }

    #[test]
    fn unknown_tag_is_not_found() {
        let registry = TypeRegistry::with_defaults();
        assert_eq!(
            registry.resolve("Volumes"),
            Err(RegistryError::NotFound("Volumes".to_string()))
        );
        assert!(registry.input_slots_of("Volumes").is_err());
    }

    #[test]
    fn alias_tag_reuses_variant() {
        let mut registry = TypeRegistry::new();
        registry.register(
            "SimpleSurfaces",
            ImpressionConstructor::new(PlateType::Surfaces),
            PlateType::Surfaces.slots(),
        );
        assert!(registry.contains("SimpleSurfaces"));
        assert_eq!(registry.tag_of(PlateType::Surfaces), Some("SimpleSurfaces"));
        assert_eq!(registry.tag_of(PlateType::Glyphs), None);
    }
}
