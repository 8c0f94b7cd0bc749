//! ABR Type Registry
//!
//! Closed catalog of impression plate types, their input slots, and the
//! primitive constructors used to fill literal-valued slots.
//!
//! # Core Concepts
//!
//! - [`TypeRegistry`]: plate-type tag → constructor + declared slots
//! - [`InputSlot`]: slot name, parameter group and accepted [`ValueType`]
//! - [`Impression`]: live instance, tagged with its [`PlateType`]
//! - [`RenderCapability`]: hooks every plate type implements
//!
//! # Example
//!
//! ```rust,ignore
//! use abr_registry::TypeRegistry;
//!
//! let registry = TypeRegistry::with_defaults();
//! let ctor = registry.resolve("Surfaces")?;
//! let mut impression = ctor.construct("id1".into());
//! for slot in registry.input_slots_of("Surfaces")? {
//!     impression.assign(slot.name, None);
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod impression;
mod primitive;
mod registry;
mod slot;
mod value;

pub use impression::{Geometry, Impression, PlateType, RenderCapability, RenderState, Style};
pub use primitive::{Primitive, PrimitiveError};
pub use registry::{ImpressionConstructor, RegistryError, TypeRegistry};
pub use slot::{InputSlot, ValueType};
pub use value::InputValue;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use abr_data::Dataset;
    use abr_document::ImpressionId;
    use serde_json::json;

    #[test]
    fn every_declared_slot_can_be_cleared_then_filled() {
        let registry = TypeRegistry::with_defaults();
        let dataset = Dataset::from_manifest(
            "ds1",
            &json!({
                "keyData": { "mesh1": { "topology": "Triangles", "pointCount": 4 } },
                "scalarVars": { "temp": { "min": 0.0, "max": 1.0 } }
            }),
        )
        .unwrap();

        let mut impression = registry
            .resolve("Surfaces")
            .unwrap()
            .construct(ImpressionId::from("id1"));
        for slot in registry.input_slots_of("Surfaces").unwrap() {
            impression.assign(slot.name, None);
        }

        let key = InputValue::KeyData(dataset.key_data("mesh1").unwrap());
        let slots = registry.input_slots_of("Surfaces").unwrap();
        assert!(slots[0].value_type.accepts(&key));
        impression.assign(slots[0].name, Some(key));

        let temp = InputValue::Scalar(dataset.scalar_var("temp").unwrap());
        assert!(!slots[0].value_type.accepts(&temp));
        assert!(slots[1].value_type.accepts(&temp));

        assert_eq!(
            impression.input("Key Data").map(InputValue::reference),
            Some("ds1/KeyData/mesh1".to_string())
        );
        assert!(PlateType::Surfaces
            .slots()
            .iter()
            .all(|slot| impression.has_slot(slot.name)));
    }
}
