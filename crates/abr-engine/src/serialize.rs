//! Canonical document from the live scene
//!
//! Reads the scene only; never drives a reconciliation pass.

use crate::error::SerializeError;
use crate::scene::LiveScene;
use abr_data::{Dataset, ScalarVariable};
use abr_document::{
    DataRanges, GroupSpec, ImpressionSpec, InputRef, Range, RenderHints, SceneSpec, StateDocument,
    STATE_VERSION,
};
use abr_registry::{Impression, InputValue, TypeRegistry};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Write the live scene as a state document
///
/// `scalarRanges` holds only customized variables, taken from impression
/// inputs and from `datasets`. `ui_data` and `local_vis_assets` come from the
/// previously loaded document and are passed through untouched.
///
/// # Errors
/// Returns `SerializeError::UnregisteredPlate` if a live impression's plate
/// type has no tag in `registry`
pub fn serialize_scene(
    scene: &LiveScene,
    registry: &TypeRegistry,
    datasets: &[Arc<Dataset>],
    ui_data: Option<Value>,
    local_vis_assets: BTreeMap<String, Value>,
) -> Result<StateDocument, SerializeError> {
    let mut impressions = BTreeMap::new();
    let mut scalar_ranges = BTreeMap::new();

    for impression in scene.impressions() {
        let spec = impression_spec(impression, registry)?;
        impressions.insert(impression.id().clone(), spec);

        for (_, value) in impression.inputs() {
            if let Some(variable) = value.as_scalar() {
                record_range(&mut scalar_ranges, variable);
            }
        }
    }
    for dataset in datasets {
        for variable in dataset.scalar_vars() {
            record_range(&mut scalar_ranges, variable);
        }
    }

    let groups = scene
        .groups()
        .map(|group| {
            let spec = GroupSpec {
                uuid: Some(group.id().clone()),
                name: group.name().to_string(),
                impressions: group.members().cloned().collect(),
                container_bounds: group.bounds(),
                root_position: group.position(),
                root_rotation: group.rotation(),
            };
            (group.id().clone(), spec)
        })
        .collect();

    Ok(StateDocument {
        version: Some(STATE_VERSION.to_string()),
        impressions,
        scene: SceneSpec {
            groups,
            lighting: scene.lights().iter().cloned().collect(),
        },
        data_ranges: DataRanges { scalar_ranges },
        local_vis_assets,
        ui_data,
    })
}

fn impression_spec(
    impression: &Impression,
    registry: &TypeRegistry,
) -> Result<ImpressionSpec, SerializeError> {
    let tag = registry
        .tag_of(impression.plate())
        .ok_or_else(|| SerializeError::UnregisteredPlate {
            impression: impression.id().clone(),
            plate: impression.plate().to_string(),
        })?;
    let slots = registry.input_slots_of(tag).unwrap_or_default();

    let mut spec = ImpressionSpec::new(tag);
    spec.uuid = Some(impression.id().clone());
    spec.name = impression.name().map(str::to_string);
    spec.tags = impression.tags().to_vec();
    spec.render_hints = Some(RenderHints {
        visible: impression.render_hints().visible,
        changed: false,
    });

    for (slot_name, value) in impression.inputs() {
        let mut input = input_ref(value);
        if let Some(slot) = slots.iter().find(|slot| slot.name == slot_name) {
            input = input.with_parameter(slot.parameter_name);
        }
        spec.input_values.insert(slot_name.to_string(), input);
    }
    Ok(spec)
}

fn input_ref(value: &InputValue) -> InputRef {
    InputRef::new(value.genre(), value.reference()).with_type(value.value_type().name())
}

fn record_range(ranges: &mut BTreeMap<String, Range>, variable: &ScalarVariable) {
    if let Some(range) = variable.custom_range() {
        ranges.insert(variable.path().to_string(), range);
    }
}
