//! End-to-end reconciliation behaviour

use abr_data::{ResourceKey, ResourceResolver};
use abr_document::{GroupId, ImpressionId};
use abr_engine::{
    EngineContext, EngineError, JsonSchemaValidator, LiveScene, SoftFailure, StateReconciler,
};
use abr_test_utils::{full_document, surface_document, MemorySource, COLORMAP, DATASET};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn engine(source: &Arc<MemorySource>) -> StateReconciler {
    let resolver = ResourceResolver::builder().layer(source.clone()).build();
    StateReconciler::new(EngineContext::default().with_resolver(resolver))
}

fn without_impression(mut document: Value, id: &str) -> Value {
    if let Some(impressions) = document["impressions"].as_object_mut() {
        impressions.remove(id);
    }
    document
}

#[tokio::test]
async fn surfaces_load_then_delete() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);

    let report = reconciler.load_document(surface_document()).await.unwrap();
    assert_eq!(report.created, 1);
    assert!(report.is_clean(), "{:?}", report.skipped);

    let summary = reconciler.scene().summary().await.unwrap();
    let id1 = &summary.impressions[&ImpressionId::from("id1")];
    assert_eq!(id1.plate.tag(), "Surfaces");
    assert_eq!(id1.inputs["Key Data"], "ds1/KeyData/mesh1");

    let report = reconciler
        .load_document(json!({ "impressions": {} }))
        .await
        .unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(reconciler.scene().read(LiveScene::len).await.unwrap(), 0);
}

#[tokio::test]
async fn identical_second_load_instantiates_nothing() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);

    let first = reconciler.load_document(full_document()).await.unwrap();
    assert_eq!(first.created, 3);
    let before = reconciler.scene().summary().await.unwrap();

    let second = reconciler.load_document(full_document()).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.removed, 0);

    let instantiations = reconciler.scene().read(LiveScene::instantiations).await.unwrap();
    assert_eq!(instantiations, 3);
    assert_eq!(reconciler.scene().summary().await.unwrap(), before);
}

#[tokio::test]
async fn deletion_touches_only_the_deleted_id() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(full_document()).await.unwrap();
    let before = reconciler.scene().summary().await.unwrap();

    let report = reconciler
        .load_document(without_impression(full_document(), "rib"))
        .await
        .unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.created, 0);

    let after = reconciler.scene().summary().await.unwrap();
    assert!(!after.impressions.contains_key(&ImpressionId::from("rib")));
    for id in ["surf", "gly"] {
        let id = ImpressionId::from(id);
        assert_eq!(after.impressions[&id], before.impressions[&id]);
    }
    let ocean = &after.groups[&GroupId::from("grp-ocean")];
    assert_eq!(ocean.len(), 1);
    assert_eq!(reconciler.scene().read(LiveScene::instantiations).await.unwrap(), 3);
}

#[tokio::test]
async fn changed_impression_is_rebuilt_alone() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(full_document()).await.unwrap();

    let mut next = full_document();
    next["impressions"]["gly"]["tags"] = json!(["wind"]);
    let report = reconciler.load_document(next).await.unwrap();
    assert_eq!(report.created, 1);

    let summary = reconciler.scene().summary().await.unwrap();
    assert_eq!(summary.impressions[&ImpressionId::from("gly")].tags, vec!["wind".to_string()]);
    assert_eq!(reconciler.scene().read(LiveScene::instantiations).await.unwrap(), 4);
}

#[tokio::test]
async fn unknown_plate_type_is_skipped() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);

    let mut document = full_document();
    document["impressions"]["vol"] = json!({ "plateType": "Volumes" });
    let report = reconciler.load_document(document).await.unwrap();

    assert_eq!(report.created, 3);
    assert!(matches!(
        report.skipped.as_slice(),
        [SoftFailure::UnknownPlateType { plate_type, .. }] if plate_type == "Volumes"
    ));
    let summary = reconciler.scene().summary().await.unwrap();
    assert_eq!(summary.impressions.len(), 3);
}

#[tokio::test]
async fn shared_dataset_is_fetched_once() {
    let source = Arc::new(MemorySource::with_samples().with_delay(Duration::from_millis(20)));
    let reconciler = engine(&source);

    let report = reconciler.load_document(full_document()).await.unwrap();
    assert!(report.is_clean(), "{:?}", report.skipped);
    assert_eq!(report.resolved, 2);
    assert_eq!(source.calls_for(&ResourceKey::dataset(DATASET)), 1);
    assert_eq!(source.calls_for(&ResourceKey::vis_asset(COLORMAP)), 1);

    // A later pass is served from the cache
    let mut next = full_document();
    next["impressions"]["surf"]["name"] = json!("Seabed");
    reconciler.load_document(next).await.unwrap();
    assert_eq!(source.total_calls(), 2);
}

#[tokio::test]
async fn missing_dataset_leaves_slots_empty() {
    let source = Arc::new(MemorySource::new());
    let reconciler = engine(&source);

    let report = reconciler.load_document(surface_document()).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.unresolved, 1);
    assert!(matches!(
        report.skipped.as_slice(),
        [SoftFailure::UnresolvedReference { .. }]
    ));

    let summary = reconciler.scene().summary().await.unwrap();
    assert!(summary.impressions[&ImpressionId::from("id1")].inputs.is_empty());
}

#[tokio::test]
async fn validation_failure_keeps_previous_scene() {
    let schema = json!({
        "type": "object",
        "required": ["impressions"],
        "properties": {
            "impressions": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": { "plateType": { "type": "string" } }
                }
            }
        }
    });
    let source = Arc::new(MemorySource::with_samples());
    let resolver = ResourceResolver::builder().layer(source.clone()).build();
    let context = EngineContext::default()
        .with_resolver(resolver)
        .with_validator(Arc::new(JsonSchemaValidator::new(&schema).unwrap()));
    let reconciler = StateReconciler::new(context);

    reconciler.load_document(full_document()).await.unwrap();
    let before = reconciler.scene().summary().await.unwrap();

    let mut bad = full_document();
    bad["impressions"]["surf"]["plateType"] = json!(5);
    bad["impressions"]["new"] = json!({ "plateType": "Glyphs" });
    let err = reconciler.load_document(bad).await.unwrap_err();

    let issues = err.validation_issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, "/impressions/surf/plateType");
    assert!(!err.is_retryable());

    assert_eq!(reconciler.scene().summary().await.unwrap(), before);
    assert_eq!(reconciler.last_applied().await, Some(full_document()));
}

#[tokio::test]
async fn groups_lights_and_defaults_are_applied() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(full_document()).await.unwrap();

    let (ocean, default_members, sun) = reconciler
        .scene()
        .read(|scene| {
            let ocean = scene.group_of(&ImpressionId::from("surf")).map(|g| g.name().to_string());
            let default_members = scene
                .group_of(&ImpressionId::from("gly"))
                .map(|g| (g.name().to_string(), g.members().count()));
            let sun = scene.lights().get("Sun").map(|l| l.intensity);
            (ocean, default_members, sun)
        })
        .await
        .unwrap();

    assert_eq!(ocean.as_deref(), Some("Ocean"));
    assert_eq!(default_members, Some(("Default".to_string(), 1)));
    assert_eq!(sun, Some(1.5));

    // Lights update in place, never duplicate
    let mut next = full_document();
    next["scene"]["lighting"][0]["intensity"] = json!(0.5);
    reconciler.load_document(next).await.unwrap();
    let lights = reconciler
        .scene()
        .read(|scene| scene.lights().iter().map(|l| l.intensity).collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(lights, vec![0.5]);
}

#[tokio::test]
async fn render_pass_builds_changed_impressions() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(full_document()).await.unwrap();

    assert_eq!(reconciler.render_pass().await.unwrap(), 3);
    assert_eq!(reconciler.render_pass().await.unwrap(), 0);

    let (glyph_elements, glyph_visible) = reconciler
        .scene()
        .read(|scene| {
            let glyphs = scene.impression(&ImpressionId::from("gly")).unwrap();
            let state = glyphs.render_state();
            (state.geometry.map(|g| g.elements), state.visible)
        })
        .await
        .unwrap();
    // 200 points at 50% density, hidden by its render hints
    assert_eq!(glyph_elements, Some(100));
    assert!(!glyph_visible);
}

#[tokio::test]
async fn loader_failure_is_fatal_and_leaves_scene() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    let loader = abr_engine::BundledStateLoader::new();

    let err = reconciler.load_from(&loader, "Missing").await.unwrap_err();
    assert!(matches!(err, EngineError::Loader(_)));
    assert!(reconciler.last_applied().await.is_none());
}

#[tokio::test]
async fn impression_dropped_from_its_group_joins_default() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    let document = |tag: &str, members: Value| {
        json!({
            "impressions": {
                "a": { "plateType": "Glyphs", "tags": [tag] }
            },
            "scene": {
                "groups": { "g1": { "name": "G1", "impressions": members } }
            }
        })
    };

    reconciler.load_document(document("x", json!(["a"]))).await.unwrap();
    reconciler.load_document(document("y", json!([]))).await.unwrap();

    let group = reconciler
        .scene()
        .read(|scene| scene.group_of(&ImpressionId::from("a")).map(|g| g.name().to_string()))
        .await
        .unwrap();
    assert_eq!(group.as_deref(), Some("Default"));

    let serialized = reconciler.serialize_value().await.unwrap();
    assert_eq!(serialized["scene"]["groups"]["g1"]["impressions"], json!([]));
}

#[tokio::test]
async fn replaced_impressions_container_rebuilds_scene() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(full_document()).await.unwrap();

    let next = surface_document();
    let delta = json!({
        "impressions": [full_document()["impressions"].clone(), next["impressions"].clone()]
    });
    let report = reconciler.load_with_delta(next, &delta).await.unwrap();

    assert!(report.cleared);
    assert_eq!(report.removed, 3);
    assert_eq!(report.created, 1);

    let summary = reconciler.scene().summary().await.unwrap();
    let ids: Vec<&str> = summary.impressions.keys().map(ImpressionId::as_str).collect();
    assert_eq!(ids, vec!["id1"]);
    assert_eq!(reconciler.scene().read(LiveScene::instantiations).await.unwrap(), 4);
}

#[tokio::test]
async fn external_deletion_delta_removes_impression() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(surface_document()).await.unwrap();

    let old = surface_document()["impressions"]["id1"].clone();
    let delta = json!({ "impressions": { "id1": [old, 0, 0] } });
    let report = reconciler
        .load_with_delta(json!({ "impressions": {} }), &delta)
        .await
        .unwrap();

    assert!(!report.cleared);
    assert_eq!(report.removed, 1);
    assert_eq!(reconciler.scene().read(LiveScene::len).await.unwrap(), 0);
}

#[tokio::test]
async fn undecodable_delta_is_fatal() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(surface_document()).await.unwrap();

    let delta = json!({ "impressions": { "id1": [1, 2, 3, 4] } });
    let err = reconciler
        .load_with_delta(json!({ "impressions": {} }), &delta)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Delta(_)));
    assert_eq!(reconciler.scene().read(LiveScene::len).await.unwrap(), 1);
}

#[tokio::test]
async fn clear_then_reload_rebuilds_everything() {
    let source = Arc::new(MemorySource::with_samples());
    let reconciler = engine(&source);
    reconciler.load_document(full_document()).await.unwrap();

    assert_eq!(reconciler.clear().await.unwrap(), 3);
    assert!(reconciler.last_applied().await.is_none());

    let report = reconciler.load_document(full_document()).await.unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(reconciler.scene().read(LiveScene::len).await.unwrap(), 3);
}
