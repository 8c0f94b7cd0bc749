//! Reconciliation orchestrator
//!
//! Provides [`StateReconciler`], which brings the live scene in line with an
//! incoming state document:
//!
//! 1. Validating: run the schema validator, then parse the document
//! 2. Diffing: compare against the last applied document
//! 3. ResolvingResources: resolve plate types, then every distinct dataset
//!    and vis asset reference in one concurrent batch
//! 4. Instantiating: build fresh impressions for changed ids
//! 5. Applying: hand the staged plan to the scene owner task
//!
//! Only validation (and a vanished scene task) aborts a load. Everything
//! else is a [`SoftFailure`]: logged, reported, and skipped.

use crate::context::EngineContext;
use crate::error::{EngineError, SerializeError, SoftFailure};
use crate::loader::StateLoader;
use crate::phase::{PhaseTracker, ReconcilePhase};
use crate::scene::{SceneHandle, ScenePlan};
use crate::serialize::serialize_scene;
use abr_data::{DataEntry, Resolution, Resource, ResourceKey, ScalarVariable};
use abr_document::{
    DataPath, DataPathKind, ImpressionChanges, ImpressionId, ImpressionSpec, InputGenre, InputRef,
    PathError, Range, StateDocument,
};
use abr_registry::{Impression, ImpressionConstructor, InputSlot, InputValue, Primitive};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type Resolutions = BTreeMap<ResourceKey, Resolution>;

/// Outcome of one successful load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Impressions instantiated
    pub created: usize,
    /// Impressions destroyed, including by a scene clear
    pub removed: usize,
    /// Whether the scene was cleared before rebuilding
    pub cleared: bool,
    /// Distinct references resolved in this pass
    pub resolved: usize,
    /// Distinct references left unresolved in this pass
    pub unresolved: usize,
    /// Per-entity failures that were skipped
    pub skipped: Vec<SoftFailure>,
}

impl LoadReport {
    /// No soft failures were recorded
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, failure: SoftFailure) {
        tracing::warn!("{}", failure);
        self.skipped.push(failure);
    }
}

/// Last document successfully applied
#[derive(Debug)]
struct Applied {
    raw: Value,
    ui_data: Option<Value>,
    local_vis_assets: BTreeMap<String, Value>,
}

/// Impression selected for rebuilding in this pass
struct Target<'a> {
    id: &'a ImpressionId,
    spec: &'a ImpressionSpec,
    constructor: ImpressionConstructor,
    slots: &'static [InputSlot],
}

/// Keeps one live scene synchronized with successive state documents
///
/// Passes are serialized: a second `load_document` waits for the first.
#[derive(Debug)]
pub struct StateReconciler {
    context: EngineContext,
    scene: SceneHandle,
    last_applied: Mutex<Option<Applied>>,
}

impl StateReconciler {
    /// Create a reconciler with an empty live scene
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(context: EngineContext) -> Self {
        let scene = SceneHandle::spawn(context.config().scene_channel_capacity);
        Self {
            context,
            scene,
            last_applied: Mutex::new(None),
        }
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Handle to the live scene
    #[inline]
    #[must_use]
    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    /// Raw document of the last successful load
    pub async fn last_applied(&self) -> Option<Value> {
        self.last_applied.lock().await.as_ref().map(|applied| applied.raw.clone())
    }

    /// Fetch a named document and load it
    ///
    /// # Errors
    /// Returns `EngineError::Loader` on fetch failure, otherwise as for
    /// [`StateReconciler::load_document`]
    pub async fn load_from(
        &self,
        loader: &dyn StateLoader,
        name: &str,
    ) -> Result<LoadReport, EngineError> {
        let raw = loader.get_state(name).await?;
        self.load_document(raw).await
    }

    /// Reconcile the live scene with a raw document
    ///
    /// # Errors
    /// - `EngineError::Malformed` if the document is not a state document
    /// - `EngineError::Validation` if the schema rejects it
    /// - `EngineError::SceneClosed` if the scene task has stopped
    ///
    /// On error the live scene and last applied document are unchanged.
    pub async fn load_document(&self, raw: Value) -> Result<LoadReport, EngineError> {
        self.reconcile(raw, None).await
    }

    /// Reconcile with a document and the delta that produced it
    ///
    /// The delta comes from an external producer and replaces the diff
    /// against the last applied document. An `impressions` entry that is
    /// not keyed by id discards the live scene and rebuilds from `raw`.
    ///
    /// # Errors
    /// As for [`StateReconciler::load_document`], plus `EngineError::Delta`
    /// if `delta` does not follow the delta encoding
    pub async fn load_with_delta(
        &self,
        raw: Value,
        delta: &Value,
    ) -> Result<LoadReport, EngineError> {
        self.reconcile(raw, Some(delta)).await
    }

    /// Discard the live scene and forget the last applied document
    ///
    /// The next load rebuilds every impression it declares.
    ///
    /// # Errors
    /// Returns `EngineError::SceneClosed` if the scene task has stopped
    pub async fn clear(&self) -> Result<usize, EngineError> {
        let mut last = self.last_applied.lock().await;
        let removed = self.scene.clear().await?;
        *last = None;
        tracing::info!("Cleared live scene: {} impressions removed", removed);
        Ok(removed)
    }

    async fn reconcile(&self, raw: Value, delta: Option<&Value>) -> Result<LoadReport, EngineError> {
        let mut last = self.last_applied.lock().await;
        let mut phase = PhaseTracker::new();

        phase.advance(ReconcilePhase::Validating)?;
        let validated = self.validate(&raw).and_then(|document| {
            let external = delta
                .map(ImpressionChanges::from_delta_value)
                .transpose()?;
            Ok((document, external))
        });
        let (document, external) = match validated {
            Ok(validated) => validated,
            Err(e) => {
                phase.advance(ReconcilePhase::Failed)?;
                tracing::error!("Load aborted: {}", e);
                return Err(e);
            }
        };

        phase.advance(ReconcilePhase::Diffing)?;
        let changes = external
            .unwrap_or_else(|| ImpressionChanges::between(last.as_ref().map(|a| &a.raw), &raw));
        if changes.rebuilds_all() {
            tracing::debug!("Rebuilding every impression");
        } else {
            tracing::debug!("Document changes: {:?}", changes);
        }

        phase.advance(ReconcilePhase::ResolvingResources)?;
        let mut report = LoadReport::default();
        self.register_embedded(&document);
        let targets = self.select_targets(&document, &changes, &mut report);
        let resolutions = self.resolve(&document, &targets).await;
        report.resolved = resolutions.values().filter(|r| r.is_resolved()).count();
        report.unresolved = resolutions.len() - report.resolved;

        phase.advance(ReconcilePhase::Instantiating)?;
        let creations: Vec<Impression> = targets
            .iter()
            .map(|target| instantiate(target, &resolutions, &mut report))
            .collect();

        phase.advance(ReconcilePhase::Applying)?;
        let plan = ScenePlan {
            clear: changes.clears_scene(),
            removals: changes.deleted().cloned().collect(),
            creations,
            groups: document
                .scene
                .groups
                .iter()
                .map(|(id, spec)| (id.clone(), spec.clone()))
                .collect(),
            lights: document.scene.lighting.clone(),
            ranges: range_overrides(&document, &resolutions, &mut report),
        };
        let outcome = match self.scene.apply(plan).await {
            Ok(outcome) => outcome,
            Err(e) => {
                phase.advance(ReconcilePhase::Failed)?;
                tracing::error!("Load aborted while applying: {}", e);
                return Err(e);
            }
        };
        report.created = outcome.created;
        report.removed = outcome.removed;
        report.cleared = changes.clears_scene();

        *last = Some(Applied {
            raw,
            ui_data: document.ui_data,
            local_vis_assets: document.local_vis_assets,
        });
        phase.advance(ReconcilePhase::Done)?;

        tracing::info!(
            "Loaded state: {} created, {} removed, {} skipped, {}/{} references resolved",
            report.created,
            report.removed,
            report.skipped.len(),
            report.resolved,
            report.resolved + report.unresolved
        );
        Ok(report)
    }

    fn validate(&self, raw: &Value) -> Result<StateDocument, EngineError> {
        self.context
            .validator()
            .validate(raw)
            .map_err(|issues| EngineError::Validation { issues })?;
        Ok(StateDocument::from_value(raw)?)
    }

    fn register_embedded(&self, document: &StateDocument) {
        for (uuid, manifest) in &document.local_vis_assets {
            self.context
                .resolver()
                .register_embedded(ResourceKey::vis_asset(uuid.as_str()), manifest.clone());
        }
    }

    fn select_targets<'a>(
        &self,
        document: &'a StateDocument,
        changes: &ImpressionChanges,
        report: &mut LoadReport,
    ) -> Vec<Target<'a>> {
        let registry = self.context.registry();
        let mut targets = Vec::new();
        for (id, spec) in &document.impressions {
            if !changes.is_changed(id) {
                continue;
            }
            match (registry.resolve(&spec.plate_type), registry.input_slots_of(&spec.plate_type)) {
                (Ok(constructor), Ok(slots)) => {
                    tracing::debug!("Rebuilding impression {} ({})", id, spec.plate_type);
                    targets.push(Target {
                        id,
                        spec,
                        constructor,
                        slots,
                    });
                }
                _ => report.skip(SoftFailure::UnknownPlateType {
                    impression: id.clone(),
                    plate_type: spec.plate_type.clone(),
                }),
            }
        }
        targets
    }

    /// Resolve every distinct reference of this pass before any instantiation
    async fn resolve(&self, document: &StateDocument, targets: &[Target<'_>]) -> Resolutions {
        let mut keys = Vec::new();
        for target in targets {
            for slot in target.slots {
                if let Some(key) = target.spec.input_values.get(slot.name).and_then(resource_key) {
                    keys.push(key);
                }
            }
        }
        for path in document.data_ranges.scalar_ranges.keys() {
            if let Ok(path) = path.parse::<DataPath>() {
                keys.push(ResourceKey::dataset(path.dataset()));
            }
        }
        self.context.resolver().resolve_batch(keys).await
    }

    /// Serialize the live scene
    ///
    /// Waits for any in-flight load to finish first.
    ///
    /// # Errors
    /// Returns `EngineError::Serialize` if an impression cannot be written
    pub async fn serialize(&self) -> Result<StateDocument, EngineError> {
        let last = self.last_applied.lock().await;
        let (ui_data, local_vis_assets) = last
            .as_ref()
            .map(|applied| (applied.ui_data.clone(), applied.local_vis_assets.clone()))
            .unwrap_or_default();
        drop(last);

        let registry = self.context.shared_registry();
        let datasets = self.context.resolver().datasets();
        let document = self
            .scene
            .read(move |scene| {
                serialize_scene(scene, &registry, &datasets, ui_data, local_vis_assets)
            })
            .await??;
        Ok(document)
    }

    /// Serialize the live scene to raw JSON
    ///
    /// # Errors
    /// As for [`StateReconciler::serialize`]
    pub async fn serialize_value(&self) -> Result<Value, EngineError> {
        let document = self.serialize().await?;
        let raw = document.to_value().map_err(SerializeError::from)?;
        Ok(raw)
    }

    /// Serialize the live scene and store it through a loader
    ///
    /// # Errors
    /// Returns serialization errors or `EngineError::Loader`
    pub async fn save_to(&self, loader: &dyn StateLoader) -> Result<(), EngineError> {
        let document = self.serialize_value().await?;
        loader.save_state(&document).await?;
        Ok(())
    }

    /// Run render hooks on impressions changed by recent loads
    ///
    /// # Errors
    /// Returns `EngineError::SceneClosed` if the scene task has stopped
    pub async fn render_pass(&self) -> Result<usize, EngineError> {
        self.scene.render_pass().await
    }
}

/// Resource an input needs resolved, if any
fn resource_key(input: &InputRef) -> Option<ResourceKey> {
    if !input.input_genre.is_resource() {
        return None;
    }
    match input.input_genre {
        InputGenre::KeyData | InputGenre::Variable => input
            .input_value
            .parse::<DataPath>()
            .ok()
            .map(|path| ResourceKey::dataset(path.dataset())),
        InputGenre::VisAsset => Some(ResourceKey::vis_asset(input.input_value.as_str())),
        InputGenre::Primitive | InputGenre::Unknown => None,
    }
}

fn resolved<'r>(resolutions: &'r Resolutions, key: &ResourceKey) -> Result<&'r Resource, String> {
    match resolutions.get(key) {
        Some(Resolution::Resolved(resolved)) => Ok(&resolved.resource),
        Some(Resolution::Unresolved(reason)) => Err(reason.to_string()),
        None => Err("not requested in this pass".to_string()),
    }
}

fn instantiate(
    target: &Target<'_>,
    resolutions: &Resolutions,
    report: &mut LoadReport,
) -> Impression {
    let mut impression = target.constructor.construct(target.id.clone());
    for slot in target.slots {
        let value = target
            .spec
            .input_values
            .get(slot.name)
            .and_then(|input| match input_value(target.id, slot, input, resolutions) {
                Ok(value) => Some(value),
                Err(failure) => {
                    report.skip(failure);
                    None
                }
            });
        impression.assign(slot.name, value);
    }

    let ignored = target
        .spec
        .input_values
        .keys()
        .filter(|name| !target.slots.iter().any(|slot| slot.name == name.as_str()));
    for name in ignored {
        tracing::debug!("Impression {} has no slot '{}'; input ignored", target.id, name);
    }

    impression.set_name(target.spec.name.clone());
    impression.set_render_hints(target.spec.render_hints.clone().unwrap_or_default());
    impression.set_tags(target.spec.tags.clone());
    impression.mark_changed();
    impression
}

/// Turn a document input into a slot value
///
/// Values are never coerced: a genre, parameter or type disagreement is a
/// type mismatch for the slot.
fn input_value(
    id: &ImpressionId,
    slot: &InputSlot,
    input: &InputRef,
    resolutions: &Resolutions,
) -> Result<InputValue, SoftFailure> {
    let mismatch = |found: String| SoftFailure::TypeMismatch {
        impression: id.clone(),
        slot: slot.name.to_string(),
        expected: slot.value_type,
        found,
    };
    let unresolved = |reason: String| SoftFailure::UnresolvedReference {
        owner: format!("impression {id} slot '{}'", slot.name),
        reference: input.input_value.clone(),
        reason,
    };

    if input.input_genre != slot.genre() {
        return Err(mismatch(format!("genre {}", input.input_genre.as_str())));
    }
    if !slot.matches_parameter(input.parameter_name.as_deref()) {
        return Err(mismatch(format!(
            "parameter '{}'",
            input.parameter_name.as_deref().unwrap_or_default()
        )));
    }

    let value = match input.input_genre {
        InputGenre::KeyData | InputGenre::Variable => {
            let path: DataPath = input
                .input_value
                .parse()
                .map_err(|e: PathError| unresolved(e.to_string()))?;
            let kind_fits = match input.input_genre {
                InputGenre::KeyData => path.kind() == DataPathKind::KeyData,
                _ => path.kind() != DataPathKind::KeyData,
            };
            if !kind_fits {
                let genre = input.input_genre.as_str();
                return Err(unresolved(format!("{} path for a {genre} input", path.kind())));
            }

            let dataset = resolved(resolutions, &ResourceKey::dataset(path.dataset()))
                .map_err(unresolved)?
                .as_dataset()
                .ok_or_else(|| unresolved("reference is not a dataset".to_string()))?;
            match dataset.lookup(&path) {
                Some(DataEntry::KeyData(key)) => InputValue::KeyData(key),
                Some(DataEntry::Scalar(var)) => InputValue::Scalar(var),
                Some(DataEntry::Vector(var)) => InputValue::Vector(var),
                None => {
                    return Err(unresolved(format!("no such entry in dataset {}", path.dataset())))
                }
            }
        }
        InputGenre::VisAsset => {
            let key = ResourceKey::vis_asset(input.input_value.as_str());
            let asset = resolved(resolutions, &key)
                .map_err(unresolved)?
                .as_vis_asset()
                .ok_or_else(|| unresolved("reference is not a vis asset".to_string()))?;
            InputValue::VisAsset(asset.clone())
        }
        InputGenre::Primitive => {
            let built = match input.input_type.as_deref() {
                Some(type_name) => Primitive::construct(type_name, &input.input_value),
                None => Primitive::construct_as(slot.value_type, &input.input_value),
            };
            let primitive = built.map_err(|error| SoftFailure::PrimitiveConstruction {
                impression: id.clone(),
                slot: slot.name.to_string(),
                error,
            })?;
            InputValue::Primitive(primitive)
        }
        InputGenre::Unknown => return Err(mismatch("unknown genre".to_string())),
    };

    if slot.value_type.accepts(&value) {
        Ok(value)
    } else {
        Err(mismatch(value.value_type().name().to_string()))
    }
}

/// Scalar range overrides that resolved to a live variable
fn range_overrides(
    document: &StateDocument,
    resolutions: &Resolutions,
    report: &mut LoadReport,
) -> Vec<(Arc<ScalarVariable>, Range)> {
    let mut overrides = Vec::new();
    for (reference, range) in &document.data_ranges.scalar_ranges {
        let unresolved = |reason: String| SoftFailure::UnresolvedReference {
            owner: "dataRanges".to_string(),
            reference: reference.clone(),
            reason,
        };
        let variable = reference
            .parse::<DataPath>()
            .map_err(|e| e.to_string())
            .and_then(|path| {
                if path.kind() != DataPathKind::ScalarVar {
                    return Err(format!("{} path in scalarRanges", path.kind()));
                }
                resolved(resolutions, &ResourceKey::dataset(path.dataset()))?
                    .as_dataset()
                    .and_then(|dataset| dataset.scalar_var(path.name()))
                    .ok_or_else(|| "no such scalar variable".to_string())
            });
        match variable {
            Ok(variable) => overrides.push((variable, *range)),
            Err(reason) => report.skip(unresolved(reason)),
        }
    }
    overrides
}
