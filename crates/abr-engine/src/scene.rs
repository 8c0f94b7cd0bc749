//! Live scene and its owner task
//!
//! The [`LiveScene`] is mutated only inside the task spawned by
//! [`SceneHandle::spawn`]. Reconciliation stages a [`ScenePlan`] and sends it
//! over the channel; the owner task applies the whole plan in one step, so
//! readers never observe a half-applied load.

use crate::error::EngineError;
use abr_data::ScalarVariable;
use abr_document::{Bounds, GroupId, GroupSpec, ImpressionId, LightSpec, Quat, Range, Vec3};
use abr_registry::{Impression, PlateType, RenderCapability};
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Parent under which lights are attached in the host scene
pub const LIGHT_PARENT: &str = "ABRLightParent";

/// Name given to the implicit group of ungrouped impressions
pub const DEFAULT_GROUP_NAME: &str = "Default";

/// Group of impressions sharing a transform
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    id: GroupId,
    name: String,
    position: Vec3,
    rotation: Quat,
    bounds: Bounds,
    members: IndexSet<ImpressionId>,
}

impl Group {
    fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: Vec3::default(),
            rotation: Quat::default(),
            bounds: Bounds::default(),
            members: IndexSet::new(),
        }
    }

    fn update_from(&mut self, spec: &GroupSpec) {
        self.name.clone_from(&spec.name);
        self.position = spec.root_position;
        self.rotation = spec.root_rotation;
        self.bounds = spec.container_bounds;
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Member ids in attachment order
    pub fn members(&self) -> impl Iterator<Item = &ImpressionId> + '_ {
        self.members.iter()
    }
}

/// Lights keyed by name under [`LIGHT_PARENT`]
#[derive(Debug, Clone, Default)]
pub struct LightRig {
    lights: IndexMap<String, LightSpec>,
}

impl LightRig {
    /// Create the light if absent, otherwise update it in place
    ///
    /// Returns `true` when a new light was created.
    pub fn upsert(&mut self, spec: &LightSpec) -> bool {
        match self.lights.get_mut(&spec.name) {
            Some(light) => {
                light.kind = spec.kind;
                light.intensity = spec.intensity;
                light.position = spec.position;
                light.rotation = spec.rotation;
                false
            }
            None => {
                tracing::debug!("Creating light {}/{}", LIGHT_PARENT, spec.name);
                self.lights.insert(spec.name.clone(), spec.clone());
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LightSpec> {
        self.lights.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LightSpec> + '_ {
        self.lights.values()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

/// Mutations staged by one reconciliation pass
#[derive(Debug, Default)]
pub(crate) struct ScenePlan {
    /// Discard every impression and group first
    pub(crate) clear: bool,
    pub(crate) removals: Vec<ImpressionId>,
    pub(crate) creations: Vec<Impression>,
    pub(crate) groups: Vec<(GroupId, GroupSpec)>,
    pub(crate) lights: Vec<LightSpec>,
    pub(crate) ranges: Vec<(Arc<ScalarVariable>, Range)>,
}

/// What applying a plan changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ApplyOutcome {
    pub(crate) created: usize,
    pub(crate) removed: usize,
}

/// The set of live impressions, groups and lights
#[derive(Debug, Default)]
pub struct LiveScene {
    impressions: IndexMap<ImpressionId, Impression>,
    groups: IndexMap<GroupId, Group>,
    membership: HashMap<ImpressionId, GroupId>,
    default_group: Option<GroupId>,
    lights: LightRig,
    instantiations: u64,
}

impl LiveScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn impression(&self, id: &ImpressionId) -> Option<&Impression> {
        self.impressions.get(id)
    }

    pub fn impressions(&self) -> impl Iterator<Item = &Impression> + '_ {
        self.impressions.values()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.impressions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.impressions.is_empty()
    }

    #[must_use]
    pub fn group(&self, id: &GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.groups.values()
    }

    /// Group an impression belongs to
    #[must_use]
    pub fn group_of(&self, id: &ImpressionId) -> Option<&Group> {
        self.membership.get(id).and_then(|gid| self.groups.get(gid))
    }

    #[inline]
    #[must_use]
    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    /// Impressions instantiated over the scene's lifetime
    #[inline]
    #[must_use]
    pub fn instantiations(&self) -> u64 {
        self.instantiations
    }

    pub(crate) fn apply(&mut self, plan: ScenePlan) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        if plan.clear {
            outcome.removed += self.clear();
        }

        for id in &plan.removals {
            if self.remove(id) {
                outcome.removed += 1;
            } else {
                tracing::debug!("Deleted impression {} was not live", id);
            }
        }

        for mut impression in plan.creations {
            impression.mark_changed();
            if let Some(mut old) = self.impressions.insert(impression.id().clone(), impression) {
                old.cleanup();
            }
            self.instantiations += 1;
            outcome.created += 1;
        }

        self.detach_undeclared(&plan.groups);
        for (id, spec) in &plan.groups {
            self.upsert_group(id, spec);
        }
        self.attach_ungrouped();

        for light in &plan.lights {
            self.lights.upsert(light);
        }

        for (variable, range) in plan.ranges {
            tracing::debug!("Custom range for {}: [{}, {}]", variable.path(), range.min, range.max);
            variable.set_custom_range(range);
        }

        outcome
    }

    /// Drop every impression and group; lights survive
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.impressions.len();
        for impression in self.impressions.values_mut() {
            impression.cleanup();
        }
        self.impressions.clear();
        self.groups.clear();
        self.membership.clear();
        self.default_group = None;
        removed
    }

    fn remove(&mut self, id: &ImpressionId) -> bool {
        let Some(mut impression) = self.impressions.shift_remove(id) else {
            return false;
        };
        impression.cleanup();
        self.detach(id);
        true
    }

    fn detach(&mut self, id: &ImpressionId) {
        if let Some(group) = self
            .membership
            .remove(id)
            .and_then(|gid| self.groups.get_mut(&gid))
        {
            group.members.shift_remove(id);
        }
    }

    /// Drop memberships the incoming groups no longer declare
    ///
    /// Members of the default group stay put; everyone else released here
    /// lands in the default group through `attach_ungrouped`.
    fn detach_undeclared(&mut self, groups: &[(GroupId, GroupSpec)]) {
        let declared: HashSet<&ImpressionId> = groups
            .iter()
            .flat_map(|(_, spec)| spec.impressions.iter())
            .collect();
        let stale: Vec<ImpressionId> = self
            .membership
            .iter()
            .filter(|(id, group)| {
                !declared.contains(id) && self.default_group.as_ref() != Some(*group)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            tracing::debug!("Impression {} is no longer listed by its group", id);
            self.detach(id);
        }
    }

    fn upsert_group(&mut self, id: &GroupId, spec: &GroupSpec) {
        self.groups
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!("Creating group {} ({})", id, spec.name);
                Group::new(id.clone(), spec.name.clone())
            })
            .update_from(spec);

        for member in &spec.impressions {
            if self.impressions.contains_key(member) {
                self.attach(member, id);
            }
        }
    }

    fn attach(&mut self, member: &ImpressionId, group_id: &GroupId) {
        if let Some(previous) = self.membership.insert(member.clone(), group_id.clone()) {
            if &previous != group_id {
                if let Some(group) = self.groups.get_mut(&previous) {
                    group.members.shift_remove(member);
                }
            }
        }
        if let Some(group) = self.groups.get_mut(group_id) {
            group.members.insert(member.clone());
        }
    }

    fn attach_ungrouped(&mut self) {
        let ungrouped: Vec<ImpressionId> = self
            .impressions
            .keys()
            .filter(|id| !self.membership.contains_key(*id))
            .cloned()
            .collect();
        if ungrouped.is_empty() {
            return;
        }

        let default_id = match &self.default_group {
            Some(id) if self.groups.contains_key(id) => id.clone(),
            _ => {
                let id = GroupId::generate();
                self.groups
                    .insert(id.clone(), Group::new(id.clone(), DEFAULT_GROUP_NAME));
                self.default_group = Some(id.clone());
                id
            }
        };
        for member in &ungrouped {
            self.attach(member, &default_id);
        }
    }

    /// Run render hooks on changed impressions
    ///
    /// Returns how many impressions were recomputed.
    pub fn render_pass(&mut self) -> usize {
        let mut rendered = 0;
        for impression in self.impressions.values_mut().filter(|i| i.is_changed()) {
            if !impression.render_state().object_ready {
                impression.setup_object();
            }
            impression.compute_geometry();
            impression.update_styling();
            impression.update_visibility();
            impression.mark_rendered();
            rendered += 1;
        }
        rendered
    }

    /// Comparable snapshot of the scene contents
    #[must_use]
    pub fn summary(&self) -> SceneSummary {
        let impressions = self
            .impressions
            .values()
            .map(|impression| {
                let summary = ImpressionSummary {
                    plate: impression.plate(),
                    name: impression.name().map(str::to_string),
                    inputs: impression
                        .inputs()
                        .map(|(slot, value)| (slot.to_string(), value.reference()))
                        .collect(),
                    tags: impression.tags().to_vec(),
                    visible: impression.render_hints().visible,
                };
                (impression.id().clone(), summary)
            })
            .collect();

        let groups = self
            .groups
            .values()
            .map(|group| (group.id.clone(), group.members.iter().cloned().collect()))
            .collect();

        let lights = self
            .lights
            .iter()
            .map(|light| (light.name.clone(), light.clone()))
            .collect();

        SceneSummary {
            impressions,
            groups,
            lights,
        }
    }
}

/// One impression in a [`SceneSummary`]
#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionSummary {
    pub plate: PlateType,
    pub name: Option<String>,
    /// Slot name to identity string
    pub inputs: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub visible: bool,
}

/// Order-independent snapshot used to compare scenes
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSummary {
    pub impressions: BTreeMap<ImpressionId, ImpressionSummary>,
    pub groups: BTreeMap<GroupId, BTreeSet<ImpressionId>>,
    pub lights: BTreeMap<String, LightSpec>,
}

type SceneReader = Box<dyn FnOnce(&LiveScene) + Send>;

enum SceneCommand {
    Apply {
        plan: ScenePlan,
        reply: oneshot::Sender<ApplyOutcome>,
    },
    Read(SceneReader),
    RenderPass(oneshot::Sender<usize>),
    Clear(oneshot::Sender<usize>),
}

/// Handle to the task owning the live scene
///
/// Clones talk to the same scene. The task stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct SceneHandle {
    sender: mpsc::Sender<SceneCommand>,
}

impl std::fmt::Debug for SceneCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply { plan, .. } => f.debug_struct("Apply").field("plan", plan).finish(),
            Self::Read(_) => f.write_str("Read"),
            Self::RenderPass(_) => f.write_str("RenderPass"),
            Self::Clear(_) => f.write_str("Clear"),
        }
    }
}

impl SceneHandle {
    /// Spawn the owner task on the current tokio runtime
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<SceneCommand>(capacity.max(1));

        tokio::spawn(async move {
            let mut scene = LiveScene::new();
            while let Some(command) = receiver.recv().await {
                match command {
                    SceneCommand::Apply { plan, reply } => {
                        let outcome = scene.apply(plan);
                        let _ = reply.send(outcome);
                    }
                    SceneCommand::Read(reader) => reader(&scene),
                    SceneCommand::RenderPass(reply) => {
                        let _ = reply.send(scene.render_pass());
                    }
                    SceneCommand::Clear(reply) => {
                        let _ = reply.send(scene.clear());
                    }
                }
            }
            tracing::debug!("Live scene owner stopped");
        });

        Self { sender }
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> SceneCommand,
    ) -> Result<R, EngineError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| EngineError::SceneClosed)?;
        response.await.map_err(|_| EngineError::SceneClosed)
    }

    pub(crate) async fn apply(&self, plan: ScenePlan) -> Result<ApplyOutcome, EngineError> {
        self.request(|reply| SceneCommand::Apply { plan, reply }).await
    }

    /// Run a closure against the scene on its owner task
    ///
    /// # Errors
    /// Returns `EngineError::SceneClosed` if the owner task is gone
    pub async fn read<R, F>(&self, reader: F) -> Result<R, EngineError>
    where
        R: Send + 'static,
        F: FnOnce(&LiveScene) -> R + Send + 'static,
    {
        self.request(|reply| {
            SceneCommand::Read(Box::new(move |scene| {
                let _ = reply.send(reader(scene));
            }))
        })
        .await
    }

    /// Snapshot of the scene
    ///
    /// # Errors
    /// Returns `EngineError::SceneClosed` if the owner task is gone
    pub async fn summary(&self) -> Result<SceneSummary, EngineError> {
        self.read(LiveScene::summary).await
    }

    /// Recompute changed impressions
    ///
    /// # Errors
    /// Returns `EngineError::SceneClosed` if the owner task is gone
    pub async fn render_pass(&self) -> Result<usize, EngineError> {
        self.request(SceneCommand::RenderPass).await
    }

    /// Discard every impression and group
    pub(crate) async fn clear(&self) -> Result<usize, EngineError> {
        self.request(SceneCommand::Clear).await
    }
}
