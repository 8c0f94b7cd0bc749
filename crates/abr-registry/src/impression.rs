//! Live data impressions
//!
//! The set of plate types is closed. Each [`Impression`] carries its
//! [`PlateType`] tag and the render hooks dispatch on it.

use crate::slot::{InputSlot, GLYPH_SLOTS, RIBBON_SLOTS, SURFACE_SLOTS};
use crate::value::InputValue;
use abr_data::Topology;
use abr_document::{ImpressionId, RenderHints};
use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};

/// Impression variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlateType {
    Surfaces,
    Ribbons,
    Glyphs,
}

impl PlateType {
    /// Tag used in documents
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Surfaces => "Surfaces",
            Self::Ribbons => "Ribbons",
            Self::Glyphs => "Glyphs",
        }
    }

    /// Declared input slots, in catalog order
    #[must_use]
    pub fn slots(self) -> &'static [InputSlot] {
        match self {
            Self::Surfaces => SURFACE_SLOTS,
            Self::Ribbons => RIBBON_SLOTS,
            Self::Glyphs => GLYPH_SLOTS,
        }
    }

    /// Slot whose primitive scales the geometry
    fn size_slot(self) -> &'static str {
        match self {
            Self::Surfaces => "Pattern Size",
            Self::Ribbons => "Ribbon Width",
            Self::Glyphs => "Glyph Size",
        }
    }
}

impl Display for PlateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Geometry produced for the host renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub topology: Topology,
    /// Vertices for surfaces and ribbons, instances for glyphs
    pub elements: usize,
}

/// Styling parameters resolved from slots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    /// Color variable and colormap both present
    pub colored: bool,
    pub scale: Option<f64>,
}

/// Host-facing state built by the render hooks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    pub object_ready: bool,
    pub geometry: Option<Geometry>,
    pub style: Option<Style>,
    pub visible: bool,
}

/// Render hooks every plate type implements
pub trait RenderCapability {
    /// Build geometry from key data
    fn compute_geometry(&mut self);
    /// Create the host object
    fn setup_object(&mut self);
    /// Apply color and size parameters
    fn update_styling(&mut self);
    /// Apply visibility from render hints
    fn update_visibility(&mut self);
    /// Release host state
    fn cleanup(&mut self);
}

/// Instantiated data impression
#[derive(Debug, Clone)]
pub struct Impression {
    id: ImpressionId,
    plate: PlateType,
    name: Option<String>,
    inputs: IndexMap<String, Option<InputValue>>,
    render_hints: RenderHints,
    tags: Vec<String>,
    render: RenderState,
}

impl Impression {
    /// Fresh impression with no inputs assigned
    #[must_use]
    pub fn new(id: ImpressionId, plate: PlateType) -> Self {
        Self {
            id,
            plate,
            name: None,
            inputs: IndexMap::new(),
            render_hints: RenderHints::default(),
            tags: Vec::new(),
            render: RenderState::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &ImpressionId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn plate(&self) -> PlateType {
        self.plate
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Set a slot; `None` explicitly clears it
    pub fn assign(&mut self, slot: &str, value: Option<InputValue>) {
        self.inputs.insert(slot.to_string(), value);
    }

    /// Current value of a slot
    #[must_use]
    pub fn input(&self, slot: &str) -> Option<&InputValue> {
        self.inputs.get(slot).and_then(Option::as_ref)
    }

    /// Whether the slot was assigned at all, even with no value
    #[must_use]
    pub fn has_slot(&self, slot: &str) -> bool {
        self.inputs.contains_key(slot)
    }

    /// Slots holding a value, in assignment order
    pub fn inputs(&self) -> impl Iterator<Item = (&str, &InputValue)> + '_ {
        self.inputs
            .iter()
            .filter_map(|(slot, value)| value.as_ref().map(|v| (slot.as_str(), v)))
    }

    #[inline]
    #[must_use]
    pub fn render_hints(&self) -> &RenderHints {
        &self.render_hints
    }

    pub fn set_render_hints(&mut self, hints: RenderHints) {
        self.render_hints = hints;
    }

    #[inline]
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    /// Flag for recomputation by the next render pass
    pub fn mark_changed(&mut self) {
        self.render_hints.changed = true;
    }

    #[inline]
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.render_hints.changed
    }

    /// Clear the change flag after a render pass
    pub fn mark_rendered(&mut self) {
        self.render_hints.changed = false;
    }

    #[inline]
    #[must_use]
    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    fn primitive(&self, slot: &str) -> Option<f64> {
        self.input(slot)
            .and_then(InputValue::as_primitive)
            .map(|p| p.as_f64())
    }
}

impl RenderCapability for Impression {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn compute_geometry(&mut self) {
        let Some((topology, points)) = self
            .input("Key Data")
            .and_then(InputValue::as_key_data)
            .map(|key| (key.topology(), key.point_count()))
        else {
            self.render.geometry = None;
            return;
        };
        let elements = match self.plate {
            // Both faces are emitted
            PlateType::Surfaces => points * 2,
            PlateType::Ribbons => points,
            PlateType::Glyphs => {
                let density = self.primitive("Glyph Density").unwrap_or(100.0).clamp(0.0, 100.0);
                (points as f64 * density / 100.0).round() as usize
            }
        };
        self.render.geometry = Some(Geometry { topology, elements });
    }

    fn setup_object(&mut self) {
        self.render.object_ready = true;
    }

    fn update_styling(&mut self) {
        let colored =
            self.input("Color Variable").is_some() && self.input("Colormap").is_some();
        let scale = self.primitive(self.plate.size_slot());
        self.render.style = Some(Style { colored, scale });
    }

    fn update_visibility(&mut self) {
        self.render.visible = self.render_hints.visible && self.render.geometry.is_some();
    }

    fn cleanup(&mut self) {
        self.render = RenderState::default();
    }
}
