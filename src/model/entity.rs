//! Tab entity model
//!
//! A `TabEntity` is the canonical persisted state of one overlay tab window.
//! Entities are mutated locally by the lifecycle manager and remotely via
//! last-writer-wins merge, so every mutation must bump `last_modified`.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of an execution context running its own engine instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random context id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Screen position of a tab window (top-left corner).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions of a tab window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

impl Size {
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }
}

/// Visibility state of a tab window.
///
/// `soloed_on` and `muted_on` are mutually exclusive: a solo list confines
/// visibility to the named contexts, a mute list hides the tab from them.
/// Setting one clears the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    pub minimized: bool,
    #[serde(default)]
    pub soloed_on: BTreeSet<ContextId>,
    #[serde(default)]
    pub muted_on: BTreeSet<ContextId>,
}

impl Visibility {
    /// Replace the solo set, clearing any mute set.
    pub fn set_solo(&mut self, contexts: BTreeSet<ContextId>) {
        self.soloed_on = contexts;
        self.muted_on.clear();
    }

    /// Replace the mute set, clearing any solo set.
    pub fn set_mute(&mut self, contexts: BTreeSet<ContextId>) {
        self.muted_on = contexts;
        self.soloed_on.clear();
    }
}

/// Errors produced by entity construction/validation.
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("invalid entity: {0}")]
    Invalid(String),
}

/// The persisted state of one overlay tab window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabEntity {
    /// Stable, globally unique identifier
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub position: Position,
    pub size: Size,
    pub z_index: u32,
    /// Context that created the entity. Unset for legacy entities, in which
    /// case ownership checks pass by default.
    #[serde(default)]
    pub owner_context: Option<ContextId>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Wall-clock timestamp of the last mutation; the merge tiebreaker.
    pub last_modified: DateTime<Utc>,
}

impl TabEntity {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            title: title.into(),
            position: Position::new(0.0, 0.0),
            size: Size::new(400.0, 300.0),
            z_index: 0,
            owner_context: None,
            visibility: Visibility::default(),
            last_modified: Utc::now(),
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_size(mut self, w: f64, h: f64) -> Self {
        self.size = Size::new(w, h);
        self
    }

    pub fn with_owner(mut self, owner: ContextId) -> Self {
        self.owner_context = Some(owner);
        self
    }

    /// Check the required fields. A nil id or empty url marks an entity that
    /// was never properly constructed.
    pub fn validate(&self) -> Result<(), EntityError> {
        if self.id.is_nil() {
            return Err(EntityError::Invalid("nil entity id".to_string()));
        }
        if self.url.is_empty() {
            return Err(EntityError::Invalid("empty url".to_string()));
        }
        Ok(())
    }

    /// Whether `context` may mutate this entity. Legacy entities with no
    /// recorded owner accept mutations from anyone.
    pub fn is_owned_by(&self, context: &ContextId) -> bool {
        match &self.owner_context {
            Some(owner) => owner == context,
            None => true,
        }
    }

    /// Visibility predicate for a given viewing context.
    ///
    /// minimized => hidden; else a nonempty solo set confines visibility to
    /// its members; else a nonempty mute set hides the tab from its members;
    /// else visible.
    pub fn is_visible_to(&self, viewer: &ContextId) -> bool {
        if self.visibility.minimized {
            return false;
        }
        if !self.visibility.soloed_on.is_empty() {
            return self.visibility.soloed_on.contains(viewer);
        }
        if !self.visibility.muted_on.is_empty() {
            return !self.visibility.muted_on.contains(viewer);
        }
        true
    }

    /// Record a mutation at `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_modified = at;
    }
}
