//! Tag domain model.
//!
//! # Responsibility
//! - Define hierarchical tags attached to tasks and projects.
//! - Describe optional location metadata for location-based tags.
//!
//! # Invariants
//! - Location radius is positive metres when set.
//! - Children of a tag with `children_mutually_exclusive` may not be assigned
//!   together to one task (enforced by the tag service).

use crate::model::folder::{normalize_name, NameValidationError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable tag identifier.
pub type TagId = Uuid;

pub const TAG_NAME_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    Active,
    OnHold,
    Dropped,
}

/// Geographic anchor for a location tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres.
    pub radius: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagValidationError {
    Name(NameValidationError),
    NonPositiveRadius(i64),
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
}

impl Display for TagValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(err) => write!(f, "invalid tag name: {err}"),
            Self::NonPositiveRadius(value) => {
                write!(f, "location radius must be positive metres, got {value}")
            }
            Self::LatitudeOutOfRange(value) => write!(f, "latitude out of range: {value}"),
            Self::LongitudeOutOfRange(value) => write!(f, "longitude out of range: {value}"),
        }
    }
}

impl Error for TagValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Name(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub status: TagStatus,
    pub parent_id: Option<TagId>,
    pub order: i64,
    pub allows_next_action: bool,
    pub children_mutually_exclusive: bool,
    pub location: Option<TagLocation>,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Tag {
    pub fn new(name: impl Into<String>, parent_id: Option<TagId>, now: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: TagStatus::Active,
            parent_id,
            order: 0,
            allows_next_action: true,
            children_mutually_exclusive: false,
            location: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), TagValidationError> {
        normalize_name(&self.name, TAG_NAME_MAX_CHARS).map_err(TagValidationError::Name)?;
        if let Some(location) = &self.location {
            if !(-90.0..=90.0).contains(&location.latitude) {
                return Err(TagValidationError::LatitudeOutOfRange(location.latitude));
            }
            if !(-180.0..=180.0).contains(&location.longitude) {
                return Err(TagValidationError::LongitudeOutOfRange(location.longitude));
            }
            if let Some(radius) = location.radius {
                if radius <= 0 {
                    return Err(TagValidationError::NonPositiveRadius(radius));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Tag, TagLocation, TagValidationError};

    #[test]
    fn new_tag_allows_next_action_by_default() {
        let tag = Tag::new("errands", None, 0);
        assert!(tag.allows_next_action);
        assert!(!tag.children_mutually_exclusive);
        assert!(tag.validate().is_ok());
    }

    #[test]
    fn location_radius_must_be_positive() {
        let mut tag = Tag::new("office", None, 0);
        tag.location = Some(TagLocation {
            latitude: 52.5,
            longitude: 13.4,
            radius: Some(0),
            name: None,
        });
        assert_eq!(tag.validate(), Err(TagValidationError::NonPositiveRadius(0)));
    }
}
