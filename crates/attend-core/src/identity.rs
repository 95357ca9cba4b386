use crate::types::{Identity, LandmarkPoint};

pub const DEFAULT_PLACEHOLDER_IDENTITY: &str = "person";

/// Strategy for deriving the identity key of a detected face.
pub trait IdentityResolver {
    fn resolve(&self, landmarks: &[LandmarkPoint]) -> Identity;
}

/// Resolves every face to one fixed key.
///
/// Stands in until per-person recognition exists; the gate and log treat the
/// key like any other identity.
#[derive(Debug, Clone)]
pub struct PlaceholderResolver {
    identity: Identity,
}

impl PlaceholderResolver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            identity: Identity::new(label),
        }
    }
}

impl Default for PlaceholderResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_IDENTITY)
    }
}

impl IdentityResolver for PlaceholderResolver {
    fn resolve(&self, _landmarks: &[LandmarkPoint]) -> Identity {
        self.identity.clone()
    }
}
