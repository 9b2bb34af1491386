//! User profiles: the subjects (self, family members) whose reports are
//! tracked separately.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declared attributes forwarded to the analysis capability as context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileContext {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    /// Relationship to the account holder ("self", "mother", ...).
    pub relation: String,
    pub avatar_color: String,
    pub context: ProfileContext,
}

impl Profile {
    pub fn new(name: impl Into<String>, relation: impl Into<String>, avatar_color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            relation: relation.into(),
            avatar_color: avatar_color.into(),
            context: ProfileContext::default(),
        }
    }

    /// The fallback profile substituted when the set would become empty.
    pub fn default_self() -> Self {
        Self::new("Me", "self", "#4E8BF4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profiles_get_unique_ids() {
        let a = Profile::new("Mom", "mother", "#E57373");
        let b = Profile::new("Mom", "mother", "#E57373");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn default_profile_is_self() {
        let p = Profile::default_self();
        assert_eq!(p.relation, "self");
        assert_eq!(p.context, ProfileContext::default());
    }
}
