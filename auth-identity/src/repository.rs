use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{IdentityError, Result};
use crate::models::UserProfile;

/// Authoritative source of role and profile data, keyed by subject id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, subject_id: Uuid) -> Result<UserProfile>;
}

// In-memory implementation for development/testing
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: UserProfile) -> Self {
        self.insert(profile);
        self
    }

    pub fn insert(&self, profile: UserProfile) {
        self.profiles.write().insert(profile.id, profile);
    }

    pub fn remove(&self, subject_id: Uuid) -> Option<UserProfile> {
        self.profiles.write().remove(&subject_id)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn fetch_profile(&self, subject_id: Uuid) -> Result<UserProfile> {
        self.profiles
            .read()
            .get(&subject_id)
            .cloned()
            .ok_or(IdentityError::ProfileNotFound(subject_id))
    }
}
