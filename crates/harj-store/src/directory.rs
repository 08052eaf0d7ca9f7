use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use harj_types::{UserId, UserProfile};

/// Resolves user ids to display identities. Owned by the account side of the
/// marketplace; messaging only reads from it.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve(&self, id: UserId) -> Option<UserProfile>;
}

#[derive(Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.insert(user);
        }
        directory
    }

    /// Parses a JSON array of profiles.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let users: Vec<UserProfile> = serde_json::from_str(raw)?;
        Ok(Self::with_users(users))
    }

    pub fn insert(&self, user: UserProfile) {
        match self.users.write() {
            Ok(mut users) => {
                users.insert(user.id, user);
            }
            Err(e) => warn!("user directory lock poisoned: {}", e),
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn resolve(&self, id: UserId) -> Option<UserProfile> {
        self.users.read().ok()?.get(&id).cloned()
    }
}
