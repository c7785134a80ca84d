use async_trait::async_trait;
use tokio::sync::RwLock;

use logstore_application::SettingsRepository;
use logstore_core::AppResult;
use logstore_domain::SettingsSnapshot;

/// In-memory store configuration.
#[derive(Debug, Default)]
pub struct InMemorySettingsRepository {
    snapshot: RwLock<SettingsSnapshot>,
}

impl InMemorySettingsRepository {
    /// Creates a repository seeded with `snapshot`.
    #[must_use]
    pub fn new(snapshot: SettingsSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn load_snapshot(&self) -> AppResult<SettingsSnapshot> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save_setting(&self, name: &str, value: &str) -> AppResult<()> {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = snapshot.clone().with(name, value);
        Ok(())
    }
}
