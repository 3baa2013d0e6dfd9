use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

/// User-level switches consumed by the dashboard.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Observable "AI insights enabled" flag.
    fn ai_insights_enabled(&self) -> watch::Receiver<bool>;

    async fn set_ai_insights_enabled(&self, enabled: bool) -> Result<()>;
}

pub struct InMemoryPreferences {
    ai_enabled: watch::Sender<bool>,
}

impl Default for InMemoryPreferences {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InMemoryPreferences {
    pub fn new(ai_enabled: bool) -> Self {
        let (ai_enabled, _) = watch::channel(ai_enabled);
        Self { ai_enabled }
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferences {
    fn ai_insights_enabled(&self) -> watch::Receiver<bool> {
        self.ai_enabled.subscribe()
    }

    async fn set_ai_insights_enabled(&self, enabled: bool) -> Result<()> {
        self.ai_enabled.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
        Ok(())
    }
}
