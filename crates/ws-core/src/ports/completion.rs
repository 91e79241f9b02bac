use async_trait::async_trait;

use crate::draft::Draft;

/// Receives the final draft once per draft lifecycle, after the remote
/// accepted the commit.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn on_complete(&self, draft: &Draft) -> anyhow::Result<()>;
}
