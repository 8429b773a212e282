//! Run cancellation

use tokio_util::sync::CancellationToken;

/// Shared cancellation signal for one run.
///
/// The engine checks it at every step boundary and races in-flight provider
/// and tool calls against it.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
