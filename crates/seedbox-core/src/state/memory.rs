// # Memory State Store
//
// In-memory implementation of StateStore.
//
// Nothing survives a restart. Useful for tests and for embedding the
// controller where another component owns persistence.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{SessionState, StateStore};

/// In-memory state store implementation
///
/// Clones share the same record.
///
/// # Example
///
/// ```rust
/// use seedbox_core::state::MemoryStateStore;
/// use seedbox_core::traits::{SessionState, StateStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     assert_eq!(store.load().await?, SessionState::template());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<Option<SessionState>>>,
}

impl MemoryStateStore {
    /// Create an empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `state`
    pub fn with_state(state: SessionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(state))),
        }
    }

    /// The last saved record, if any
    pub async fn snapshot(&self) -> Option<SessionState> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<SessionState, Error> {
        Ok(self.inner.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, state: &SessionState) -> Result<(), Error> {
        *self.inner.write().await = Some(state.clone());
        Ok(())
    }
}
