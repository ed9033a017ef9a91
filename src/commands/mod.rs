use crate::{errors::ServiceError, events::EventSender, repositories::DemandStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Command trait for implementing the Command Pattern
///
/// Each command validates its own input, runs as one unit of work against the
/// store and publishes its domain events once that unit of work has committed.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `store` - Storage port the command reads and writes through
    /// * `event_sender` - Channel to publish domain events
    async fn execute(
        &self,
        store: Arc<dyn DemandStore>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

pub mod demand;
pub mod forecasting;
