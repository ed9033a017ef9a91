use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sender plus the receiving end, sized by `capacity`
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event for a change that is already committed.
    ///
    /// Delivery problems are logged; the change itself stands.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event not delivered: {}", e);
        }
    }
}

/// Domain events published after a unit of work commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    DemandBulkUpdated {
        history_id: Uuid,
        records_affected: u64,
        percentage: f64,
        change_summary: String,
        timestamp: DateTime<Utc>,
    },
    DemandDatasetImported {
        records_processed: u64,
        product_records_processed: u64,
        aggregate_rows: u64,
        timestamp: DateTime<Utc>,
    },
    ForecastProcessed {
        products_processed: usize,
        parameters_written: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Drains the channel, logging each event, until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::DemandBulkUpdated {
                history_id,
                records_affected,
                change_summary,
                ..
            } => {
                info!(
                    %history_id,
                    records_affected,
                    "Working demand adjusted: {}",
                    change_summary
                );
            }
            Event::DemandDatasetImported {
                records_processed,
                product_records_processed,
                aggregate_rows,
                ..
            } => {
                info!(
                    records_processed,
                    product_records_processed, aggregate_rows, "Demand dataset replaced"
                );
            }
            Event::ForecastProcessed {
                products_processed,
                parameters_written,
                ..
            } => {
                info!(
                    products_processed,
                    parameters_written, "Forecast processing finished"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
