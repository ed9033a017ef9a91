pub mod bulk_update_command;
pub mod import_dataset_command;

pub use bulk_update_command::{BulkUpdateCommand, BulkUpdateResult, BulkUpdateStage};
pub use import_dataset_command::{ImportDatasetCommand, ImportDatasetResult};
