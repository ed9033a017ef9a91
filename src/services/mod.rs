// Forecast processing over the aggregate table
pub mod forecasting;

// Facade used by the CLI and other collaborators
pub mod demand;
