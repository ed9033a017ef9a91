pub mod process_forecast_command;

pub use process_forecast_command::ProcessForecastCommand;
