pub mod dataset;
pub mod scope;

pub use dataset::{DemandDataset, NewDemandRecord, NewProduct};
pub use scope::{DemandScope, YearMonth};
