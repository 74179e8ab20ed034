pub mod ingestion;
pub mod observation;
pub mod processing;

pub use ingestion::{FredClient, ProviderClient};
pub use observation::{Observation, Series, SeriesIds};
pub use processing::{Calendar, SeriesAligner};
