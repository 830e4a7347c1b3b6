pub mod config;
pub mod consolidate;
pub mod discover;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod sheets;
pub mod sink;
pub mod table;
pub mod validate;

pub use config::Config;
pub use error::EtlError;
pub use pipeline::{Outcome, Pipeline, RunReport};
