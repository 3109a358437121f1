pub mod config;
pub mod error;
pub mod record;
pub mod tabular;

pub use config::Config;
pub use error::*;
pub use record::*;
