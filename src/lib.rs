pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, ImportSettings};

pub use adapters::{PhraseGateway, TracingProgress};
pub use core::engine::{ImportEngine, ImportOptions, ImportReport};
pub use utils::error::{ImportError, Result};
