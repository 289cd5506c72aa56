// Adapters layer: concrete implementations of the domain ports.

pub mod http;
pub mod progress;

pub use http::PhraseGateway;
pub use progress::TracingProgress;
