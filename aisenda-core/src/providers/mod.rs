//! Provider errors and model routing

pub mod error;
pub mod routing;

pub use error::{ProviderError, ProviderResult};
pub use routing::{route_model, ProviderTag};
