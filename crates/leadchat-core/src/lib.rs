pub mod api;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod models;
pub mod pagination;
pub mod partition;
pub mod permissions;
pub mod phone;
pub mod runtime;
pub mod search;
pub mod store;
pub mod streaming;
pub mod tracing_setup;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::CoreConfig;
pub use error::{CoreError, ErrorCategory, Result};
pub use events::CoreEvent;
pub use runtime::{ChatRuntime, Panel, PanelErrors};
