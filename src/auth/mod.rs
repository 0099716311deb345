pub mod providers;

pub use providers::{configure_providers, OAuthProvider, ProviderConfig, ProviderRegistry, RunContext};
