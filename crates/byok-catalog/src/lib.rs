//! Model catalog resolution for bring-your-own-key language-model providers.
//!
//! Reconciles a provider's built-in default catalog, an optional remote
//! catalog, and the caller's credential state into the set of models that are
//! advertised as available. Remote failures degrade to the defaults; only an
//! interactive credential prompt that is cancelled surfaces as an error.

mod cancellation;
mod catalog_fetcher;
mod catalog_merge;
mod credential_gate;
mod model_catalog;
mod provider_profile;
mod resolver;
mod types;

pub use cancellation::CooperativeCancellationToken;
pub use catalog_fetcher::*;
pub use catalog_merge::merge_model_catalogs;
pub use credential_gate::*;
pub use model_catalog::*;
pub use provider_profile::*;
pub use resolver::*;
pub use types::*;
