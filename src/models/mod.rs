//! Data models

mod caller;
mod provider_key;
mod usage;

pub use caller::*;
pub use provider_key::*;
pub use usage::*;
