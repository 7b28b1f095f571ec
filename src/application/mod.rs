//! Worker behavior: the install and fetch handlers, the worker lifecycle and
//! the registration that routes requests to the active version.

pub mod error;
pub mod fetch;
pub mod install;
pub mod network;
pub mod registration;
pub mod worker;

pub use fetch::{FetchError, FetchOutcome, FetchSource};
pub use install::{AssetFailure, InstallError, InstallPolicy, InstallReport};
pub use network::{Network, NetworkError};
pub use registration::Registration;
pub use worker::{ServiceWorker, WorkerConfig};
