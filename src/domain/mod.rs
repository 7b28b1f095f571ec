//! Core value types shared by the cache, the worker and the HTTP front end.

pub mod lifecycle;
pub mod request;
pub mod response;

pub use lifecycle::{TransitionError, WorkerId, WorkerState};
pub use request::{FetchRequest, normalize_target};
pub use response::ResponseSnapshot;
