//! HTTP front end: the intercepting proxy listener and the admin listener.

mod admin;
mod middleware;
mod proxy;

pub use admin::{AdminState, build_admin_router};
pub use proxy::{ProxyState, SOURCE_HEADER, build_proxy_router};
