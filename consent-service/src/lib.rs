//! AIS consent gateway.
//!
//! Creates, reads and revokes account information consents on behalf of TPPs
//! and drives their strong customer authentication through the redirect,
//! decoupled or embedded approach offered by the ASPSP.

pub mod config;
pub mod context;
pub mod handlers;
pub mod models;
pub mod services;
pub mod spi;
pub mod startup;

pub use context::RequestContext;
pub use services::ConsentService;
pub use startup::{AppState, Application};
