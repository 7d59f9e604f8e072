//! Lead capture and administration for loan prospect forms.
//!
//! Public visitors submit leads through [`leads::lead_router`]; staff review,
//! annotate and export them through the same router behind the shared admin
//! key. Form schemas live in their own store and are served by
//! [`forms::form_router`]. New leads fan out to the notification channels in
//! [`notify`].

pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod leads;
pub mod notify;
pub mod storage;
pub mod telemetry;
