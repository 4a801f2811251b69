//! Domain building blocks for the outbound notification pipeline.
//!
//! Everything in this crate is pure (no I/O) so it can be shared by the
//! repository layer, the pipeline services, the HTTP API and the worker CLI.

pub mod audit;
pub mod autopilot;
pub mod channels;
pub mod clock;
pub mod error;
pub mod notification_status;
pub mod roles;
pub mod templates;
pub mod types;
