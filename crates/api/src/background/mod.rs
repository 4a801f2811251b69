//! Background tasks and scheduled jobs.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. Interval jobs accept a [`CancellationToken`]
//! for graceful shutdown; bus subscribers exit when the bus is dropped.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod audit_cache;
pub mod autopilot;
pub mod read_receipts;
