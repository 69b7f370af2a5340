//! Background execution for the SWR edge proxy.
//!
//! This crate provides:
//! - `BackgroundWork` - The "register background work" host capability
//! - `DeferredWork` - Queue drained by the host after the response is sent
//! - `TokioWork` - Spawns onto a tokio runtime (native targets)

mod background;

pub use background::*;
