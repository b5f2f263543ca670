//! Client-side services layered over the hosted backend.
//!
//! - [`session`] - process-wide session and profile state fed by auth events
//! - [`reconciler`] - position planning and atomic reorder batches

pub mod reconciler;
pub mod session;
