//! Pointer, keyboard and tablet input for the CDK display layer on Win32.
//!
//! The crate bridges the single system cursor and the asynchronous Wintab packet stream into the
//! master/slave device model the widget layer consumes:
//!
//! - [`backend`] implements the native windowing primitives behind [`backend::Platform`].
//! - [`glue`] adds the small policies on top of them (cursor refusal, window-at-point search).
//! - [`device`] owns the devices and the virtual-device indirection.
//! - [`wintab`] discovers tablets and their cursors and keeps the open contexts.
//! - [`router`] turns native messages into [`event::Event`]s and delivers them.
//!
//! Everything is owned by a single [`display::Display`] and runs on the UI thread.

// Tracing since it's used crate wide for logging
#[macro_use]
extern crate tracing;

pub mod backend;
pub mod device;
pub mod display;
pub mod event;
pub mod glue;
pub mod grab;
pub mod replay;
pub mod router;
pub mod seat;
pub mod utils;
pub mod window;
pub mod wintab;

pub use display::{Display, DisplayManager};
