//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the shared playback state and the media catalog so
//! route handlers can stay focused on protocol translation.

pub mod catalog;
pub mod coordinator;
pub mod registry;
