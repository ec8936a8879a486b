//! CardCraft — a layered photo-card editor.
//!
//! The crate is split into a lib target (everything below) and a thin bin
//! target so the headless CLI and the integration tests can drive the same
//! code paths as the GUI.

#![allow(dead_code)] // API surface kept for the CLI and tests
#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod io;
pub mod layout;
pub mod logger;
pub mod settings;
pub mod theme;
