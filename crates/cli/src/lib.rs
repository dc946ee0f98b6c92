//! Public library modules for the CLI crate
pub mod overrides;
pub mod render;
