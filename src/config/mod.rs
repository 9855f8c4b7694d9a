// src/config/mod.rs
//! Registry file loading and generation.

pub mod generate;
pub mod registry;

pub use registry::{
    load_registry, load_registry_default, load_registry_from, registry_to_toml, write_registry,
};
