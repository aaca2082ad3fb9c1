// src/core/mod.rs

pub mod catalog;
pub mod catalog_loader;
pub mod grapher;
pub mod hop_cache;
pub mod path;
pub mod paths;
pub mod processor;
pub mod settings;
pub mod tag_filter;
