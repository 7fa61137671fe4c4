pub mod alt_text;
pub mod cache;
pub mod config;
pub mod detail;
pub mod error;
pub mod gallery;
pub mod model;
pub mod probe;
pub mod renderers;
pub mod source;
pub mod store;
pub mod view_model;
