//! Library half of the `thinlink` command: config loading and field
//! argument handling, kept here so they can be tested without a backend.

pub mod config;
pub mod fields;

pub use config::{AppConfig, CryptoConfig, DEFAULT_CONFIG_FILE};
pub use fields::{format_fields, format_message, format_value, parse_field};
