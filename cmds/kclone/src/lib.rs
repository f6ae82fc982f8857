pub mod clone;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod editor;
pub mod prompt;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
