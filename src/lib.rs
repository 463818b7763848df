pub mod config;
pub mod error;
pub mod hotkeys;
pub mod keys;
pub mod registry;
pub mod settings;
pub mod switcher;

#[cfg(windows)]
pub mod win_apis;
#[cfg(windows)]
pub mod app;

#[cfg(test)]
mod fakes;
