// src/lib.rs  -  morse-switch library: switch events in, keystrokes and pointer actions out
pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod keyer;
pub mod layout;
pub mod morse;
pub mod output;
