//! Glass TUI - Terminal surface for the card timeline emulator
//!
//! This crate draws the Glass timeline in a terminal: one 16:9 card at a
//! time, navigated with arrow keys or mouse strokes, with the device's
//! camera and speech recogniser simulated from the keyboard.
//!
//! # Architecture
//!
//! - **EmulatorClient**: Embeds the headless `glass-core` emulator
//! - **Display**: State derived from `RenderMessage`s
//! - **Widgets**: Card frame and wrapped text
//! - **App**: Event loop and layout

pub mod app;
pub mod display;
pub mod emulator_client;
pub mod theme;
pub mod widgets;

pub use app::App;
pub use display::DisplayState;
pub use emulator_client::EmulatorClient;
