//! vibelang-freqkeys - Keyboard-to-frequency controller for VibeLang
//!
//! Maps computer key presses and releases to pitch frequencies and hands
//! them to user callbacks. A controller is *linked* to a keyboard event
//! source to start receiving events:
//!
//! - Two octave rows of keys with configurable octaves and base frequency
//! - Attack (key down) and release (key up) callbacks
//! - Link, unlink and restart without leaking or duplicating handlers
//! - OS-level (rdev) and terminal (crossterm) keyboard sources
//! - Configurable via TOML file
//!
//! # Usage as a Library
//!
//! ```no_run
//! use std::sync::Arc;
//! use vibelang_freqkeys::{ControllerOptions, FrequencyKeyboardController, KeyBus, KeyEvent};
//!
//! let bus = Arc::new(KeyBus::new());
//! let options = ControllerOptions::default()
//!     .with_attack(|press| println!("{} {} {:.2} Hz", press.key, press.note, press.hz));
//! let mut controller = FrequencyKeyboardController::with_options(bus.clone(), options)?;
//! controller.link()?;
//!
//! bus.press(&KeyEvent::new("n"));
//! controller.unlink();
//! # Ok::<(), vibelang_freqkeys::Error>(())
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod frequency;
pub mod os_keyboard;
pub mod terminal;

// Re-export main types
pub use config::{Config, InputBackend};
pub use controller::{ControllerOptions, FrequencyKeyboardController, KeyPress, NoteCallback};
pub use error::{Error, LinkConflict, Result};
pub use events::{EventSource, InputStatus, KeyBus, KeyEvent, KeyEventKind, Trigger};
pub use frequency::{FrequencyTable, KeyboardLayout, NoteEntry};
pub use os_keyboard::{is_available as os_keyboard_available, KeyTracker, OsKeyEvent, OsKeyboardListener};
pub use terminal::{RawTerminal, TerminalKeyboard, TerminalSignal};
