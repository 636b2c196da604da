//! Terminal keyboard input using crossterm
//!
//! [`RawTerminal`] keeps the terminal in raw mode with focus reporting for as
//! long as it lives. The OS-level listener holds one so played keys do not
//! echo, and reads focus changes and quit keys from it.
//!
//! [`TerminalKeyboard`] is the fallback for systems where the OS-level
//! listener is unavailable. Release and repeat events are only reported by
//! terminals supporting the keyboard enhancement protocol; elsewhere every
//! press is followed by an immediate release.

use crate::error::{Error, Result};
use crate::events::{InputStatus, KeyBus, KeyEvent, KeyEventKind};
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind as TermKeyKind,
    KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement};
use std::io::stdout;
use std::time::Duration;

/// What a terminal key event means for the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalInput {
    /// Forward to the bus
    Key(KeyEventKind, KeyEvent),
    /// Esc or Ctrl+C
    Quit,
    /// Not a character key
    Ignored,
}

/// Terminal events relevant while another source delivers the keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalSignal {
    /// The terminal window gained focus
    FocusGained,
    /// The terminal window lost focus
    FocusLost,
    /// Esc or Ctrl+C
    Quit,
}

/// Raw mode and focus reporting, restored on drop
pub struct RawTerminal {
    focus_reporting: bool,
    enhanced: bool,
}

impl RawTerminal {
    /// Enter raw mode and enable focus change reporting
    pub fn enter() -> Result<Self> {
        enable_raw_mode().map_err(|e| Error::Terminal(format!("Failed to enable raw mode: {}", e)))?;

        // From here on Drop restores the terminal, even if a step below fails
        let mut raw = Self {
            focus_reporting: false,
            enhanced: false,
        };
        execute!(stdout(), EnableFocusChange)?;
        raw.focus_reporting = true;
        Ok(raw)
    }

    /// Request release/repeat reporting. Returns whether the terminal supports it.
    pub fn enable_key_reporting(&mut self) -> Result<bool> {
        if !self.enhanced && supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.enhanced = true;
        }
        Ok(self.enhanced)
    }

    /// Wait up to `timeout` for a focus change or quit key
    pub fn poll_signal(&self, timeout: Duration) -> Result<Option<TerminalSignal>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(signal(&event::read()?))
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        if self.focus_reporting {
            let _ = execute!(stdout(), DisableFocusChange);
        }
        let _ = disable_raw_mode();
    }
}

/// Raw-mode terminal reader dispatching key events to a [`KeyBus`]
pub struct TerminalKeyboard {
    raw: RawTerminal,
}

impl TerminalKeyboard {
    /// Enter raw mode and request release/repeat reporting when supported
    pub fn new() -> Result<Self> {
        let mut raw = RawTerminal::enter()?;
        if !raw.enable_key_reporting()? {
            log::warn!("Terminal does not report key releases, releasing immediately after each press");
        }
        Ok(Self { raw })
    }

    /// Whether the terminal reports releases and repeats
    pub fn is_enhanced(&self) -> bool {
        self.raw.enhanced
    }

    /// Wait up to `timeout` for a terminal event and dispatch it to `bus`
    pub fn poll(&mut self, bus: &KeyBus, timeout: Duration) -> Result<InputStatus> {
        if !event::poll(timeout)? {
            return Ok(InputStatus::Running);
        }

        let Event::Key(key) = event::read()? else {
            return Ok(InputStatus::Running);
        };

        match translate(&key) {
            TerminalInput::Quit => return Ok(InputStatus::Quit),
            TerminalInput::Key(kind, key_event) => {
                bus.dispatch(kind, &key_event);
                if !self.is_enhanced() && kind == KeyEventKind::Pressed {
                    bus.dispatch(KeyEventKind::Released, &key_event);
                }
            }
            TerminalInput::Ignored => {}
        }
        Ok(InputStatus::Running)
    }
}

/// Classify a terminal event for a player reading keys elsewhere
pub fn signal(event: &Event) -> Option<TerminalSignal> {
    match event {
        Event::FocusGained => Some(TerminalSignal::FocusGained),
        Event::FocusLost => Some(TerminalSignal::FocusLost),
        Event::Key(key) if key.kind == TermKeyKind::Press && translate(key) == TerminalInput::Quit => {
            Some(TerminalSignal::Quit)
        }
        _ => None,
    }
}

/// Classify a crossterm key event
pub fn translate(key: &event::KeyEvent) -> TerminalInput {
    match key.code {
        KeyCode::Esc => TerminalInput::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => TerminalInput::Quit,
        KeyCode::Char(c) => {
            let key_name = c.to_string();
            match key.kind {
                TermKeyKind::Press => TerminalInput::Key(KeyEventKind::Pressed, KeyEvent::new(key_name)),
                TermKeyKind::Repeat => {
                    TerminalInput::Key(KeyEventKind::Pressed, KeyEvent::repeated(key_name))
                }
                TermKeyKind::Release => {
                    TerminalInput::Key(KeyEventKind::Released, KeyEvent::new(key_name))
                }
            }
        }
        _ => TerminalInput::Ignored,
    }
}
