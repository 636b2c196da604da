//! OS-level keyboard input using rdev
//!
//! A listener thread intercepts key presses and releases at the OS level and
//! forwards them over a channel. [`OsKeyboardListener::pump`] drains the
//! channel on the caller's thread and dispatches to a [`KeyBus`], so handlers
//! never run on the listener thread.
//!
//! rdev sees keys typed into every window. Events arriving while the player
//! is unfocused are dropped, and losing focus releases every held key.

use crate::events::{InputStatus, KeyBus, KeyEvent, KeyEventKind};
use crate::frequency::KeyboardLayout;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use rdev::{listen, Event, EventType, Key};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const ESCAPE: char = '\x1b';

/// Keyboard events from the OS-level listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKeyEvent {
    /// A key was pressed (also sent for auto-repeat)
    Press(char),
    /// A key was released
    Release(char),
}

/// OS-level keyboard listener that captures key press and release events
pub struct OsKeyboardListener {
    /// Channel receiver for keyboard events
    event_rx: Receiver<OsKeyEvent>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
    /// Held keys and focus state
    tracker: KeyTracker,
    /// Listener thread handle
    _thread: JoinHandle<()>,
}

impl OsKeyboardListener {
    /// Start the OS keyboard listener
    ///
    /// Returns None if the listener couldn't be started (e.g., on systems without X11)
    pub fn new(layout: KeyboardLayout) -> Option<Self> {
        if !is_available() {
            return None;
        }

        let (tx, rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let thread = thread::spawn(move || {
            run_listener(tx, shutdown_clone, layout);
        });

        // Give the thread a moment to start
        thread::sleep(Duration::from_millis(100));

        Some(Self {
            event_rx: rx,
            shutdown,
            tracker: KeyTracker::new(),
            _thread: thread,
        })
    }

    /// Try to receive a raw keyboard event (non-blocking)
    pub fn try_recv(&self) -> Option<OsKeyEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for events, then dispatch everything queued to `bus`.
    pub fn pump(&mut self, bus: &KeyBus, timeout: Duration) -> InputStatus {
        let first = match self.event_rx.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return InputStatus::Running,
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("OS keyboard listener stopped");
                return InputStatus::Quit;
            }
        };

        let mut next = Some(first);
        while let Some(event) = next {
            if self.tracker.handle(bus, event) == InputStatus::Quit {
                return InputStatus::Quit;
            }
            next = self.try_recv();
        }
        InputStatus::Running
    }

    /// Update the focus state, releasing held keys when focus is lost
    pub fn set_focused(&mut self, bus: &KeyBus, focused: bool) {
        self.tracker.set_focused(bus, focused);
    }
}

/// Held keys and focus state of an OS keyboard stream
#[derive(Debug)]
pub struct KeyTracker {
    held: HashSet<char>,
    focused: bool,
}

impl Default for KeyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyTracker {
    /// A focused tracker with no keys held
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            focused: true,
        }
    }

    /// Whether events are currently dispatched
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Dispatch one raw event to `bus`. Unfocused events are dropped.
    pub fn handle(&mut self, bus: &KeyBus, event: OsKeyEvent) -> InputStatus {
        if !self.focused {
            return InputStatus::Running;
        }
        if event == OsKeyEvent::Press(ESCAPE) {
            return InputStatus::Quit;
        }
        let (kind, key_event) = translate(&mut self.held, event);
        bus.dispatch(kind, &key_event);
        InputStatus::Running
    }

    /// Update the focus state. Losing focus releases every held key.
    pub fn set_focused(&mut self, bus: &KeyBus, focused: bool) {
        if self.focused && !focused {
            self.release_all(bus);
        }
        self.focused = focused;
    }

    /// Dispatch a release for every held key and forget them
    pub fn release_all(&mut self, bus: &KeyBus) {
        let mut held: Vec<char> = self.held.drain().collect();
        held.sort_unstable();
        for c in held {
            bus.release(&KeyEvent::new(c.to_string()));
        }
    }
}

impl Drop for OsKeyboardListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Turn a raw OS event into a bus event, flagging presses of held keys as repeats
pub fn translate(held: &mut HashSet<char>, event: OsKeyEvent) -> (KeyEventKind, KeyEvent) {
    match event {
        OsKeyEvent::Press(c) => {
            let repeat = !held.insert(c);
            (
                KeyEventKind::Pressed,
                KeyEvent {
                    key: c.to_string(),
                    repeat,
                },
            )
        }
        OsKeyEvent::Release(c) => {
            held.remove(&c);
            (KeyEventKind::Released, KeyEvent::new(c.to_string()))
        }
    }
}

/// Map an rdev Key to the character it produces on `layout`
///
/// Note: rdev reports physical key positions, not logical characters.
/// On German QWERTZ keyboards the physical Z position is the Y key and
/// vice versa.
pub fn key_to_char(key: Key, layout: KeyboardLayout) -> Option<char> {
    match (key, layout) {
        (Key::KeyZ, KeyboardLayout::German) => Some('y'),
        (Key::KeyY, KeyboardLayout::German) => Some('z'),
        (Key::KeyZ, KeyboardLayout::Us) => Some('z'),
        (Key::KeyY, KeyboardLayout::Us) => Some('y'),
        _ => key_to_char_common(key),
    }
}

fn key_to_char_common(key: Key) -> Option<char> {
    match key {
        // First octave: bottom row (Z X C V B N M) and home row (S D G H J)
        Key::KeyX => Some('x'),
        Key::KeyC => Some('c'),
        Key::KeyV => Some('v'),
        Key::KeyB => Some('b'),
        Key::KeyN => Some('n'),
        Key::KeyM => Some('m'),
        Key::KeyS => Some('s'),
        Key::KeyD => Some('d'),
        Key::KeyG => Some('g'),
        Key::KeyH => Some('h'),
        Key::KeyJ => Some('j'),

        // Second octave: QWERTY row (Q W E R T Y U) and number row (2 3 5 6 7)
        Key::KeyQ => Some('q'),
        Key::KeyW => Some('w'),
        Key::KeyE => Some('e'),
        Key::KeyR => Some('r'),
        Key::KeyT => Some('t'),
        Key::KeyU => Some('u'),
        Key::Num2 => Some('2'),
        Key::Num3 => Some('3'),
        Key::Num5 => Some('5'),
        Key::Num6 => Some('6'),
        Key::Num7 => Some('7'),

        Key::Escape => Some(ESCAPE),

        _ => None,
    }
}

/// Run the rdev listener (blocking - runs in its own thread)
fn run_listener(tx: Sender<OsKeyEvent>, shutdown: Arc<AtomicBool>, layout: KeyboardLayout) {
    let callback = move |event: Event| {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }

        match event.event_type {
            EventType::KeyPress(key) => {
                if let Some(c) = key_to_char(key, layout) {
                    let _ = tx.send(OsKeyEvent::Press(c));
                }
            }
            EventType::KeyRelease(key) => {
                if let Some(c) = key_to_char(key, layout) {
                    let _ = tx.send(OsKeyEvent::Release(c));
                }
            }
            _ => {}
        }
    };

    // This blocks until an error occurs
    if let Err(e) = listen(callback) {
        log::error!("OS keyboard listener error: {:?}", e);
    }
}

/// Check if the OS keyboard listener is likely to work on this system
pub fn is_available() -> bool {
    // On Linux, rdev requires X11 or Wayland
    #[cfg(target_os = "linux")]
    {
        std::env::var("DISPLAY").is_ok() || std::env::var("WAYLAND_DISPLAY").is_ok()
    }

    #[cfg(not(target_os = "linux"))]
    {
        true
    }
}
