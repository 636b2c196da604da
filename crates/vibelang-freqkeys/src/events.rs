//! Keyboard events and the event source contract
//!
//! - [`KeyEvent`] - A raw key press or release
//! - [`Trigger`] - A handler registered for an event kind
//! - [`EventSource`] - Anything handlers can be registered with
//! - [`KeyBus`] - In-process event source that dispatches to its handlers

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Event names a handler can be registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    /// A key was pressed (`keydown`)
    Pressed,
    /// A key was released (`keyup`)
    Released,
}

impl KeyEventKind {
    /// Event name as understood by keyboard event sources
    pub fn name(self) -> &'static str {
        match self {
            KeyEventKind::Pressed => "keydown",
            KeyEventKind::Released => "keyup",
        }
    }
}

impl fmt::Display for KeyEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a keyboard input loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    /// Keep pumping events
    Running,
    /// The user asked to quit, or the input went away
    Quit,
}

/// A raw keyboard event as delivered by an event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key value, e.g. `"n"` or `"Escape"`
    pub key: String,
    /// Whether this is an auto-repeat of a held key
    pub repeat: bool,
}

impl KeyEvent {
    /// A first (non-repeat) event for `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            repeat: false,
        }
    }

    /// An auto-repeat event for `key`
    pub fn repeated(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            repeat: true,
        }
    }
}

type HandlerFn = dyn Fn(&KeyEvent) + Send + Sync;

/// A key event handler compared by identity.
///
/// Clones share identity. Two triggers built from identical closures are
/// different triggers.
#[derive(Clone)]
pub struct Trigger(Arc<HandlerFn>);

impl Trigger {
    /// Wrap a closure into a new trigger
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Invoke the handler
    pub fn call(&self, event: &KeyEvent) {
        (self.0)(event)
    }

    /// Identity comparison
    pub fn same(&self, other: &Trigger) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Trigger {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Trigger {}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trigger({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// A publisher of keyboard events handlers can subscribe to
pub trait EventSource: Send + Sync {
    /// Register a handler for an event kind
    fn register(&self, kind: KeyEventKind, trigger: Trigger);

    /// Remove a previously registered handler
    fn unregister(&self, kind: KeyEventKind, trigger: &Trigger);
}

/// In-process keyboard event source.
///
/// Registering the same trigger twice for a kind keeps a single entry,
/// unregistering an unknown trigger does nothing.
#[derive(Default)]
pub struct KeyBus {
    handlers: Mutex<HashMap<KeyEventKind, Vec<Trigger>>>,
}

impl KeyBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<KeyEventKind, Vec<Trigger>>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver an event to every handler registered for `kind`.
    ///
    /// Handlers run outside the lock and may (un)register.
    pub fn dispatch(&self, kind: KeyEventKind, event: &KeyEvent) {
        let handlers = self.handlers(kind);
        log::trace!("{} '{}' -> {} handler(s)", kind, event.key, handlers.len());
        for handler in handlers {
            handler.call(event);
        }
    }

    /// Dispatch a key press
    pub fn press(&self, event: &KeyEvent) {
        self.dispatch(KeyEventKind::Pressed, event);
    }

    /// Dispatch a key release
    pub fn release(&self, event: &KeyEvent) {
        self.dispatch(KeyEventKind::Released, event);
    }

    /// Snapshot of the handlers currently registered for `kind`
    pub fn handlers(&self, kind: KeyEventKind) -> Vec<Trigger> {
        self.lock().get(&kind).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for `kind`
    pub fn handler_count(&self, kind: KeyEventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Whether `trigger` is registered for `kind`
    pub fn is_registered(&self, kind: KeyEventKind, trigger: &Trigger) -> bool {
        self.lock()
            .get(&kind)
            .is_some_and(|handlers| handlers.iter().any(|h| h.same(trigger)))
    }
}

impl EventSource for KeyBus {
    fn register(&self, kind: KeyEventKind, trigger: Trigger) {
        let mut handlers = self.lock();
        let list = handlers.entry(kind).or_default();
        if !list.iter().any(|h| h.same(&trigger)) {
            list.push(trigger);
        }
    }

    fn unregister(&self, kind: KeyEventKind, trigger: &Trigger) {
        if let Some(list) = self.lock().get_mut(&kind) {
            list.retain(|h| !h.same(trigger));
        }
    }
}

impl fmt::Debug for KeyBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBus")
            .field("keydown", &self.handler_count(KeyEventKind::Pressed))
            .field("keyup", &self.handler_count(KeyEventKind::Released))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_trigger(counter: &Arc<AtomicUsize>) -> Trigger {
        let counter = counter.clone();
        Trigger::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_trigger_identity() {
        let a = Trigger::new(|_| {});
        let b = Trigger::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_dispatch_reaches_registered_kind_only() {
        let bus = KeyBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.register(KeyEventKind::Pressed, counting_trigger(&count));

        bus.press(&KeyEvent::new("n"));
        bus.release(&KeyEvent::new("n"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_register_keeps_one_entry() {
        let bus = KeyBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let trigger = counting_trigger(&count);
        bus.register(KeyEventKind::Pressed, trigger.clone());
        bus.register(KeyEventKind::Pressed, trigger.clone());
        assert_eq!(bus.handler_count(KeyEventKind::Pressed), 1);

        bus.press(&KeyEvent::new("n"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_by_identity() {
        let bus = KeyBus::new();
        let a = Trigger::new(|_| {});
        let b = Trigger::new(|_| {});
        bus.register(KeyEventKind::Released, a.clone());
        bus.register(KeyEventKind::Released, b.clone());

        bus.unregister(KeyEventKind::Released, &a);
        assert!(!bus.is_registered(KeyEventKind::Released, &a));
        assert!(bus.is_registered(KeyEventKind::Released, &b));

        // unknown trigger
        bus.unregister(KeyEventKind::Released, &Trigger::new(|_| {}));
        assert_eq!(bus.handler_count(KeyEventKind::Released), 1);
    }

    #[test]
    fn test_handler_may_unregister_itself() {
        let bus = Arc::new(KeyBus::new());
        let slot: Arc<Mutex<Option<Trigger>>> = Arc::new(Mutex::new(None));
        let trigger = {
            let bus = bus.clone();
            let slot = slot.clone();
            Trigger::new(move |_| {
                if let Some(me) = slot.lock().unwrap().take() {
                    bus.unregister(KeyEventKind::Pressed, &me);
                }
            })
        };
        *slot.lock().unwrap() = Some(trigger.clone());
        bus.register(KeyEventKind::Pressed, trigger);

        bus.press(&KeyEvent::new("x"));
        assert_eq!(bus.handler_count(KeyEventKind::Pressed), 0);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(KeyEventKind::Pressed.name(), "keydown");
        assert_eq!(KeyEventKind::Released.to_string(), "keyup");
    }
}
