//! Keyboard-link controller
//!
//! Holds a pair of *pending* triggers (what would be registered) and, while
//! linked, the pair of *linked* triggers (what is registered with the event
//! source). [`FrequencyKeyboardController::link`],
//! [`unlink`](FrequencyKeyboardController::unlink) and
//! [`restart`](FrequencyKeyboardController::restart) are the only operations
//! touching the event source.
//!
//! Triggers are compared by identity: a new closure is a new trigger even if
//! its body is identical to the current one.

use crate::error::{Error, LinkConflict, Result};
use crate::events::{EventSource, KeyEvent, KeyEventKind, Trigger};
use crate::frequency::{
    validate_base_frequency, validate_octave, FrequencyTable, KeyboardLayout,
    DEFAULT_BASE_FREQUENCY, DEFAULT_FIRST_OCTAVE, DEFAULT_SECOND_OCTAVE, RESET_BASE_FREQUENCY,
};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Payload delivered to attack and release callbacks
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    /// Key as reported by the event source
    pub key: String,
    /// Ratio to the base frequency, from the frequency table
    pub frequency: f64,
    /// Note label, e.g. `A1`
    pub note: String,
    /// Absolute pitch in Hz (`base_frequency * frequency`)
    pub hz: f64,
}

/// User callback receiving note payloads
pub type NoteCallback = Arc<dyn Fn(&KeyPress) + Send + Sync>;

/// Tuning state shared with the triggers built by a controller
#[derive(Debug, Clone)]
struct Tuning {
    base_frequency: f64,
    table: FrequencyTable,
}

impl Tuning {
    fn new(base_frequency: f64, layout: KeyboardLayout, first_octave: u8, second_octave: u8) -> Self {
        Self {
            base_frequency,
            table: FrequencyTable::new(layout, first_octave, second_octave),
        }
    }

    fn key_press(&self, key: &str) -> Option<KeyPress> {
        self.table.get(key).map(|entry| KeyPress {
            key: key.to_string(),
            frequency: entry.ratio,
            note: entry.note.clone(),
            hz: self.base_frequency * entry.ratio,
        })
    }
}

/// Options for [`FrequencyKeyboardController::with_options`]
#[derive(Clone)]
pub struct ControllerOptions {
    /// Attack (key down) callback, logs when absent
    pub attack: Option<NoteCallback>,
    /// Release (key up) callback, logs when absent
    pub release: Option<NoteCallback>,
    /// Reconcile automatically when a trigger changes while linked
    pub auto_restart: bool,
    /// Pitch of `A` in octave 1
    pub base_frequency: f64,
    /// Octave of the lower key row
    pub first_octave: u8,
    /// Octave of the upper key row
    pub second_octave: u8,
    /// Key layout
    pub layout: KeyboardLayout,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            attack: None,
            release: None,
            auto_restart: false,
            base_frequency: DEFAULT_BASE_FREQUENCY,
            first_octave: DEFAULT_FIRST_OCTAVE,
            second_octave: DEFAULT_SECOND_OCTAVE,
            layout: KeyboardLayout::default(),
        }
    }
}

impl ControllerOptions {
    /// Set the attack callback
    pub fn with_attack<F>(mut self, callback: F) -> Self
    where
        F: Fn(&KeyPress) + Send + Sync + 'static,
    {
        self.attack = Some(Arc::new(callback));
        self
    }

    /// Set the release callback
    pub fn with_release<F>(mut self, callback: F) -> Self
    where
        F: Fn(&KeyPress) + Send + Sync + 'static,
    {
        self.release = Some(Arc::new(callback));
        self
    }

    /// Enable or disable auto restart
    pub fn with_auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    /// Set the base frequency
    pub fn with_base_frequency(mut self, base_frequency: f64) -> Self {
        self.base_frequency = base_frequency;
        self
    }

    /// Set both octaves
    pub fn with_octaves(mut self, first: u8, second: u8) -> Self {
        self.first_octave = first;
        self.second_octave = second;
        self
    }

    /// Set the key layout
    pub fn with_layout(mut self, layout: KeyboardLayout) -> Self {
        self.layout = layout;
        self
    }
}

impl fmt::Debug for ControllerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("attack", &self.attack.is_some())
            .field("release", &self.release.is_some())
            .field("auto_restart", &self.auto_restart)
            .field("base_frequency", &self.base_frequency)
            .field("first_octave", &self.first_octave)
            .field("second_octave", &self.second_octave)
            .field("layout", &self.layout)
            .finish()
    }
}

/// Triggers currently registered with the event source
#[derive(Debug, Clone)]
struct LinkedTriggers {
    attack: Trigger,
    release: Trigger,
}

/// Maps key events to frequencies and manages their registration
pub struct FrequencyKeyboardController {
    source: Arc<dyn EventSource>,
    tuning: Arc<RwLock<Tuning>>,
    auto_restart: bool,
    pending_attack: Trigger,
    pending_release: Trigger,
    linked: Option<LinkedTriggers>,
}

impl FrequencyKeyboardController {
    /// Create an unlinked controller with default settings and logging callbacks
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        let tuning = Arc::new(RwLock::new(Tuning::new(
            DEFAULT_BASE_FREQUENCY,
            KeyboardLayout::default(),
            DEFAULT_FIRST_OCTAVE,
            DEFAULT_SECOND_OCTAVE,
        )));
        let pending_attack = logging_trigger(&tuning, KeyEventKind::Pressed);
        let pending_release = logging_trigger(&tuning, KeyEventKind::Released);

        Self {
            source,
            tuning,
            auto_restart: false,
            pending_attack,
            pending_release,
            linked: None,
        }
    }

    /// Create an unlinked controller from options, validating every setting
    pub fn with_options(source: Arc<dyn EventSource>, options: ControllerOptions) -> Result<Self> {
        let base_frequency = validate_base_frequency(options.base_frequency)?;
        let first_octave = validate_octave(options.first_octave)?;
        let second_octave = validate_octave(options.second_octave)?;

        let tuning = Arc::new(RwLock::new(Tuning::new(
            base_frequency,
            options.layout,
            first_octave,
            second_octave,
        )));
        let pending_attack = match options.attack {
            Some(callback) => note_trigger(&tuning, callback),
            None => logging_trigger(&tuning, KeyEventKind::Pressed),
        };
        let pending_release = match options.release {
            Some(callback) => note_trigger(&tuning, callback),
            None => logging_trigger(&tuning, KeyEventKind::Released),
        };

        Ok(Self {
            source,
            tuning,
            auto_restart: options.auto_restart,
            pending_attack,
            pending_release,
            linked: None,
        })
    }

    fn tuning(&self) -> RwLockReadGuard<'_, Tuning> {
        self.tuning.read().unwrap_or_else(|e| e.into_inner())
    }

    fn tuning_mut(&self) -> RwLockWriteGuard<'_, Tuning> {
        self.tuning.write().unwrap_or_else(|e| e.into_inner())
    }

    // ========== Configuration ==========

    /// Pitch of `A` in octave 1
    pub fn base_frequency(&self) -> f64 {
        self.tuning().base_frequency
    }

    /// Set the base frequency, must lie in (0, 30000)
    pub fn set_base_frequency(&mut self, base_frequency: f64) -> Result<()> {
        let base_frequency = validate_base_frequency(base_frequency)?;
        self.tuning_mut().base_frequency = base_frequency;
        Ok(())
    }

    /// Octave of the lower key row
    pub fn first_octave(&self) -> u8 {
        self.tuning().table.first_octave()
    }

    /// Set the octave of the lower key row, must lie in 1..=7
    pub fn set_first_octave(&mut self, octave: u8) -> Result<()> {
        let octave = validate_octave(octave)?;
        let mut tuning = self.tuning_mut();
        tuning.table = FrequencyTable::new(tuning.table.layout(), octave, tuning.table.second_octave());
        Ok(())
    }

    /// Octave of the upper key row
    pub fn second_octave(&self) -> u8 {
        self.tuning().table.second_octave()
    }

    /// Set the octave of the upper key row, must lie in 1..=7
    pub fn set_second_octave(&mut self, octave: u8) -> Result<()> {
        let octave = validate_octave(octave)?;
        let mut tuning = self.tuning_mut();
        tuning.table = FrequencyTable::new(tuning.table.layout(), tuning.table.first_octave(), octave);
        Ok(())
    }

    /// Key layout
    pub fn layout(&self) -> KeyboardLayout {
        self.tuning().table.layout()
    }

    /// Switch the key layout
    pub fn set_layout(&mut self, layout: KeyboardLayout) {
        let mut tuning = self.tuning_mut();
        tuning.table = FrequencyTable::new(layout, tuning.table.first_octave(), tuning.table.second_octave());
    }

    /// Snapshot of the current frequency table
    pub fn frequency_table(&self) -> FrequencyTable {
        self.tuning().table.clone()
    }

    /// Payload a trigger would deliver for `key`, if it is mapped
    pub fn key_press(&self, key: &str) -> Option<KeyPress> {
        self.tuning().key_press(key)
    }

    /// Whether trigger changes reconcile immediately while linked
    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    /// Enable or disable auto restart
    pub fn set_auto_restart(&mut self, auto_restart: bool) {
        self.auto_restart = auto_restart;
    }

    // ========== Triggers ==========

    /// Build a trigger that feeds `callback` from this controller's tuning.
    ///
    /// The trigger skips repeats and unmapped keys. It reads the tuning at
    /// event time, so later configuration changes apply to it.
    pub fn trigger<F>(&self, callback: F) -> Trigger
    where
        F: Fn(&KeyPress) + Send + Sync + 'static,
    {
        note_trigger(&self.tuning, Arc::new(callback))
    }

    /// Trigger used for key down once linked
    pub fn pending_attack(&self) -> &Trigger {
        &self.pending_attack
    }

    /// Replace the pending attack trigger
    pub fn set_pending_attack(&mut self, trigger: Trigger) -> Result<()> {
        if trigger.same(&self.pending_attack) {
            return Err(Error::NoOp("attack"));
        }
        self.pending_attack = trigger;
        self.auto_reconcile()
    }

    /// Trigger used for key up once linked
    pub fn pending_release(&self) -> &Trigger {
        &self.pending_release
    }

    /// Replace the pending release trigger
    pub fn set_pending_release(&mut self, trigger: Trigger) -> Result<()> {
        if trigger.same(&self.pending_release) {
            return Err(Error::NoOp("release"));
        }
        self.pending_release = trigger;
        self.auto_reconcile()
    }

    /// Wrap `callback` with [`trigger`](Self::trigger) and make it the pending attack
    pub fn set_attack_callback<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(&KeyPress) + Send + Sync + 'static,
    {
        let trigger = self.trigger(callback);
        self.set_pending_attack(trigger)
    }

    /// Wrap `callback` with [`trigger`](Self::trigger) and make it the pending release
    pub fn set_release_callback<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(&KeyPress) + Send + Sync + 'static,
    {
        let trigger = self.trigger(callback);
        self.set_pending_release(trigger)
    }

    /// Attack trigger registered with the event source, if linked
    pub fn linked_attack(&self) -> Option<&Trigger> {
        self.linked.as_ref().map(|l| &l.attack)
    }

    /// Release trigger registered with the event source, if linked
    pub fn linked_release(&self) -> Option<&Trigger> {
        self.linked.as_ref().map(|l| &l.release)
    }

    fn auto_reconcile(&mut self) -> Result<()> {
        if !(self.auto_restart && self.is_linked()) {
            return Ok(());
        }
        match self.restart() {
            // pending was set back to what is already linked
            Err(Error::NoChange) => Ok(()),
            other => other,
        }
    }

    // ========== Link state ==========

    /// Whether the triggers are registered with the event source
    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    /// Register the pending triggers with the event source
    pub fn link(&mut self) -> Result<()> {
        if let Some(linked) = &self.linked {
            let conflict = if linked.attack.same(&self.pending_attack)
                && linked.release.same(&self.pending_release)
            {
                LinkConflict::Unchanged
            } else {
                LinkConflict::PendingChanged
            };
            return Err(Error::AlreadyLinked(conflict));
        }

        self.source.register(KeyEventKind::Pressed, self.pending_attack.clone());
        self.source.register(KeyEventKind::Released, self.pending_release.clone());
        self.linked = Some(LinkedTriggers {
            attack: self.pending_attack.clone(),
            release: self.pending_release.clone(),
        });
        log::debug!("Linked attack {:?} and release {:?}", self.pending_attack, self.pending_release);
        Ok(())
    }

    /// Unregister the linked triggers. Does nothing when not linked.
    pub fn unlink(&mut self) {
        if let Some(linked) = self.linked.take() {
            self.source.unregister(KeyEventKind::Pressed, &linked.attack);
            self.source.unregister(KeyEventKind::Released, &linked.release);
            log::debug!("Unlinked attack {:?} and release {:?}", linked.attack, linked.release);
        }
    }

    /// Swap the registered triggers for the pending ones, touching only the
    /// event kinds whose trigger changed.
    pub fn restart(&mut self) -> Result<()> {
        let source = &self.source;
        let linked = self.linked.as_mut().ok_or(Error::NotLinked)?;

        let attack_changed = !linked.attack.same(&self.pending_attack);
        let release_changed = !linked.release.same(&self.pending_release);

        match (attack_changed, release_changed) {
            (true, true) => {
                source.unregister(KeyEventKind::Pressed, &linked.attack);
                source.unregister(KeyEventKind::Released, &linked.release);

                source.register(KeyEventKind::Pressed, self.pending_attack.clone());
                source.register(KeyEventKind::Released, self.pending_release.clone());
                linked.attack = self.pending_attack.clone();
                linked.release = self.pending_release.clone();
                log::debug!("Restarted attack and release triggers");
            }
            (true, false) => {
                source.unregister(KeyEventKind::Pressed, &linked.attack);

                source.register(KeyEventKind::Pressed, self.pending_attack.clone());
                linked.attack = self.pending_attack.clone();
                log::debug!("Restarted attack trigger");
            }
            (false, true) => {
                source.unregister(KeyEventKind::Released, &linked.release);

                source.register(KeyEventKind::Released, self.pending_release.clone());
                linked.release = self.pending_release.clone();
                log::debug!("Restarted release trigger");
            }
            (false, false) => return Err(Error::NoChange),
        }
        Ok(())
    }

    /// Unlink, then restore base frequency 220, octaves 1/2 and logging
    /// triggers. Auto restart and layout are kept.
    pub fn reset(&mut self) {
        self.unlink();
        {
            let mut tuning = self.tuning_mut();
            let layout = tuning.table.layout();
            *tuning = Tuning::new(RESET_BASE_FREQUENCY, layout, DEFAULT_FIRST_OCTAVE, DEFAULT_SECOND_OCTAVE);
        }
        self.pending_attack = logging_trigger(&self.tuning, KeyEventKind::Pressed);
        self.pending_release = logging_trigger(&self.tuning, KeyEventKind::Released);
    }
}

impl fmt::Debug for FrequencyKeyboardController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyKeyboardController")
            .field("tuning", &*self.tuning())
            .field("auto_restart", &self.auto_restart)
            .field("pending_attack", &self.pending_attack)
            .field("pending_release", &self.pending_release)
            .field("linked", &self.linked)
            .finish()
    }
}

fn note_trigger(tuning: &Arc<RwLock<Tuning>>, callback: NoteCallback) -> Trigger {
    let tuning = Arc::clone(tuning);
    Trigger::new(move |event: &KeyEvent| {
        if event.repeat {
            return;
        }
        let press = tuning
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .key_press(&event.key);
        if let Some(press) = press {
            callback(&press);
        }
    })
}

fn logging_trigger(tuning: &Arc<RwLock<Tuning>>, kind: KeyEventKind) -> Trigger {
    note_trigger(
        tuning,
        Arc::new(move |press: &KeyPress| {
            log::info!("{} event: {} -> {} ({:.2} Hz)", kind, press.key, press.note, press.hz);
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyBus;
    use std::sync::Mutex;

    type Recorded = Arc<Mutex<Vec<KeyPress>>>;

    fn setup() -> (Arc<KeyBus>, FrequencyKeyboardController) {
        let bus = Arc::new(KeyBus::new());
        let controller = FrequencyKeyboardController::new(bus.clone());
        (bus, controller)
    }

    fn recorder() -> (Recorded, impl Fn(&KeyPress) + Send + Sync + 'static) {
        let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = recorded.clone();
        (recorded, move |press: &KeyPress| sink.lock().unwrap().push(press.clone()))
    }

    fn counts(bus: &KeyBus) -> (usize, usize) {
        (
            bus.handler_count(KeyEventKind::Pressed),
            bus.handler_count(KeyEventKind::Released),
        )
    }

    #[test]
    fn test_defaults() {
        let (_, controller) = setup();
        assert_eq!(controller.base_frequency(), 440.0);
        assert_eq!(controller.first_octave(), 1);
        assert_eq!(controller.second_octave(), 2);
        assert!(!controller.auto_restart());
        assert!(!controller.is_linked());
        assert!(controller.linked_attack().is_none());
        assert!(controller.linked_release().is_none());
    }

    #[test]
    fn test_config_setters_validate() {
        let (_, mut controller) = setup();

        controller.set_base_frequency(261.63).unwrap();
        assert_eq!(controller.base_frequency(), 261.63);
        for bad in [0.0, -5.0, 30000.0, 1e9] {
            assert!(matches!(controller.set_base_frequency(bad), Err(Error::Configuration(_))));
            assert_eq!(controller.base_frequency(), 261.63);
        }

        controller.set_first_octave(3).unwrap();
        controller.set_second_octave(7).unwrap();
        assert_eq!(controller.first_octave(), 3);
        assert_eq!(controller.second_octave(), 7);
        assert!(matches!(controller.set_first_octave(0), Err(Error::Configuration(_))));
        assert!(matches!(controller.set_second_octave(8), Err(Error::Configuration(_))));
        assert_eq!(controller.first_octave(), 3);
        assert_eq!(controller.second_octave(), 7);
    }

    #[test]
    fn test_with_options_rejects_invalid() {
        let bus = Arc::new(KeyBus::new());
        let options = ControllerOptions::default().with_octaves(1, 9);
        assert!(matches!(
            FrequencyKeyboardController::with_options(bus.clone(), options),
            Err(Error::Configuration(_))
        ));
        let options = ControllerOptions::default().with_base_frequency(-1.0);
        assert!(FrequencyKeyboardController::with_options(bus, options).is_err());
    }

    #[test]
    fn test_link_registers_once() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        assert!(controller.is_linked());
        assert_eq!(counts(&bus), (1, 1));
        assert_eq!(controller.linked_attack(), Some(controller.pending_attack()));
        assert_eq!(controller.linked_release(), Some(controller.pending_release()));

        let err = controller.link().unwrap_err();
        assert!(matches!(err, Error::AlreadyLinked(LinkConflict::Unchanged)));
        assert_eq!(counts(&bus), (1, 1));
    }

    #[test]
    fn test_link_conflict_reports_pending_change() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        controller.set_attack_callback(|_| {}).unwrap();

        let err = controller.link().unwrap_err();
        assert!(matches!(err, Error::AlreadyLinked(LinkConflict::PendingChanged)));
        assert_eq!(counts(&bus), (1, 1));
    }

    #[test]
    fn test_unlink_is_idempotent() {
        let (bus, mut controller) = setup();
        controller.unlink();
        assert!(!controller.is_linked());

        controller.link().unwrap();
        controller.unlink();
        assert!(!controller.is_linked());
        assert_eq!(counts(&bus), (0, 0));
        assert!(controller.linked_attack().is_none());

        controller.unlink();
        assert_eq!(counts(&bus), (0, 0));
    }

    #[test]
    fn test_unlink_removes_linked_not_pending() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        let linked = controller.pending_attack().clone();
        controller.set_attack_callback(|_| {}).unwrap();

        controller.unlink();
        assert!(!bus.is_registered(KeyEventKind::Pressed, &linked));
        assert_eq!(counts(&bus), (0, 0));
    }

    #[test]
    fn test_restart_requires_link() {
        let (bus, mut controller) = setup();
        controller.set_attack_callback(|_| {}).unwrap();
        assert!(matches!(controller.restart(), Err(Error::NotLinked)));
        assert_eq!(counts(&bus), (0, 0));
    }

    #[test]
    fn test_restart_without_change() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        assert!(matches!(controller.restart(), Err(Error::NoChange)));
        assert_eq!(counts(&bus), (1, 1));
    }

    #[test]
    fn test_restart_attack_only() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        let old_attack = controller.pending_attack().clone();
        let release = controller.pending_release().clone();

        controller.set_attack_callback(|_| {}).unwrap();
        controller.restart().unwrap();

        assert!(!bus.is_registered(KeyEventKind::Pressed, &old_attack));
        assert!(bus.is_registered(KeyEventKind::Pressed, controller.pending_attack()));
        assert_eq!(bus.handlers(KeyEventKind::Released), vec![release.clone()]);
        assert_eq!(controller.linked_release(), Some(&release));
        assert_eq!(counts(&bus), (1, 1));
    }

    #[test]
    fn test_restart_release_only() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        let attack = controller.pending_attack().clone();

        controller.set_release_callback(|_| {}).unwrap();
        controller.restart().unwrap();

        assert_eq!(bus.handlers(KeyEventKind::Pressed), vec![attack]);
        assert_eq!(
            bus.handlers(KeyEventKind::Released),
            vec![controller.pending_release().clone()]
        );
        assert_eq!(controller.linked_release(), Some(controller.pending_release()));
    }

    #[test]
    fn test_restart_both() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        controller.set_attack_callback(|_| {}).unwrap();
        controller.set_release_callback(|_| {}).unwrap();
        controller.restart().unwrap();

        assert_eq!(bus.handlers(KeyEventKind::Pressed), vec![controller.pending_attack().clone()]);
        assert_eq!(bus.handlers(KeyEventKind::Released), vec![controller.pending_release().clone()]);
        assert!(matches!(controller.restart(), Err(Error::NoChange)));
    }

    #[test]
    fn test_same_trigger_is_noop() {
        let (_, mut controller) = setup();
        let attack = controller.pending_attack().clone();
        let release = controller.pending_release().clone();
        assert!(matches!(controller.set_pending_attack(attack), Err(Error::NoOp("attack"))));
        assert!(matches!(controller.set_pending_release(release), Err(Error::NoOp("release"))));
    }

    #[test]
    fn test_identical_closures_are_distinct() {
        let (_, mut controller) = setup();
        let a = controller.trigger(|_| {});
        let b = controller.trigger(|_| {});
        controller.set_pending_attack(a).unwrap();
        assert!(controller.set_pending_attack(b).is_ok());
    }

    #[test]
    fn test_press_and_release_payload() {
        let bus = Arc::new(KeyBus::new());
        let (attacks, on_attack) = recorder();
        let (releases, on_release) = recorder();
        let options = ControllerOptions::default()
            .with_attack(on_attack)
            .with_release(on_release);
        let mut controller = FrequencyKeyboardController::with_options(bus.clone(), options).unwrap();
        controller.link().unwrap();

        bus.press(&KeyEvent::new("n"));
        bus.release(&KeyEvent::new("n"));

        let expected = KeyPress {
            key: "n".to_string(),
            frequency: 1.0,
            note: "A1".to_string(),
            hz: 440.0,
        };
        assert_eq!(*attacks.lock().unwrap(), vec![expected.clone()]);
        assert_eq!(*releases.lock().unwrap(), vec![expected]);
    }

    #[test]
    fn test_repeat_and_unmapped_keys_are_ignored() {
        let bus = Arc::new(KeyBus::new());
        let (attacks, on_attack) = recorder();
        let options = ControllerOptions::default().with_attack(on_attack);
        let mut controller = FrequencyKeyboardController::with_options(bus.clone(), options).unwrap();
        controller.link().unwrap();

        bus.press(&KeyEvent::repeated("n"));
        bus.press(&KeyEvent::new("Enter"));
        bus.press(&KeyEvent::new("a"));
        assert!(attacks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_linked_trigger_follows_tuning_changes() {
        let bus = Arc::new(KeyBus::new());
        let (attacks, on_attack) = recorder();
        let options = ControllerOptions::default().with_attack(on_attack);
        let mut controller = FrequencyKeyboardController::with_options(bus.clone(), options).unwrap();
        controller.link().unwrap();
        let attack = controller.pending_attack().clone();
        let release = controller.pending_release().clone();

        controller.set_first_octave(3).unwrap();
        controller.set_second_octave(5).unwrap();
        controller.set_base_frequency(110.0).unwrap();
        controller.set_layout(KeyboardLayout::German);

        assert!(controller.is_linked());
        assert_eq!(counts(&bus), (1, 1));
        assert_eq!(controller.linked_attack(), Some(&attack));
        assert_eq!(controller.linked_release(), Some(&release));
        assert_eq!(bus.handlers(KeyEventKind::Pressed), vec![attack]);
        assert_eq!(bus.handlers(KeyEventKind::Released), vec![release]);

        bus.press(&KeyEvent::new("n"));

        let press = attacks.lock().unwrap()[0].clone();
        assert_eq!(press.note, "A3");
        assert_eq!(press.frequency, 4.0);
        assert_eq!(press.hz, 440.0);
    }

    #[test]
    fn test_manual_restart_swaps_attack() {
        let (bus, mut controller) = setup();
        let (first, on_first) = recorder();
        let (second, on_second) = recorder();

        let a = controller.trigger(on_first);
        controller.set_pending_attack(a.clone()).unwrap();
        controller.link().unwrap();

        let b = controller.trigger(on_second);
        controller.set_pending_attack(b.clone()).unwrap();
        assert_eq!(controller.linked_attack(), Some(&a));
        bus.press(&KeyEvent::new("z"));
        assert_eq!(first.lock().unwrap().len(), 1);
        assert!(second.lock().unwrap().is_empty());

        controller.restart().unwrap();
        assert_eq!(controller.linked_attack(), Some(&b));
        bus.press(&KeyEvent::new("z"));
        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_auto_restart_reconciles_on_set() {
        let (bus, mut controller) = setup();
        controller.set_auto_restart(true);
        controller.link().unwrap();
        let release = controller.pending_release().clone();

        controller.set_attack_callback(|_| {}).unwrap();
        assert_eq!(controller.linked_attack(), Some(controller.pending_attack()));
        assert_eq!(bus.handlers(KeyEventKind::Pressed), vec![controller.pending_attack().clone()]);
        assert_eq!(controller.linked_release(), Some(&release));
    }

    #[test]
    fn test_auto_restart_back_to_linked_trigger() {
        let (bus, mut controller) = setup();
        controller.link().unwrap();
        let linked = controller.pending_attack().clone();
        controller.set_attack_callback(|_| {}).unwrap();

        controller.set_auto_restart(true);
        controller.set_pending_attack(linked.clone()).unwrap();
        assert_eq!(controller.linked_attack(), Some(&linked));
        assert_eq!(counts(&bus), (1, 1));
    }

    #[test]
    fn test_auto_restart_inactive_while_unlinked() {
        let (bus, mut controller) = setup();
        controller.set_auto_restart(true);
        controller.set_attack_callback(|_| {}).unwrap();
        assert!(!controller.is_linked());
        assert_eq!(counts(&bus), (0, 0));
    }

    #[test]
    fn test_reset() {
        let (bus, mut controller) = setup();
        controller.set_auto_restart(true);
        controller.set_base_frequency(1000.0).unwrap();
        controller.set_first_octave(4).unwrap();
        controller.set_second_octave(6).unwrap();
        controller.set_attack_callback(|_| {}).unwrap();
        let custom = controller.pending_attack().clone();
        controller.link().unwrap();

        controller.reset();
        assert!(!controller.is_linked());
        assert_eq!(counts(&bus), (0, 0));
        assert_eq!(controller.base_frequency(), 220.0);
        assert_eq!(controller.first_octave(), 1);
        assert_eq!(controller.second_octave(), 2);
        assert_ne!(controller.pending_attack(), &custom);
        assert!(controller.auto_restart());

        // unlinked reset
        controller.reset();
        assert_eq!(controller.base_frequency(), 220.0);
        assert!(!controller.is_linked());
    }

    #[test]
    fn test_layout_switch() {
        let (_, mut controller) = setup();
        assert_eq!(controller.key_press("z").unwrap().note, "C1");
        controller.set_layout(KeyboardLayout::German);
        assert_eq!(controller.layout(), KeyboardLayout::German);
        assert_eq!(controller.key_press("z").unwrap().note, "A2");
        controller.reset();
        assert_eq!(controller.layout(), KeyboardLayout::German);
    }
}
