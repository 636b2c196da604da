//! vibe-freqkeys - Play pitch frequencies from your computer keyboard
//!
//! Links a frequency keyboard controller to the OS or terminal keyboard and
//! prints the frequency of every key pressed.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use vibelang_freqkeys::{
    config::{Config, InputBackend},
    controller::{FrequencyKeyboardController, KeyPress},
    events::{InputStatus, KeyBus},
    frequency::KeyboardLayout,
    os_keyboard::{is_available as os_keyboard_available, OsKeyboardListener},
    terminal::{RawTerminal, TerminalKeyboard, TerminalSignal},
};

const POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "vibe-freqkeys")]
#[command(author, version, about = "Keyboard-to-frequency player for VibeLang", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (default: ~/.config/vibe-freqkeys/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base frequency in Hz (pitch of the N key)
    #[arg(short, long)]
    base_frequency: Option<f64>,

    /// Octave of the bottom key rows (1-7)
    #[arg(long)]
    first_octave: Option<u8>,

    /// Octave of the number/QWERTY key rows (1-7)
    #[arg(long)]
    second_octave: Option<u8>,

    /// Keyboard layout
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Read keys from the terminal instead of the OS listener
    #[arg(long)]
    terminal: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Us,
    German,
}

impl From<LayoutArg> for KeyboardLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Us => KeyboardLayout::Us,
            LayoutArg::German => KeyboardLayout::German,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
    /// Print the key to frequency table
    Table,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            return Ok(());
        }
        Some(Commands::ConfigPath) => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            return Ok(());
        }
        _ => {}
    }

    // Load config
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(),
    };

    // Apply CLI overrides
    if let Some(base_frequency) = cli.base_frequency {
        config.controller.base_frequency = base_frequency;
    }
    if let Some(octave) = cli.first_octave {
        config.controller.first_octave = octave;
    }
    if let Some(octave) = cli.second_octave {
        config.controller.second_octave = octave;
    }
    if let Some(layout) = cli.layout {
        config.controller.layout = layout.into();
    }
    if cli.terminal {
        config.input.backend = InputBackend::Terminal;
    }

    let options = config
        .to_options()?
        .with_attack(|press| print_press("down", press))
        .with_release(|press| print_press("up", press));

    let bus = Arc::new(KeyBus::new());
    let mut controller = FrequencyKeyboardController::with_options(bus.clone(), options)?;

    if matches!(cli.command, Some(Commands::Table)) {
        print_table(&controller);
        return Ok(());
    }

    controller.link()?;
    let result = run(&bus, config.input.backend, controller.layout());
    controller.unlink();
    result
}

fn run(bus: &KeyBus, backend: InputBackend, layout: KeyboardLayout) -> Result<()> {
    let use_os = match backend {
        InputBackend::Os => {
            if !os_keyboard_available() {
                bail!("OS keyboard input is not available on this system");
            }
            true
        }
        InputBackend::Terminal => false,
        InputBackend::Auto => os_keyboard_available(),
    };

    if use_os {
        if let Some(mut listener) = OsKeyboardListener::new(layout) {
            log::info!("Using OS keyboard input");
            // no echo of played keys while the listener runs
            let terminal = RawTerminal::enter()?;
            println!("Play with the Z-M and Q-U rows, Esc to quit\r");
            return run_os_listener(bus, &mut listener, &terminal);
        }
        log::warn!("OS keyboard listener could not be started, falling back to terminal input");
    }

    let mut terminal = TerminalKeyboard::new()?;
    log::info!("Using terminal keyboard input (enhanced: {})", terminal.is_enhanced());
    println!("Play with the Z-M and Q-U rows, Esc to quit\r");
    while terminal.poll(bus, POLL_INTERVAL)? == InputStatus::Running {}
    Ok(())
}

fn run_os_listener(bus: &KeyBus, listener: &mut OsKeyboardListener, terminal: &RawTerminal) -> Result<()> {
    loop {
        match terminal.poll_signal(Duration::ZERO)? {
            Some(TerminalSignal::FocusGained) => listener.set_focused(bus, true),
            Some(TerminalSignal::FocusLost) => listener.set_focused(bus, false),
            Some(TerminalSignal::Quit) => return Ok(()),
            None => {}
        }

        if listener.pump(bus, POLL_INTERVAL) == InputStatus::Quit {
            return Ok(());
        }
    }
}

fn print_press(direction: &str, press: &KeyPress) {
    // raw mode needs explicit carriage returns
    print!(
        "{:>4} {:>2}  {:<3} x{:<8.4} {:>9.2} Hz\r\n",
        direction, press.key, press.note, press.frequency, press.hz
    );
    let _ = std::io::stdout().flush();
}

fn print_table(controller: &FrequencyKeyboardController) {
    let table = controller.frequency_table();
    let base = controller.base_frequency();
    println!(
        "Layout {:?}, base {} Hz, octaves {}/{}",
        table.layout(),
        base,
        table.first_octave(),
        table.second_octave()
    );
    for (key, entry) in table.sorted() {
        println!("  {}  {:<3}  x{:<8.4}  {:>9.2} Hz", key, entry.note, entry.ratio, base * entry.ratio);
    }
}
