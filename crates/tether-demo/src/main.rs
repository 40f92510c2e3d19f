//! Small interactive CLI used as the subject in the harness's own tests.

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

const VERSION_LINE: &str = "tether-demo v1.0.0";

const BOLD_CYAN: &str = "\x1b[1;36m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Demo subject for tether.
#[derive(Parser, Debug)]
#[command(name = "tether-demo", about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the version line
    Version,

    /// Greet someone and ask about the weather
    Hello {
        /// Who to greet
        #[arg(long, default_value = "World")]
        who: String,
    },

    /// Write a message to stderr and exit with the given code
    Fail {
        #[arg(long, default_value_t = 1)]
        code: i32,

        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weather {
    Sunny,
    Cloudy,
    Rainy,
}

impl Weather {
    const ALL: [Weather; 3] = [Weather::Sunny, Weather::Cloudy, Weather::Rainy];

    fn label(self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
        }
    }

    fn response(self) -> &'static str {
        match self {
            Weather::Sunny => "The weather is great, that's awesome! Go for a walk.",
            Weather::Cloudy => "The weather is okay, maybe take a jacket.",
            Weather::Rainy => "The weather is not good, stay home and read a book.",
        }
    }

    /// Interpret a typed answer; anything unrecognized keeps the default.
    fn from_answer(answer: &str) -> Weather {
        let answer = answer.trim().to_ascii_lowercase();
        match answer.as_str() {
            "2" | "cloudy" | "ok" | "okay" => Weather::Cloudy,
            "3" | "rainy" | "bad" | "not good" => Weather::Rainy,
            _ => Weather::Sunny,
        }
    }
}

/// Keeps the terminal in raw mode until dropped.
struct RawMode;

impl RawMode {
    fn enable() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("switching terminal to raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("{VERSION_LINE}");
            Ok(())
        }
        Commands::Hello { who } => hello(&who),
        Commands::Fail { code, message } => {
            eprintln!("{message}");
            std::process::exit(code);
        }
    }
}

fn hello(who: &str) -> anyhow::Result<()> {
    let mut out = io::stdout();
    writeln!(out, "Hello, {who}!")?;

    let choice = if io::stdin().is_terminal() {
        let _raw = RawMode::enable()?;
        write!(out, "How is the weather today?\r\n")?;
        select_with_keys(&mut out)?
    } else {
        writeln!(out, "How is the weather today? (Sunny, Cloudy, Rainy)")?;
        out.flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer).context("reading answer")?;
        Weather::from_answer(&answer)
    };

    writeln!(out, "{GREEN}{}{RESET}", choice.response())?;
    out.flush()?;
    Ok(())
}

/// Arrow-key menu. Up/down move the cursor, Enter selects.
///
/// Raw mode turns off output post-processing, so lines end in `\r\n`.
fn select_with_keys(out: &mut impl Write) -> anyhow::Result<Weather> {
    let mut selected = 0usize;
    draw_menu(out, selected, false)?;

    loop {
        let Event::Key(key) = event::read().context("reading key")? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Up => selected = selected.saturating_sub(1),
            KeyCode::Down => selected = (selected + 1).min(Weather::ALL.len() - 1),
            KeyCode::Enter => return Ok(Weather::ALL[selected]),
            // A bare line feed arrives as Ctrl-J in raw mode.
            KeyCode::Char('j') if ctrl => return Ok(Weather::ALL[selected]),
            KeyCode::Char('c') if ctrl => bail!("interrupted"),
            _ => continue,
        }
        draw_menu(out, selected, true)?;
    }
}

fn draw_menu(out: &mut impl Write, selected: usize, redraw: bool) -> io::Result<()> {
    if redraw {
        write!(out, "\x1b[{}A", Weather::ALL.len())?;
    }
    for (i, weather) in Weather::ALL.iter().enumerate() {
        if i == selected {
            write!(out, "\r\x1b[2K{BOLD_CYAN}> {}{RESET}\r\n", weather.label())?;
        } else {
            write!(out, "\r\x1b[2K  {}\r\n", weather.label())?;
        }
    }
    out.flush()
}
