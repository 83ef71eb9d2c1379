//! Terminal emulator detection and "open a new window running X"
//!
//! Each platform has its own way to get a fresh visible terminal: a new
//! console on Windows, Terminal.app via AppleScript on macOS, and whichever
//! X11/Wayland emulator is installed elsewhere.

use crate::process::{cmd_line, posix_script, shell_quote, SpawnRequest};
use crate::spawner::{release, Spawner};
use kickoff_core::{KickoffError, Result};
use std::fmt;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Emulators tried in order when nothing is configured
const SEARCH_ORDER: &[Emulator] = &[
    Emulator::XTerminalEmulator,
    Emulator::GnomeTerminal,
    Emulator::Konsole,
    Emulator::Xfce4Terminal,
    Emulator::Alacritty,
    Emulator::Kitty,
    Emulator::WezTerm,
    Emulator::Xterm,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emulator {
    WindowsConsole,
    MacTerminal,
    XTerminalEmulator,
    GnomeTerminal,
    Konsole,
    Xfce4Terminal,
    Alacritty,
    Kitty,
    WezTerm,
    Xterm,
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.chars().any(char::is_whitespace) {
                write!(f, " {}", shell_quote(arg))?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

impl Emulator {
    /// Look up an emulator by name or by path to its binary
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let base = name
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(name)
            .trim_end_matches(".exe")
            .to_ascii_lowercase();

        match base.as_str() {
            "cmd" | "console" | "windows" => Some(Emulator::WindowsConsole),
            "terminal" | "terminal.app" | "osascript" => Some(Emulator::MacTerminal),
            "x-terminal-emulator" => Some(Emulator::XTerminalEmulator),
            "gnome-terminal" => Some(Emulator::GnomeTerminal),
            "konsole" => Some(Emulator::Konsole),
            "xfce4-terminal" => Some(Emulator::Xfce4Terminal),
            "alacritty" => Some(Emulator::Alacritty),
            "kitty" => Some(Emulator::Kitty),
            "wezterm" => Some(Emulator::WezTerm),
            "xterm" => Some(Emulator::Xterm),
            _ => None,
        }
    }

    pub fn binary(&self) -> &'static str {
        match self {
            Emulator::WindowsConsole => "cmd",
            Emulator::MacTerminal => "osascript",
            Emulator::XTerminalEmulator => "x-terminal-emulator",
            Emulator::GnomeTerminal => "gnome-terminal",
            Emulator::Konsole => "konsole",
            Emulator::Xfce4Terminal => "xfce4-terminal",
            Emulator::Alacritty => "alacritty",
            Emulator::Kitty => "kitty",
            Emulator::WezTerm => "wezterm",
            Emulator::Xterm => "xterm",
        }
    }

    pub fn is_available(&self) -> bool {
        which::which(self.binary()).is_ok()
    }

    /// Pick the emulator to use.
    ///
    /// An explicit preference must be installed. Without one, `$TERMINAL` is
    /// honoured when it names a known emulator, then the platform default,
    /// then the first installed emulator from the search order.
    pub fn resolve(preferred: Option<&str>) -> Result<Self> {
        if let Some(name) = preferred {
            let emulator = Emulator::from_name(name).ok_or_else(|| {
                KickoffError::TerminalNotFound(format!("unknown terminal '{}'", name))
            })?;
            if !emulator.is_available() {
                return Err(KickoffError::TerminalNotFound(format!(
                    "'{}' is not installed",
                    emulator.binary()
                )));
            }
            return Ok(emulator);
        }

        if let Ok(name) = std::env::var("TERMINAL") {
            match Emulator::from_name(&name) {
                Some(emulator) if emulator.is_available() => return Ok(emulator),
                _ => debug!(terminal = %name, "Ignoring unusable $TERMINAL"),
            }
        }

        if cfg!(target_os = "windows") {
            return Ok(Emulator::WindowsConsole);
        }
        if cfg!(target_os = "macos") {
            return Ok(Emulator::MacTerminal);
        }

        SEARCH_ORDER
            .iter()
            .copied()
            .find(Emulator::is_available)
            .ok_or_else(|| {
                let tried: Vec<&str> = SEARCH_ORDER.iter().map(|e| e.binary()).collect();
                KickoffError::TerminalNotFound(format!("tried {}", tried.join(", ")))
            })
    }

    /// The command that opens a window titled after the request and runs it
    pub fn invocation(&self, request: &SpawnRequest) -> Invocation {
        let title = request.title.clone();
        let sh = |script: String| vec!["sh".to_string(), "-c".to_string(), script];
        let script = posix_script(request);

        let (program, args): (&str, Vec<String>) = match self {
            Emulator::WindowsConsole => {
                // `start` gives the inner cmd a console of its own
                let flag = if request.hold { "/K" } else { "/C" };
                (
                    "cmd",
                    vec![
                        "/C".to_string(),
                        "start".to_string(),
                        format!("\"{}\"", title.replace('"', "")),
                        "cmd".to_string(),
                        "/S".to_string(),
                        flag.to_string(),
                        format!("\"{}\"", cmd_line(request)),
                    ],
                )
            }
            Emulator::MacTerminal => {
                let script = format!("{}; {}", osc_title(&title), script);
                (
                    "osascript",
                    vec![
                        "-e".to_string(),
                        format!(
                            "tell application \"Terminal\" to do script \"{}\"",
                            applescript_escape(&script)
                        ),
                        "-e".to_string(),
                        "tell application \"Terminal\" to activate".to_string(),
                    ],
                )
            }
            Emulator::GnomeTerminal => (
                "gnome-terminal",
                [vec!["--title".to_string(), title, "--".to_string()], sh(script)].concat(),
            ),
            Emulator::Konsole => (
                "konsole",
                [
                    vec!["-p".to_string(), format!("tabtitle={}", title), "-e".to_string()],
                    sh(script),
                ]
                .concat(),
            ),
            Emulator::Xfce4Terminal => (
                "xfce4-terminal",
                [vec!["--title".to_string(), title, "-x".to_string()], sh(script)].concat(),
            ),
            Emulator::Alacritty => (
                "alacritty",
                [vec!["--title".to_string(), title, "-e".to_string()], sh(script)].concat(),
            ),
            Emulator::Kitty => (
                "kitty",
                [vec!["--title".to_string(), title], sh(script)].concat(),
            ),
            Emulator::WezTerm => (
                "wezterm",
                [
                    vec!["start".to_string(), "--".to_string()],
                    sh(format!("{}; {}", osc_title(&title), script)),
                ]
                .concat(),
            ),
            Emulator::XTerminalEmulator | Emulator::Xterm => (
                self.binary(),
                [vec!["-T".to_string(), title, "-e".to_string()], sh(script)].concat(),
            ),
        };

        Invocation {
            program: program.to_string(),
            args,
        }
    }
}

impl fmt::Display for Emulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Opens every target in a new visible terminal window
#[derive(Debug, Clone, Copy)]
pub struct TerminalSpawner {
    emulator: Emulator,
}

impl TerminalSpawner {
    pub fn new(emulator: Emulator) -> Self {
        Self { emulator }
    }

    /// Resolve the emulator to use, see [`Emulator::resolve`]
    pub fn detect(preferred: Option<&str>) -> Result<Self> {
        let emulator = Emulator::resolve(preferred)?;
        info!(terminal = %emulator, "Using terminal emulator");
        Ok(Self::new(emulator))
    }

    pub fn emulator(&self) -> Emulator {
        self.emulator
    }

    #[cfg(windows)]
    fn command(&self, request: &SpawnRequest) -> Result<Command> {
        use std::os::windows::process::CommandExt;

        let invocation = self.emulator.invocation(request);
        let mut command = Command::new(&invocation.program);
        if self.emulator == Emulator::WindowsConsole {
            // Quoted title and line must reach cmd.exe untouched. Std handles
            // stay inherited: redirecting them would also redirect the new
            // console that `start` opens.
            for arg in &invocation.args {
                command.raw_arg(arg);
            }
        } else {
            command
                .args(&invocation.args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }
        Ok(command)
    }

    #[cfg(not(windows))]
    fn command(&self, request: &SpawnRequest) -> Result<Command> {
        if self.emulator == Emulator::WindowsConsole {
            return Err(KickoffError::SpawnError(
                "cmd consoles are only available on Windows".to_string(),
            ));
        }

        let invocation = self.emulator.invocation(request);
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        crate::spawner::detach(&mut command);
        Ok(command)
    }
}

impl Spawner for TerminalSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<Option<u32>> {
        let mut command = self.command(request)?;
        let child = command.spawn().map_err(|e| {
            warn!(
                title = %request.title,
                terminal = %self.emulator,
                error = %e,
                "Failed to open terminal window"
            );
            KickoffError::SpawnError(format!(
                "Failed to open {} for '{}': {}",
                self.emulator, request.title, e
            ))
        })?;

        Ok(Some(release(child)))
    }

    fn describe(&self, request: &SpawnRequest) -> String {
        self.emulator.invocation(request).to_string()
    }
}

/// Shell snippet that sets the window title with an OSC 0 escape
fn osc_title(title: &str) -> String {
    format!("printf '\\033]0;%s\\007' {}", shell_quote(title))
}

fn applescript_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
