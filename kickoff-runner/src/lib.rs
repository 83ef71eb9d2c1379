pub mod console;
pub mod executor;
pub mod keypress;
pub mod probe;
pub mod process;
pub mod spawner;
pub mod terminal;

pub use executor::{LaunchEvent, Launcher};
pub use probe::ReadinessProbe;
pub use process::SpawnRequest;
pub use spawner::{DetachedSpawner, DryRunSpawner, Spawner};
pub use terminal::{Emulator, TerminalSpawner};
