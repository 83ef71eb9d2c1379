use crate::process::{cmd_body, posix_script, SpawnRequest};
use crate::terminal::Emulator;
use kickoff_core::{KickoffError, Result};
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// Starts a target and returns immediately, without waiting for it
pub trait Spawner {
    /// Start the request; returns the pid of the started process when known
    fn spawn(&self, request: &SpawnRequest) -> Result<Option<u32>>;

    /// Human-readable command that `spawn` runs
    fn describe(&self, request: &SpawnRequest) -> String {
        request.run.clone()
    }

    /// True when nothing is really started
    fn simulated(&self) -> bool {
        false
    }
}

impl<S: Spawner + ?Sized> Spawner for Box<S> {
    fn spawn(&self, request: &SpawnRequest) -> Result<Option<u32>> {
        (**self).spawn(request)
    }

    fn describe(&self, request: &SpawnRequest) -> String {
        (**self).describe(request)
    }

    fn simulated(&self) -> bool {
        (**self).simulated()
    }
}

/// Runs targets in the background with no window and no output
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSpawner;

impl DetachedSpawner {
    pub fn new() -> Self {
        Self
    }

    #[cfg(windows)]
    fn command(request: &SpawnRequest) -> Command {
        use std::os::windows::process::CommandExt;

        let mut command = Command::new("cmd");
        // /S keeps everything between the outer quotes verbatim
        command
            .args(["/S", "/C"])
            .raw_arg(format!("\"{}\"", cmd_body(request)));
        command
    }

    #[cfg(not(windows))]
    fn command(request: &SpawnRequest) -> Command {
        let request = request.clone().without_hold();
        let mut command = Command::new("sh");
        command.arg("-c").arg(posix_script(&request));
        command
    }
}

impl Spawner for DetachedSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<Option<u32>> {
        let mut command = Self::command(request);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut command);

        let child = command.spawn().map_err(|e| {
            KickoffError::SpawnError(format!("Failed to start '{}': {}", request.title, e))
        })?;
        Ok(Some(release(child)))
    }

    fn describe(&self, request: &SpawnRequest) -> String {
        let request = request.clone().without_hold();
        if cfg!(target_os = "windows") {
            // No console to title or switch code page in
            format!("cmd /C {}", cmd_body(&request))
        } else {
            format!("sh -c {}", posix_script(&request))
        }
    }
}

/// Records what would be started without starting anything
#[derive(Debug, Clone, Default)]
pub struct DryRunSpawner {
    emulator: Option<Emulator>,
}

impl DryRunSpawner {
    pub fn new(emulator: Option<Emulator>) -> Self {
        Self { emulator }
    }
}

impl Spawner for DryRunSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<Option<u32>> {
        debug!(title = %request.title, "Dry run, not spawning");
        Ok(None)
    }

    fn describe(&self, request: &SpawnRequest) -> String {
        match self.emulator {
            Some(emulator) => emulator.invocation(request).to_string(),
            None => DetachedSpawner.describe(request),
        }
    }

    fn simulated(&self) -> bool {
        true
    }
}

/// Put the child in its own process group so a Ctrl+C aimed at the launcher
/// does not reach it
pub(crate) fn detach(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        use windows_sys::Win32::System::Threading::{
            CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS,
        };
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }
}

/// Hand the child to a reaper thread and return its pid
pub(crate) fn release(mut child: Child) -> u32 {
    let pid = child.id();
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    pid
}
