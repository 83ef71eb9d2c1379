// Process invocation details shared by every spawner

use kickoff_core::{LaunchPlan, Target};
use std::path::PathBuf;

/// Everything a spawner needs to start one target
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub title: String,
    pub run: String,
    pub working_directory: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Keep the window open after the command exits
    pub hold: bool,
    pub code_page: Option<u32>,
}

impl SpawnRequest {
    pub fn new(target: &Target, plan: &LaunchPlan) -> Self {
        Self {
            title: target.title.clone(),
            run: target.run.clone(),
            working_directory: target.cwd.clone(),
            env: target.env.clone(),
            hold: plan.hold,
            code_page: plan.code_page,
        }
    }

    pub fn without_hold(mut self) -> Self {
        self.hold = false;
        self
    }
}

/// POSIX shell script that runs the request inside `sh -c`.
///
/// Environment and working directory are applied by the script itself, since
/// several terminal emulators hand the command to an already-running server
/// process that does not inherit ours.
pub fn posix_script(request: &SpawnRequest) -> String {
    let mut parts: Vec<String> = request
        .env
        .iter()
        .map(|(key, value)| format!("export {}={}", key, shell_quote(value)))
        .collect();

    match &request.working_directory {
        Some(dir) => parts.push(format!(
            "cd {} && {}",
            shell_quote(&dir.to_string_lossy()),
            request.run.trim()
        )),
        None => parts.push(request.run.trim().to_string()),
    }

    if request.hold {
        parts.push("status=$?".to_string());
        parts.push(format!(
            "printf '\\n[%s] exited with status %s\\n' {} \"$status\"",
            shell_quote(&request.title)
        ));
        parts.push("printf 'Press Enter to close this window...'".to_string());
        parts.push("read _".to_string());
    }

    parts.join("; ")
}

/// `cmd.exe` command line for a new console window
pub fn cmd_line(request: &SpawnRequest) -> String {
    let mut parts = vec![format!("title {}", cmd_escape(&request.title))];

    if let Some(code_page) = request.code_page {
        parts.push(format!("chcp {} >nul", code_page));
    }
    parts.push(cmd_body(request));

    parts.join(" && ")
}

/// `cmd.exe` line without console builtins, for processes with no console
pub fn cmd_body(request: &SpawnRequest) -> String {
    let mut parts = Vec::new();

    for (key, value) in &request.env {
        parts.push(format!("set \"{}={}\"", key, value));
    }
    if let Some(dir) = &request.working_directory {
        parts.push(format!("cd /d \"{}\"", dir.display()));
    }
    parts.push(request.run.trim().to_string());

    parts.join(" && ")
}

/// Quote a string for POSIX `sh` using single quotes
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Escape cmd.exe metacharacters in free text such as a window title
pub fn cmd_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '^' | '&' | '|' | '<' | '>' | '(' | ')') {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}
