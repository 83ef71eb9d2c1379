use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Output code page that renders Cyrillic status text (UTF-8)
pub const UTF8_CODE_PAGE: u32 = 65001;

/// Default time a readiness probe may take before the launcher moves on
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_BANNER: &str = "Starting trading suite components";
pub const DEFAULT_COMPLETION: &str = "All components started";

/// An ordered set of programs to start, each in its own terminal window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchPlan {
    pub name: String,
    pub banner: String,
    pub completion: String,
    pub code_page: Option<u32>,
    /// Keep each window open after its command exits
    pub hold: bool,
    pub wait_for_key: bool,
    /// Preferred terminal emulator; `None` means detect
    pub terminal: Option<String>,
    pub targets: Vec<Target>,
}

/// A single program started by the launcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub title: String,
    pub run: String,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Stagger pause after this target is spawned
    pub delay: Duration,
    pub readiness: Option<Readiness>,
    pub ready_timeout: Duration,
}

/// How to tell that a launched program is up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum Readiness {
    /// GET returns a 2xx status
    Http(String),
    /// A TCP connection to `host:port` succeeds
    Tcp(String),
    /// The file exists
    File(PathBuf),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpawnStatus {
    Spawned,
    Simulated,
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReadinessOutcome {
    Ready { waited_ms: u64 },
    TimedOut { waited_ms: u64 },
}

/// What happened to one target during a launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub index: usize,
    pub title: String,
    pub status: SpawnStatus,
    /// Pid of the process the launcher started (the terminal, not the program)
    pub pid: Option<u32>,
    pub readiness: Option<ReadinessOutcome>,
    pub spawned_at: DateTime<Utc>,
    pub delay_ms: u64,
}

/// Complete record of one launcher run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchReport {
    pub id: Uuid,
    pub plan_name: String,
    pub records: Vec<LaunchRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for LaunchPlan {
    /// The trading suite: ticker viewer, trainer GUI and trading bot
    fn default() -> Self {
        Self {
            name: "trading-suite".to_string(),
            banner: DEFAULT_BANNER.to_string(),
            completion: DEFAULT_COMPLETION.to_string(),
            code_page: Some(UTF8_CODE_PAGE),
            hold: true,
            wait_for_key: true,
            terminal: None,
            targets: vec![
                Target::new("Ticker Viewer", "python run_ticker_viewer.py")
                    .with_delay(Duration::from_secs(3)),
                Target::new("Trainer GUI", "python trainer_gui.py")
                    .with_delay(Duration::from_secs(3)),
                Target::new("Trading Bot", "python trading_bot_main.py")
                    .with_delay(Duration::from_secs(1)),
            ],
        }
    }
}

impl LaunchPlan {
    pub fn target(&self, title: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.title == title)
    }

    /// Sum of all stagger pauses, ignoring readiness waits
    pub fn total_delay(&self) -> Duration {
        self.targets.iter().map(|t| t.delay).sum()
    }
}

impl Target {
    pub fn new(title: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            run: run.into(),
            cwd: None,
            env: Vec::new(),
            delay: Duration::ZERO,
            readiness: None,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness, timeout: Duration) -> Self {
        self.readiness = Some(readiness);
        self.ready_timeout = timeout;
        self
    }

    /// Words of the command line, honouring simple single and double quotes
    pub fn command_words(&self) -> Vec<String> {
        split_command_line(&self.run)
    }

    /// The program the command line starts (first word)
    pub fn program(&self) -> Option<String> {
        self.command_words().into_iter().next()
    }

    /// Arguments that look like script files (`foo.py`, `bin/run.sh`)
    pub fn script_paths(&self) -> Vec<PathBuf> {
        self.command_words()
            .into_iter()
            .skip(1)
            .filter(|word| !word.starts_with('-'))
            .filter(|word| {
                let path = std::path::Path::new(word);
                path.extension().is_some() || word.contains('/') || word.contains('\\')
            })
            .map(PathBuf::from)
            .collect()
    }
}

impl SpawnStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SpawnStatus::Failed { .. })
    }
}

impl LaunchReport {
    pub fn spawned(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == SpawnStatus::Spawned)
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &LaunchRecord> {
        self.records.iter().filter(|r| r.status.is_failed())
    }

    pub fn titles(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.title.as_str()).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn split_command_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_order() {
        let plan = LaunchPlan::default();
        let titles: Vec<&str> = plan.targets.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Ticker Viewer", "Trainer GUI", "Trading Bot"]);
        assert_eq!(plan.code_page, Some(UTF8_CODE_PAGE));
        assert!(plan.hold);
        assert!(plan.wait_for_key);
    }

    #[test]
    fn test_default_plan_delays() {
        let plan = LaunchPlan::default();
        assert_eq!(plan.targets[0].delay, Duration::from_secs(3));
        assert_eq!(plan.targets[1].delay, Duration::from_secs(3));
        assert_eq!(plan.targets[2].delay, Duration::from_secs(1));
        assert_eq!(plan.total_delay(), Duration::from_secs(7));
    }

    #[test]
    fn test_target_program_and_scripts() {
        let target = Target::new("bot", "python -u trading_bot_main.py --live");
        assert_eq!(target.program().as_deref(), Some("python"));
        assert_eq!(target.script_paths(), vec![PathBuf::from("trading_bot_main.py")]);
    }

    #[test]
    fn test_command_words_with_quotes() {
        let target = Target::new("viewer", r#""C:\Program Files\Python\python.exe" 'my app.py'"#);
        assert_eq!(
            target.command_words(),
            vec![
                r"C:\Program Files\Python\python.exe".to_string(),
                "my app.py".to_string()
            ]
        );
    }

    #[test]
    fn test_command_words_empty_quotes() {
        let target = Target::new("t", r#"echo "" done"#);
        assert_eq!(target.command_words(), vec!["echo", "", "done"]);
    }

    #[test]
    fn test_target_builders() {
        let target = Target::new("gui", "python trainer_gui.py")
            .with_cwd("gui")
            .with_env("PYTHONIOENCODING", "utf-8")
            .with_readiness(Readiness::Tcp("127.0.0.1:8765".to_string()), Duration::from_secs(5));
        assert_eq!(target.cwd, Some(PathBuf::from("gui")));
        assert_eq!(target.env, vec![("PYTHONIOENCODING".to_string(), "utf-8".to_string())]);
        assert_eq!(target.ready_timeout, Duration::from_secs(5));
        assert!(matches!(target.readiness, Some(Readiness::Tcp(_))));
    }

    #[test]
    fn test_report_counts_and_json() {
        let record = |index: usize, status: SpawnStatus| LaunchRecord {
            index,
            title: format!("t{}", index),
            status,
            pid: None,
            readiness: None,
            spawned_at: Utc::now(),
            delay_ms: 0,
        };
        let report = LaunchReport {
            id: Uuid::new_v4(),
            plan_name: "test".to_string(),
            records: vec![
                record(0, SpawnStatus::Spawned),
                record(1, SpawnStatus::Failed { reason: "no such file".to_string() }),
                record(2, SpawnStatus::Spawned),
            ],
            started_at: Utc::now(),
            completed_at: None,
        };

        assert_eq!(report.spawned(), 2);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.titles(), vec!["t0", "t1", "t2"]);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"plan_name\": \"test\""));
        assert!(json.contains("\"status\": \"failed\""));
    }
}
