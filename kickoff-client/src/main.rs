use clap::{Args, Parser, Subcommand};
use kickoff_core::{LaunchPlan, LaunchReport, Readiness};
use kickoff_parser::{parse_launchfile, LAUNCHFILE_TEMPLATE};
use kickoff_runner::{
    console, keypress, DetachedSpawner, DryRunSpawner, Emulator, LaunchEvent, Launcher,
    Spawner, TerminalSpawner,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_LAUNCHFILE: &str = "Launchfile";

/// Terminal name that starts targets in the background instead of in windows
const DETACHED: &str = "detached";

#[derive(Parser)]
#[command(name = "kickoff")]
#[command(about = "Open each program of a launch plan in its own terminal window", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the Launchfile (the built-in plan is used when ./Launchfile is absent)
    #[arg(short, long, global = true, env = "KICKOFF_LAUNCHFILE")]
    file: Option<PathBuf>,

    /// Terminal emulator to open windows with, or "detached"
    #[arg(short, long, global = true, env = "KICKOFF_TERMINAL")]
    terminal: Option<String>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Exit right after the last target instead of waiting for a key press
    #[arg(long, global = true)]
    no_wait: bool,

    /// Show what would be started without starting anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Write a JSON launch report to this path
    #[arg(long, global = true)]
    report: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start every target of the plan (default)
    Run,

    /// Generate a Launchfile template
    Init {
        /// Overwrite an existing Launchfile
        #[arg(long)]
        force: bool,
    },

    /// Check that terminals, programs and scripts of the plan can be found
    Check,

    /// Show the targets of the plan
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    match command {
        Commands::Init { force } => {
            let path = cli.file.unwrap_or_else(|| PathBuf::from(DEFAULT_LAUNCHFILE));
            generate_launchfile_template(&path, force)?;
        }
        Commands::Run => {
            let plan = load_plan(cli.file.as_deref())?;
            let terminal = cli.terminal.or_else(|| plan.terminal.clone());
            run_plan(&plan, terminal.as_deref(), &cli.run).await?;
        }
        Commands::Check => {
            let plan = load_plan(cli.file.as_deref())?;
            let terminal = cli.terminal.or_else(|| plan.terminal.clone());
            if !check_plan(&plan, terminal.as_deref()) {
                process::exit(1);
            }
        }
        Commands::List => {
            let plan = load_plan(cli.file.as_deref())?;
            print_plan(&plan);
        }
    }

    Ok(())
}

fn load_plan(file: Option<&Path>) -> anyhow::Result<LaunchPlan> {
    match file {
        Some(path) => read_launchfile(path),
        None if Path::new(DEFAULT_LAUNCHFILE).exists() => {
            read_launchfile(Path::new(DEFAULT_LAUNCHFILE))
        }
        None => {
            info!("No Launchfile found, using the built-in trading suite plan");
            Ok(LaunchPlan::default())
        }
    }
}

fn read_launchfile(path: &Path) -> anyhow::Result<LaunchPlan> {
    let content = fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read Launchfile at {}: {}", path.display(), e)
    })?;

    parse_launchfile(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse Launchfile {}: {}", path.display(), e))
}

fn select_spawner(terminal: Option<&str>, dry_run: bool) -> Box<dyn Spawner> {
    let emulator = match terminal {
        Some(name) if name.eq_ignore_ascii_case(DETACHED) => None,
        preferred => match TerminalSpawner::detect(preferred) {
            Ok(spawner) => Some(spawner.emulator()),
            Err(e) => {
                warn!(error = %e, "No usable terminal emulator, starting targets detached");
                println!("⚠️  {}; {}", e, fallback_notice(dry_run));
                None
            }
        },
    };

    match (emulator, dry_run) {
        (emulator, true) => Box::new(DryRunSpawner::new(emulator)),
        (Some(emulator), false) => Box::new(TerminalSpawner::new(emulator)),
        (None, false) => Box::new(DetachedSpawner::new()),
    }
}

fn fallback_notice(dry_run: bool) -> &'static str {
    if dry_run {
        "showing the detached commands instead"
    } else {
        "targets will run in the background"
    }
}

async fn run_plan(plan: &LaunchPlan, terminal: Option<&str>, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(code_page) = plan.code_page {
        if let Err(e) = console::set_output_code_page(code_page) {
            warn!(code_page, error = %e, "Could not set console code page");
        }
    }

    println!("{}", "=".repeat(60));
    println!("🚀 {}", plan.banner);
    println!("{}", "=".repeat(60));

    let launcher = Launcher::new(select_spawner(terminal, args.dry_run)).with_observer(print_event);
    let report = launcher.run(plan).await;

    if let Some(path) = &args.report {
        // A lost report does not fail a completed run
        match write_report(&report, path) {
            Ok(()) => println!("\n📄 Launch report written to {}", path.display()),
            Err(e) => {
                warn!(error = %e, "Launch report not written");
                println!("\n⚠️  {}", e);
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("✅ {}", plan.completion);
    if args.dry_run {
        println!("   Dry run: {} target(s) shown, none started", report.records.len());
    } else {
        println!(
            "   {} of {} target(s) started",
            report.spawned(),
            report.records.len()
        );
    }
    for record in report.failed() {
        println!("   ✗ {}", record.title);
    }
    println!("{}", "=".repeat(60));

    if plan.wait_for_key && !args.no_wait {
        println!("Each program runs in its own window; close them there.");
        println!("Press any key to exit...");
        tokio::task::spawn_blocking(keypress::wait_for_key).await??;
    }

    Ok(())
}

fn write_report(report: &LaunchReport, path: &Path) -> anyhow::Result<()> {
    let json = report.to_json()?;
    fs::write(path, json).map_err(|e| {
        anyhow::anyhow!("Failed to write launch report to {}: {}", path.display(), e)
    })
}

fn print_event(event: &LaunchEvent) {
    match event {
        LaunchEvent::Spawning {
            index,
            total,
            title,
            command,
        } => {
            println!("\n▶ [{}/{}] {}", index + 1, total, title);
            println!("   Command: {}", command);
        }
        LaunchEvent::Spawned { pid, .. } => match pid {
            Some(pid) => println!("   ✓ Started (pid {})", pid),
            None => println!("   ✓ Started"),
        },
        LaunchEvent::Simulated { .. } => println!("   • Dry run, not started"),
        LaunchEvent::SpawnFailed { error, .. } => println!("   ✗ {}", error),
        LaunchEvent::AwaitingReadiness {
            readiness, timeout, ..
        } => println!(
            "   ⏳ Waiting for {} (up to {})",
            describe_readiness(readiness),
            format_duration(*timeout)
        ),
        LaunchEvent::Ready { waited, .. } => {
            println!("   ✓ Ready after {}", format_duration(*waited))
        }
        LaunchEvent::NotReady { waited, .. } => println!(
            "   ⚠️  Not ready after {}, continuing",
            format_duration(*waited)
        ),
        LaunchEvent::Pausing { delay, .. } => {
            println!("   ⏱️  Pausing {}", format_duration(*delay))
        }
    }
}

fn check_plan(plan: &LaunchPlan, terminal: Option<&str>) -> bool {
    let mut problems = 0;

    println!("Checking plan '{}' ({} targets)\n", plan.name, plan.targets.len());

    match terminal {
        Some(name) if name.eq_ignore_ascii_case(DETACHED) => {
            println!("✓ Terminal: detached (no windows)")
        }
        preferred => match Emulator::resolve(preferred) {
            Ok(emulator) => println!("✓ Terminal: {}", emulator),
            Err(e) => {
                println!("✗ Terminal: {}", e);
                problems += 1;
            }
        },
    }

    for target in &plan.targets {
        println!("\n{}", target.title);

        let base = target.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        if let Some(cwd) = &target.cwd {
            if cwd.is_dir() {
                println!("  ✓ Directory {}", cwd.display());
            } else {
                println!("  ✗ Directory {} does not exist", cwd.display());
                problems += 1;
            }
        }

        match target.program() {
            Some(program) => {
                match which::which_in(&program, std::env::var_os("PATH"), &base) {
                    Ok(path) => println!("  ✓ {} → {}", program, path.display()),
                    Err(_) => {
                        println!("  ✗ {} not found on PATH", program);
                        problems += 1;
                    }
                }
            }
            None => {
                println!("  ✗ Empty command");
                problems += 1;
            }
        }

        for script in target.script_paths() {
            let path = if script.is_absolute() {
                script.clone()
            } else {
                base.join(&script)
            };
            if path.exists() {
                println!("  ✓ {}", script.display());
            } else {
                println!("  ✗ {} does not exist", path.display());
                problems += 1;
            }
        }
    }

    println!();
    if problems == 0 {
        println!("✅ Plan looks good");
    } else {
        println!("❌ {} problem(s) found", problems);
    }
    problems == 0
}

fn print_plan(plan: &LaunchPlan) {
    println!("Plan: {}", plan.name);
    if let Some(code_page) = plan.code_page {
        println!("Code page: {}", code_page);
    }
    println!(
        "Windows stay open: {}",
        if plan.hold { "yes" } else { "no" }
    );
    println!("Total stagger: {}\n", format_duration(plan.total_delay()));

    for (index, target) in plan.targets.iter().enumerate() {
        println!("  {}. {}", index + 1, target.title);
        println!("     Command: {}", target.run);
        if let Some(cwd) = &target.cwd {
            println!("     Directory: {}", cwd.display());
        }
        for (key, value) in &target.env {
            println!("     Env: {}={}", key, value);
        }
        if let Some(readiness) = &target.readiness {
            println!(
                "     Ready when: {} (timeout {})",
                describe_readiness(readiness),
                format_duration(target.ready_timeout)
            );
        }
        println!("     Then pause: {}", format_duration(target.delay));
    }
}

fn describe_readiness(readiness: &Readiness) -> String {
    match readiness {
        Readiness::Http(url) => format!("HTTP 2xx from {}", url),
        Readiness::Tcp(addr) => format!("TCP {}", addr),
        Readiness::File(path) => format!("file {}", path.display()),
    }
}

fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms == 0 {
        "none".to_string()
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{}ms", ms)
    }
}

fn generate_launchfile_template(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Launchfile already exists at {}; use --force to overwrite it or pass a different --file",
            path.display()
        );
    }

    fs::write(path, LAUNCHFILE_TEMPLATE)?;
    println!("✓ Created Launchfile template at {}", path.display());
    Ok(())
}
