use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rollcall_core::{
    visibility, AttendanceLedger, Role, ScanReport, Student, StudentRegistry, User, UserDirectory,
};
use rollcall_store::{Collection, DocumentStore};

mod adapters;
mod config;
mod engine;
mod export;

use adapters::{ExecAnalyzer, FileFrameSource};
use config::Config;
use engine::spawn_engine;

#[derive(Parser)]
#[command(name = "rollcall", about = "Classroom attendance via face scanning")]
struct Cli {
    /// Acting user's login name
    #[arg(short, long)]
    username: String,
    /// Acting user's password
    #[arg(short, long)]
    password: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan and record the outcome
    Scan,
    /// Keep scanning on a timer until interrupted
    Auto,
    /// Manage the student registry
    Students {
        #[command(subcommand)]
        command: StudentsCommand,
    },
    /// Manage login accounts (admin only)
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Monthly attendance summary for one student
    Report {
        /// Student id
        student: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    /// Write CSV reports
    Export {
        #[command(subcommand)]
        command: ExportCommand,
    },
    /// Show or update the school profile
    School {
        #[command(subcommand)]
        command: SchoolCommand,
    },
}

#[derive(Subcommand)]
enum StudentsCommand {
    /// Register a student
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        roll_number: String,
        #[arg(long)]
        class_section: String,
        /// Reference image (path or data URL)
        #[arg(long)]
        photo_url: String,
    },
    /// List students visible to you
    List,
    /// Delete a student (ledger history keeps its name snapshots)
    Remove { id: String },
}

#[derive(Subcommand)]
enum UsersCommand {
    /// Create a login account
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        /// Required for teachers
        #[arg(long)]
        assigned_class: Option<String>,
    },
    /// List accounts
    List,
    /// Delete an account
    Remove { username: String },
}

#[derive(Subcommand)]
enum ExportCommand {
    /// Monthly summary per student
    Summary {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Full daily scan log
    Daily {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SchoolCommand {
    Show,
    /// Update name and/or logo (admin only)
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        logo: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Teacher,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Admin => Role::Admin,
            RoleArg::Teacher => Role::Teacher,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let store = DocumentStore::open(&config.data_dir)?;

    let mut directory = UserDirectory::from_users(store.load(Collection::Users)?);
    if directory.ensure_bootstrap_admin() {
        store.save(Collection::Users, directory.all())?;
    }
    let actor = directory
        .authenticate(&cli.username, &cli.password)
        .context("login failed")?;
    tracing::info!(username = %actor.username, role = ?actor.role, "authenticated");

    match cli.command {
        Commands::Scan => run_scan(&config, store, actor, false).await,
        Commands::Auto => run_scan(&config, store, actor, true).await,
        Commands::Students { command } => run_students(command, &store, &actor),
        Commands::Users { command } => run_users(command, &store, &actor, directory),
        Commands::Report {
            student,
            year,
            month,
        } => run_report(&store, &actor, &student, year, month),
        Commands::Export { command } => run_export(command, &store, &actor),
        Commands::School { command } => run_school(command, &store, &actor),
    }
}

/// Spin up the engine for a live session: a single manual scan, or auto
/// mode until Ctrl-C.
async fn run_scan(config: &Config, store: DocumentStore, actor: User, auto: bool) -> Result<()> {
    let students: Vec<Student> = store.load(Collection::Students)?;
    let ledger = AttendanceLedger::from_events(store.load(Collection::AttendanceEvents)?);

    let handle = spawn_engine(
        FileFrameSource::new(&config.frame_path),
        ExecAnalyzer::new(&config.analyzer_cmd),
        config.reference_cap,
        Duration::from_secs(config.scan_interval_secs),
        actor,
        students,
        ledger,
        store,
    );

    handle.start().await.context("could not start the camera")?;

    if auto {
        handle.toggle_auto().await?;
        println!(
            "Auto-scanning every {}s. Press Ctrl-C to stop.",
            config.scan_interval_secs
        );
        tokio::signal::ctrl_c().await?;
        handle.stop().await?;
        let status = handle.status().await?;
        println!("Session ended. Ledger now holds {} events.", status.ledger_len);
    } else {
        let report = handle.scan().await?;
        print_report(&report);
        handle.stop().await?;
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    match report {
        ScanReport::Skipped => println!("Scan skipped: one was already running."),
        ScanReport::NoMatch { reason } => println!("No match: {reason}"),
        ScanReport::Recorded(event) => println!(
            "{} recorded for {} ({}) at {} — confidence {:.2}",
            event.status.as_str(),
            event.student_name,
            event.student_id,
            event.timestamp,
            event.confidence
        ),
        ScanReport::Deduplicated(event) => println!(
            "Already recorded for {} within the last minute; skipped.",
            event.student_name
        ),
    }
}

fn run_students(command: StudentsCommand, store: &DocumentStore, actor: &User) -> Result<()> {
    let mut registry = StudentRegistry::from_students(store.load(Collection::Students)?);
    match command {
        StudentsCommand::Add {
            id,
            name,
            roll_number,
            class_section,
            photo_url,
        } => {
            registry.register(
                actor,
                Student {
                    id,
                    name,
                    roll_number,
                    class_section,
                    photo_url,
                },
            )?;
            store.save(Collection::Students, registry.all())?;
            println!("Student registered.");
        }
        StudentsCommand::List => {
            for student in visibility::filter_students(registry.all(), actor) {
                println!(
                    "{}  {}  roll {}  class {}",
                    student.id, student.name, student.roll_number, student.class_section
                );
            }
        }
        StudentsCommand::Remove { id } => {
            let removed = registry.remove(actor, &id)?;
            store.save(Collection::Students, registry.all())?;
            println!("Deleted {} ({}).", removed.name, removed.id);
        }
    }
    Ok(())
}

fn run_users(
    command: UsersCommand,
    store: &DocumentStore,
    actor: &User,
    mut directory: UserDirectory,
) -> Result<()> {
    match command {
        UsersCommand::Add {
            username,
            password,
            name,
            role,
            assigned_class,
        } => {
            directory.create(
                actor,
                User {
                    username,
                    password,
                    name,
                    role: role.into(),
                    assigned_class,
                },
            )?;
            store.save(Collection::Users, directory.all())?;
            println!("User created.");
        }
        UsersCommand::List => {
            for user in directory.all() {
                let class = user.assigned_class.as_deref().unwrap_or("-");
                println!("{}  {:?}  class {}", user.username, user.role, class);
            }
        }
        UsersCommand::Remove { username } => {
            directory.remove(actor, &username)?;
            store.save(Collection::Users, directory.all())?;
            println!("User deleted.");
        }
    }
    Ok(())
}

fn run_report(
    store: &DocumentStore,
    actor: &User,
    student_id: &str,
    year: i32,
    month: u32,
) -> Result<()> {
    let students: Vec<Student> = store.load(Collection::Students)?;
    let visible = visibility::filter_students(&students, actor);
    let Some(student) = visible.iter().find(|s| s.id == student_id) else {
        bail!("no visible student with id {student_id}");
    };

    let ledger = AttendanceLedger::from_events(store.load(Collection::AttendanceEvents)?);
    let summary = ledger.aggregate_monthly(student_id, year, month);
    println!(
        "{} — {year}-{month:02}: present {} of {} scanned days (absent {}, {:.1}%)",
        student.name,
        summary.present_days,
        summary.total_scanned_days,
        summary.absent_days(),
        summary.percentage()
    );
    Ok(())
}

fn run_export(command: ExportCommand, store: &DocumentStore, actor: &User) -> Result<()> {
    let students: Vec<Student> = store.load(Collection::Students)?;
    let ledger = AttendanceLedger::from_events(store.load(Collection::AttendanceEvents)?);

    let (csv, out) = match command {
        ExportCommand::Summary { year, month, out } => {
            let visible = visibility::filter_students(&students, actor);
            (
                export::monthly_summary_csv(&visible, &ledger, year, month),
                out,
            )
        }
        ExportCommand::Daily { out } => {
            let events = ledger.read_all(&students, actor);
            (export::daily_log_csv(&events), out)
        }
    };

    match out {
        Some(path) => {
            std::fs::write(&path, csv).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}.", path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

fn run_school(command: SchoolCommand, store: &DocumentStore, actor: &User) -> Result<()> {
    match command {
        SchoolCommand::Show => {
            let config = store.load_school_config()?.unwrap_or_default();
            println!("{}", config.name);
            if !config.logo.is_empty() {
                println!("logo: {}", config.logo);
            }
        }
        SchoolCommand::Set { name, logo } => {
            if !actor.is_admin() {
                bail!("updating the school profile requires an admin account");
            }
            let mut config = store.load_school_config()?.unwrap_or_default();
            if let Some(name) = name {
                config.name = name;
            }
            if let Some(logo) = logo {
                config.logo = logo;
            }
            store.save_school_config(&config)?;
            println!("School profile updated.");
        }
    }
    Ok(())
}
