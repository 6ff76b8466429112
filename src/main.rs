use std::{io::Write, path::PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use folio_admin::{
    AdminApp, Config, Gateway, MemoryAuth, SqliteStore,
    core::{
        notify::{Notifications, ToastKind},
        router::HOME_PATH,
        sync::{CollectionSync, SyncedRecord},
    },
    format::format_timestamp,
    models::{Attendee, CheckInPayload, Project, ProjectStatus, ProjectUpdate},
};

type App = AdminApp<SqliteStore, MemoryAuth>;

#[derive(Parser)]
#[command(name = "folio-admin")]
#[command(about = "Manage portfolio projects and event check-ins")]
struct Cli {
    /// Path to the document database (overrides FOLIO_DB)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Sign in with this email (defaults to FOLIO_ADMIN_EMAIL)
    #[arg(long)]
    email: Option<String>,

    /// Sign in with this password (defaults to FOLIO_ADMIN_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Portfolio projects
    #[command(subcommand)]
    Projects(ProjectCommand),

    /// Event attendees
    #[command(subcommand)]
    Attendees(AttendeeCommand),

    /// Print a collection every time it changes, until Ctrl-C
    Watch {
        #[arg(value_enum)]
        collection: WatchTarget,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    List,
    Show {
        id: String,
    },
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        status: Option<ProjectStatus>,
    },
    Rename {
        id: String,
        name: String,
    },
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum AttendeeCommand {
    List,
    CheckIn {
        user_id: String,
        display_name: String,
        #[arg(long)]
        picture_url: Option<String>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum WatchTarget {
    Projects,
    Attendees,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load()?;
    if let Some(db) = args.db {
        config.database_path = db;
    }

    let store = SqliteStore::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    let auth = MemoryAuth::new();
    if let Some(password) = &config.admin_password {
        auth.register(&config.admin_email, password, Some("Administrator"));
    }

    let app = AdminApp::new(Gateway::new(store, auth, &config), &config);
    app.start();

    if let Some(password) = args.password.or_else(|| config.admin_password.clone()) {
        let email = args.email.unwrap_or_else(|| config.admin_email.clone());
        if let Err(err) = app.login(&email, &password).await {
            warn!(email = %email, error = %err, "sign-in failed");
        }
    }

    let result = run(&app, args.command).await;

    for toast in app.notifications().toasts() {
        let label = match toast.kind {
            ToastKind::Success => "ok",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
            ToastKind::Warning => "warning",
        };
        eprintln!("[{label}] {}", toast.message);
    }

    app.gateway().store().close().await?;
    result
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Projects(command) => {
            require_route(app, HOME_PATH).await?;
            run_projects(app, command).await
        }
        Command::Attendees(AttendeeCommand::List) => {
            require_route(app, "/activity").await?;
            let attendees = load(&app.attendees()).await?;
            for attendee in &attendees {
                println!(
                    "{}\t{}\t{}\t{}",
                    format_timestamp(attendee.check_in_time, None),
                    attendee.user_id,
                    attendee.display_name,
                    attendee.status
                );
            }
            println!("{} attendee(s)", attendees.len());
            Ok(())
        }
        Command::Attendees(AttendeeCommand::CheckIn {
            user_id,
            display_name,
            picture_url,
        }) => {
            // The check-in page is public.
            require_route(app, "/liff").await?;
            let id = app
                .attendees()
                .check_in(CheckInPayload {
                    user_id,
                    display_name,
                    picture_url,
                })
                .await
                .context("Check-in failed")?;
            println!("{id}");
            Ok(())
        }
        Command::Watch { collection } => match collection {
            WatchTarget::Projects => {
                require_route(app, HOME_PATH).await?;
                watch(&app.projects(), |project: &Project| {
                    format!("{}\t{}", project.id.as_deref().unwrap_or("-"), project.display_name())
                })
                .await
            }
            WatchTarget::Attendees => {
                require_route(app, "/activity").await?;
                watch(&app.attendees(), |attendee: &Attendee| {
                    format!("{}\t{}", attendee.user_id, attendee.display_name)
                })
                .await
            }
        },
    }
}

async fn run_projects(app: &App, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::List => {
            let projects = load(&app.projects()).await?;
            for project in &projects {
                println!(
                    "{}\t{}\t{}\t{}",
                    project.id.as_deref().unwrap_or("-"),
                    format_timestamp(project.created_at, None),
                    project
                        .status
                        .map(|status| status.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    project.display_name()
                );
            }
            println!("{} project(s)", projects.len());
        }
        ProjectCommand::Show { id } => {
            let project = fetch_project(app, &id).await?;
            println!("{}", serde_json::to_string_pretty(&project)?);
        }
        ProjectCommand::Add {
            name,
            description,
            status,
        } => {
            let project = Project {
                description,
                status,
                ..Project::named(name)
            };
            let id = app.projects().add(&project).await?;
            info!(id = %id, "project created");
            println!("{id}");
        }
        ProjectCommand::Rename { id, name } => {
            let update = ProjectUpdate {
                name: Some(name),
                ..ProjectUpdate::default()
            };
            app.project_detail()
                .update(&id, &update)
                .await
                .with_context(|| format!("Failed to rename project {id}"))?;
        }
        ProjectCommand::Delete { id, yes } => {
            let project = fetch_project(app, &id).await?;
            let (deleted, ()) = tokio::join!(
                app.delete_project(&id, project.display_name()),
                answer_confirm(app.notifications(), yes)
            );
            if !deleted? {
                println!("Cancelled");
            }
        }
    }
    Ok(())
}

/// Navigate to `path`; a redirect means the route needs a signed-in user.
async fn require_route(app: &App, path: &str) -> anyhow::Result<()> {
    let outcome = app.navigate(path).await?;
    if outcome.is_redirect() {
        bail!("Sign in required: pass --email and --password or set FOLIO_ADMIN_PASSWORD");
    }
    info!(title = %app.document_title(), "route opened");
    Ok(())
}

async fn fetch_project(app: &App, id: &str) -> anyhow::Result<Project> {
    let detail = app.project_detail();
    detail.fetch(id).await;
    let state = detail.state();
    if let Some(error) = state.error {
        bail!(error);
    }
    state.project.context("Project not loaded")
}

/// Wait for the first snapshot of a collection and return it.
async fn load<T: SyncedRecord>(
    sync: &CollectionSync<T, SqliteStore, MemoryAuth>,
) -> anyhow::Result<Vec<T>> {
    sync.init_listener().await;
    let mut receiver = sync.subscribe();
    let state = receiver.wait_for(|state| !state.loading).await?.clone();
    sync.release();
    if let Some(error) = state.error {
        bail!(error);
    }
    Ok(state.items)
}

async fn watch<T: SyncedRecord>(
    sync: &CollectionSync<T, SqliteStore, MemoryAuth>,
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    sync.init_listener().await;
    let mut receiver = sync.subscribe();
    loop {
        let state = receiver.borrow_and_update().clone();
        if let Some(error) = state.error {
            bail!(error);
        }
        if !state.loading {
            println!("--- {} item(s)", state.items.len());
            for item in &state.items {
                println!("{}", line(item));
            }
        }

        tokio::select! {
            changed = receiver.changed() => changed?,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    sync.release();
    Ok(())
}

/// Answer the confirmation dialog once it opens, from `--yes` or stdin.
async fn answer_confirm(notifications: &Notifications, yes: bool) {
    let mut dialog = notifications.subscribe_dialog();
    let Ok(shown) = dialog.wait_for(|dialog| dialog.open).await.map(|d| d.clone()) else {
        return;
    };

    let answer = if yes {
        true
    } else {
        let prompt = format!("{}: {} [y/N] ", shown.title, shown.message);
        tokio::task::spawn_blocking(move || {
            print!("{prompt}");
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok();
            matches!(line.trim(), "y" | "Y" | "yes")
        })
        .await
        .unwrap_or(false)
    };
    notifications.resolve_confirm(answer);
}
