mod api;
mod app;
mod form;
mod ui;
mod undo;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, info, warn};
use todo_shared::UpdateTaskRequest;
use tui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use crate::api::{ApiClient, ClientError};
use crate::app::{Action, App, Completion};

const TICK: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "todo-terminal-ui")]
#[command(version)]
#[command(about = "Terminal client for the to-do API")]
struct Cli {
    /// Base URL of the API server
    #[arg(long, env = "TODO_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Seconds a deleted task stays restorable
    #[arg(long, default_value_t = undo::DEFAULT_UNDO_TIMEOUT.as_secs())]
    undo_timeout_secs: u64,

    /// Write logs to this file (the terminal belongs to the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(path: Option<&Path>) -> io::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn traced<T>(what: &str, result: Result<T, ClientError>) -> Result<T, ClientError> {
    match &result {
        Ok(_) => debug!("{what} ok"),
        Err(err) => warn!("{what} failed: {err}"),
    }
    result
}

/// Runs the network call behind `action`. `None` for actions that need no
/// call.
async fn perform(client: &ApiClient, action: Action) -> Option<Completion> {
    let completion = match action {
        Action::None | Action::Quit => return None,
        Action::Login(credentials) => Completion::LoggedIn(traced("login", client.login(&credentials).await)),
        Action::Register(credentials) => {
            Completion::Registered(traced("register", client.register(&credentials).await))
        }
        Action::FetchProfile => Completion::Profile(traced("profile", client.me().await)),
        Action::Logout => Completion::LoggedOut(traced("logout", client.logout().await)),
        Action::Refresh => Completion::Loaded(traced("list tasks", client.list_tasks().await)),
        Action::Create(request) => Completion::Saved(traced("create task", client.create_task(&request).await)),
        Action::Replace { id, request } => {
            Completion::Saved(traced("replace task", client.replace_task(id, &request).await))
        }
        Action::Toggle { id, completed } => {
            let request = UpdateTaskRequest {
                title: None,
                completed: Some(completed),
            };
            Completion::Toggled(traced("toggle task", client.update_task(id, &request).await))
        }
        Action::Delete(id) => Completion::Deleted {
            id,
            result: traced("delete task", client.delete_task(id).await),
        },
        Action::Undo(request) => Completion::Restored(traced("undo delete", client.create_task(&request).await)),
    };
    Some(completion)
}

async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    client: &ApiClient,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| ui::draw(f, &*app))?;

        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let mut action = app.handle_key(key, Instant::now());
        loop {
            if action == Action::Quit {
                return Ok(());
            }
            let Some(completion) = perform(client, action).await else {
                break;
            };
            action = app.complete(completion);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let client = ApiClient::new(&cli.server)?;
    info!("using server {}", client.base_url());
    let mut app = App::new(Duration::from_secs(cli.undo_timeout_secs));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run(&mut terminal, &client, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}
