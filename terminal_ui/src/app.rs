//! Client state and its transitions.
//!
//! Key presses turn into an [`Action`] (at most one network call each); the
//! result of that call comes back as a [`Completion`], which may ask for a
//! follow-up action. Nothing here touches the network, so every view flow can
//! be driven directly in tests.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use todo_shared::validation::REQUIRED;
use todo_shared::{
    validate_title, CreateTaskRequest, Credentials, MessageResponse, Task, UserInfo,
};

use crate::api::ClientError;
use crate::form::{CredentialsForm, CredentialsField, TextInput};
use crate::undo::UndoSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Register,
    List,
    Form,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Quit,
    Login(Credentials),
    Register(Credentials),
    FetchProfile,
    Logout,
    Refresh,
    Create(CreateTaskRequest),
    Replace { id: i64, request: CreateTaskRequest },
    Toggle { id: i64, completed: bool },
    Delete(i64),
    Undo(CreateTaskRequest),
}

#[derive(Debug)]
pub enum Completion {
    LoggedIn(Result<MessageResponse, ClientError>),
    Registered(Result<MessageResponse, ClientError>),
    Profile(Result<UserInfo, ClientError>),
    LoggedOut(Result<MessageResponse, ClientError>),
    Loaded(Result<Vec<Task>, ClientError>),
    Saved(Result<Task, ClientError>),
    Toggled(Result<Task, ClientError>),
    Deleted { id: i64, result: Result<(), ClientError> },
    Restored(Result<Task, ClientError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Completed,
}

/// Create/edit form. `editing` is `None` when creating.
#[derive(Debug, Clone)]
pub struct TaskForm {
    pub editing: Option<i64>,
    pub title: TextInput,
    pub completed: bool,
    pub focus: FormField,
}

impl TaskForm {
    fn blank() -> Self {
        Self {
            editing: None,
            title: TextInput::new("Title"),
            completed: false,
            focus: FormField::Title,
        }
    }

    fn for_task(task: &Task) -> Self {
        Self {
            editing: Some(task.id),
            title: TextInput::new("Title").with_value(task.title.clone()),
            completed: task.completed,
            focus: FormField::Title,
        }
    }
}

#[derive(Debug)]
pub struct App {
    pub view: View,
    pub login: CredentialsForm,
    pub register: CredentialsForm,
    pub task_form: TaskForm,
    pub tasks: Vec<Task>,
    pub selected: usize,
    pub user: Option<String>,
    pub status: Option<Status>,
    pub undo: UndoSlot,
}

impl App {
    pub fn new(undo_timeout: Duration) -> Self {
        Self {
            view: View::Login,
            login: CredentialsForm::default(),
            register: CredentialsForm::default(),
            task_form: TaskForm::blank(),
            tasks: Vec::new(),
            selected: 0,
            user: None,
            status: None,
            undo: UndoSlot::new(undo_timeout),
        }
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.tasks.get(self.selected)
    }

    /// Housekeeping run on every loop iteration.
    pub fn tick(&mut self, now: Instant) {
        self.undo.expire(now);
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            kind: StatusKind::Info,
            text: text.into(),
        });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            kind: StatusKind::Error,
            text: text.into(),
        });
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        match self.view {
            View::Login => self.login_key(key),
            View::Register => self.register_key(key),
            View::List => self.list_key(key, now),
            View::Form => self.form_key(key),
        }
    }

    fn login_key(&mut self, key: KeyEvent) -> Action {
        let to_register = key.code == KeyCode::F(2)
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('r'));
        if to_register {
            self.view = View::Register;
            self.status = None;
            return Action::None;
        }
        match key.code {
            KeyCode::Esc => Action::Quit,
            KeyCode::Enter => match submit_credentials(&mut self.login) {
                Some(credentials) => Action::Login(credentials),
                None => Action::None,
            },
            _ => {
                credentials_key(&mut self.login, &key);
                Action::None
            }
        }
    }

    fn register_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => {
                self.view = View::Login;
                self.status = None;
                Action::None
            }
            KeyCode::Enter => match submit_credentials(&mut self.register) {
                Some(credentials) => Action::Register(credentials),
                None => Action::None,
            },
            _ => {
                credentials_key(&mut self.register, &key);
                Action::None
            }
        }
    }

    fn list_key(&mut self, key: KeyEvent, now: Instant) -> Action {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.tasks.len() {
                    self.selected += 1;
                }
                Action::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            KeyCode::Char('n') => {
                self.task_form = TaskForm::blank();
                self.view = View::Form;
                Action::None
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(task) = self.selected_task() {
                    self.task_form = TaskForm::for_task(task);
                    self.view = View::Form;
                }
                Action::None
            }
            KeyCode::Char(' ') | KeyCode::Char('x') => match self.selected_task() {
                Some(task) => Action::Toggle {
                    id: task.id,
                    completed: !task.completed,
                },
                None => Action::None,
            },
            KeyCode::Char('d') | KeyCode::Delete => {
                let Some(task) = self.tasks.get(self.selected) else {
                    return Action::None;
                };
                let id = task.id;
                self.undo.remember(task, now);
                Action::Delete(id)
            }
            KeyCode::Char('u') => match self.undo.peek(now) {
                Some(deleted) => Action::Undo(deleted.recreate_request()),
                None => {
                    self.info("Nothing to undo");
                    Action::None
                }
            },
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('l') => Action::Logout,
            _ => Action::None,
        }
    }

    fn form_key(&mut self, key: KeyEvent) -> Action {
        let form = &mut self.task_form;
        match key.code {
            KeyCode::Esc => {
                self.view = View::List;
                self.status = None;
                Action::None
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
                form.focus = match form.focus {
                    FormField::Title => FormField::Completed,
                    FormField::Completed => FormField::Title,
                };
                Action::None
            }
            KeyCode::Char(' ') if form.focus == FormField::Completed => {
                form.completed = !form.completed;
                Action::None
            }
            KeyCode::Enter => {
                let title = match validate_title(&form.title.value) {
                    Ok(title) => title,
                    Err(message) => {
                        form.title.error = Some(message.to_string());
                        form.focus = FormField::Title;
                        return Action::None;
                    }
                };
                let request = CreateTaskRequest {
                    title,
                    completed: Some(form.completed),
                };
                match form.editing {
                    Some(id) => Action::Replace { id, request },
                    None => Action::Create(request),
                }
            }
            _ => {
                if form.focus == FormField::Title {
                    form.title.handle_key(&key);
                }
                Action::None
            }
        }
    }

    /// Applies the outcome of a network call and returns any follow-up.
    pub fn complete(&mut self, completion: Completion) -> Action {
        match completion {
            Completion::LoggedIn(Ok(_)) => {
                self.user = Some(self.login.username.value.trim().to_string());
                self.login.password.clear();
                self.login.clear_errors();
                self.view = View::List;
                self.info("Signed in");
                Action::FetchProfile
            }
            Completion::LoggedIn(Err(err)) => {
                show_credential_errors(&mut self.login, &err);
                self.error(err.to_string());
                Action::None
            }
            Completion::Registered(Ok(response)) => {
                let username = self.register.username.value.trim().to_string();
                self.register = CredentialsForm::default();
                self.login = CredentialsForm::default();
                self.login.username.value = username;
                self.login.focus = CredentialsField::Password;
                self.view = View::Login;
                self.info(response.message);
                Action::None
            }
            Completion::Registered(Err(err)) => {
                show_credential_errors(&mut self.register, &err);
                self.error(err.to_string());
                Action::None
            }
            Completion::Profile(Ok(profile)) => {
                self.user = Some(profile.username);
                Action::Refresh
            }
            Completion::Profile(Err(err)) => {
                if err.is_unauthorized() {
                    self.fail(err);
                    return Action::None;
                }
                Action::Refresh
            }
            Completion::LoggedOut(result) => {
                self.leave_task_views();
                match result {
                    Ok(response) => self.info(response.message),
                    Err(err) => self.error(format!("Signed out locally: {err}")),
                }
                Action::None
            }
            Completion::Loaded(Ok(tasks)) => {
                self.tasks = tasks;
                self.clamp_selection();
                Action::None
            }
            Completion::Saved(Ok(task)) => {
                self.view = View::List;
                self.info(format!("Saved \"{}\"", task.title));
                Action::Refresh
            }
            Completion::Saved(Err(err)) if !err.is_unauthorized() => {
                self.task_form.title.error = err.field("title").map(str::to_string);
                self.error(err.to_string());
                Action::None
            }
            Completion::Toggled(Ok(task)) => {
                if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
                    *slot = task;
                }
                Action::None
            }
            Completion::Deleted { id, result: Ok(()) } => {
                let title = self
                    .tasks
                    .iter()
                    .find(|t| t.id == id)
                    .map(|t| t.title.clone())
                    .unwrap_or_default();
                self.tasks.retain(|t| t.id != id);
                self.clamp_selection();
                self.info(format!("Deleted \"{title}\" (u to undo)"));
                Action::None
            }
            Completion::Deleted { result: Err(err), .. } => {
                self.undo.clear();
                self.fail(err);
                Action::None
            }
            Completion::Restored(Ok(task)) => {
                self.undo.clear();
                self.info(format!("Restored \"{}\"", task.title));
                self.tasks.insert(0, task);
                self.selected = 0;
                Action::Refresh
            }
            Completion::Loaded(Err(err))
            | Completion::Saved(Err(err))
            | Completion::Toggled(Err(err))
            | Completion::Restored(Err(err)) => {
                self.fail(err);
                Action::None
            }
        }
    }

    /// Reports a failed call without touching the rendered tasks. A lost
    /// session sends the user back to the login form.
    fn fail(&mut self, err: ClientError) {
        if err.is_unauthorized() {
            self.leave_task_views();
            self.error("Session expired, please sign in again");
        } else {
            self.error(err.to_string());
        }
    }

    fn leave_task_views(&mut self) {
        self.view = View::Login;
        self.tasks.clear();
        self.selected = 0;
        self.user = None;
        self.undo.clear();
        self.task_form = TaskForm::blank();
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.tasks.len() {
            self.selected = self.tasks.len().saturating_sub(1);
        }
    }
}

fn credentials_key(form: &mut CredentialsForm, key: &KeyEvent) {
    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => form.next_field(),
        _ => {
            form.focused_mut().handle_key(key);
        }
    }
}

/// Checks both fields are filled in, marking the empty ones.
fn submit_credentials(form: &mut CredentialsForm) -> Option<Credentials> {
    form.clear_errors();
    if form.username.value.trim().is_empty() {
        form.username.error = Some(REQUIRED.to_string());
    }
    if form.password.value.is_empty() {
        form.password.error = Some(REQUIRED.to_string());
    }
    if form.username.error.is_some() || form.password.error.is_some() {
        return None;
    }
    Some(Credentials::new(
        form.username.value.trim(),
        form.password.value.clone(),
    ))
}

fn show_credential_errors(form: &mut CredentialsForm, err: &ClientError) {
    form.username.error = err.field("username").map(str::to_string);
    form.password.error = err.field("password").map(str::to_string);
}
