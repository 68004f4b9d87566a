use tui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{App, FormField, StatusKind, View};
use crate::form::{CredentialsField, CredentialsForm, TextInput};

pub fn draw<B: Backend>(f: &mut Frame<B>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)].as_ref())
        .split(f.size());

    match app.view {
        View::Login => draw_credentials(f, chunks[0], "todo · sign in", &app.login),
        View::Register => draw_credentials(f, chunks[0], "todo · register", &app.register),
        View::List => draw_list(f, chunks[0], app),
        View::Form => draw_form(f, chunks[0], app),
    }

    let status = match &app.status {
        Some(status) => {
            let color = match status.kind {
                StatusKind::Info => Color::Green,
                StatusKind::Error => Color::Red,
            };
            Spans::from(Span::styled(status.text.clone(), Style::default().fg(color)))
        }
        None => Spans::from(""),
    };
    f.render_widget(Paragraph::new(status), chunks[1]);

    let help = Paragraph::new(Spans::from(Span::styled(
        help_text(app),
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(help, chunks[2]);
}

fn help_text(app: &App) -> String {
    match app.view {
        View::Login => "Tab next field · Enter sign in · F2 register · Esc quit".to_string(),
        View::Register => "Tab next field · Enter register · Esc back".to_string(),
        View::List => {
            let mut help = "j/k move · n new · e edit · space toggle · d delete".to_string();
            if !app.undo.is_empty() {
                help.push_str(" · u undo");
            }
            help.push_str(" · r refresh · l sign out · q quit");
            help
        }
        View::Form => "Tab switch field · space toggle done · Enter save · Esc cancel".to_string(),
    }
}

fn input_lines(input: &TextInput, focused: bool) -> Vec<Spans<'static>> {
    let label_style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let cursor = if focused { "_" } else { "" };
    let mut lines = vec![Spans::from(vec![
        Span::styled(format!("{}: ", input.label), label_style),
        Span::raw(format!("{}{}", input.display(), cursor)),
    ])];
    if let Some(error) = &input.error {
        lines.push(Spans::from(Span::styled(
            format!("  {error}"),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Spans::from(""));
    lines
}

fn draw_credentials<B: Backend>(f: &mut Frame<B>, area: Rect, title: &'static str, form: &CredentialsForm) {
    let mut lines = input_lines(&form.username, form.focus == CredentialsField::Username);
    lines.extend(input_lines(&form.password, form.focus == CredentialsField::Password));

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .alignment(Alignment::Left);
    f.render_widget(paragraph, area);
}

fn draw_list<B: Backend>(f: &mut Frame<B>, area: Rect, app: &App) {
    let title = match &app.user {
        Some(user) => format!("todo · {user}"),
        None => "todo".to_string(),
    };

    let items: Vec<ListItem> = app
        .tasks
        .iter()
        .map(|task| {
            let (mark, style) = if task.completed {
                ("[x] ", Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT))
            } else {
                ("[ ] ", Style::default().fg(Color::LightBlue))
            };
            ListItem::new(Spans::from(vec![
                Span::raw(mark),
                Span::styled(task.title.clone(), style),
                Span::styled(
                    format!("  {}", task.created_at.format("%Y-%m-%d %H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    if items.is_empty() {
        let empty = Paragraph::new("No tasks yet. Press n to add one.")
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(empty, area);
        return;
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_form<B: Backend>(f: &mut Frame<B>, area: Rect, app: &App) {
    let form = &app.task_form;
    let title = if form.editing.is_some() { "edit task" } else { "new task" };

    let mut lines = input_lines(&form.title, form.focus == FormField::Title);
    let checkbox_style = if form.focus == FormField::Completed {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Yellow)
    };
    lines.push(Spans::from(vec![
        Span::styled("Completed: ", checkbox_style),
        Span::raw(if form.completed { "[x]" } else { "[ ]" }),
    ]));

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .alignment(Alignment::Left);
    f.render_widget(paragraph, area);
}
