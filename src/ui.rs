use crate::app::{App, AuthField, InputMode, NoticeKind, Route};
use crate::form::{FormField, TaskForm};
use crate::models::{priority_label, Status, Task, Theme};
use chrono::Local;
use crossterm::event::{self, Event as CEvent};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn text_style(theme: Theme) -> Style {
    match theme {
        Theme::Light => Style::default().fg(Color::Black),
        Theme::Dark => Style::default().fg(Color::White),
    }
}

fn dim_style(theme: Theme) -> Style {
    match theme {
        Theme::Light => Style::default().fg(Color::DarkGray),
        Theme::Dark => Style::default().fg(Color::Gray),
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Pending => Color::Gray,
        Status::InProgress => Color::Yellow,
        Status::Completed => Color::Green,
    }
}

// Fixed 5-level mapping, mirroring the priority labels
fn priority_color(priority: u8) -> Color {
    match priority {
        1 => Color::Gray,
        2 => Color::Blue,
        3 => Color::Yellow,
        4 => Color::LightRed,
        5 => Color::Red,
        _ => Color::Gray,
    }
}

fn human_size(size: u64) -> String {
    if size >= 1024 * 1024 {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    } else if size >= 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{} B", size)
    }
}

fn get_legend(app: &App) -> Text<'static> {
    let key = |k: &str| Span::styled(format!(" {} ", k), Style::default().fg(Color::Red));
    let label = |t: &str| Span::raw(format!(": {} ", t));

    if app.route() == Route::Auth {
        return Text::from(Line::from(vec![
            key("Tab"),
            label("Switch Field"),
            key("Enter"),
            label("Sign In"),
            key("Esc"),
            label("Quit"),
        ]));
    }
    match app.input_mode {
        InputMode::Normal => Text::from(Line::from(vec![
            key("q"),
            label("Quit"),
            key("j/k"),
            label("Move"),
            key("g/Space"),
            label("Grab/Drop"),
            key("/"),
            label("Search"),
            key("f"),
            label("Filter"),
            key("a"),
            label("Add"),
            key("e"),
            label("Edit"),
            key("d"),
            label("Delete"),
            key("o"),
            label("Files"),
            key("c"),
            label("Comments"),
            key("x"),
            label("Delete File"),
            key("T"),
            label("Theme"),
            key("L"),
            label("Sign Out"),
        ])),
        InputMode::Search => Text::from(Line::from(vec![
            key("Enter"),
            label("Apply"),
            key("Esc"),
            label("Clear"),
        ])),
        InputMode::Editing => Text::from(Line::from(vec![
            key("Tab"),
            label("Next Field"),
            key("i"),
            label("Type"),
            key("Space"),
            label("Cycle"),
            key("J/K"),
            label("Pick"),
            key("x"),
            label("Remove"),
            key("Enter"),
            label("Submit"),
            key("Esc"),
            label("Cancel"),
        ])),
        InputMode::Insert => Text::from(Line::from(vec![
            key("Enter"),
            label("Accept"),
            key("Esc"),
            label("Back"),
        ])),
        InputMode::Confirm => Text::from(Line::from(vec![
            key("y"),
            label("Delete"),
            key("n"),
            label("Keep"),
        ])),
    }
}

fn draw_auth(f: &mut Frame, app: &App, area: Rect) {
    let theme = app.config.theme;
    let popup = centered_rect_absolute(46, 8, area);

    let email_style = if app.auth_input.field == AuthField::Email {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        text_style(theme)
    };
    let password_style = if app.auth_input.field == AuthField::Password {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        text_style(theme)
    };

    let masked: String = "*".repeat(app.auth_input.password.chars().count());
    let lines = vec![
        Line::from(vec![
            Span::styled("Email:    ", email_style),
            Span::raw(app.auth_input.email.clone()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Password: ", password_style),
            Span::raw(masked),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to sign in",
            dim_style(theme),
        )),
    ];

    let block = Block::default()
        .title("Sign In")
        .borders(Borders::ALL)
        .style(text_style(theme));
    let widget = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(Clear, popup);
    f.render_widget(widget, popup);
}

fn task_row(task: &Task, grabbed: bool, today: chrono::NaiveDate) -> ListItem<'static> {
    let mut spans = Vec::new();
    if grabbed {
        spans.push(Span::styled(
            "** ",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ));
    }
    spans.push(Span::styled(
        format!("[{}] ", task.status.label()),
        Style::default().fg(status_color(task.status)),
    ));
    spans.push(Span::raw(task.title.clone()));
    spans.push(Span::styled(
        format!("  {}", priority_label(task.priority)),
        Style::default().fg(priority_color(task.priority)),
    ));
    if task.is_overdue(today) {
        spans.push(Span::styled(
            "  (Overdue)",
            Style::default().fg(Color::Red),
        ));
    }
    ListItem::new(Line::from(spans))
}

// Detail panel for the selected task: badges, labels, due date, and the
// expandable attachment/comment sections
fn detail_lines(app: &App, task: &Task, today: chrono::NaiveDate) -> Vec<Line<'static>> {
    let theme = app.config.theme;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line<'static>> = Vec::new();

    lines.push(Line::from(Span::styled(task.title.clone(), bold)));
    if !task.project.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Project: {}", task.project),
            dim_style(theme),
        )));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(vec![
        Span::styled("Status: ", bold),
        Span::styled(
            task.status.label().to_string(),
            Style::default().fg(status_color(task.status)),
        ),
        Span::raw("   "),
        Span::styled("Priority: ", bold),
        Span::styled(
            priority_label(task.priority).to_string(),
            Style::default().fg(priority_color(task.priority)),
        ),
    ]));

    let overdue = task.is_overdue(today);
    let due_style = if overdue {
        Style::default().fg(Color::Red)
    } else {
        dim_style(theme)
    };
    let mut due = format!("Due: {}", task.due_date.format("%b %e, %Y"));
    if overdue {
        due.push_str(" (Overdue)");
    }
    lines.push(Line::from(Span::styled(due, due_style)));

    if !task.labels.is_empty() {
        let mut label_spans: Vec<Span<'static>> = Vec::new();
        for (i, label) in task.labels.iter().enumerate() {
            if i > 0 {
                label_spans.push(Span::raw(" ".to_string()));
            }
            label_spans.push(Span::styled(
                format!(" {} ", label),
                Style::default().bg(Color::Yellow).fg(Color::Black),
            ));
        }
        lines.push(Line::from(label_spans));
    }

    lines.push(Line::from(""));
    if task.description.is_empty() {
        lines.push(Line::from(Span::styled(
            "No description".to_string(),
            dim_style(theme),
        )));
    } else {
        for text_line in task.description.lines() {
            lines.push(Line::from(Span::raw(text_line.to_string())));
        }
    }
    lines.push(Line::from(""));

    // attachments
    let marker = if app.show_attachments { "v" } else { ">" };
    lines.push(Line::from(Span::styled(
        format!("{} {} attachments (o)", marker, task.attachments.len()),
        dim_style(theme),
    )));
    if app.show_attachments {
        for (i, attachment) in task.attachments.iter().enumerate() {
            let style = if i == app.attachment_cursor {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                text_style(theme)
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "  {} ({}, {})",
                    attachment.name,
                    attachment.content_type,
                    human_size(attachment.size)
                ),
                style,
            )));
        }
    }

    // comments
    let marker = if app.show_comments { "v" } else { ">" };
    lines.push(Line::from(Span::styled(
        format!("{} {} comments (c)", marker, task.comments.len()),
        dim_style(theme),
    )));
    if app.show_comments {
        for comment in &task.comments {
            lines.push(Line::from(vec![
                Span::styled(
                    comment.user_email.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  {}", comment.created_at.format("%b %e, %H:%M")),
                    dim_style(theme),
                ),
            ]));
            lines.push(Line::from(Span::raw(format!("  {}", comment.content))));
        }
    }

    lines
}

fn form_lines(form: &TaskForm, insert: bool, theme: Theme) -> Vec<Line<'static>> {
    let field_line = |field: FormField, value: String, active: FormField| {
        let style = if field == active {
            let mut s = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
            if insert {
                s = s.add_modifier(Modifier::UNDERLINED);
            }
            s
        } else {
            text_style(theme)
        };
        Line::from(vec![
            Span::styled(format!("{:<12}", field.label()), style),
            Span::raw(value),
        ])
    };

    let mut lines = vec![
        field_line(FormField::Title, form.title.clone(), form.field),
        field_line(FormField::Description, form.description.clone(), form.field),
        field_line(FormField::Project, form.project.clone(), form.field),
        field_line(FormField::DueDate, form.due_date.clone(), form.field),
        field_line(
            FormField::Status,
            form.status.label().to_string(),
            form.field,
        ),
        field_line(
            FormField::Priority,
            format!("{} ({})", form.priority, priority_label(form.priority)),
            form.field,
        ),
        field_line(FormField::NewLabel, form.new_label.clone(), form.field),
        field_line(
            FormField::AttachmentPath,
            form.attachment_path.clone(),
            form.field,
        ),
    ];

    if !form.labels.is_empty() {
        let picking = form.field == FormField::NewLabel;
        let mut spans = vec![Span::raw("Labels: ".to_string())];
        for (i, label) in form.labels.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" ".to_string()));
            }
            let style = if picking && i == form.label_cursor {
                Style::default()
                    .bg(Color::Green)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().bg(Color::Yellow).fg(Color::Black)
            };
            spans.push(Span::styled(format!(" {} ", label), style));
        }
        lines.push(Line::from(spans));
    }
    let picking_files = form.field == FormField::AttachmentPath;
    for (i, attachment) in form.attachments.iter().enumerate() {
        let style = if picking_files && i == form.attachment_cursor {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            dim_style(theme)
        };
        lines.push(Line::from(Span::styled(
            format!("File: {} ({})", attachment.name, human_size(attachment.size)),
            style,
        )));
    }
    lines
}

fn draw_tasks(f: &mut Frame, app: &mut App, area: Rect) {
    let theme = app.config.theme;
    let today = Local::now().date_naive();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    // header: search query and active status filter
    let search_prefix = if matches!(app.input_mode, InputMode::Search) {
        "Search (typing): "
    } else {
        "Search: "
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(search_prefix, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(app.search_query.clone()),
        Span::raw("   "),
        Span::styled("Filter: ", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(
            app.status_filter.label(),
            Style::default().fg(Color::Cyan),
        ),
    ]))
    .style(text_style(theme))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(chunks[1]);

    // left panel: the filtered, ordered task list
    let items: Vec<ListItem> = app
        .visible_tasks()
        .iter()
        .map(|task| task_row(task, app.grabbed.as_deref() == Some(task.id.as_str()), today))
        .collect();

    let list_title = if app.grabbed.is_some() {
        "Tasks (moving)"
    } else {
        "Tasks"
    };
    let tasks_widget = if !items.is_empty() {
        List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(list_title)
                    .style(text_style(theme)),
            )
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else {
        List::new(vec![ListItem::new(
            "No tasks found. Create a new task to get started!",
        )])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(list_title)
                .style(text_style(theme)),
        )
    };
    f.render_stateful_widget(tasks_widget, body[0], &mut app.state);

    // right panel: selected task detail
    let detail_block = Block::default()
        .borders(Borders::ALL)
        .title("Task Details")
        .style(text_style(theme));
    let lines = app
        .selected_task()
        .map(|task| detail_lines(app, task, today));
    let paragraph = match lines {
        Some(lines) => Paragraph::new(lines)
            .block(detail_block)
            .wrap(Wrap { trim: false }),
        None => Paragraph::new("Select a task to see its details")
            .block(detail_block)
            .wrap(Wrap { trim: true }),
    };
    f.render_widget(paragraph, body[1]);

    // popups over the body
    match app.input_mode {
        InputMode::Editing | InputMode::Insert => {
            if let Some(form) = &app.form {
                let title = if form.editing_id.is_some() {
                    "Edit Task"
                } else {
                    "Create New Task"
                };
                let insert = matches!(app.input_mode, InputMode::Insert);
                let lines = form_lines(form, insert, theme);
                let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
                let popup = centered_rect_absolute(60, height, area);
                let widget = Paragraph::new(lines)
                    .block(
                        Block::default()
                            .title(title)
                            .borders(Borders::ALL)
                            .style(Style::default().fg(Color::Green)),
                    )
                    .wrap(Wrap { trim: false });
                f.render_widget(Clear, popup);
                f.render_widget(widget, popup);
            }
        }
        InputMode::Confirm => {
            let popup = centered_rect_absolute(44, 3, area);
            let widget = Paragraph::new("Are you sure you want to delete this task?")
                .block(
                    Block::default()
                        .title("Confirm (y/n)")
                        .borders(Borders::ALL)
                        .style(Style::default().fg(Color::Red)),
                )
                .alignment(Alignment::Center);
            f.render_widget(Clear, popup);
            f.render_widget(widget, popup);
        }
        _ => {}
    }
}

fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    // body plus a two-line footer: key legend and the notice line
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Min(0), Constraint::Length(2)].as_ref())
        .split(size);

    let body_chunk = chunks[0];
    let footer_chunk = chunks[1];

    match app.route() {
        Route::Auth => draw_auth(f, app, body_chunk),
        Route::Tasks => draw_tasks(f, app, body_chunk),
    }

    let footer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)].as_ref())
        .split(footer_chunk);

    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, footer[0]);

    if let Some(notice) = app.notices.last() {
        let color = match notice.kind {
            NoticeKind::Success => Color::Green,
            NoticeKind::Error => Color::Red,
        };
        let widget = Paragraph::new(notice.text.clone())
            .style(Style::default().fg(color))
            .alignment(Alignment::Left);
        f.render_widget(widget, footer[1]);
    }
}

// Main event loop: draw, poll, dispatch
pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| draw(f, &mut app))?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                let should_quit = app.handle_input(key).await;
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Session;
    use crate::config::Config;
    use crate::models::User;

    fn signed_in_app() -> App {
        let mut app = App::new(Config {
            instance_url: "http://localhost".to_string(),
            anon_key: "anon".to_string(),
            email: None,
            theme: Theme::Light,
        });
        app.session = Some(Session {
            user: User {
                id: "u1".to_string(),
                email: "u1@example.com".to_string(),
            },
            access_token: "token".to_string(),
        });
        app
    }

    fn legend_text(app: &App) -> String {
        get_legend(app)
            .lines
            .iter()
            .flat_map(|line| line.spans.iter())
            .map(|span| span.content.to_string())
            .collect()
    }

    #[test]
    fn test_normal_legend_names_every_grab_key() {
        let app = signed_in_app();
        assert!(legend_text(&app).contains("g/Space"));
    }

    #[test]
    fn test_human_size_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
