//! Main application logic for the terminal user interface.
//!
//! A single-page task list: live search, priority filter and sort cycling
//! on top of the view pipeline, with toggling, manual reordering, add/edit
//! and confirmed deletes applied straight to the store.

use std::io;
use std::path::Path;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

use crate::fields::{format_priority, Priority};
use crate::store::{FileStorage, Store};
use crate::task::Task;
use crate::tui::colors::{GOLD, HIGH_RED, SEA_GREEN};
use crate::view::{self, ViewQuery};

/// What the keyboard is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    List,
    Search,
    NewTask,
    EditTitle,
    ConfirmDelete,
}

/// Main application state for the terminal user interface.
pub struct App {
    store: Store,
    query: ViewQuery,
    /// Ids of the tasks currently shown, in display order.
    visible: Vec<String>,
    list_state: TableState,
    mode: Mode,
    /// Line buffer for search / new-task / edit input.
    input: String,
    status: String,
}

impl App {
    /// Create the app, loading the store from the given path.
    pub fn new(db_path: &Path) -> Self {
        let store = Store::open(Box::new(FileStorage::new(db_path)));
        let mut app = App {
            store,
            query: ViewQuery::default(),
            visible: Vec::new(),
            list_state: TableState::default(),
            mode: Mode::List,
            input: String::new(),
            status: String::new(),
        };
        app.refresh();
        app
    }

    /// Drive the draw/input loop until the user quits.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;
            if self.handle_input()? {
                return Ok(());
            }
        }
    }

    /// Recompute the visible id sequence and keep the selection sane.
    fn refresh(&mut self) {
        let selected_id = self
            .list_state
            .selected()
            .and_then(|i| self.visible.get(i))
            .cloned();

        self.visible = view::visible(&self.store.tasks, &self.query)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();

        let idx = selected_id
            .and_then(|id| self.visible.iter().position(|v| *v == id))
            .or(if self.visible.is_empty() { None } else { Some(0) });
        self.list_state.select(idx);
    }

    fn selected_id(&self) -> Option<String> {
        self.list_state
            .selected()
            .and_then(|i| self.visible.get(i))
            .cloned()
    }

    fn report_save(&mut self, result: io::Result<bool>) {
        if let Err(e) = result {
            self.status = format!("Save failed: {e}");
        }
    }

    /// Poll for and handle one keyboard event.
    ///
    /// Returns true if the application should quit.
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(match self.mode {
                    Mode::List => self.handle_list_key(key.code, key.modifiers),
                    Mode::Search | Mode::NewTask | Mode::EditTitle => {
                        self.handle_text_key(key.code);
                        false
                    }
                    Mode::ConfirmDelete => {
                        self.handle_confirm_key(key.code);
                        false
                    }
                });
            }
        }
        Ok(false)
    }

    fn handle_list_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        self.status.clear();
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                self.input = self.query.search.clone();
            }
            KeyCode::Char('n') => {
                self.mode = Mode::NewTask;
                self.input.clear();
            }
            KeyCode::Char('e') => {
                if let Some(id) = self.selected_id() {
                    if let Some(t) = self.store.get(&id) {
                        self.input = t.title.clone();
                        self.mode = Mode::EditTitle;
                    }
                }
            }
            KeyCode::Char('d') => {
                if self.selected_id().is_some() {
                    self.mode = Mode::ConfirmDelete;
                }
            }
            KeyCode::Char(' ') => {
                if let Some(id) = self.selected_id() {
                    let result = self.store.toggle(&id);
                    self.report_save(result);
                    self.refresh();
                }
            }
            KeyCode::Char('p') => {
                self.query.priority = self.query.priority.next();
                self.refresh();
            }
            KeyCode::Char('s') => {
                self.query.sort = self.query.sort.next();
                self.refresh();
            }
            KeyCode::Char('c') => {
                self.query.search.clear();
                self.refresh();
            }
            KeyCode::Char('J') => self.move_selected(1),
            KeyCode::Char('K') => self.move_selected(-1),
            KeyCode::Down | KeyCode::Char('j') => self.select_offset(1),
            KeyCode::Up | KeyCode::Char('k') => self.select_offset(-1),
            KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.query = ViewQuery::default();
                self.refresh();
            }
            _ => {}
        }
        false
    }

    fn handle_text_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.mode = Mode::List;
                self.input.clear();
            }
            KeyCode::Enter => self.commit_input(),
            KeyCode::Backspace => {
                self.input.pop();
                if self.mode == Mode::Search {
                    self.query.search = self.input.clone();
                    self.refresh();
                }
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                // Search filters live while typing.
                if self.mode == Mode::Search {
                    self.query.search = self.input.clone();
                    self.refresh();
                }
            }
            _ => {}
        }
    }

    fn commit_input(&mut self) {
        match self.mode {
            Mode::Search => {
                self.query.search = self.input.clone();
            }
            Mode::NewTask => {
                let title = self.input.trim().to_string();
                if title.is_empty() {
                    self.status = "Title must not be empty.".into();
                } else {
                    let order = self.store.next_order();
                    let task = Task::new(title, Priority::Medium, order);
                    if let Err(e) = self.store.add(task) {
                        self.status = format!("Save failed: {e}");
                    }
                }
            }
            Mode::EditTitle => {
                let title = self.input.trim().to_string();
                if title.is_empty() {
                    self.status = "Title must not be empty.".into();
                } else if let Some(id) = self.selected_id() {
                    let patch = crate::store::TaskPatch {
                        title: Some(title),
                        ..Default::default()
                    };
                    let result = self.store.update(&id, patch);
                    self.report_save(result);
                }
            }
            Mode::List | Mode::ConfirmDelete => {}
        }
        self.mode = Mode::List;
        self.input.clear();
        self.refresh();
    }

    fn handle_confirm_key(&mut self, code: KeyCode) {
        if let KeyCode::Char('y') | KeyCode::Char('Y') = code {
            if let Some(id) = self.selected_id() {
                let result = self.store.remove(&id);
                self.report_save(result);
            }
        }
        self.mode = Mode::List;
        self.refresh();
    }

    fn select_offset(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let len = self.visible.len() as isize;
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len - 1);
        self.list_state.select(Some(next as usize));
    }

    /// Move the selected task within the visible sequence and persist the
    /// resulting display order.
    fn move_selected(&mut self, delta: isize) {
        let Some(current) = self.list_state.selected() else {
            return;
        };
        let target = current as isize + delta;
        if target < 0 || target >= self.visible.len() as isize {
            return;
        }
        self.visible.swap(current, target as usize);
        if let Err(e) = self.store.reorder(&self.visible) {
            self.status = format!("Save failed: {e}");
        }
        // The new sequence becomes the store's base order; the active sort
        // key still decides what the list looks like.
        self.list_state.select(Some(target as usize));
        self.refresh();
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_list(f, chunks[1]);
        self.render_footer(f, chunks[2]);
    }

    fn render_header(&mut self, f: &mut Frame, area: Rect) {
        let filter_span = Span::styled(
            format!(" filter:{} ", self.query.priority.label()),
            Style::default().fg(Color::Cyan),
        );
        let sort_span = Span::styled(
            format!(" sort:{} ", self.query.sort.label()),
            Style::default().fg(Color::Cyan),
        );
        let search_span = if self.query.search.is_empty() {
            Span::raw("")
        } else {
            Span::styled(
                format!(" search:'{}' ", self.query.search),
                Style::default().fg(Color::Yellow),
            )
        };
        let header = Paragraph::new(Line::from(vec![
            Span::styled("STELLAR TODO", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            filter_span,
            sort_span,
            search_span,
        ]))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(header, area);
    }

    fn render_list(&mut self, f: &mut Frame, area: Rect) {
        let header_cells = ["Done", "Pri", "Due", "Subs", "Title"].iter().map(|h| {
            ratatui::widgets::Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD))
        });
        let header = Row::new(header_cells).height(1);

        let rows: Vec<Row> = self
            .visible
            .iter()
            .filter_map(|id| self.store.get(id))
            .map(|task| {
                let priority_color = match task.priority {
                    Priority::High => HIGH_RED,
                    Priority::Medium => GOLD,
                    Priority::Low => SEA_GREEN,
                };
                let style = if task.completed {
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
                } else {
                    Style::default().fg(priority_color)
                };
                let due = task
                    .due_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into());
                let subs = if task.subtasks.is_empty() {
                    "-".to_string()
                } else {
                    let done = task.subtasks.iter().filter(|s| s.done).count();
                    format!("{}/{}", done, task.subtasks.len())
                };
                let tags = if task.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", task.tags.join(","))
                };
                Row::new(vec![
                    if task.completed { "[x]" } else { "[ ]" }.to_string(),
                    format_priority(task.priority).to_string(),
                    due,
                    subs,
                    format!("{}{}", task.title, tags),
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Length(7),
                Constraint::Length(11),
                Constraint::Length(5),
                Constraint::Min(10),
            ],
        )
        .header(header)
        .row_highlight_style(Style::default().bg(Color::Rgb(40, 40, 60)))
        .block(Block::default().borders(Borders::ALL).title(format!(
            " {} task(s) ",
            self.visible.len()
        )));
        f.render_stateful_widget(table, area, &mut self.list_state);
    }

    fn render_footer(&mut self, f: &mut Frame, area: Rect) {
        let text = match self.mode {
            Mode::Search => format!("search: {}_  (Enter apply, Esc cancel)", self.input),
            Mode::NewTask => format!("new task title: {}_  (Enter add, Esc cancel)", self.input),
            Mode::EditTitle => format!("edit title: {}_  (Enter save, Esc cancel)", self.input),
            Mode::ConfirmDelete => {
                let title = self
                    .selected_id()
                    .and_then(|id| self.store.get(&id).map(|t| t.title.clone()))
                    .unwrap_or_default();
                format!("delete '{title}'? (y/N)")
            }
            Mode::List => {
                if self.status.is_empty() {
                    "q quit  / search  n new  e edit  d delete  space done  J/K move  p filter  s sort  c clear".into()
                } else {
                    self.status.clone()
                }
            }
        };
        let footer = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
        f.render_widget(footer, area);
    }
}
