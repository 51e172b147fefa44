use crate::calendar::{self, Cell, MonthCursor, MonthGrid, WEEKDAYS};
use crate::filter::{filter_bar, Filter, QuickPick};
use crate::model::{parse_hex_color, Category, Task, TaskId, Theme, DEFAULT_COLOR};
use crate::session::{today, Session};
use crate::storage::{DirStore, Store, StoreLocation};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

pub fn run(session: Session<DirStore>, location: StoreLocation) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(session, location);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App<S: Store> {
    session: Session<S>,
    location: StoreLocation,
    view: ViewMode,
    mode: Mode,
    filter: Filter,
    quick_pick: QuickPick,
    selected_task: usize,
    task_offset: usize,
    selected_category: usize,
    month: MonthCursor,
    last_save: Instant,
    status: String,
}

enum Mode {
    Normal,
    Creating(FieldValue),
    Editing { task_id: TaskId, text: FieldValue },
    CategoryForm(CategoryForm),
    ConfirmDelete { category: String },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ViewMode {
    Tasks,
    Categories,
    Calendar,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Tasks => "Tasks",
            ViewMode::Categories => "Categories",
            ViewMode::Calendar => "Calendar",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum CategoryField {
    Name,
    Color,
}

struct CategoryForm {
    /// Name of the category being edited; `None` when adding.
    original: Option<String>,
    name: FieldValue,
    color: FieldValue,
    field: CategoryField,
}

impl CategoryForm {
    fn new() -> Self {
        CategoryForm {
            original: None,
            name: FieldValue::new(""),
            color: FieldValue::new("#10b981"),
            field: CategoryField::Name,
        }
    }

    fn from_category(category: &Category) -> Self {
        CategoryForm {
            original: Some(category.name.clone()),
            name: FieldValue::new(&category.name),
            color: FieldValue::new(&category.color),
            field: CategoryField::Name,
        }
    }

    fn switch_field(&mut self) {
        self.field = match self.field {
            CategoryField::Name => CategoryField::Color,
            CategoryField::Color => CategoryField::Name,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            CategoryField::Name => &mut self.name,
            CategoryField::Color => &mut self.color,
        }
    }
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    /// Applies a plain editing key. Returns false for keys it does not own.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.len(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert_char(c)
            }
            _ => return false,
        }
        true
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

struct Palette {
    bg: Color,
    panel: Color,
    fg: Color,
    muted: Color,
    accent: Color,
    highlight_bg: Color,
    highlight_fg: Color,
    done: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Palette {
                bg: Color::Rgb(16, 18, 24),
                panel: Color::Rgb(22, 24, 30),
                fg: Color::White,
                muted: Color::DarkGray,
                accent: Color::Cyan,
                highlight_bg: Color::LightCyan,
                highlight_fg: Color::Black,
                done: Color::Gray,
            },
            Theme::Light => Palette {
                bg: Color::Rgb(246, 245, 240),
                panel: Color::Rgb(236, 234, 226),
                fg: Color::Black,
                muted: Color::Gray,
                accent: Color::Blue,
                highlight_bg: Color::Rgb(252, 214, 112),
                highlight_fg: Color::Black,
                done: Color::DarkGray,
            },
        }
    }

    fn border(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.accent } else { self.muted })
    }
}

impl<S: Store> App<S> {
    fn new(session: Session<S>, location: StoreLocation) -> Self {
        let status = format!("Loaded tasks from {}", location.dir.display());
        let quick_pick = QuickPick::new(&session.tracker().categories);
        App {
            session,
            location,
            view: ViewMode::Tasks,
            mode: Mode::Normal,
            filter: Filter::All,
            quick_pick,
            selected_task: 0,
            task_offset: 0,
            selected_category: 0,
            month: MonthCursor::containing(today()),
            last_save: Instant::now(),
            status,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn palette(&self) -> Palette {
        Palette::for_theme(self.session.tracker().theme)
    }

    fn categories(&self) -> &[Category] {
        &self.session.tracker().categories
    }

    fn visible_tasks(&self) -> Vec<&Task> {
        self.filter.visible(&self.session.tracker().tasks).collect()
    }

    fn current_task(&self) -> Option<&Task> {
        self.visible_tasks().get(self.selected_task).copied()
    }

    fn current_category(&self) -> Option<&Category> {
        self.categories().get(self.selected_category)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Creating(_) | Mode::Editing { .. } | Mode::CategoryForm(_) => {
                self.handle_form_key(key)?;
                Ok(false)
            }
            Mode::ConfirmDelete { .. } => {
                self.handle_confirm_key(key)?;
                Ok(false)
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('1') => self.set_view(ViewMode::Tasks),
            KeyCode::Char('2') => self.set_view(ViewMode::Categories),
            KeyCode::Char('3') => self.set_view(ViewMode::Calendar),
            KeyCode::Char('t') => {
                let theme = self.session.toggle_theme()?;
                self.saved(format!("Switched to {} theme", theme));
            }
            _ => match self.view {
                ViewMode::Tasks => self.handle_tasks_key(key)?,
                ViewMode::Categories => self.handle_categories_key(key),
                ViewMode::Calendar => self.handle_calendar_key(key),
            },
        }
        Ok(false)
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_task = self.selected_task.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => self.selected_task += 1,
            KeyCode::Char('n') => {
                if self.categories().is_empty() {
                    self.status = "Add a category before creating tasks".into();
                } else {
                    self.quick_pick.reconcile(&self.session.tracker().categories);
                    self.mode = Mode::Creating(FieldValue::new(""));
                    self.status =
                        "New task (Tab/Shift-Tab pick category, Enter save, Esc cancel)".into();
                }
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.current_task() {
                    let task_id = task.id.clone();
                    let text = FieldValue::new(&task.text);
                    self.status = format!("Editing {}", task_id);
                    self.mode = Mode::Editing { task_id, text };
                } else {
                    self.status = "No task selected to edit".into();
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('c') => {
                if let Some(id) = self.current_task().map(|t| t.id.clone()) {
                    let completed = self.session.toggle_task(&id, today())?;
                    self.saved(if completed {
                        format!("Completed {}", id)
                    } else {
                        format!("Reopened {}", id)
                    });
                } else {
                    self.status = "No task selected".into();
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.current_task().map(|t| t.id.clone()) {
                    self.session.delete_task(&id, today())?;
                    self.saved(format!("Deleted {}", id));
                } else {
                    self.status = "No task selected to delete".into();
                }
            }
            KeyCode::Char('f') | KeyCode::Tab => self.cycle_filter(1),
            KeyCode::Char('F') | KeyCode::BackTab => self.cycle_filter(-1),
            KeyCode::Char('a') => {
                self.filter = Filter::All;
                self.selected_task = 0;
                self.status = "Showing all tasks".into();
            }
            _ => {}
        }
        self.ensure_task_bounds();
        Ok(())
    }

    fn handle_categories_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_category = self.selected_category.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => self.selected_category += 1,
            KeyCode::Char('n') => {
                self.mode = Mode::CategoryForm(CategoryForm::new());
                self.status = "New category (Tab switch field, Enter save, Esc cancel)".into();
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(category) = self.current_category() {
                    let form = CategoryForm::from_category(category);
                    self.status = format!("Editing category {}", category.name);
                    self.mode = Mode::CategoryForm(form);
                } else {
                    self.status = "No category selected".into();
                }
            }
            KeyCode::Char('d') => {
                if let Some(name) = self.current_category().map(|c| c.name.clone()) {
                    self.status = format!(
                        "Delete {}? Tasks keep their old name (y to confirm, n/Esc to cancel)",
                        name
                    );
                    self.mode = Mode::ConfirmDelete { category: name };
                } else {
                    self.status = "No category selected to delete".into();
                }
            }
            KeyCode::Char('p') => {
                if let Some(name) = self.current_category().map(|c| c.name.clone()) {
                    self.quick_pick.pick(&name);
                    self.status = format!("New tasks go to {}", name);
                }
            }
            _ => {}
        }
        self.ensure_category_bounds();
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.month = self.month.prev(),
            KeyCode::Right | KeyCode::Char('l') => self.month = self.month.next(),
            KeyCode::Up | KeyCode::Char('k') => {
                self.month = MonthCursor {
                    year: self.month.year - 1,
                    ..self.month
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.month = MonthCursor {
                    year: self.month.year + 1,
                    ..self.month
                }
            }
            KeyCode::Char('.') => self.month = MonthCursor::containing(today()),
            _ => return,
        }
        self.status = format!("Showing {}", self.month.title());
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close_form = match &mut mode {
            Mode::Creating(text) => self.process_create_key(text, key)?,
            Mode::Editing { task_id, text } => {
                let id = task_id.clone();
                self.process_edit_key(&id, text, key)?
            }
            Mode::CategoryForm(form) => self.process_category_key(form, key)?,
            Mode::ConfirmDelete { .. } | Mode::Normal => true,
        };
        self.mode = if close_form { Mode::Normal } else { mode };
        Ok(())
    }

    fn process_create_key(&mut self, text: &mut FieldValue, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                return Ok(true);
            }
            KeyCode::Tab => self.quick_pick.cycle(&self.session.tracker().categories, 1),
            KeyCode::BackTab => self.quick_pick.cycle(&self.session.tracker().categories, -1),
            KeyCode::Enter => {
                let Some(category) = self.quick_pick.selected().map(str::to_string) else {
                    self.status = "Pick a category first".into();
                    return Ok(false);
                };
                return match self.session.add_task(&text.value, &category)? {
                    Some(id) => {
                        self.saved(format!("Added {} to {}", id, category));
                        let visible = self.visible_tasks();
                        if let Some(pos) = visible.iter().position(|t| t.id == id) {
                            self.selected_task = pos;
                        }
                        Ok(true)
                    }
                    None => {
                        self.status = "Task text is empty".into();
                        Ok(false)
                    }
                };
            }
            _ => {
                text.handle_key(key);
            }
        }
        Ok(false)
    }

    fn process_edit_key(&mut self, id: &str, text: &mut FieldValue, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                Ok(true)
            }
            KeyCode::Enter => {
                if self.session.edit_task(id, &text.value)? {
                    self.saved(format!("Updated {}", id));
                } else {
                    self.status = "Nothing changed".into();
                }
                Ok(true)
            }
            _ => {
                text.handle_key(key);
                Ok(false)
            }
        }
    }

    fn process_category_key(&mut self, form: &mut CategoryForm, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                Ok(true)
            }
            KeyCode::Tab | KeyCode::BackTab => {
                form.switch_field();
                Ok(false)
            }
            KeyCode::Enter => self.submit_category(form),
            _ => {
                form.active_field_mut().handle_key(key);
                Ok(false)
            }
        }
    }

    fn submit_category(&mut self, form: &CategoryForm) -> Result<bool> {
        let color = form.color.value.trim().to_lowercase();
        if parse_hex_color(&color).is_none() {
            self.status = format!("Invalid color (use #rrggbb): {}", color);
            return Ok(false);
        }
        let name = form.name.value.trim().to_string();
        match &form.original {
            None => {
                if self.session.add_category(&name, &color)? {
                    self.saved(format!("Added category {}", name));
                } else {
                    self.status = "Category name is empty or already taken".into();
                }
            }
            Some(old) => {
                if self.session.rename_category(old, &name, &color)? {
                    self.filter = std::mem::take(&mut self.filter).renamed(old, &name);
                    if self.quick_pick.selected() == Some(old.as_str()) {
                        self.quick_pick.pick(&name);
                    }
                    self.saved(format!("Saved category {}", name));
                } else {
                    self.status = "Category name is empty".into();
                }
            }
        }
        self.after_category_change();
        Ok(true)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<()> {
        let name = match &self.mode {
            Mode::ConfirmDelete { category } => category.clone(),
            _ => return Ok(()),
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let mut accept = |_: &str| -> Result<bool> { Ok(true) };
                match self.session.delete_category(&name, &mut accept) {
                    Ok(_) => self.saved(format!("Deleted category {}", name)),
                    Err(err) => self.status = format!("Delete failed: {}", err),
                }
                self.after_category_change();
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(())
    }

    fn after_category_change(&mut self) {
        let categories = self.session.tracker().categories.clone();
        self.filter = std::mem::take(&mut self.filter).reconcile(&categories);
        self.quick_pick.reconcile(&categories);
        self.ensure_category_bounds();
        self.ensure_task_bounds();
    }

    fn cycle_filter(&mut self, delta: isize) {
        self.filter = self.filter.cycle(self.categories(), delta);
        self.selected_task = 0;
        self.task_offset = 0;
        self.status = format!("Filter: {}", self.filter.label());
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
            self.status = format!("Switched to {} view", view.label());
        }
        self.ensure_task_bounds();
        self.ensure_category_bounds();
    }

    fn ensure_task_bounds(&mut self) {
        let len = self.visible_tasks().len();
        if self.selected_task >= len {
            self.selected_task = len.saturating_sub(1);
        }
    }

    fn ensure_category_bounds(&mut self) {
        let len = self.categories().len();
        if self.selected_category >= len {
            self.selected_category = len.saturating_sub(1);
        }
    }

    fn saved(&mut self, message: impl Into<String>) {
        self.last_save = Instant::now();
        self.status = message.into();
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let palette = self.palette();
        f.render_widget(
            Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
            f.size(),
        );
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0], &palette);
        match self.view {
            ViewMode::Tasks => self.draw_tasks(f, layout[1], &palette),
            ViewMode::Categories => self.draw_categories(f, layout[1], &palette),
            ViewMode::Calendar => self.draw_calendar(f, layout[1], &palette),
        }
        self.draw_footer(f, layout[2], &palette);

        match &self.mode {
            Mode::Creating(text) => self.draw_task_form(f, "New Task", text, true, &palette),
            Mode::Editing { text, .. } => self.draw_task_form(f, "Edit Task", text, false, &palette),
            Mode::CategoryForm(form) => self.draw_category_form(f, form, &palette),
            Mode::ConfirmDelete { category } => self.draw_confirm(f, category, &palette),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let title = Line::from(vec![
            Span::styled(
                "tally ",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(self.location.scope.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.dir.display()),
                Style::default().fg(palette.muted),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(palette.muted),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{} theme", self.session.tracker().theme),
                Style::default().fg(palette.muted),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(palette.muted));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_tasks(&mut self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(area);

        let mut spans = Vec::new();
        for entry in filter_bar(self.categories(), &self.filter) {
            let color = entry.color.as_deref().map(hex_to_color).unwrap_or(palette.fg);
            let mut style = Style::default().fg(color);
            if entry.active {
                style = style
                    .bg(palette.highlight_bg)
                    .fg(palette.highlight_fg)
                    .add_modifier(Modifier::BOLD);
            }
            spans.push(Span::styled(format!(" {} ", entry.label), style));
            spans.push(Span::raw(" "));
        }
        let bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(palette.border(false))
                .title("Filter (f/F cycle, a all)"),
        );
        f.render_widget(bar, sections[0]);

        let tracker = self.session.tracker();
        let visible: Vec<&Task> = self.filter.visible(&tracker.tasks).collect();
        let viewport = sections[1].height.saturating_sub(2) as usize;
        let offset = adjust_offset(
            self.selected_task,
            self.task_offset,
            viewport,
            1,
            visible.len(),
        );
        let items = if visible.is_empty() {
            vec![ListItem::new("No tasks").style(Style::default().fg(palette.muted))]
        } else {
            visible
                .iter()
                .map(|task| task_item(task, tracker.color_of(&task.category), palette))
                .collect()
        };
        let done = visible.iter().filter(|t| t.completed).count();
        let mut state = ListState::default();
        *state.offset_mut() = offset;
        if !visible.is_empty() {
            state.select(Some(self.selected_task));
        }
        let block = Block::default()
            .title(Span::styled(
                format!(
                    "{} ({} open, {} done)",
                    self.filter.label(),
                    visible.len() - done,
                    done
                ),
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(palette.border(true))
            .style(Style::default().bg(palette.panel));
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(palette.highlight_bg)
                .fg(palette.highlight_fg)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, sections[1], &mut state);
        self.task_offset = offset;
    }

    fn draw_categories(&self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let tracker = self.session.tracker();
        let items: Vec<ListItem> = if tracker.categories.is_empty() {
            vec![ListItem::new("No categories").style(Style::default().fg(palette.muted))]
        } else {
            tracker
                .categories
                .iter()
                .map(|c| {
                    let count = tracker.tasks.iter().filter(|t| t.category == c.name).count();
                    let picked = self.quick_pick.selected() == Some(c.name.as_str());
                    ListItem::new(Line::from(vec![
                        Span::styled("██ ", Style::default().fg(hex_to_color(&c.color))),
                        Span::styled(
                            c.name.clone(),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(
                            format!("  {}  {} tasks", c.color, count),
                            Style::default().fg(palette.muted),
                        ),
                        Span::styled(
                            if picked { "  (quick pick)" } else { "" },
                            Style::default().fg(palette.accent),
                        ),
                    ]))
                })
                .collect()
        };
        let orphans = orphan_names(&tracker.tasks, &tracker.categories);
        let sections = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        let mut state = ListState::default();
        if !tracker.categories.is_empty() {
            state.select(Some(self.selected_category));
        }
        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!("Categories ({})", tracker.categories.len()))
                    .borders(Borders::ALL)
                    .border_style(palette.border(true))
                    .style(Style::default().bg(palette.panel)),
            )
            .highlight_style(
                Style::default()
                    .bg(palette.highlight_bg)
                    .fg(palette.highlight_fg)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, sections[0], &mut state);

        let mut lines = vec![Line::from(Span::styled(
            "Names left on tasks after a delete",
            Style::default().fg(palette.muted),
        ))];
        if orphans.is_empty() {
            lines.push(Line::from("none"));
        }
        for name in orphans {
            lines.push(Line::from(vec![
                Span::styled("██ ", Style::default().fg(hex_to_color(DEFAULT_COLOR))),
                Span::raw(name),
            ]));
        }
        let side = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title("Orphaned")
                .borders(Borders::ALL)
                .border_style(palette.border(false)),
        );
        f.render_widget(side, sections[1]);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let tracker = self.session.tracker();
        let grid = calendar::render_for(tracker, self.month);
        let sections = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        let block = Block::default()
            .title(Span::styled(
                grid.title.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(palette.border(true))
            .style(Style::default().bg(palette.panel));
        let paragraph = Paragraph::new(calendar_lines(&grid, today(), palette))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, sections[0]);

        let mut lines = Vec::new();
        for entry in calendar::legend(&tracker.categories) {
            lines.push(Line::from(vec![
                Span::styled("● ", Style::default().fg(hex_to_color(&entry.color))),
                Span::raw(entry.name),
            ]));
        }
        lines.push(Line::raw(""));
        let markers: Vec<_> = grid
            .cells
            .iter()
            .filter_map(|c| match c {
                Cell::Day { date, markers } if !markers.is_empty() => Some((date, markers)),
                _ => None,
            })
            .collect();
        if markers.is_empty() {
            lines.push(Line::from(Span::styled(
                "No completions this month",
                Style::default().fg(palette.muted),
            )));
        }
        for (date, day_markers) in markers {
            for marker in day_markers {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("{} ", date.format("%d")),
                        Style::default().fg(palette.muted),
                    ),
                    Span::styled("● ", Style::default().fg(hex_to_color(&marker.color))),
                    Span::raw(marker.label.clone()),
                ]));
            }
        }
        let side = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title("Legend")
                .borders(Borders::ALL)
                .border_style(palette.border(false)),
        );
        f.render_widget(side, sections[1]);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(palette.muted)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);
        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(palette.muted)),
            );
        f.render_widget(status, bottom[0]);

        let detail = Paragraph::new(self.detail_line(palette))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(palette.muted))
                    .title("Selected"),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("1", Style::default().fg(Color::LightCyan)),
            Span::raw(" tasks  "),
            Span::styled("2", Style::default().fg(Color::LightCyan)),
            Span::raw(" categories  "),
            Span::styled("3", Style::default().fg(Color::LightCyan)),
            Span::raw(" calendar  "),
            Span::styled("t", Style::default().fg(Color::LightCyan)),
            Span::raw(" theme  "),
        ];
        match self.view {
            ViewMode::Tasks => spans.extend([
                Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
                Span::raw(" move  "),
                Span::styled("n", Style::default().fg(Color::LightMagenta)),
                Span::raw(" new  "),
                Span::styled("e", Style::default().fg(Color::LightYellow)),
                Span::raw(" edit  "),
                Span::styled("space", Style::default().fg(Color::LightGreen)),
                Span::raw(" complete/undo  "),
                Span::styled("d", Style::default().fg(Color::LightRed)),
                Span::raw(" delete  "),
            ]),
            ViewMode::Categories => spans.extend([
                Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
                Span::raw(" move  "),
                Span::styled("n", Style::default().fg(Color::LightMagenta)),
                Span::raw(" new  "),
                Span::styled("e", Style::default().fg(Color::LightYellow)),
                Span::raw(" rename/recolor  "),
                Span::styled("p", Style::default().fg(Color::LightGreen)),
                Span::raw(" quick pick  "),
                Span::styled("d", Style::default().fg(Color::LightRed)),
                Span::raw(" delete  "),
            ]),
            ViewMode::Calendar => spans.extend([
                Span::styled("←→", Style::default().fg(Color::LightCyan)),
                Span::raw(" month  "),
                Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
                Span::raw(" year  "),
                Span::styled(".", Style::default().fg(Color::LightYellow)),
                Span::raw(" today  "),
            ]),
        }
        spans.extend([
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn detail_line(&self, palette: &Palette) -> Line<'static> {
        match self.view {
            ViewMode::Tasks => match self.current_task() {
                Some(task) => {
                    let mut spans = vec![
                        Span::styled(
                            task.text.clone(),
                            Style::default()
                                .fg(Color::Yellow)
                                .add_modifier(Modifier::BOLD),
                        ),
                        Span::raw("  "),
                        Span::styled(
                            task.category.clone(),
                            Style::default().fg(hex_to_color(
                                self.session.tracker().color_of(&task.category),
                            )),
                        ),
                    ];
                    if let Some(done) = task.completed_on {
                        spans.push(Span::styled(
                            format!("  done {}", done.format("%Y-%m-%d")),
                            Style::default().fg(palette.muted),
                        ));
                    }
                    Line::from(spans)
                }
                None => Line::from("No task selected"),
            },
            ViewMode::Categories => match self.current_category() {
                Some(c) => {
                    let done_today = self
                        .session
                        .tracker()
                        .completions
                        .count(today(), &c.name);
                    Line::from(vec![
                        Span::styled("██ ", Style::default().fg(hex_to_color(&c.color))),
                        Span::raw(c.name.clone()),
                        Span::styled(
                            format!("  {} completed today", done_today),
                            Style::default().fg(palette.muted),
                        ),
                    ])
                }
                None => Line::from("No category selected"),
            },
            ViewMode::Calendar => {
                let completions = &self.session.tracker().completions;
                if completions.is_empty() {
                    return Line::from("Nothing completed yet");
                }
                let total: u32 = completions
                    .dates()
                    .filter(|d| MonthCursor::containing(**d) == self.month)
                    .filter_map(|d| completions.on(*d))
                    .flat_map(|counts| counts.values())
                    .sum();
                Line::from(format!("{} completed in {}", total, self.month.title()))
            }
        }
    }

    fn draw_task_form(
        &self,
        f: &mut ratatui::Frame<'_>,
        title: &str,
        text: &FieldValue,
        show_chips: bool,
        palette: &Palette,
    ) {
        let area = centered_rect(60, 30, f.size());
        f.render_widget(Clear, area);
        let mut lines = vec![field_line("Task", text, true, palette), Line::raw("")];
        if show_chips {
            let mut spans = vec![Span::styled(
                "Category: ",
                Style::default()
                    .fg(palette.muted)
                    .add_modifier(Modifier::BOLD),
            )];
            for chip in self.quick_pick.chips(self.categories()) {
                let color = hex_to_color(&chip.color);
                let style = if chip.active {
                    Style::default()
                        .bg(color)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(color)
                };
                spans.push(Span::styled(format!(" {} ", chip.name), style));
                spans.push(Span::raw(" "));
            }
            lines.push(Line::from(spans));
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled(
                "Tab/Shift-Tab category • Enter save • Esc cancel",
                Style::default().fg(palette.muted),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter save • Esc cancel",
                Style::default().fg(palette.muted),
            )));
        }
        let block = Block::default()
            .title(title.to_string())
            .borders(Borders::ALL)
            .border_style(palette.border(true))
            .style(Style::default().bg(palette.panel).fg(palette.fg));
        let paragraph = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_category_form(&self, f: &mut ratatui::Frame<'_>, form: &CategoryForm, palette: &Palette) {
        let area = centered_rect(50, 30, f.size());
        f.render_widget(Clear, area);
        let title = if form.original.is_some() {
            "Edit Category"
        } else {
            "New Category"
        };
        let swatch = parse_hex_color(&form.color.value)
            .map(|(r, g, b)| Color::Rgb(r, g, b))
            .unwrap_or(palette.muted);
        let mut color_line =
            field_line("Color", &form.color, form.field == CategoryField::Color, palette);
        color_line
            .spans
            .insert(0, Span::styled("██ ", Style::default().fg(swatch)));
        let lines = vec![
            field_line("Name", &form.name, form.field == CategoryField::Name, palette),
            color_line,
            Line::raw(""),
            Line::from(Span::styled(
                "Tab switch field • Enter save • Esc cancel",
                Style::default().fg(palette.muted),
            )),
        ];
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(palette.border(true))
            .style(Style::default().bg(palette.panel).fg(palette.fg));
        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, category: &str, palette: &Palette) {
        let area = centered_rect(40, 20, f.size());
        f.render_widget(Clear, area);
        let lines = vec![
            Line::from(format!("Delete category {}?", category)),
            Line::from(Span::styled(
                "Tasks keep their old name",
                Style::default().fg(palette.muted),
            )),
            Line::raw(""),
            Line::from(vec![
                Span::styled("y", Style::default().fg(Color::LightRed)),
                Span::raw(" delete  "),
                Span::styled("n", Style::default().fg(Color::LightGreen)),
                Span::raw(" keep"),
            ]),
        ];
        let block = Block::default()
            .title("Confirm")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightRed))
            .style(Style::default().bg(palette.panel).fg(palette.fg));
        f.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn hex_to_color(hex: &str) -> Color {
    let (r, g, b) = parse_hex_color(hex)
        .or_else(|| parse_hex_color(DEFAULT_COLOR))
        .unwrap_or((107, 114, 128));
    Color::Rgb(r, g, b)
}

fn calendar_lines(grid: &MonthGrid, today: chrono::NaiveDate, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    lines.push(Line::from(
        WEEKDAYS
            .iter()
            .map(|d| Span::styled(format!("{:^8}", d), Style::default().fg(palette.muted)))
            .collect::<Vec<_>>(),
    ));
    for week in grid.weeks() {
        let mut spans = Vec::new();
        for cell in week {
            match cell {
                Cell::Blank => spans.push(Span::raw(" ".repeat(8))),
                Cell::Day { date, markers } => {
                    let mut style = Style::default().fg(palette.fg);
                    if *date == today {
                        style = style
                            .bg(palette.highlight_bg)
                            .fg(palette.highlight_fg)
                            .add_modifier(Modifier::BOLD);
                    }
                    spans.push(Span::styled(format!("{:>3} ", date.format("%-d")), style));
                    let mut dots = 0;
                    for marker in markers.iter().take(3) {
                        spans.push(Span::styled("●", Style::default().fg(hex_to_color(&marker.color))));
                        dots += 1;
                    }
                    let more = if markers.len() > 3 { "+" } else { " " };
                    spans.push(Span::raw(format!("{}{}", more, " ".repeat(3 - dots))));
                }
            }
        }
        lines.push(Line::from(spans));
        lines.push(Line::raw(""));
    }
    lines
}

fn orphan_names(tasks: &[Task], categories: &[Category]) -> Vec<String> {
    let mut names: Vec<String> = tasks
        .iter()
        .map(|t| t.category.clone())
        .filter(|name| !categories.iter().any(|c| &c.name == name))
        .collect();
    names.sort();
    names.dedup();
    names
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn task_item(task: &Task, color: &str, palette: &Palette) -> ListItem<'static> {
    let mut text_style = Style::default().fg(palette.fg);
    if task.completed {
        text_style = text_style
            .fg(palette.done)
            .add_modifier(Modifier::CROSSED_OUT);
    }
    let line = Line::from(vec![
        Span::styled("▌", Style::default().fg(hex_to_color(color))),
        Span::raw(if task.completed { "[x] " } else { "[ ] " }),
        Span::styled(task.text.clone(), text_style),
        Span::raw("  "),
        Span::styled(task.category.clone(), Style::default().fg(hex_to_color(color))),
        Span::styled(format!("  [{}]", task.id), Style::default().fg(palette.muted)),
    ]);
    ListItem::new(line)
}

fn field_line(label: &str, field: &FieldValue, active: bool, palette: &Palette) -> Line<'static> {
    let label_style = Style::default()
        .fg(palette.muted)
        .add_modifier(Modifier::BOLD);
    let value_style = Style::default().fg(if active { palette.accent } else { palette.fg });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(text, value_style),
    ])
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
