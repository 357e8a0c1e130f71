use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Points},
        Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState,
    },
    Frame, Terminal,
};
use split_ledger::{ChartVisibility, ContributorRemoval, PieChart, Session, Submission, Transaction};
use std::io;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Transactions,
    Contributors,
}

const FORM_LABELS: [&str; 3] = ["Description", "Amount", "Contributions"];

/// Add-transaction form; the input survives a rejected submit
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub fields: [String; 3],
    pub active: usize,
}

impl FormState {
    pub fn next_field(&mut self) {
        self.active = (self.active + 1) % self.fields.len();
    }

    pub fn previous_field(&mut self) {
        self.active = (self.active + self.fields.len() - 1) % self.fields.len();
    }

    pub fn submission(&self) -> Submission {
        Submission::new(&self.fields[0], &self.fields[1], &self.fields[2])
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    pub session: Session,
    pub state: TableState,
    pub contributor_state: TableState,
    pub focus: Focus,
    pub form: Option<FormState>,
    pub status: Option<StatusMessage>,
}

impl App {
    pub fn new(session: Session) -> Self {
        let mut app = Self {
            session,
            state: TableState::default(),
            contributor_state: TableState::default(),
            focus: Focus::Transactions,
            form: None,
            status: None,
        };
        app.clamp_selection();
        app
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.session.ledger().transactions()
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        self.state.selected().and_then(|i| self.transactions().get(i))
    }

    fn info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage { text: text.into(), is_error: false });
    }

    fn error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage { text: text.into(), is_error: true });
    }

    /// Keep both selections inside their tables after the ledger changed
    pub fn clamp_selection(&mut self) {
        let len = self.transactions().len();
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => Some(0),
        };
        self.state.select(selected);

        let contributors = self.selected_transaction().map(|t| t.contributors.len()).unwrap_or(0);
        let selected = match self.contributor_state.selected() {
            _ if contributors == 0 => None,
            Some(i) => Some(i.min(contributors - 1)),
            None => Some(0),
        };
        self.contributor_state.select(selected);
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Transactions => Focus::Contributors,
            Focus::Contributors => Focus::Transactions,
        };
    }

    fn focused(&mut self) -> (&mut TableState, usize) {
        match self.focus {
            Focus::Transactions => {
                let len = self.session.ledger().len();
                (&mut self.state, len)
            }
            Focus::Contributors => {
                let len = self
                    .state
                    .selected()
                    .and_then(|i| self.session.ledger().transactions().get(i))
                    .map(|t| t.contributors.len())
                    .unwrap_or(0);
                (&mut self.contributor_state, len)
            }
        }
    }

    fn move_selection(&mut self, delta: isize, wrap: bool) {
        let (state, len) = self.focused();
        if len == 0 {
            return;
        }
        let current = state.selected().unwrap_or(0) as isize;
        let last = len as isize - 1;
        let next = current + delta;
        let next = if wrap {
            if next > last {
                0
            } else if next < 0 {
                last
            } else {
                next
            }
        } else {
            next.clamp(0, last)
        };
        state.select(Some(next as usize));

        if self.focus == Focus::Transactions {
            self.contributor_state.select(None);
            self.clamp_selection();
        }
    }

    pub fn next(&mut self) {
        self.move_selection(1, true);
    }

    pub fn previous(&mut self) {
        self.move_selection(-1, true);
    }

    pub fn page_down(&mut self) {
        self.move_selection(20, false);
    }

    pub fn page_up(&mut self) {
        self.move_selection(-20, false);
    }

    pub fn first(&mut self) {
        self.move_selection(isize::MIN / 2, false);
    }

    pub fn last(&mut self) {
        self.move_selection(isize::MAX / 2, false);
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    pub fn open_form(&mut self) {
        self.form = Some(FormState::default());
    }

    pub fn submit_form(&mut self) {
        let Some(form) = &self.form else {
            return;
        };
        match self.session.add_transaction(&form.submission()) {
            Ok(id) => {
                self.form = None;
                let index = self.transactions().iter().position(|t| t.id == id);
                self.state.select(index);
                self.contributor_state.select(None);
                self.clamp_selection();
                self.info("Transaction added");
            }
            Err(err) => {
                warn!(error = %err, "transaction rejected");
                self.error(err.to_string());
            }
        }
    }

    pub fn delete_selected_transaction(&mut self) {
        let Some(id) = self.selected_transaction().map(|t| t.id) else {
            return;
        };
        match self.session.delete_transaction(id) {
            Ok(_) => self.info("Transaction deleted"),
            Err(err) => self.error(format!("{:#}", err)),
        }
        self.clamp_selection();
    }

    pub fn delete_selected_contributor(&mut self) {
        let Some(tx) = self.selected_transaction() else {
            return;
        };
        let tx_id = tx.id;
        let Some(contributor_id) = self
            .contributor_state
            .selected()
            .and_then(|i| tx.contributors.get(i))
            .map(|c| c.id)
        else {
            return;
        };

        match self.session.delete_contributor(tx_id, contributor_id) {
            Ok(ContributorRemoval::TransactionRemoved) => {
                self.focus = Focus::Transactions;
                self.info("Last contributor removed, transaction deleted");
            }
            Ok(ContributorRemoval::Removed) => self.info("Contributor removed"),
            Ok(ContributorRemoval::NotFound) => {}
            Err(err) => self.error(format!("{:#}", err)),
        }
        self.clamp_selection();
    }

    pub fn toggle_chart(&mut self) {
        let Some(id) = self.selected_transaction().map(|t| t.id) else {
            return;
        };
        match self.session.toggle_chart(id) {
            Ok(ChartVisibility::Shown) => self.info("Chart shown"),
            Ok(ChartVisibility::Hidden) => self.info("Chart hidden"),
            Err(err) => self.error(format!("{:#}", err)),
        }
    }

    /// Pick up writes made by another process to the same store
    pub fn reload(&mut self) {
        match self.session.reload() {
            Ok(()) => {
                let count = self.transactions().len();
                self.info(format!("Reloaded {} transactions", count));
            }
            Err(err) => {
                warn!(error = %err, "reload failed");
                self.error(format!("{:#}", err));
            }
        }
        self.clamp_selection();
    }

    pub fn total_amount(&self) -> f64 {
        self.transactions().iter().map(|t| t.amount).sum()
    }

    /// Returns false when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if let Some(form) = self.form.as_mut() {
            match key.code {
                KeyCode::Esc => {
                    self.form = None;
                    self.status = None;
                }
                KeyCode::Enter => self.submit_form(),
                KeyCode::Tab | KeyCode::Down => form.next_field(),
                KeyCode::BackTab | KeyCode::Up => form.previous_field(),
                KeyCode::Backspace => {
                    form.fields[form.active].pop();
                }
                KeyCode::Char(c) => form.fields[form.active].push(c),
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            KeyCode::Tab | KeyCode::BackTab => self.toggle_focus(),
            KeyCode::Char('a') => self.open_form(),
            KeyCode::Char('d') => self.delete_selected_transaction(),
            KeyCode::Char('x') => self.delete_selected_contributor(),
            KeyCode::Char('v') | KeyCode::Enter => self.toggle_chart(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Home => self.first(),
            KeyCode::End => self.last(),
            _ => {}
        }
        true
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55), // Transaction list
            Constraint::Percentage(45), // Contributors + chart
        ])
        .split(chunks[1]);

    render_table(f, content_chunks[0], app);
    render_detail_panel(f, content_chunks[1], app);
    render_status_bar(f, chunks[2], app);

    if let Some(form) = &app.form {
        let area = f.size();
        render_form(f, area, form);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let spans = vec![
        Span::styled(
            "Split Ledger",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Transactions: {}", app.transactions().len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Total: ₹{:.2}", app.total_amount()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Charts open: {}", app.session.charts().len()),
            Style::default().fg(Color::Cyan),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn focus_border(app: &App, focus: Focus) -> Style {
    if app.focus == focus && app.form.is_none() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let charts = app.session.charts();
    let rows: Vec<Row> = app
        .session
        .ledger()
        .transactions()
        .iter()
        .map(|tx| {
            let chart_mark = if charts.is_shown(tx.id) { "◕" } else { "" };
            Row::new(vec![
                Cell::from(short_id(&tx.id.to_string())),
                Cell::from(truncate(&tx.description, 30)),
                Cell::from(format!("{:.2}", tx.amount)).style(Style::default().fg(Color::Green)),
                Cell::from(format!("{}", tx.contributors.len())),
                Cell::from(chart_mark).style(Style::default().fg(Color::Cyan)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Min(20),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(3),
        ],
    )
    .header(header_row(&["ID", "Description", "Amount", "People", ""]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_border(app, Focus::Transactions))
            .title(" Transactions "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(tx) = app.selected_transaction().cloned() else {
        let empty = Paragraph::new("  No transactions yet. Press 'a' to add one.").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Contributors "),
        );
        f.render_widget(empty, area);
        return;
    };

    let chart = app.session.chart(tx.id).cloned();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(if chart.is_some() {
            [Constraint::Percentage(45), Constraint::Percentage(55)]
        } else {
            [Constraint::Percentage(100), Constraint::Length(0)]
        })
        .split(area);

    let difference = tx.amount - tx.contributed_total();
    let rows: Vec<Row> = tx
        .contributors
        .iter()
        .map(|c| {
            Row::new(vec![
                Cell::from(truncate(&c.name, 20)),
                Cell::from(format!("₹{:.2}", c.amount)),
            ])
        })
        .collect();

    let title = if difference.abs() >= 0.005 {
        format!(" {} (₹{:.2}, unassigned ₹{:.2}) ", truncate(&tx.description, 24), tx.amount, difference)
    } else {
        format!(" {} (₹{:.2}) ", truncate(&tx.description, 24), tx.amount)
    };

    let table = Table::new(rows, [Constraint::Min(16), Constraint::Length(14)])
        .header(header_row(&["Name", "Share"]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_border(app, Focus::Contributors))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, chunks[0], &mut app.contributor_state);

    if let Some(chart) = chart {
        render_chart(f, chunks[1], &chart);
    }
}

fn slice_color((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(r, g, b)
}

fn render_chart(f: &mut Frame, area: Rect, chart: &PieChart) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let layers: Vec<(Color, Vec<(f64, f64)>)> = chart
        .slices
        .iter()
        .zip(chart.raster(0.03))
        .map(|(slice, points)| (slice_color(slice.color), points))
        .collect();

    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Amount Distribution "),
        )
        .marker(Marker::Braille)
        .x_bounds([-1.1, 1.1])
        .y_bounds([-1.1, 1.1])
        .paint(|ctx| {
            for (color, points) in &layers {
                ctx.draw(&Points {
                    coords: points,
                    color: *color,
                });
            }
        });
    f.render_widget(canvas, chunks[0]);

    let legend: Vec<Line> = chart
        .slices
        .iter()
        .map(|slice| {
            Line::from(vec![
                Span::styled("■ ", Style::default().fg(slice_color(slice.color))),
                Span::raw(truncate(&slice.label, 14)),
                Span::styled(
                    format!(" {:.1}%", slice.fraction * 100.0),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        })
        .collect();

    let legend = Paragraph::new(legend).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Legend "),
    );
    f.render_widget(legend, chunks[1]);
}

fn render_form(f: &mut Frame, area: Rect, form: &FormState) {
    let popup = centered_rect(60, 11, area);
    f.render_widget(Clear, popup);

    let mut content = vec![Line::from("")];
    for (i, label) in FORM_LABELS.iter().enumerate() {
        let active = i == form.active;
        let label_style = if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let cursor = if active { "▏" } else { "" };
        content.push(Line::from(vec![
            Span::styled(format!("  {:<14}", label), label_style),
            Span::raw(form.fields[i].as_str()),
            Span::styled(cursor, Style::default().fg(Color::Yellow)),
        ]));
        content.push(Line::from(""));
    }
    content.push(Line::from(Span::styled(
        "  Names: 'Alice, Bob'   Contributions: 'Alice-40, Bob-60' or blank",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));
    content.push(Line::from(Span::styled(
        "  Enter save | Tab next field | Esc cancel",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let form_widget = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Add Transaction "),
    );
    f.render_widget(form_widget, popup);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if let Some(status) = &app.status {
        let color = if status.is_error { Color::Red } else { Color::Green };
        status_spans.push(Span::styled(format!(" {} ", status.text), Style::default().fg(color)));
        status_spans.push(Span::raw("| "));
    }

    for (key, label, color) in [
        ("a", " Add | ", Color::Yellow),
        ("d", " Delete | ", Color::Yellow),
        ("x", " Remove contributor | ", Color::Yellow),
        ("v", " Chart | ", Color::Yellow),
        ("r", " Reload | ", Color::Yellow),
        ("Tab", " Focus | ", Color::Yellow),
        ("q", " Quit", Color::Red),
    ] {
        status_spans.push(Span::styled(key, Style::default().fg(color)));
        status_spans.push(Span::raw(label));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
