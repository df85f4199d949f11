use crate::error::LauncherError;
use anyhow::{anyhow, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::fmt;
use std::io::{self, Stdout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    Text { default: Option<String>, required: bool },
    Confirm { default: bool },
    List { choices: Vec<String>, default: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub message: String,
    pub kind: QuestionKind,
}

impl Question {
    pub fn text(id: &'static str, message: &str) -> Self {
        Self {
            id,
            message: message.to_string(),
            kind: QuestionKind::Text {
                default: None,
                required: false,
            },
        }
    }

    pub fn confirm(id: &'static str, message: &str, default: bool) -> Self {
        Self {
            id,
            message: message.to_string(),
            kind: QuestionKind::Confirm { default },
        }
    }

    pub fn list(id: &'static str, message: &str, choices: Vec<String>, default: usize) -> Self {
        Self {
            id,
            message: message.to_string(),
            kind: QuestionKind::List { choices, default },
        }
    }

    /// Only meaningful for text questions.
    pub fn with_default(mut self, value: &str) -> Self {
        if let QuestionKind::Text { default, .. } = &mut self.kind {
            *default = Some(value.to_string());
        }
        self
    }

    /// Only meaningful for text questions.
    pub fn required(mut self) -> Self {
        if let QuestionKind::Text { required, .. } = &mut self.kind {
            *required = true;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Flag(bool),
    Choice(String),
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Text(s) | Answer::Choice(s) => write!(f, "{s}"),
            Answer::Flag(true) => write!(f, "Yes"),
            Answer::Flag(false) => write!(f, "No"),
        }
    }
}

/// Answers of one prompt, keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers {
    values: Vec<(&'static str, Answer)>,
}

impl Answers {
    pub fn insert(&mut self, id: &'static str, answer: Answer) {
        match self.values.iter_mut().find(|(k, _)| *k == id) {
            Some((_, v)) => *v = answer,
            None => self.values.push((id, answer)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Answer> {
        self.values.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    pub fn text(&self, id: &str) -> Result<&str> {
        match self.get(id) {
            Some(Answer::Text(s)) => Ok(s),
            other => Err(anyhow!("expected a text answer for '{id}', got {other:?}")),
        }
    }

    pub fn flag(&self, id: &str) -> Result<bool> {
        match self.get(id) {
            Some(Answer::Flag(b)) => Ok(*b),
            other => Err(anyhow!("expected a yes/no answer for '{id}', got {other:?}")),
        }
    }

    pub fn choice(&self, id: &str) -> Result<&str> {
        match self.get(id) {
            Some(Answer::Choice(s)) => Ok(s),
            other => Err(anyhow!("expected a selection for '{id}', got {other:?}")),
        }
    }
}

/// Source of interactive answers.
///
/// Implementations return `LauncherError::Cancelled` when the user aborts.
pub trait Prompter {
    fn ask(&mut self, questions: &[Question]) -> Result<Answers>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Pending,
    Submit(Answer),
    Cancel,
}

/// Input state of the question currently on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionState {
    buffer: String,
    selected: usize,
    error: Option<String>,
}

impl QuestionState {
    pub fn new(q: &Question) -> Self {
        let selected = match &q.kind {
            QuestionKind::List { choices, default } => (*default).min(choices.len().saturating_sub(1)),
            _ => 0,
        };
        Self {
            selected,
            ..Self::default()
        }
    }

    pub fn handle_key(&mut self, q: &Question, key: KeyEvent) -> Step {
        if key.kind != KeyEventKind::Press {
            return Step::Pending;
        }
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            return Step::Cancel;
        }

        match &q.kind {
            QuestionKind::Text { default, required } => match key.code {
                KeyCode::Char(c)
                    if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
                {
                    self.buffer.push(c);
                    self.error = None;
                    Step::Pending
                }
                KeyCode::Backspace => {
                    self.buffer.pop();
                    Step::Pending
                }
                KeyCode::Enter => {
                    let typed = self.buffer.trim();
                    let value = if typed.is_empty() {
                        default.clone().unwrap_or_default()
                    } else {
                        typed.to_string()
                    };
                    if *required && value.is_empty() {
                        self.error = Some("A value is required".to_string());
                        Step::Pending
                    } else {
                        Step::Submit(Answer::Text(value))
                    }
                }
                _ => Step::Pending,
            },
            QuestionKind::Confirm { default } => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Step::Submit(Answer::Flag(true)),
                KeyCode::Char('n') | KeyCode::Char('N') => Step::Submit(Answer::Flag(false)),
                KeyCode::Enter => Step::Submit(Answer::Flag(*default)),
                _ => Step::Pending,
            },
            QuestionKind::List { choices, .. } => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected = self.selected.saturating_sub(1);
                    Step::Pending
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.selected + 1 < choices.len() {
                        self.selected += 1;
                    }
                    Step::Pending
                }
                KeyCode::Home => {
                    self.selected = 0;
                    Step::Pending
                }
                KeyCode::End => {
                    self.selected = choices.len().saturating_sub(1);
                    Step::Pending
                }
                KeyCode::Enter => match choices.get(self.selected) {
                    Some(c) => Step::Submit(Answer::Choice(c.clone())),
                    None => Step::Pending,
                },
                _ => Step::Pending,
            },
        }
    }
}

/// Full-screen prompter on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = self.terminal.backend_mut().execute(LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, questions: &[Question]) -> Result<Answers> {
        let answers = {
            let mut session = TerminalSession::enter()?;
            run_form(&mut session.terminal, questions, || Ok(event::read()?))?
        };

        // leave the answers in the scrollback once the alternate screen is gone
        for q in questions {
            if let Some(a) = answers.get(q.id) {
                println!("{} {} {}", "?".green(), q.message.as_str().bold(), a.to_string().cyan());
            }
        }
        Ok(answers)
    }
}

fn run_form<B: Backend>(
    terminal: &mut Terminal<B>,
    questions: &[Question],
    mut next_event: impl FnMut() -> Result<Event>,
) -> Result<Answers> {
    let mut answers = Answers::default();
    let mut done: Vec<(String, String)> = Vec::new();

    for q in questions {
        let mut state = QuestionState::new(q);
        loop {
            terminal.draw(|f| draw_form(f, &done, q, &state))?;
            let Event::Key(k) = next_event()? else {
                continue;
            };
            match state.handle_key(q, k) {
                Step::Pending => {}
                Step::Submit(a) => {
                    done.push((q.message.clone(), a.to_string()));
                    answers.insert(q.id, a);
                    break;
                }
                Step::Cancel => return Err(LauncherError::Cancelled.into()),
            }
        }
    }

    Ok(answers)
}

fn draw_form(f: &mut Frame, done: &[(String, String)], q: &Question, state: &QuestionState) {
    let body_height = match &q.kind {
        QuestionKind::List { choices, .. } => choices.len() as u16 + 2,
        _ => 3,
    };
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(done.len() as u16),
                Constraint::Length(body_height),
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.area());

    let history: Text = done
        .iter()
        .map(|(m, a)| {
            Line::from(vec![
                Span::styled("? ", Style::default().fg(Color::Green)),
                Span::raw(format!("{m} ")),
                Span::styled(a.clone(), Style::default().fg(Color::Cyan)),
            ])
        })
        .collect::<Vec<_>>()
        .into();
    f.render_widget(Paragraph::new(history), root[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(format!(" {} ", q.message));

    draw_question(f, root[1], block, q, state);

    if let Some(err) = &state.error {
        let w = Paragraph::new(err.as_str()).style(Style::default().fg(Color::Red));
        f.render_widget(w, root[2]);
    }

    let help_bar = Paragraph::new(help_for(&q.kind))
        .style(Style::default().fg(Color::Black).bg(Color::White));
    f.render_widget(help_bar, root[4]);
}

fn draw_question(f: &mut Frame, area: Rect, block: Block, q: &Question, state: &QuestionState) {
    match &q.kind {
        QuestionKind::Text { default, .. } => {
            let line = if state.buffer.is_empty() {
                match default {
                    Some(d) => Line::from(Span::styled(
                        d.clone(),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )),
                    None => Line::from(""),
                }
            } else {
                Line::from(state.buffer.clone())
            };
            f.render_widget(Paragraph::new(line).block(block).wrap(Wrap { trim: false }), area);
            let x = area.x + 1 + state.buffer.chars().count() as u16;
            f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
        }
        QuestionKind::Confirm { default } => {
            let hint = if *default { "(Y/n)" } else { "(y/N)" };
            f.render_widget(Paragraph::new(hint).block(block), area);
        }
        QuestionKind::List { choices, .. } => {
            let items: Vec<ListItem> = choices.iter().map(|c| ListItem::new(c.clone())).collect();
            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().fg(Color::Black).bg(Color::Blue))
                .highlight_symbol("▶ ");
            let mut list_state = ListState::default();
            list_state.select(Some(state.selected));
            f.render_stateful_widget(list, area, &mut list_state);
        }
    }
}

fn help_for(kind: &QuestionKind) -> &'static str {
    match kind {
        QuestionKind::Text { .. } => " Ent:Submit Bksp:Delete Esc:Cancel ",
        QuestionKind::Confirm { .. } => " y:Yes n:No Ent:Default Esc:Cancel ",
        QuestionKind::List { .. } => " ↑/↓:Move Ent:Select Esc:Cancel ",
    }
}
