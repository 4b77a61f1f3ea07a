use crate::{
    bet::Side,
    client::AppSnapshot,
    notice::NoticeKind,
    orchestrator::FlipPhase,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

const COIN_WIDTH: usize = 21;
const COIN_HEIGHT: usize = 9;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    NextStake,
    PrevStake,
    ToggleWhale,
    PickSide(Side),
    Flip,
    Redraw,
}

#[derive(Default)]
pub struct UiState {
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Reads terminal events on a dedicated thread so the async loop never blocks
/// on `event::read`.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(input_events: &mut InputEventReceiver) -> Result<Event> {
    match input_events.recv().await {
        Some(ev) => Ok(ev?),
        None => Err(eyre!("terminal input closed")),
    }
}

pub fn interpret_event(event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    // raw mode swallows SIGINT
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(UserEvent::Quit);
    }
    Some(match key.code {
        KeyCode::Char('q') | KeyCode::Esc => UserEvent::Quit,
        KeyCode::Right | KeyCode::Char('l') => UserEvent::NextStake,
        KeyCode::Left | KeyCode::Char('h') => UserEvent::PrevStake,
        KeyCode::Char('w') => UserEvent::ToggleWhale,
        KeyCode::Char('H') => UserEvent::PickSide(Side::Front),
        KeyCode::Char('T') => UserEvent::PickSide(Side::Back),
        KeyCode::Char('f') | KeyCode::Enter => UserEvent::Flip,
        _ => return None,
    })
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // one Terminal for the whole session keeps ratatui's diffing buffers
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(term) = state.terminal.as_mut() {
        term.draw(|f| ui(f, snap))?;
    }
    Ok(())
}

fn ui(f: &mut Frame, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                       // title + balance
            Constraint::Length(3),                       // stake menu
            Constraint::Length(3),                       // side selector
            Constraint::Length(COIN_HEIGHT as u16 + 2), // coin
            Constraint::Length(4),                       // result + status
            Constraint::Min(3),                          // notices
            Constraint::Length(3),                       // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_stakes(f, chunks[1], snap);
    draw_sides(f, chunks[2], snap);
    draw_coin(f, chunks[3], snap);
    draw_result(f, chunks[4], snap);
    draw_notices(f, chunks[5], snap);
    draw_help(f, chunks[6]);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let line = match &snap.balance {
        Some(balance) => Line::from(balance.as_str()),
        None => Line::styled("no wallet", Style::default().fg(Color::DarkGray)),
    };
    let header = Paragraph::new(line)
        .alignment(Alignment::Right)
        .block(Block::default().borders(Borders::ALL).title("Coin Flip"));
    f.render_widget(header, area);
}

fn draw_stakes(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut spans = Vec::new();
    for (idx, stake) in snap.stakes.iter().enumerate() {
        let style = if idx == snap.selected_stake {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        spans.push(Span::styled(format!(" {stake} "), style));
    }
    let whale = if snap.whale { "on" } else { "off" };
    spans.push(Span::raw(format!("   whale: {whale}")));
    let stakes =
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title("Stake"));
    f.render_widget(stakes, area);
}

fn draw_sides(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let spans = [Side::Front, Side::Back]
        .into_iter()
        .map(|side| {
            if side == snap.side {
                Span::styled(
                    format!("[{}]", side.label()),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw(format!(" {} ", side.label()))
            }
        })
        .collect::<Vec<_>>();
    let sides =
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title("Side"));
    f.render_widget(sides, area);
}

fn draw_coin(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let color = match snap.coin.face {
        Side::Front => Color::Yellow,
        Side::Back => Color::LightYellow,
    };
    let lines = coin_art(snap.coin.width_ratio, snap.coin.face)
        .into_iter()
        .map(|row| Line::styled(row, Style::default().fg(color)))
        .collect::<Vec<_>>();
    let coin = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(coin, area);
}

fn draw_result(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let result = match snap.result {
        Some(label) => Line::styled(
            format!("Result: {label}"),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        None if snap.phase != FlipPhase::Idle => Line::from("Result: ..."),
        None => Line::styled("Result: -", Style::default().fg(Color::DarkGray)),
    };
    let mut lines = vec![result, Line::from(snap.status.as_str())];
    if !snap.errors.is_empty() {
        let recent = snap.errors.iter().rev().take(2).join(" | ");
        lines.push(Line::styled(recent, Style::default().fg(Color::Red)));
    }
    let panel = Paragraph::new(lines).wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn draw_notices(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines = snap
        .notices
        .iter()
        .map(|(kind, text)| {
            let color = match kind {
                NoticeKind::Info => Color::Yellow,
                NoticeKind::Win => Color::Green,
                NoticeKind::Loss => Color::Red,
            };
            Line::styled(text.as_str(), Style::default().fg(color))
        })
        .collect::<Vec<_>>();
    let notices = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Notices"));
    f.render_widget(notices, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = [
        "←/→ stake",
        "w whale",
        "H heads",
        "T tails",
        "f flip",
        "q quit",
    ]
    .iter()
    .join("  ");
    let help = Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, area);
}

/// Renders the coin seen edge-on by `width_ratio` (1.0 face-on), each row
/// padded to the same display width.
pub fn coin_art(width_ratio: f64, face: Side) -> Vec<String> {
    let fill = match face {
        Side::Front => '█',
        Side::Back => '▓',
    };
    let letter = match face {
        Side::Front => 'H',
        Side::Back => 'T',
    };
    let half = (COIN_HEIGHT / 2) as f64;
    (0..COIN_HEIGHT)
        .map(|row| {
            let y = (row as f64 - half) / (half + 0.5);
            let span = (COIN_WIDTH as f64 * width_ratio.clamp(0.0, 1.0) * (1.0 - y * y).sqrt())
                .round()
                .max(1.0) as usize;
            let mid = span / 2;
            let body: String = (0..span)
                .map(|col| {
                    if row == COIN_HEIGHT / 2 && span >= 3 && col == mid {
                        letter
                    } else {
                        fill
                    }
                })
                .collect();
            center(&body, COIN_WIDTH)
        })
        .collect()
}

fn center(text: &str, width: usize) -> String {
    let used = text.width();
    let left = width.saturating_sub(used) / 2;
    let right = width.saturating_sub(used + left);
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
