mod big_text;
mod confirmation;
pub mod helpers;
mod input;
mod roster;

use crate::app::{App, InputMode, Role};
use big_text::{BigText, GLYPH_HEIGHT};
use confirmation::draw_confirmation_modal;
use helpers::{centered_rect, status_style};
use input::draw_input_modal;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use roster::draw_roster;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    draw_title_bar(f, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    draw_clock(f, app, body[0]);
    draw_roster(f, app, body[1]);

    draw_status_bar(f, app, chunks[2]);

    if app.input_mode.is_confirmation() {
        draw_confirmation_modal(f, app);
    }

    if app.input_mode.is_text_input() {
        draw_input_modal(f, app);
    }
}

fn draw_title_bar(f: &mut Frame, app: &App, area: Rect) {
    let role = match app.role {
        Role::Admin => Span::styled(
            " ADMIN ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ),
        Role::Viewer => Span::styled(
            " VIEWER ",
            Style::default().fg(Color::Black).bg(Color::Cyan),
        ),
    };

    let title = Line::from(vec![
        Span::styled(
            "⏱  RaceTimer ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        role,
    ]);

    let paragraph = Paragraph::new(title).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn draw_clock(f: &mut Frame, app: &App, area: Rect) {
    let style = status_style(app.display.status);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stopwatch ")
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let time = app.formatted_time();
    let clock_width = BigText::width(&time);

    // Big clock, status line, countdown line
    let content_height = GLYPH_HEIGHT + 4;
    let content = centered_rect(inner, inner.width, content_height);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(GLYPH_HEIGHT),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(content);

    if clock_width <= inner.width {
        let clock_area = centered_rect(rows[0], clock_width, GLYPH_HEIGHT);
        f.render_widget(BigText::new(&time).style(style), clock_area);
    } else {
        // Terminal too narrow for the block font
        let small = Paragraph::new(Span::styled(time.clone(), style)).alignment(Alignment::Center);
        f.render_widget(small, rows[0]);
    }

    let status = Paragraph::new(Span::styled(app.display.status.as_str(), style))
        .alignment(Alignment::Center);
    f.render_widget(status, rows[2]);

    if let Some(countdown) = app.countdown_text() {
        let countdown = Paragraph::new(Span::styled(
            countdown,
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        f.render_widget(countdown, rows[4]);
    }
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let content = if !app.status_message.is_empty() {
        Span::styled(
            format!(" {} ", app.status_message),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )
    } else {
        match app.input_mode {
            InputMode::Normal => match app.role {
                Role::Admin => Span::raw(
                    "[s]Start • [x]Stop • [r]Reset • [a]Add • [d]Delete • [C]Clear • [↑↓]Select • [q]Quit",
                ),
                Role::Viewer => Span::raw("[↑↓]Select • [q]Quit"),
            },
            mode if mode.is_confirmation() => Span::styled(
                " Confirm: [Y]es / [N]o ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            _ => Span::raw("[Enter] Next  [Esc] Cancel"),
        }
    };

    let paragraph = Paragraph::new(Line::from(content)).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}
