use racetimer_core::models::TimerStatus;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
};

pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

pub fn status_color(status: TimerStatus) -> Color {
    match status {
        TimerStatus::Running => Color::Green,
        TimerStatus::Stopped => Color::Yellow,
        TimerStatus::Unknown => Color::DarkGray,
    }
}

pub fn status_style(status: TimerStatus) -> Style {
    Style::default()
        .fg(status_color(status))
        .add_modifier(Modifier::BOLD)
}
