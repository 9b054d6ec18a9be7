use crate::app::App;
use crate::ui::helpers::centered_rect;
use ratatui::{
    Frame,
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Single-line prompt for the add-driver steps
pub fn draw_input_modal(f: &mut Frame, app: &App) {
    let width = 60;
    let modal_area = centered_rect(f.area(), width, 3);

    f.render_widget(Clear, modal_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Add driver: {} ", app.input_prompt()))
        .border_style(Style::default().fg(Color::Cyan));

    let input = Paragraph::new(app.input_buffer.as_str()).block(block);

    f.render_widget(input, modal_area);

    // Inside the left border, clamped to the box
    let cursor_x = (modal_area.x + 1 + app.input_buffer.chars().count() as u16)
        .min(modal_area.right().saturating_sub(2));
    let cursor_y = modal_area.y + 1;

    f.set_cursor_position((cursor_x, cursor_y));
}
