use crate::app::{App, InputMode};
use crate::ui::helpers::centered_rect;
use ratatui::{
    Frame,
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub fn draw_confirmation_modal(f: &mut Frame, app: &App) {
    let modal_area = centered_rect(f.area(), 60, 9);

    f.render_widget(Clear, modal_area);

    let (title, message, yes_label) = match app.input_mode {
        InputMode::ConfirmReset => (
            " Reset Timer? ",
            "The shared stopwatch goes back to 00:00:00 for everyone.".to_string(),
            "  [Y]es, Reset   ",
        ),
        InputMode::ConfirmDelete => {
            let name = app
                .selected_entry()
                .map(|(_, entry)| entry.name.as_str())
                .unwrap_or("this driver");
            (
                " Remove Driver? ",
                format!("Remove \"{}\" from the roster?", name),
                "  [Y]es, Remove  ",
            )
        }
        _ => (
            " Clear Roster? ",
            format!("Remove all {} drivers from the roster?", app.roster.len()),
            "  [Y]es, Clear   ",
        ),
    };

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(message, Style::default().fg(Color::White))),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                yes_label,
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw("    "),
            Span::styled(
                "  [N]o, Cancel   ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            title,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(Color::Red));

    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);

    f.render_widget(paragraph, modal_area);
}
