use crate::app::App;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

pub fn draw_roster(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.roster_available {
        format!(" 🏁 Drivers ({}) ", app.roster.len())
    } else {
        format!(" 🏁 Drivers ({}) - offline ", app.roster.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));

    if app.roster.is_empty() {
        let hint = if app.is_admin() {
            "No drivers yet. Press [a] to add one."
        } else {
            "No drivers yet."
        };
        let paragraph = Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray)))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .roster
        .iter()
        .map(|(_, entry)| {
            ListItem::new(vec![
                Line::from(Span::styled(
                    entry.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    entry.subtitle(),
                    Style::default().fg(Color::Gray),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    state.select(Some(app.selected_index));

    f.render_stateful_widget(list, area, &mut state);
}
