use ratatui::prelude::*;
use ratatui::widgets::Widget;

/// Glyph height in rows
pub const GLYPH_HEIGHT: u16 = 5;

const CHAR_SPACING: u16 = 1;

/// Large block-character rendering of a clock string
pub struct BigText<'a> {
    text: &'a str,
    style: Style,
}

impl<'a> BigText<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            style: Style::default(),
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Columns needed to draw `text`
    pub fn width(text: &str) -> u16 {
        let glyphs: u16 = text.chars().map(|ch| glyph(ch)[0].len() as u16).sum();
        let gaps = text.chars().count().saturating_sub(1) as u16 * CHAR_SPACING;
        glyphs + gaps
    }
}

impl Widget for BigText<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut x_offset = 0;

        for ch in self.text.chars() {
            let rows = glyph(ch);
            let width = rows[0].len() as u16;

            if x_offset + width > area.width {
                break;
            }

            for (y, row) in rows.iter().enumerate() {
                if y as u16 >= area.height {
                    break;
                }

                for (x, mark) in row.chars().enumerate() {
                    if mark != '#' {
                        continue;
                    }
                    let position = (area.left() + x_offset + x as u16, area.top() + y as u16);
                    if let Some(cell) = buf.cell_mut(position) {
                        cell.set_style(self.style).set_symbol("█");
                    }
                }
            }
            x_offset += width + CHAR_SPACING;
        }
    }
}

fn glyph(ch: char) -> [&'static str; 5] {
    match ch {
        '0' => ["###", "# #", "# #", "# #", "###"],
        '1' => [" # ", "## ", " # ", " # ", "###"],
        '2' => ["###", "  #", "###", "#  ", "###"],
        '3' => ["###", "  #", "###", "  #", "###"],
        '4' => ["# #", "# #", "###", "  #", "  #"],
        '5' => ["###", "#  ", "###", "  #", "###"],
        '6' => ["###", "#  ", "###", "# #", "###"],
        '7' => ["###", "  #", "  #", "  #", "  #"],
        '8' => ["###", "# #", "###", "# #", "###"],
        '9' => ["###", "# #", "###", "  #", "###"],
        ':' => [" ", "#", " ", "#", " "],
        _ => ["   ", "   ", "   ", "   ", "   "],
    }
}
