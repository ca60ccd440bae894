use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use crate::api::CategoryItem;
use crate::poller::PollState;

/// Parses `#RRGGBB`; anything else renders white.
pub fn fill_color(fill: &str) -> Color {
    let hex = fill.trim_start_matches('#');
    if hex.len() != 6 {
        return Color::White;
    }
    match u32::from_str_radix(hex, 16) {
        Ok(rgb) => Color::Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8),
        Err(_) => Color::White,
    }
}

pub struct CategoryView;

impl CategoryView {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, state: &PollState<CategoryItem>) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" PRODUCTS PER CATEGORY ");

        if state.loading {
            frame.render_widget(Paragraph::new("Loading category data...").block(block), area);
            return;
        }

        if let Some(error) = &state.error {
            let paragraph = Paragraph::new(error.as_str())
                .style(Style::default().fg(Color::Red))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let bars: Vec<Bar> = state
            .data
            .iter()
            .map(|category| {
                let color = fill_color(&category.fill);
                Bar::default()
                    .value(category.product_count.max(0) as u64)
                    .label(Line::from(category.name.clone()))
                    .style(Style::default().fg(color))
                    .value_style(Style::default().fg(Color::Black).bg(color))
            })
            .collect();

        let chart = BarChart::default()
            .block(block)
            .bar_width(8)
            .bar_gap(2)
            .data(BarGroup::default().bars(&bars));

        frame.render_widget(chart, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_parse() {
        assert_eq!(fill_color("#0088FE"), Color::Rgb(0x00, 0x88, 0xFE));
        assert_eq!(fill_color("#A28AFF"), Color::Rgb(0xA2, 0x8A, 0xFF));
        assert_eq!(fill_color("teal"), Color::White);
        assert_eq!(fill_color("#zzzzzz"), Color::White);
    }
}
