use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{
        block::{Position, Title},
        Bar, BarChart, BarGroup, Block, Borders, Paragraph, Row, Table, TableState,
    },
    Frame,
};

use crate::api::StockItem;
use crate::poller::PollState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMode {
    Table,
    Chart,
}

pub struct StockView {
    pub mode: StockMode,
    pub table_state: TableState,
}

impl StockView {
    pub fn new() -> Self {
        Self {
            mode: StockMode::Table,
            table_state: TableState::default(),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            StockMode::Table => StockMode::Chart,
            StockMode::Chart => StockMode::Table,
        };
    }

    /// Moves the row highlight, clamped to `len` rows.
    pub fn move_selection(&mut self, down: bool, len: usize) {
        if len == 0 {
            self.table_state.select(None);
            return;
        }
        let next = match (self.table_state.selected(), down) {
            (None, _) => 0,
            (Some(index), true) => (index + 1).min(len - 1),
            (Some(index), false) => index.saturating_sub(1),
        };
        self.table_state.select(Some(next));
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, state: &PollState<StockItem>) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" STOCK OVERVIEW ");

        if state.loading {
            frame.render_widget(Paragraph::new("Loading stock data...").block(block), area);
            return;
        }

        if let Some(error) = &state.error {
            let paragraph = Paragraph::new(error.as_str())
                .style(Style::default().fg(Color::Red))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        match self.mode {
            StockMode::Table => self.render_table(frame, area, block, &state.data),
            StockMode::Chart => render_chart(frame, area, block, &state.data),
        }
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect, block: Block, items: &[StockItem]) {
        let header = Row::new(["Product", "Category", "Available", "Sold", "Demanded"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let rows: Vec<Row> = items
            .iter()
            .map(|item| {
                Row::new(vec![
                    item.product_name.clone(),
                    item.category.to_string(),
                    item.available.to_string(),
                    item.sold.to_string(),
                    item.demanded.to_string(),
                ])
                .style(Style::default().fg(shortage_color(item)))
            })
            .collect();

        let widths = [
            Constraint::Min(16),    // Product
            Constraint::Length(9),  // Category
            Constraint::Length(10), // Available
            Constraint::Length(8),  // Sold
            Constraint::Length(9),  // Demanded
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("▶ ");

        frame.render_stateful_widget(table, area, &mut self.table_state);
    }
}

/// Red when demand outstrips what is on hand.
fn shortage_color(item: &StockItem) -> Color {
    if item.demanded > item.available {
        Color::LightRed
    } else {
        Color::White
    }
}

fn bar_value(value: i64) -> u64 {
    value.max(0) as u64
}

fn render_chart(frame: &mut Frame, area: Rect, block: Block, items: &[StockItem]) {
    let mut chart = BarChart::default()
        .block(block.title(Title::from(" available / sold / demanded ").position(Position::Bottom)))
        .bar_width(3)
        .bar_gap(0)
        .group_gap(2);

    for item in items {
        let bars = [
            Bar::default()
                .value(bar_value(item.available))
                .style(Style::default().fg(Color::Green)),
            Bar::default()
                .value(bar_value(item.sold))
                .style(Style::default().fg(Color::Blue)),
            Bar::default()
                .value(bar_value(item.demanded))
                .style(Style::default().fg(Color::Yellow)),
        ];
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(item.product_name.clone()))
                .bars(&bars),
        );
    }

    frame.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn rendered(view: &mut StockView, state: &PollState<StockItem>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(70, 12)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.size();
                view.render(frame, area, state)
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn item(name: &str, available: i64, demanded: i64) -> StockItem {
        StockItem {
            product_name: name.to_string(),
            category: 1,
            available,
            sold: 2,
            demanded,
        }
    }

    #[test]
    fn loading_and_error_replace_the_table() {
        let mut view = StockView::new();
        assert!(rendered(&mut view, &PollState::default()).contains("Loading stock data..."));

        let failed = PollState {
            data: Arc::new(vec![item("Bolt", 1, 1)]),
            loading: false,
            error: Some("Failed to load stock data".to_string()),
        };
        let text = rendered(&mut view, &failed);
        assert!(text.contains("Failed to load stock data"));
        assert!(!text.contains("Bolt"));
    }

    #[test]
    fn table_lists_rows_and_toggle_switches_mode() {
        let mut view = StockView::new();
        let state = PollState {
            data: Arc::new(vec![item("Bolt", 10, 4), item("Washer", 0, 3)]),
            loading: false,
            error: None,
        };

        let text = rendered(&mut view, &state);
        assert!(text.contains("Bolt"));
        assert!(text.contains("Washer"));
        assert!(text.contains("Demanded"));

        view.toggle_mode();
        assert_eq!(view.mode, StockMode::Chart);
        assert!(rendered(&mut view, &state).contains("available / sold / demanded"));
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut view = StockView::new();
        view.move_selection(true, 2);
        assert_eq!(view.table_state.selected(), Some(0));
        view.move_selection(true, 2);
        view.move_selection(true, 2);
        assert_eq!(view.table_state.selected(), Some(1));
        view.move_selection(false, 2);
        view.move_selection(false, 2);
        assert_eq!(view.table_state.selected(), Some(0));
        view.move_selection(true, 0);
        assert_eq!(view.table_state.selected(), None);
    }

    #[test]
    fn shortage_rows_are_highlighted() {
        assert_eq!(shortage_color(&item("x", 1, 5)), Color::LightRed);
        assert_eq!(shortage_color(&item("x", 5, 5)), Color::White);
        assert_eq!(bar_value(-3), 0);
    }
}
