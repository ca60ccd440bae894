use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{block::Title, Block, Borders, Paragraph, Row, Table},
    Frame,
};

use crate::scanner::{ConnectionStatus, ScanSnapshot};

pub fn status_color(status: &ConnectionStatus) -> Color {
    if status.is_connected() {
        Color::Green
    } else {
        Color::Red
    }
}

pub struct ScannerView;

impl ScannerView {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, snapshot: &ScanSnapshot) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Current scan
                Constraint::Min(0),    // Recent scans
            ])
            .split(area);

        let badge = Span::styled(
            format!(" {} ", snapshot.status),
            Style::default()
                .fg(status_color(&snapshot.status))
                .add_modifier(Modifier::BOLD),
        );

        let current = Paragraph::new(Line::from(Span::styled(
            snapshot.current.as_str(),
            Style::default().fg(Color::Cyan),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" QR SCANNER ")
                .title(Title::from(badge).alignment(Alignment::Right)),
        );
        frame.render_widget(current, chunks[0]);

        let block = Block::default().borders(Borders::ALL).title(" Recent Scans ");

        if snapshot.history.is_empty() {
            let empty = Paragraph::new("No scan history yet")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, chunks[1]);
            return;
        }

        let header = Row::new(["Time", "Data"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .bottom_margin(1);

        let rows: Vec<Row> = snapshot
            .history
            .iter()
            .map(|scan| Row::new(vec![scan.timestamp.clone(), scan.value.clone()]))
            .collect();

        let table = Table::new(rows, [Constraint::Length(12), Constraint::Min(10)])
            .header(header)
            .block(block);

        frame.render_widget(table, chunks[1]);
    }
}
