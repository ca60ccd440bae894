use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::api::{ApiClient, CategoryItem, StockItem};
use crate::auth::{self, Role, Route};
use crate::config::Settings;
use crate::events::AppEvent;
use crate::poller::{CategoryCollection, PollState, Poller, StockCollection};
use crate::scanner::{ScanChannel, ScanSnapshot};
use crate::ui::scanner::status_color;
use crate::ui::{CategoryView, FormAction, LoginForm, ScannerView, StockView};

/// Everything that lives only while a role's dashboard is on screen.
struct Dashboard {
    route: Route,
    stock: Option<Poller<StockItem>>,
    categories: Poller<CategoryItem>,
    scanner: Option<ScanChannel>,
}

impl Dashboard {
    async fn close(mut self) {
        if let Some(stock) = self.stock.as_mut() {
            stock.stop().await;
        }
        self.categories.stop().await;
        if let Some(scanner) = self.scanner.as_mut() {
            if let Err(err) = scanner.shutdown().await {
                error!("scan channel shutdown failed: {:?}", err);
            }
        }
    }
}

enum Screen {
    Login(LoginForm),
    Dashboard(Dashboard),
}

pub struct App {
    client: ApiClient,
    settings: Settings,
    screen: Screen,
    stock_view: StockView,
    scanner_view: ScannerView,
    category_view: CategoryView,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,
    error_message: Option<String>,
    should_quit: bool,
    show_help: bool,
    help_scroll: u16,
}

impl App {
    pub fn new(client: ApiClient, settings: Settings) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            client,
            settings,
            screen: Screen::Login(LoginForm::new()),
            stock_view: StockView::new(),
            scanner_view: ScannerView::new(),
            category_view: CategoryView::new(),
            event_tx,
            event_rx,
            error_message: None,
            should_quit: false,
            show_help: false,
            help_scroll: 0,
        }
    }

    pub async fn run(&mut self, terminal: &mut ratatui::Terminal<impl ratatui::backend::Backend>) -> Result<()> {
        // Resume a stored session without asking for credentials again
        if let Some(route) = Route::resume(self.client.session().as_ref()) {
            info!("resuming stored session at {}", route.path);
            self.enter_dashboard(route);
        }

        loop {
            terminal.draw(|frame| self.render(frame))?;

            // Drain background results (non-blocking)
            while let Ok(event) = self.event_rx.try_recv() {
                self.handle_event(event).await;
            }

            let timeout = Duration::from_millis(50);
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_event(AppEvent::Keyboard(key.code)).await;
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        self.leave_dashboard().await;
        Ok(())
    }

    fn enter_dashboard(&mut self, route: Route) {
        let interval = self.settings.poll_interval();
        let manufacturer = route.role == Role::Manufacturer;

        let stock = manufacturer
            .then(|| Poller::spawn(StockCollection::new(self.client.clone()), interval));
        let categories = Poller::spawn(CategoryCollection::new(self.client.clone()), interval);

        let scanner = if manufacturer {
            match ScanChannel::start(self.settings.broker()) {
                Ok(channel) => Some(channel),
                Err(err) => {
                    error!("could not start scan channel: {:?}", err);
                    self.error_message = Some(format!("Scanner unavailable: {}", err));
                    None
                }
            }
        } else {
            None
        };

        self.screen = Screen::Dashboard(Dashboard {
            route,
            stock,
            categories,
            scanner,
        });
    }

    async fn leave_dashboard(&mut self) {
        let previous = std::mem::replace(&mut self.screen, Screen::Login(LoginForm::new()));
        if let Screen::Dashboard(dashboard) = previous {
            dashboard.close().await;
        }
    }

    async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Keyboard(key) => self.handle_key(key).await,
            AppEvent::LoginFinished(Ok(route)) => {
                self.error_message = None;
                self.enter_dashboard(route);
            }
            AppEvent::LoginFinished(Err(err)) => {
                if let Screen::Login(form) = &mut self.screen {
                    form.fail(err.to_string());
                }
            }
        }
    }

    async fn handle_key(&mut self, key: KeyCode) {
        if let Screen::Login(form) = &mut self.screen {
            if key == KeyCode::Esc {
                self.should_quit = true;
                return;
            }
            if let FormAction::Submit {
                username,
                password,
                role,
            } = form.handle_key(key)
            {
                self.submit_login(username, password, role);
            }
            return;
        }

        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Char('v') | KeyCode::Char('V') => {
                self.stock_view.toggle_mode();
            }
            KeyCode::Char('o') | KeyCode::Char('O') => {
                self.leave_dashboard().await;
                auth::logout(&self.client).await;
                self.error_message = None;
            }
            KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                self.help_scroll = 0;
            }
            KeyCode::Esc => {
                self.show_help = false;
                self.help_scroll = 0;
            }
            KeyCode::Up => {
                if self.show_help {
                    self.help_scroll = self.help_scroll.saturating_sub(1);
                } else {
                    let rows = self.stock_rows();
                    self.stock_view.move_selection(false, rows);
                }
            }
            KeyCode::Down => {
                if self.show_help {
                    self.help_scroll = self.help_scroll.saturating_add(1);
                } else {
                    let rows = self.stock_rows();
                    self.stock_view.move_selection(true, rows);
                }
            }
            _ => {}
        }
    }

    fn stock_rows(&self) -> usize {
        match &self.screen {
            Screen::Dashboard(Dashboard {
                stock: Some(stock), ..
            }) => stock.state().data.len(),
            _ => 0,
        }
    }

    fn submit_login(&self, username: String, password: String, role: String) {
        let client = self.client.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = auth::login(&client, &username, &password, &role).await;
            tx.send(AppEvent::LoginFinished(result)).ok();
        });
    }

    fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Status bar
                Constraint::Min(0),    // Main content
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        let (route, stock, categories, scans) = match &self.screen {
            Screen::Login(form) => {
                self.render_status_bar(frame, chunks[0], None, None);
                form.render(frame);
                self.render_footer(frame, chunks[2], false);
                return;
            }
            Screen::Dashboard(dashboard) => (
                dashboard.route.clone(),
                dashboard.stock.as_ref().map(|poller| poller.state()),
                dashboard.categories.state(),
                dashboard.scanner.as_ref().map(|channel| channel.hub().snapshot()),
            ),
        };

        self.render_status_bar(frame, chunks[0], Some(&route), scans.as_deref());

        match stock {
            Some(stock) => self.render_manufacturer(frame, chunks[1], &stock, &categories, scans),
            None => self.render_overview(frame, chunks[1], &route, &categories),
        }

        self.render_footer(frame, chunks[2], true);

        if self.show_help {
            self.render_help(frame);
        }
    }

    fn render_manufacturer(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        stock: &PollState<StockItem>,
        categories: &PollState<CategoryItem>,
        scans: Option<Arc<ScanSnapshot>>,
    ) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(8), Constraint::Length(12)])
            .split(columns[0]);

        self.stock_view.render(frame, left[0], stock);
        self.category_view.render(frame, left[1], categories);

        let snapshot = scans.unwrap_or_default();
        self.scanner_view.render(frame, columns[1], &snapshot);
    }

    fn render_overview(
        &self,
        frame: &mut Frame,
        area: Rect,
        route: &Route,
        categories: &PollState<CategoryItem>,
    ) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let heading = Paragraph::new(Line::from(vec![
            Span::raw("Dashboard for "),
            Span::styled(route.role.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("  ({})", route.path)),
        ]))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(heading, rows[0]);

        self.category_view.render(frame, rows[1], categories);
    }

    fn render_status_bar(
        &self,
        frame: &mut Frame,
        area: Rect,
        route: Option<&Route>,
        scans: Option<&ScanSnapshot>,
    ) {
        let mut spans = vec![match route {
            Some(route) => Span::styled(
                format!("● {}", route.role),
                Style::default().fg(Color::Green),
            ),
            None => Span::styled("● Signed out", Style::default().fg(Color::Yellow)),
        }];

        if let Some(route) = route {
            spans.push(Span::raw("  │  "));
            spans.push(Span::raw(route.path.clone()));
        }

        if let Some(snapshot) = scans {
            spans.push(Span::raw("  │  Scanner: "));
            spans.push(Span::styled(
                snapshot.status.to_string(),
                Style::default()
                    .fg(status_color(&snapshot.status))
                    .add_modifier(Modifier::BOLD),
            ));
        }

        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(
            self.settings.api_url.clone(),
            Style::default().fg(Color::Cyan),
        ));

        let paragraph = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title(" SMARTCHAIN ERP "));

        frame.render_widget(paragraph, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect, dashboard: bool) {
        let key = |label: &'static str| Span::styled(label, Style::default().fg(Color::Yellow));

        let footer_text = if let Some(ref error) = self.error_message {
            Line::from(vec![
                Span::styled("ERROR: ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                Span::styled(error.as_str(), Style::default().fg(Color::Red)),
            ])
        } else if dashboard {
            Line::from(vec![
                key("[v] "),
                Span::raw("Table/Chart  "),
                key("[o] "),
                Span::raw("Logout  "),
                key("[h/?] "),
                Span::raw("Help  "),
                key("[q] "),
                Span::raw("Quit  "),
                key("[↑↓] "),
                Span::raw("Navigate"),
            ])
        } else {
            Line::from(vec![
                key("[Tab] "),
                Span::raw("Next field  "),
                key("[←→] "),
                Span::raw("Role  "),
                key("[Enter] "),
                Span::raw("Login  "),
                key("[Esc] "),
                Span::raw("Quit"),
            ])
        };

        let paragraph = Paragraph::new(footer_text).block(Block::default().borders(Borders::ALL));

        frame.render_widget(paragraph, area);
    }

    fn render_help(&self, frame: &mut Frame) {
        // Centered popup, 80% width / 70% height
        let area = frame.size();
        let popup_width = (area.width * 80) / 100;
        let popup_height = (area.height * 70) / 100;
        let popup_area = Rect {
            x: (area.width - popup_width) / 2,
            y: (area.height - popup_height) / 2,
            width: popup_width,
            height: popup_height,
        };

        frame.render_widget(Clear, popup_area);

        let section = |title: &'static str| {
            Line::from(Span::styled(
                title,
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ))
        };

        let help_text = vec![
            section("STOCK OVERVIEW"),
            Line::from(""),
            Line::from("  Refreshed every few seconds from the backend. Rows in red are"),
            Line::from("  demanded beyond what is available. [v] switches to the bar chart."),
            Line::from(""),
            section("QR SCANNER"),
            Line::from(""),
            Line::from("  Scans pushed by warehouse devices appear as they arrive; the ten"),
            Line::from("  most recent are kept. The badge shows the broker connection."),
            Line::from(""),
            section("SESSION"),
            Line::from(""),
            Line::from("  Tokens are refreshed automatically. [o] logs out and forgets them."),
            Line::from(""),
            Line::from(Span::styled("Press [ESC] or [h] to close", Style::default().fg(Color::DarkGray))),
        ];

        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(" HELP (Use ↑↓ to scroll) ")
                    .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            )
            .wrap(Wrap { trim: false })
            .scroll((self.help_scroll, 0));

        frame.render_widget(paragraph, popup_area);
    }
}
