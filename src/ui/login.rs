use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const ROLES: [&str; 2] = ["manufacturer", "customer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Password,
    Role,
}

/// What a key press asks the app to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit {
        username: String,
        password: String,
        role: String,
    },
}

#[derive(Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// Index into the role list; nothing is preselected.
    pub role: Option<usize>,
    pub focus: Field,
    pub error: Option<String>,
    pub submitting: bool,
}

impl LoginForm {
    pub fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            role: None,
            focus: Field::Username,
            error: None,
            submitting: false,
        }
    }

    pub fn selected_role(&self) -> Option<&'static str> {
        self.role.map(|index| ROLES[index])
    }

    /// Submit stays disabled until a role is picked.
    pub fn can_submit(&self) -> bool {
        self.role.is_some() && !self.submitting
    }

    pub fn handle_key(&mut self, key: KeyCode) -> FormAction {
        match key {
            KeyCode::Tab | KeyCode::Down => self.focus = next_field(self.focus),
            KeyCode::BackTab | KeyCode::Up => self.focus = previous_field(self.focus),
            KeyCode::Left | KeyCode::Right if self.focus == Field::Role => {
                self.role = Some(match (self.role, key) {
                    (None, _) => 0,
                    (Some(index), KeyCode::Right) => (index + 1) % ROLES.len(),
                    (Some(index), _) => (index + ROLES.len() - 1) % ROLES.len(),
                });
            }
            KeyCode::Char(c) => match self.focus {
                Field::Username => self.username.push(c),
                Field::Password => self.password.push(c),
                Field::Role => {}
            },
            KeyCode::Backspace => match self.focus {
                Field::Username => {
                    self.username.pop();
                }
                Field::Password => {
                    self.password.pop();
                }
                Field::Role => self.role = None,
            },
            KeyCode::Enter if self.can_submit() => {
                self.error = None;
                self.submitting = true;
                return FormAction::Submit {
                    username: self.username.clone(),
                    password: self.password.clone(),
                    role: self.selected_role().unwrap_or_default().to_string(),
                };
            }
            _ => {}
        }
        FormAction::None
    }

    pub fn fail(&mut self, message: String) {
        self.submitting = false;
        self.error = Some(message);
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = centered(frame.size(), 50, 17);
        frame.render_widget(Clear, area);

        let outer = Block::default()
            .borders(Borders::ALL)
            .title(" Login ")
            .title_style(Style::default().add_modifier(Modifier::BOLD));
        let inner = outer.inner(area);
        frame.render_widget(outer, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Description
                Constraint::Length(3), // Username
                Constraint::Length(3), // Password
                Constraint::Length(3), // Role
                Constraint::Length(1), // Error
                Constraint::Length(1), // Hint
            ])
            .split(inner);

        frame.render_widget(
            Paragraph::new("Enter your username below to login to your account")
                .style(Style::default().fg(Color::Gray)),
            chunks[0],
        );

        frame.render_widget(
            self.input("Username", self.username.clone(), Field::Username),
            chunks[1],
        );
        frame.render_widget(
            self.input("Password", "*".repeat(self.password.chars().count()), Field::Password),
            chunks[2],
        );

        let role_line = Line::from(
            ROLES
                .iter()
                .enumerate()
                .flat_map(|(index, role)| {
                    let style = if self.role == Some(index) {
                        Style::default().fg(Color::Black).bg(Color::Cyan)
                    } else {
                        Style::default().fg(Color::Gray)
                    };
                    [Span::styled(format!(" {} ", role), style), Span::raw("  ")]
                })
                .collect::<Vec<_>>(),
        );
        frame.render_widget(
            Paragraph::new(role_line).block(self.field_block("Select your role", Field::Role)),
            chunks[3],
        );

        if let Some(error) = &self.error {
            frame.render_widget(
                Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red)),
                chunks[4],
            );
        }

        let hint = if self.submitting {
            Span::styled("Signing in...", Style::default().fg(Color::Yellow))
        } else if self.can_submit() {
            Span::styled("[Enter] Login  [Tab] Next field  [Esc] Quit", Style::default().fg(Color::DarkGray))
        } else {
            Span::styled("Pick a role with ←/→ to enable login", Style::default().fg(Color::DarkGray))
        };
        frame.render_widget(Paragraph::new(Line::from(hint)), chunks[5]);
    }

    fn field_block(&self, title: &'static str, field: Field) -> Block<'static> {
        let border = if self.focus == field {
            Color::Cyan
        } else {
            Color::DarkGray
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title)
    }

    fn input(&self, title: &'static str, value: String, field: Field) -> Paragraph<'static> {
        Paragraph::new(value).block(self.field_block(title, field))
    }
}

fn next_field(field: Field) -> Field {
    match field {
        Field::Username => Field::Password,
        Field::Password => Field::Role,
        Field::Role => Field::Username,
    }
}

fn previous_field(field: Field) -> Field {
    match field {
        Field::Username => Field::Role,
        Field::Password => Field::Username,
        Field::Role => Field::Password,
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(form: &mut LoginForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn enter_is_ignored_until_role_selected() {
        let mut form = LoginForm::new();
        type_text(&mut form, "u");
        form.handle_key(KeyCode::Tab);
        type_text(&mut form, "p");

        assert_eq!(form.handle_key(KeyCode::Enter), FormAction::None);
        assert!(!form.can_submit());

        form.handle_key(KeyCode::Tab);
        form.handle_key(KeyCode::Right);
        assert_eq!(form.selected_role(), Some("manufacturer"));

        assert_eq!(
            form.handle_key(KeyCode::Enter),
            FormAction::Submit {
                username: "u".into(),
                password: "p".into(),
                role: "manufacturer".into(),
            }
        );
        assert!(form.submitting);
        assert_eq!(form.handle_key(KeyCode::Enter), FormAction::None);
    }

    #[test]
    fn role_selector_cycles() {
        let mut form = LoginForm::new();
        form.focus = Field::Role;
        form.handle_key(KeyCode::Left);
        assert_eq!(form.selected_role(), Some("manufacturer"));
        form.handle_key(KeyCode::Right);
        assert_eq!(form.selected_role(), Some("customer"));
        form.handle_key(KeyCode::Right);
        assert_eq!(form.selected_role(), Some("manufacturer"));
        form.handle_key(KeyCode::Backspace);
        assert_eq!(form.selected_role(), None);
    }

    #[test]
    fn failure_shows_message_and_reenables_submit() {
        let mut form = LoginForm::new();
        form.role = Some(1);
        form.handle_key(KeyCode::Enter);

        form.fail("Invalid username or password".into());
        assert!(!form.submitting);
        assert_eq!(form.error.as_deref(), Some("Invalid username or password"));
        assert!(form.can_submit());
    }
}
