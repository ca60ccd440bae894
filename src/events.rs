use crossterm::event::KeyCode;

use crate::auth::Route;
use crate::error::LoginError;

/// Unified event type for everything the dashboard loop reacts to
#[derive(Debug)]
pub enum AppEvent {
    /// Keyboard input event
    Keyboard(KeyCode),

    /// Login request finished
    LoginFinished(Result<Route, LoginError>),
}
