use chrono::{DateTime, Local};
use std::fmt;

/// Number of scans kept in the rolling history.
pub const HISTORY_LIMIT: usize = 10;

pub const WAITING_MESSAGE: &str = "Waiting for QR code data...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Reconnecting,
    Error(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
            ConnectionStatus::Connected => f.write_str("Connected"),
            ConnectionStatus::Reconnecting => f.write_str("Reconnecting..."),
            ConnectionStatus::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub value: String,
    /// Local receipt time, display formatted.
    pub timestamp: String,
}

/// What the connection driver reports.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected,
    Error(String),
    Reconnecting,
    Message {
        payload: Vec<u8>,
        received_at: DateTime<Local>,
    },
}

/// Trims the payload and strips every `\n` / `\r`.
pub fn normalize_payload(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload)
        .trim()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect()
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%-I:%M:%S %p").to_string()
}

/// Everything a scanner view needs, newest scan first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSnapshot {
    pub current: String,
    pub status: ConnectionStatus,
    pub history: Vec<ScanEvent>,
}

impl Default for ScanSnapshot {
    fn default() -> Self {
        Self {
            current: WAITING_MESSAGE.to_string(),
            status: ConnectionStatus::Disconnected,
            history: Vec::new(),
        }
    }
}

impl ScanSnapshot {
    /// Folds one driver event in. Returns the scan it produced, if any.
    pub fn apply(&mut self, event: FeedEvent) -> Option<ScanEvent> {
        match event {
            FeedEvent::Connected => self.status = ConnectionStatus::Connected,
            FeedEvent::Error(message) => self.status = ConnectionStatus::Error(message),
            FeedEvent::Reconnecting => self.status = ConnectionStatus::Reconnecting,
            FeedEvent::Message {
                payload,
                received_at,
            } => {
                let scan = ScanEvent {
                    value: normalize_payload(&payload),
                    timestamp: format_timestamp(&received_at),
                };
                self.current = scan.value.clone();
                self.history.truncate(HISTORY_LIMIT - 1);
                self.history.insert(0, scan.clone());
                return Some(scan);
            }
        }
        None
    }
}
