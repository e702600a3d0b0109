//! Input injection seam.
//!
//! Replaying received input into the OS is platform work outside this
//! crate; the streamer drives whatever implements [`InputInjector`].

use tracing::info;

use crate::error::ScryError;
use crate::message::MouseButton;

// ── InputInjector ────────────────────────────────────────────────

/// Injects mouse and keyboard events into the local input stream.
///
/// Coordinates are in screen space — the caller scales from stream
/// space first.
pub trait InputInjector: Send {
    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> Result<(), ScryError>;
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ScryError>;
    fn key_press(&mut self, key: &str) -> Result<(), ScryError>;
}

// ── LogInjector ──────────────────────────────────────────────────

/// Logs every action instead of injecting it. Stands in where a
/// platform injector would be wired up.
#[derive(Debug, Default)]
pub struct LogInjector;

impl InputInjector for LogInjector {
    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> Result<(), ScryError> {
        info!("click {button:?} at ({x}, {y})");
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ScryError> {
        info!("move to ({x}, {y})");
        Ok(())
    }

    fn key_press(&mut self, key: &str) -> Result<(), ScryError> {
        info!("key press '{key}'");
        Ok(())
    }
}

// ── RecordingInjector ────────────────────────────────────────────

/// Records every action for inspection in tests.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    pub events: Vec<InputEvent>,
}

/// One recorded injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Click { x: i32, y: i32, button: MouseButton },
    Move { x: i32, y: i32 },
    Key(String),
}

impl InputInjector for RecordingInjector {
    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> Result<(), ScryError> {
        self.events.push(InputEvent::Click { x, y, button });
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), ScryError> {
        self.events.push(InputEvent::Move { x, y });
        Ok(())
    }

    fn key_press(&mut self, key: &str) -> Result<(), ScryError> {
        self.events.push(InputEvent::Key(key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_injector_captures_order() {
        let mut injector = RecordingInjector::default();
        injector.click(1, 2, MouseButton::Left).unwrap();
        injector.move_to(3, 4).unwrap();
        injector.key_press("enter").unwrap();

        assert_eq!(
            injector.events,
            vec![
                InputEvent::Click {
                    x: 1,
                    y: 2,
                    button: MouseButton::Left
                },
                InputEvent::Move { x: 3, y: 4 },
                InputEvent::Key("enter".into()),
            ]
        );
    }
}
