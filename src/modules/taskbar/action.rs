use crate::config::TaskbarConfig;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}

impl MouseButton {
    /// X11/GTK button numbering.
    pub fn from_number(button: u32) -> Option<Self> {
        match button {
            1 => Some(Self::Primary),
            2 => Some(Self::Middle),
            3 => Some(Self::Secondary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowAction {
    Activate,
    /// Carries the niri action used to maximize.
    Maximize(String),
    Fullscreen,
    Close,
    Unknown(String),
}

impl WindowAction {
    pub fn parse(name: &str, fullscreen_method: &str) -> Self {
        match name {
            "activate" => Self::Activate,
            "maximize" => Self::Maximize(fullscreen_method.to_string()),
            "fullscreen" => Self::Fullscreen,
            "close" => Self::Close,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Name of the niri action, `None` for unknown actions.
    pub fn niri_action(&self) -> Option<&str> {
        match self {
            Self::Activate => Some("FocusWindow"),
            Self::Maximize(method) => Some(method),
            Self::Fullscreen => Some("FullscreenWindow"),
            Self::Close => Some("CloseWindow"),
            Self::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: WindowAction,
    pub target_window_id: u64,
}

impl ActionRequest {
    /// `{"Action": {"<niri action>": {"id": <window id>}}}`
    pub fn to_command(&self) -> Option<serde_json::Value> {
        let action = self.action.niri_action()?;

        Some(json!({ "Action": { action: { "id": self.target_window_id } } }))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("no action bound to {0:?}")]
    Unbound(MouseButton),
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

/// Maps a click on `window_id` to the request configured for `button`.
pub fn map(
    button: MouseButton,
    config: &TaskbarConfig,
    window_id: u64,
) -> Result<ActionRequest, MappingError> {
    let name = match button {
        MouseButton::Primary => config.on_click.as_deref(),
        MouseButton::Middle => config.on_click_middle.as_deref(),
        MouseButton::Secondary => config.on_click_right.as_deref(),
    }
    .ok_or(MappingError::Unbound(button))?;

    match WindowAction::parse(name, config.fullscreen_method()) {
        WindowAction::Unknown(name) => Err(MappingError::UnknownAction(name)),
        action => Ok(ActionRequest {
            action,
            target_window_id: window_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TaskbarConfig {
        TaskbarConfig {
            on_click: Some("close".to_string()),
            on_click_middle: Some("maximize".to_string()),
            on_click_right: Some("bogus".to_string()),
            ..TaskbarConfig::default()
        }
    }

    #[test]
    fn primary_close() {
        let request = map(MouseButton::Primary, &config(), 7).unwrap();

        assert_eq!(
            request,
            ActionRequest {
                action: WindowAction::Close,
                target_window_id: 7
            }
        );
        assert_eq!(
            request.to_command(),
            Some(json!({"Action": {"CloseWindow": {"id": 7}}}))
        );
    }

    #[test]
    fn maximize_defaults_to_edges() {
        let request = map(MouseButton::Middle, &config(), 3).unwrap();

        assert_eq!(request.action.niri_action(), Some("MaximizeWindowToEdges"));
    }

    #[test]
    fn maximize_uses_configured_method() {
        let config = TaskbarConfig {
            fullscreen_method: Some("MaximizeColumn".to_string()),
            ..config()
        };

        let request = map(MouseButton::Middle, &config, 3).unwrap();

        assert_eq!(
            request.to_command(),
            Some(json!({"Action": {"MaximizeColumn": {"id": 3}}}))
        );
    }

    #[test]
    fn unknown_action_is_an_error() {
        assert_eq!(
            map(MouseButton::Secondary, &config(), 1),
            Err(MappingError::UnknownAction("bogus".to_string()))
        );
    }

    #[test]
    fn only_the_pressed_button_is_consulted() {
        let config = TaskbarConfig {
            on_click_right: Some("activate".to_string()),
            ..TaskbarConfig::default()
        };

        assert_eq!(
            map(MouseButton::Primary, &config, 1),
            Err(MappingError::Unbound(MouseButton::Primary))
        );
        assert_eq!(
            map(MouseButton::Secondary, &config, 1)
                .unwrap()
                .to_command(),
            Some(json!({"Action": {"FocusWindow": {"id": 1}}}))
        );
    }

    #[test]
    fn fullscreen_action() {
        let config = TaskbarConfig {
            on_click: Some("fullscreen".to_string()),
            ..TaskbarConfig::default()
        };

        let request = map(MouseButton::Primary, &config, 9).unwrap();

        assert_eq!(request.action.niri_action(), Some("FullscreenWindow"));
    }

    #[test]
    fn unknown_requests_have_no_command() {
        let request = ActionRequest {
            action: WindowAction::Unknown("bogus".to_string()),
            target_window_id: 1,
        };

        assert_eq!(request.to_command(), None);
    }

    #[test]
    fn button_numbers() {
        assert_eq!(MouseButton::from_number(1), Some(MouseButton::Primary));
        assert_eq!(MouseButton::from_number(3), Some(MouseButton::Secondary));
        assert_eq!(MouseButton::from_number(8), None);
    }
}
