use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Named control keys a mnemonic can send to a running command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKey {
    Up,
    Down,
    Left,
    Right,
    Space,
    Tab,
    Backspace,
}

impl ControlKey {
    pub const ALL: [ControlKey; 7] = [
        ControlKey::Up,
        ControlKey::Down,
        ControlKey::Left,
        ControlKey::Right,
        ControlKey::Space,
        ControlKey::Tab,
        ControlKey::Backspace,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "space" => Some(Self::Space),
            "tab" => Some(Self::Tab),
            "backspace" => Some(Self::Backspace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Space => "space",
            Self::Tab => "tab",
            Self::Backspace => "backspace",
        }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scripted interaction with a spawned command's stdin.
///
/// Serialized with an explicit `type` discriminant:
/// `{"type":"text","value":"y"}`, `{"type":"enter"}`, `{"type":"key","key":"down"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputStep {
    /// Literal text, no trailing newline.
    Text { value: String },
    Enter,
    Key { key: ControlKey },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    NotAnArray,
    NotAnObject,
    MissingType,
    UnknownType(String),
    MissingValue,
    MissingKey,
    UnknownKey(String),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::NotAnArray => write!(f, "inputs must be an array"),
            StepError::NotAnObject => write!(f, "input step must be an object"),
            StepError::MissingType => write!(f, "input step is missing a string `type`"),
            StepError::UnknownType(t) => write!(f, "unknown input step type '{}'", t),
            StepError::MissingValue => write!(f, "text step requires a string `value`"),
            StepError::MissingKey => write!(f, "key step requires a string `key`"),
            StepError::UnknownKey(k) => write!(f, "unknown key '{}'", k),
        }
    }
}

impl std::error::Error for StepError {}

impl InputStep {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text { value: value.into() }
    }

    /// Decide membership of an arbitrary JSON value in the step union.
    /// Extra fields are ignored; `enter` carries no payload.
    pub fn from_value(value: &Value) -> Result<Self, StepError> {
        let obj = value.as_object().ok_or(StepError::NotAnObject)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(StepError::MissingType)?;

        match kind {
            "text" => match obj.get("value") {
                Some(Value::String(s)) => Ok(Self::Text { value: s.clone() }),
                _ => Err(StepError::MissingValue),
            },
            "enter" => Ok(Self::Enter),
            "key" => {
                let name = obj
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or(StepError::MissingKey)?;
                ControlKey::parse(name)
                    .map(|key| Self::Key { key })
                    .ok_or_else(|| StepError::UnknownKey(name.to_string()))
            }
            other => Err(StepError::UnknownType(other.to_string())),
        }
    }

    pub fn is_valid(value: &Value) -> bool {
        Self::from_value(value).is_ok()
    }
}

impl<'de> Deserialize<'de> for InputStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        InputStep::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Parse a whole `inputs` array. Must be an actual JSON array.
pub fn parse_input_steps(value: &Value) -> Result<Vec<InputStep>, StepError> {
    let items = value.as_array().ok_or(StepError::NotAnArray)?;
    items.iter().map(InputStep::from_value).collect()
}

pub fn is_valid_input_steps(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(InputStep::is_valid))
}

/// A shell command plus the ordered stdin steps replayed against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MnemonicCommand {
    pub command: String,
    #[serde(default)]
    pub inputs: Vec<InputStep>,
}

impl MnemonicCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            inputs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_every_step_kind() {
        assert_eq!(
            InputStep::from_value(&json!({"type": "text", "value": "yes"})),
            Ok(InputStep::text("yes"))
        );
        assert_eq!(
            InputStep::from_value(&json!({"type": "text", "value": ""})),
            Ok(InputStep::text(""))
        );
        assert_eq!(InputStep::from_value(&json!({"type": "enter"})), Ok(InputStep::Enter));
        for key in ControlKey::ALL {
            let step = json!({"type": "key", "key": key.as_str()});
            assert_eq!(InputStep::from_value(&step), Ok(InputStep::Key { key }));
        }
    }

    #[test]
    fn enter_ignores_extra_fields() {
        let step = json!({"type": "enter", "value": "ignored", "key": "nope"});
        assert_eq!(InputStep::from_value(&step), Ok(InputStep::Enter));
    }

    #[test]
    fn rejects_missing_kind_specific_fields() {
        assert_eq!(
            InputStep::from_value(&json!({"type": "text"})),
            Err(StepError::MissingValue)
        );
        assert_eq!(
            InputStep::from_value(&json!({"type": "text", "value": 5})),
            Err(StepError::MissingValue)
        );
        assert_eq!(
            InputStep::from_value(&json!({"type": "key"})),
            Err(StepError::MissingKey)
        );
    }

    #[test]
    fn rejects_out_of_range_key() {
        assert_eq!(
            InputStep::from_value(&json!({"type": "key", "key": "escape"})),
            Err(StepError::UnknownKey("escape".into()))
        );
        assert!(!InputStep::is_valid(&json!({"type": "key", "key": "Up"})));
    }

    #[test]
    fn rejects_non_objects_and_unknown_types() {
        assert!(!InputStep::is_valid(&json!("text")));
        assert!(!InputStep::is_valid(&json!(null)));
        assert!(!InputStep::is_valid(&json!({"value": "x"})));
        assert!(!InputStep::is_valid(&json!({"type": "paste", "value": "x"})));
    }

    #[test]
    fn step_array_requires_real_array() {
        assert!(is_valid_input_steps(&json!([])));
        assert!(is_valid_input_steps(&json!([{"type": "enter"}, {"type": "key", "key": "tab"}])));
        assert!(!is_valid_input_steps(&json!({"0": {"type": "enter"}, "length": 1})));
        assert!(!is_valid_input_steps(&json!([{"type": "enter"}, {"type": "key"}])));
    }

    #[test]
    fn serializes_with_type_tag() {
        let steps = vec![
            InputStep::text("main"),
            InputStep::Enter,
            InputStep::Key { key: ControlKey::Down },
        ];
        assert_eq!(
            serde_json::to_value(&steps).unwrap(),
            json!([
                {"type": "text", "value": "main"},
                {"type": "enter"},
                {"type": "key", "key": "down"}
            ])
        );
    }

    #[test]
    fn command_inputs_default_to_empty() {
        let cmd: MnemonicCommand = serde_json::from_value(json!({"command": "ls"})).unwrap();
        assert_eq!(cmd, MnemonicCommand::new("ls"));
    }
}
