//! Conversion of historical `commands` representations to the current one.
//!
//! Three shapes have been persisted over time:
//! - plain strings: `["git pull", "cargo build"]`
//! - freeform inputs: `[{"command": "npm init", "inputs": ["my-app", ""]}]`
//! - input steps: `[{"command": "npm init", "inputs": [{"type": "text", "value": "my-app"}]}]`
//!
//! Each shape is a `(detector, converter)` entry in [`FORMATS`]; the first
//! detector that matches wins. New shapes go at the front of the table.

use serde_json::Value;
use thiserror::Error;

use crate::steps::{InputStep, MnemonicCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandShape {
    PlainStrings,
    FreeformInputs,
    InputSteps,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("stored commands are not an array")]
    NotArray,

    #[error("stored commands[{index}] is malformed: {message}")]
    Malformed { index: usize, message: String },
}

struct CommandFormat {
    shape: CommandShape,
    detect: fn(&[Value]) -> bool,
    convert: fn(&[Value]) -> Result<Vec<MnemonicCommand>, MigrationError>,
}

const FORMATS: &[CommandFormat] = &[
    CommandFormat {
        shape: CommandShape::PlainStrings,
        detect: is_plain_strings,
        convert: from_plain_strings,
    },
    CommandFormat {
        shape: CommandShape::FreeformInputs,
        detect: is_freeform_inputs,
        convert: from_freeform_inputs,
    },
    CommandFormat {
        shape: CommandShape::InputSteps,
        detect: is_input_steps,
        convert: from_input_steps,
    },
];

fn is_plain_strings(items: &[Value]) -> bool {
    items.first().is_some_and(Value::is_string)
}

/// Decided by the first element that carries a non-empty `inputs` array.
fn is_freeform_inputs(items: &[Value]) -> bool {
    items
        .iter()
        .filter_map(|item| item.get("inputs").and_then(Value::as_array))
        .find(|inputs| !inputs.is_empty())
        .and_then(|inputs| inputs.first())
        .is_some_and(Value::is_string)
}

fn is_input_steps(_items: &[Value]) -> bool {
    true
}

fn malformed(index: usize, message: impl Into<String>) -> MigrationError {
    MigrationError::Malformed {
        index,
        message: message.into(),
    }
}

fn command_field(index: usize, item: &Value) -> Result<String, MigrationError> {
    item.get("command")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(index, "missing string `command`"))
}

fn from_plain_strings(items: &[Value]) -> Result<Vec<MnemonicCommand>, MigrationError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str()
                .map(MnemonicCommand::new)
                .ok_or_else(|| malformed(index, "expected a string"))
        })
        .collect()
}

/// Freeform strings become literal text steps. No Enter is inserted.
fn from_freeform_inputs(items: &[Value]) -> Result<Vec<MnemonicCommand>, MigrationError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let command = command_field(index, item)?;
            let inputs = match item.get("inputs") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(entries)) => entries
                    .iter()
                    .map(|entry| match entry {
                        Value::String(s) => Ok(InputStep::text(s.clone())),
                        other => InputStep::from_value(other)
                            .map_err(|e| malformed(index, e.to_string())),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => return Err(malformed(index, "`inputs` is not an array")),
            };
            Ok(MnemonicCommand { command, inputs })
        })
        .collect()
}

fn from_input_steps(items: &[Value]) -> Result<Vec<MnemonicCommand>, MigrationError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let command = command_field(index, item)?;
            let inputs = match item.get("inputs") {
                None | Some(Value::Null) => Vec::new(),
                Some(raw) => crate::steps::parse_input_steps(raw)
                    .map_err(|e| malformed(index, e.to_string()))?,
            };
            Ok(MnemonicCommand { command, inputs })
        })
        .collect()
}

fn format_for(items: &[Value]) -> &'static CommandFormat {
    FORMATS
        .iter()
        .find(|format| (format.detect)(items))
        .unwrap_or(&FORMATS[FORMATS.len() - 1])
}

/// Which historical shape a stored `commands` array is in.
pub fn detect_shape(items: &[Value]) -> CommandShape {
    format_for(items).shape
}

/// Convert any known shape to the current one. Absent or empty input yields
/// an empty list.
pub fn migrate_commands(value: Option<&Value>) -> Result<Vec<MnemonicCommand>, MigrationError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(MigrationError::NotArray),
    };
    if items.is_empty() {
        return Ok(Vec::new());
    }

    (format_for(items).convert)(items)
}

/// Like [`migrate_commands`], but always returns at least one (possibly
/// blank) row so an editor has something to show.
pub fn commands_for_editing(value: Option<&Value>) -> Result<Vec<MnemonicCommand>, MigrationError> {
    let commands = migrate_commands(value)?;
    if commands.is_empty() {
        return Ok(vec![MnemonicCommand::new("")]);
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::ControlKey;
    use serde_json::json;

    #[test]
    fn plain_strings() {
        let raw = json!(["a", "b"]);
        assert_eq!(detect_shape(raw.as_array().unwrap()), CommandShape::PlainStrings);
        let commands = migrate_commands(Some(&raw)).unwrap();
        assert_eq!(
            serde_json::to_value(&commands).unwrap(),
            json!([{"command": "a", "inputs": []}, {"command": "b", "inputs": []}])
        );
    }

    #[test]
    fn freeform_inputs_become_text_steps() {
        let raw = json!([
            {"command": "git status", "inputs": []},
            {"command": "npm init", "inputs": ["my-app", ""]}
        ]);
        assert_eq!(detect_shape(raw.as_array().unwrap()), CommandShape::FreeformInputs);

        let commands = migrate_commands(Some(&raw)).unwrap();
        assert_eq!(commands[0], MnemonicCommand::new("git status"));
        assert_eq!(
            commands[1].inputs,
            vec![InputStep::text("my-app"), InputStep::text("")]
        );
    }

    #[test]
    fn current_shape_is_unchanged() {
        let raw = json!([
            {"command": "git rebase -i HEAD~2", "inputs": [
                {"type": "key", "key": "down"},
                {"type": "text", "value": "s"},
                {"type": "enter"}
            ]},
            {"command": "ls", "inputs": []}
        ]);
        assert_eq!(detect_shape(raw.as_array().unwrap()), CommandShape::InputSteps);

        let commands = migrate_commands(Some(&raw)).unwrap();
        assert_eq!(serde_json::to_value(&commands).unwrap(), raw);
        assert_eq!(commands[0].inputs[0], InputStep::Key { key: ControlKey::Down });
    }

    #[test]
    fn migration_is_idempotent() {
        for raw in [
            json!(["a", "b"]),
            json!([{"command": "x", "inputs": ["y"]}]),
            json!([{"command": "x", "inputs": [{"type": "enter"}]}]),
        ] {
            let once = migrate_commands(Some(&raw)).unwrap();
            let again = migrate_commands(Some(&serde_json::to_value(&once).unwrap())).unwrap();
            assert_eq!(once, again);
        }
    }

    #[test]
    fn empty_or_absent() {
        assert_eq!(migrate_commands(None).unwrap(), vec![]);
        assert_eq!(migrate_commands(Some(&json!([]))).unwrap(), vec![]);
        assert_eq!(
            commands_for_editing(Some(&json!([]))).unwrap(),
            vec![MnemonicCommand::new("")]
        );
        assert_eq!(commands_for_editing(None).unwrap(), vec![MnemonicCommand::new("")]);
    }

    #[test]
    fn malformed_storage() {
        assert_eq!(migrate_commands(Some(&json!("ls"))), Err(MigrationError::NotArray));
        assert!(matches!(
            migrate_commands(Some(&json!(["ls", 3]))),
            Err(MigrationError::Malformed { index: 1, .. })
        ));
        assert!(matches!(
            migrate_commands(Some(&json!([{"inputs": []}]))),
            Err(MigrationError::Malformed { index: 0, .. })
        ));
    }
}
