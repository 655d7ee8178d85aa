use serde_json::Value;
use thiserror::Error;

use crate::steps::{MnemonicCommand, StepError, parse_input_steps};

pub const MNEMONIC_NAME_MAX: usize = 50;
pub const LABEL_MAX: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    Field { field: &'static str, message: String },

    #[error("commands must be an array")]
    CommandsNotArray,

    #[error("commands[{index}]: {message}")]
    Command { index: usize, message: String },

    #[error("commands[{index}].inputs: {source}")]
    Inputs { index: usize, source: StepError },

    #[error("at least one command required")]
    NoCommands,
}

impl ValidationError {
    fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Field {
            field,
            message: message.into(),
        }
    }
}

/// Mnemonic names are typed on the command line: `^[a-z][a-z0-9-_]{0,49}$`.
pub fn validate_mnemonic_name(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| ValidationError::field("name", "name is required"))?;

    if !first.is_ascii_lowercase() {
        return Err(ValidationError::field(
            "name",
            "name must start with a lowercase letter",
        ));
    }
    if name.len() > MNEMONIC_NAME_MAX {
        return Err(ValidationError::field(
            "name",
            format!("name must be at most {} characters", MNEMONIC_NAME_MAX),
        ));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
        return Err(ValidationError::field(
            "name",
            "name may only contain lowercase letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

/// Folder and token display names. Returns the trimmed name.
pub fn validate_label(field: &'static str, name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::field(field, format!("{} is required", field)));
    }
    if trimmed.chars().count() > LABEL_MAX {
        return Err(ValidationError::field(
            field,
            format!("{} must be at most {} characters", field, LABEL_MAX),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate a request's `commands` payload and produce the normalized form:
/// commands trimmed, blank commands dropped, missing `inputs` defaulted to `[]`.
pub fn normalize_commands(value: &Value) -> Result<Vec<MnemonicCommand>, ValidationError> {
    let items = value.as_array().ok_or(ValidationError::CommandsNotArray)?;

    let mut commands = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| ValidationError::Command {
            index,
            message: "must be an object".into(),
        })?;

        let command = obj
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::Command {
                index,
                message: "`command` must be a string".into(),
            })?;

        let inputs = match obj.get("inputs") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => parse_input_steps(raw)
                .map_err(|source| ValidationError::Inputs { index, source })?,
        };

        let command = command.trim();
        if command.is_empty() {
            continue;
        }
        commands.push(MnemonicCommand {
            command: command.to_string(),
            inputs,
        });
    }

    if commands.is_empty() {
        return Err(ValidationError::NoCommands);
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{ControlKey, InputStep};
    use serde_json::json;

    #[test]
    fn mnemonic_names() {
        assert!(validate_mnemonic_name("deploy-prod_2").is_ok());
        assert!(validate_mnemonic_name("a").is_ok());
        assert!(validate_mnemonic_name(&"a".repeat(50)).is_ok());

        assert!(validate_mnemonic_name("Deploy").is_err());
        assert!(validate_mnemonic_name("1abc").is_err());
        assert!(validate_mnemonic_name(&"a".repeat(51)).is_err());
        assert!(validate_mnemonic_name("").is_err());
        assert!(validate_mnemonic_name("git push").is_err());
        assert!(validate_mnemonic_name("-lead").is_err());
        assert!(validate_mnemonic_name("héllo").is_err());
    }

    #[test]
    fn labels_are_trimmed() {
        assert_eq!(validate_label("name", "  Work  ").unwrap(), "Work");
        assert!(validate_label("name", "   ").is_err());
        assert!(validate_label("name", &"x".repeat(101)).is_err());
    }

    #[test]
    fn drops_blank_commands() {
        let commands = normalize_commands(&json!([
            {"command": "  ", "inputs": []},
            {"command": "git push", "inputs": []}
        ]))
        .unwrap();
        assert_eq!(commands, vec![MnemonicCommand::new("git push")]);
    }

    #[test]
    fn all_blank_is_rejected() {
        let err = normalize_commands(&json!([{"command": ""}, {"command": " \t "}])).unwrap_err();
        assert_eq!(err, ValidationError::NoCommands);
        assert_eq!(err.to_string(), "at least one command required");
        assert_eq!(normalize_commands(&json!([])), Err(ValidationError::NoCommands));
    }

    #[test]
    fn trims_and_defaults_inputs() {
        let commands = normalize_commands(&json!([
            {"command": "  npm init  "},
            {"command": "git rebase -i", "inputs": [
                {"type": "key", "key": "down"},
                {"type": "text", "value": "s"},
                {"type": "enter"}
            ]}
        ]))
        .unwrap();

        assert_eq!(commands[0], MnemonicCommand::new("npm init"));
        assert_eq!(
            commands[1].inputs,
            vec![
                InputStep::Key { key: ControlKey::Down },
                InputStep::text("s"),
                InputStep::Enter,
            ]
        );
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert_eq!(
            normalize_commands(&json!({"command": "ls"})),
            Err(ValidationError::CommandsNotArray)
        );
        assert!(matches!(
            normalize_commands(&json!(["ls"])),
            Err(ValidationError::Command { index: 0, .. })
        ));
        assert!(matches!(
            normalize_commands(&json!([{"command": "ls"}, {"inputs": []}])),
            Err(ValidationError::Command { index: 1, .. })
        ));
        assert!(matches!(
            normalize_commands(&json!([{"command": "ls", "inputs": [{"type": "key", "key": "f1"}]}])),
            Err(ValidationError::Inputs { index: 0, .. })
        ));
        assert!(matches!(
            normalize_commands(&json!([{"command": "ls", "inputs": "y"}])),
            Err(ValidationError::Inputs { index: 0, source: StepError::NotAnArray })
        ));
    }
}
