//! Database row types. These map directly to SQLite rows and are converted to
//! mnemo-types models at the edge of the crate.

use anyhow::{Result, anyhow};
use mnemo_types::MnemonicCommand;
use mnemo_types::migrate::{MigrationError, commands_for_editing, migrate_commands};
use mnemo_types::models::{Folder, Mnemonic, TokenInfo, User};
use serde_json::Value;

use crate::parse_timestamp;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub provider: String,
    pub provider_account_id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            name: self.name,
            image: self.image,
        }
    }
}

/// Profile data handed over by an identity provider after sign-in.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub name: Option<&'a str>,
    pub image: Option<&'a str>,
    pub provider: &'a str,
    pub provider_account_id: &'a str,
}

pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct FolderRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub mnemonic_count: Option<i64>,
}

impl FolderRow {
    pub fn into_folder(self) -> Folder {
        Folder {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            mnemonic_count: self.mnemonic_count,
        }
    }
}

#[derive(Debug)]
pub struct MnemonicRow {
    pub id: String,
    pub user_id: String,
    pub folder_id: Option<String>,
    pub name: String,
    pub commands: String,
    pub created_at: String,
    pub updated_at: String,
}

impl MnemonicRow {
    /// Stored commands may be in any historical shape; they are migrated on
    /// the way out.
    pub fn into_mnemonic(self) -> Result<Mnemonic> {
        self.convert(migrate_commands)
    }

    /// Same as [`into_mnemonic`](Self::into_mnemonic), but an empty command
    /// list comes back as one blank row for the edit form.
    pub fn into_editable(self) -> Result<Mnemonic> {
        self.convert(commands_for_editing)
    }

    fn convert(
        self,
        migrate: fn(Option<&Value>) -> Result<Vec<MnemonicCommand>, MigrationError>,
    ) -> Result<Mnemonic> {
        let raw: Value = serde_json::from_str(&self.commands)
            .map_err(|e| anyhow!("Mnemonic '{}' has unreadable commands: {}", self.id, e))?;
        let commands = migrate(Some(&raw)).map_err(|e| anyhow!("Mnemonic '{}': {}", self.id, e))?;

        Ok(Mnemonic {
            id: self.id,
            user_id: self.user_id,
            folder_id: self.folder_id,
            name: self.name,
            commands,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

#[derive(Debug)]
pub struct TokenRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub token_id: String,
    pub hashed_token: String,
    pub last_used: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TokenRow {
    pub fn into_info(self) -> TokenInfo {
        TokenInfo {
            id: self.id,
            name: self.name,
            last_used: self.last_used.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}
