use crate::models::{FolderRow, MnemonicRow, NewUser, SessionRow, TokenRow, UserRow};
use crate::{Database, format_timestamp, now};
use anyhow::Result;
use chrono::{DateTime, Utc};
use mnemo_types::MnemonicCommand;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, name, image, provider, provider_account_id, created_at, updated_at";
const MNEMONIC_COLUMNS: &str = "id, user_id, folder_id, name, commands, created_at, updated_at";
const TOKEN_COLUMNS: &str =
    "id, user_id, name, token_id, hashed_token, last_used, created_at, updated_at";

/// Fields persisted when a token is issued.
pub struct NewToken<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub name: &'a str,
    pub token_id: &'a str,
    pub hashed_token: &'a str,
}

impl Database {
    // -- Users --

    /// Create or refresh the user behind a provider identity. Matches on the
    /// provider account first, then on email.
    pub fn upsert_user(&self, user: &NewUser<'_>) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM users WHERE provider = ?1 AND provider_account_id = ?2",
                    (user.provider, user.provider_account_id),
                    |row| row.get(0),
                )
                .optional()?;
            let existing = match existing {
                Some(id) => Some(id),
                None => tx
                    .query_row("SELECT id FROM users WHERE email = ?1", [user.email], |row| {
                        row.get(0)
                    })
                    .optional()?,
            };

            let id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE users
                         SET email = ?2, name = ?3, image = ?4, provider = ?5,
                             provider_account_id = ?6, updated_at = ?7
                         WHERE id = ?1",
                        rusqlite::params![
                            id,
                            user.email,
                            user.name,
                            user.image,
                            user.provider,
                            user.provider_account_id,
                            ts
                        ],
                    )?;
                    id
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO users
                         (id, email, name, image, provider, provider_account_id, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                        rusqlite::params![
                            id,
                            user.email,
                            user.name,
                            user.image,
                            user.provider,
                            user.provider_account_id,
                            ts
                        ],
                    )?;
                    id
                }
            };

            let row = query_user_by_id(&tx, &id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished during upsert", id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Sessions --

    pub fn create_session(
        &self,
        id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRow> {
        self.with_conn(|conn| {
            let row = SessionRow {
                id: id.to_string(),
                user_id: user_id.to_string(),
                expires_at: format_timestamp(expires_at),
                created_at: now(),
            };
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&row.id, &row.user_id, &row.expires_at, &row.created_at),
            )?;
            Ok(row)
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(SessionRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            expires_at: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM sessions WHERE id = ?1", [id])? > 0))
    }

    // -- Folders --

    pub fn folder_name_exists(
        &self,
        user_id: &str,
        name: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM folders WHERE user_id = ?1 AND name = ?2 AND id IS NOT ?3",
                    (user_id, name, exclude_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn create_folder(&self, id: &str, user_id: &str, name: &str) -> Result<FolderRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO folders (id, user_id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (id, user_id, name, &ts),
            )?;
            Ok(FolderRow {
                id: id.to_string(),
                user_id: user_id.to_string(),
                name: name.to_string(),
                created_at: ts.clone(),
                updated_at: ts,
                mnemonic_count: Some(0),
            })
        })
    }

    /// All folders owned by `user_id`, with mnemonic counts, sorted by name.
    pub fn list_folders(&self, user_id: &str) -> Result<Vec<FolderRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.user_id, f.name, f.created_at, f.updated_at, COUNT(m.id)
                 FROM folders f
                 LEFT JOIN mnemonics m ON m.folder_id = f.id
                 WHERE f.user_id = ?1
                 GROUP BY f.id
                 ORDER BY f.name",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FolderRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                        mnemonic_count: Some(row.get(5)?),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Looks a folder up regardless of owner; callers decide what a foreign
    /// folder means.
    pub fn get_folder(&self, id: &str) -> Result<Option<FolderRow>> {
        self.with_conn(|conn| query_folder(conn, id))
    }

    pub fn rename_folder(&self, id: &str, user_id: &str, name: &str) -> Result<Option<FolderRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE folders SET name = ?3, updated_at = ?4 WHERE id = ?1 AND user_id = ?2",
                (id, user_id, name, now()),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_folder(conn, id)
        })
    }

    /// Delete a folder and every mnemonic filed under it. Returns the number
    /// of mnemonics removed, or `None` if the folder is not the user's.
    pub fn delete_folder(&self, id: &str, user_id: &str) -> Result<Option<usize>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owned: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM folders WHERE id = ?1 AND user_id = ?2",
                    (id, user_id),
                    |row| row.get(0),
                )
                .optional()?;
            if owned.is_none() {
                return Ok(None);
            }

            let deleted = tx.execute("DELETE FROM mnemonics WHERE folder_id = ?1", [id])?;
            tx.execute("DELETE FROM folders WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(Some(deleted))
        })
    }

    // -- Mnemonics --

    pub fn mnemonic_name_exists(
        &self,
        user_id: &str,
        name: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM mnemonics WHERE user_id = ?1 AND name = ?2 AND id IS NOT ?3",
                    (user_id, name, exclude_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn create_mnemonic(
        &self,
        id: &str,
        user_id: &str,
        folder_id: Option<&str>,
        name: &str,
        commands: &[MnemonicCommand],
    ) -> Result<MnemonicRow> {
        let commands = serde_json::to_string(commands)?;
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO mnemonics (id, user_id, folder_id, name, commands, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![id, user_id, folder_id, name, commands, ts],
            )?;
            Ok(MnemonicRow {
                id: id.to_string(),
                user_id: user_id.to_string(),
                folder_id: folder_id.map(str::to_string),
                name: name.to_string(),
                commands,
                created_at: ts.clone(),
                updated_at: ts,
            })
        })
    }

    /// The user's mnemonics, optionally restricted to one folder, sorted by name.
    pub fn list_mnemonics(&self, user_id: &str, folder_id: Option<&str>) -> Result<Vec<MnemonicRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MNEMONIC_COLUMNS} FROM mnemonics
                 WHERE user_id = ?1 AND (?2 IS NULL OR folder_id = ?2)
                 ORDER BY name"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((user_id, folder_id), map_mnemonic)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_mnemonic(&self, id: &str, user_id: &str) -> Result<Option<MnemonicRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MNEMONIC_COLUMNS} FROM mnemonics WHERE id = ?1 AND user_id = ?2");
            Ok(conn.query_row(&sql, (id, user_id), map_mnemonic).optional()?)
        })
    }

    pub fn get_mnemonic_by_name(&self, user_id: &str, name: &str) -> Result<Option<MnemonicRow>> {
        self.with_conn(|conn| {
            let sql =
                format!("SELECT {MNEMONIC_COLUMNS} FROM mnemonics WHERE user_id = ?1 AND name = ?2");
            Ok(conn.query_row(&sql, (user_id, name), map_mnemonic).optional()?)
        })
    }

    /// Replace name and commands wholesale. `folder_id` of `None` keeps the
    /// current folder.
    pub fn update_mnemonic(
        &self,
        id: &str,
        user_id: &str,
        folder_id: Option<&str>,
        name: &str,
        commands: &[MnemonicCommand],
    ) -> Result<Option<MnemonicRow>> {
        let commands = serde_json::to_string(commands)?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE mnemonics
                 SET name = ?3, commands = ?4, folder_id = COALESCE(?5, folder_id), updated_at = ?6
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id, name, commands, folder_id, now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let sql = format!("SELECT {MNEMONIC_COLUMNS} FROM mnemonics WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], map_mnemonic).optional()?)
        })
    }

    pub fn delete_mnemonic(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM mnemonics WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }

    // -- Tokens --

    pub fn token_name_exists(
        &self,
        user_id: &str,
        name: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM api_tokens WHERE user_id = ?1 AND name = ?2 AND id IS NOT ?3",
                    (user_id, name, exclude_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn create_token(&self, token: &NewToken<'_>) -> Result<TokenRow> {
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO api_tokens (id, user_id, name, token_id, hashed_token, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    token.id,
                    token.user_id,
                    token.name,
                    token.token_id,
                    token.hashed_token,
                    ts
                ],
            )?;
            Ok(TokenRow {
                id: token.id.to_string(),
                user_id: token.user_id.to_string(),
                name: token.name.to_string(),
                token_id: token.token_id.to_string(),
                hashed_token: token.hashed_token.to_string(),
                last_used: None,
                created_at: ts.clone(),
                updated_at: ts,
            })
        })
    }

    /// Newest first.
    pub fn list_tokens(&self, user_id: &str) -> Result<Vec<TokenRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE user_id = ?1 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_token)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn find_token(&self, user_id: &str, token_id: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| {
            let sql =
                format!("SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE user_id = ?1 AND token_id = ?2");
            Ok(conn.query_row(&sql, (user_id, token_id), map_token).optional()?)
        })
    }

    pub fn touch_token(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE api_tokens SET last_used = ?2 WHERE id = ?1",
                (id, format_timestamp(at)),
            )?;
            Ok(())
        })
    }

    pub fn rename_token(&self, id: &str, user_id: &str, name: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE api_tokens SET name = ?3, updated_at = ?4 WHERE id = ?1 AND user_id = ?2",
                (id, user_id, name, now()),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let sql = format!("SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE id = ?1");
            Ok(conn.query_row(&sql, [id], map_token).optional()?)
        })
    }

    pub fn delete_token(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM api_tokens WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                image: row.get(3)?,
                provider: row.get(4)?,
                provider_account_id: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_folder(conn: &Connection, id: &str) -> Result<Option<FolderRow>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, name, created_at, updated_at FROM folders WHERE id = ?1",
            [id],
            |row| {
                Ok(FolderRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                    mnemonic_count: None,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn map_mnemonic(row: &Row<'_>) -> rusqlite::Result<MnemonicRow> {
    Ok(MnemonicRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        folder_id: row.get(2)?,
        name: row.get(3)?,
        commands: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_token(row: &Row<'_>) -> rusqlite::Result<TokenRow> {
    Ok(TokenRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        token_id: row.get(3)?,
        hashed_token: row.get(4)?,
        last_used: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;
    use mnemo_types::InputStep;

    fn db_with_user(email: &str) -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .upsert_user(&NewUser {
                email,
                name: Some("Test"),
                image: None,
                provider: "github",
                provider_account_id: email,
            })
            .unwrap();
        (db, user.id)
    }

    fn add_user(db: &Database, email: &str) -> String {
        db.upsert_user(&NewUser {
            email,
            name: None,
            image: None,
            provider: "github",
            provider_account_id: email,
        })
        .unwrap()
        .id
    }

    #[test]
    fn upsert_user_is_stable() {
        let (db, id) = db_with_user("a@example.com");
        let again = db
            .upsert_user(&NewUser {
                email: "a@example.com",
                name: Some("Renamed"),
                image: Some("https://example.com/a.png"),
                provider: "github",
                provider_account_id: "a@example.com",
            })
            .unwrap();
        assert_eq!(again.id, id);
        assert_eq!(again.name.as_deref(), Some("Renamed"));
    }

    #[test]
    fn duplicate_folder_names_hit_the_constraint() {
        let (db, user) = db_with_user("a@example.com");
        let other = add_user(&db, "b@example.com");

        db.create_folder("f1", &user, "Work").unwrap();
        assert!(db.folder_name_exists(&user, "Work", None).unwrap());
        assert!(!db.folder_name_exists(&user, "Work", Some("f1")).unwrap());
        assert!(!db.folder_name_exists(&other, "Work", None).unwrap());

        let err = db.create_folder("f2", &user, "Work").unwrap_err();
        assert!(is_unique_violation(&err));
        db.create_folder("f3", &other, "Work").unwrap();
    }

    #[test]
    fn deleting_folder_cascades_to_mnemonics() {
        let (db, user) = db_with_user("a@example.com");
        db.create_folder("f1", &user, "Ops").unwrap();
        db.create_folder("f2", &user, "Keep").unwrap();
        let cmds = vec![MnemonicCommand::new("ls")];
        for name in ["one", "two", "three"] {
            db.create_mnemonic(&format!("m-{name}"), &user, Some("f1"), name, &cmds)
                .unwrap();
        }
        db.create_mnemonic("m-kept", &user, Some("f2"), "kept", &cmds).unwrap();
        db.create_mnemonic("m-loose", &user, None, "loose", &cmds).unwrap();

        let folders = db.list_folders(&user).unwrap();
        assert_eq!(folders[1].name, "Ops");
        assert_eq!(folders[1].mnemonic_count, Some(3));

        assert_eq!(db.delete_folder("f1", &user).unwrap(), Some(3));
        assert_eq!(db.list_mnemonics(&user, None).unwrap().len(), 2);
        assert_eq!(db.delete_folder("f1", &user).unwrap(), None);
    }

    #[test]
    fn delete_folder_requires_ownership() {
        let (db, user) = db_with_user("a@example.com");
        let other = add_user(&db, "b@example.com");
        db.create_folder("f1", &user, "Ops").unwrap();
        assert_eq!(db.delete_folder("f1", &other).unwrap(), None);
        assert!(db.get_folder("f1").unwrap().is_some());
    }

    #[test]
    fn mnemonic_roundtrip_and_update() {
        let (db, user) = db_with_user("a@example.com");
        db.create_folder("f1", &user, "Ops").unwrap();
        let cmds = vec![MnemonicCommand {
            command: "npm init".into(),
            inputs: vec![InputStep::text("app"), InputStep::Enter],
        }];
        db.create_mnemonic("m1", &user, Some("f1"), "init", &cmds).unwrap();

        let loaded = db
            .get_mnemonic_by_name(&user, "init")
            .unwrap()
            .unwrap()
            .into_mnemonic()
            .unwrap();
        assert_eq!(loaded.commands, cmds);
        assert_eq!(loaded.folder_id.as_deref(), Some("f1"));

        let updated = db
            .update_mnemonic("m1", &user, None, "setup", &[MnemonicCommand::new("make")])
            .unwrap()
            .unwrap()
            .into_mnemonic()
            .unwrap();
        assert_eq!(updated.name, "setup");
        assert_eq!(updated.folder_id.as_deref(), Some("f1"));
        assert_eq!(updated.commands, vec![MnemonicCommand::new("make")]);

        let other = add_user(&db, "b@example.com");
        assert!(db.update_mnemonic("m1", &other, None, "x", &cmds).unwrap().is_none());
        assert!(!db.delete_mnemonic("m1", &other).unwrap());
        assert!(db.delete_mnemonic("m1", &user).unwrap());
    }

    #[test]
    fn legacy_commands_are_migrated_on_read() {
        let (db, user) = db_with_user("a@example.com");
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mnemonics (id, user_id, folder_id, name, commands, created_at, updated_at)
                 VALUES ('m1', ?1, NULL, 'old', '[\"git pull\",\"make\"]', '2024-01-01 10:00:00', '2024-01-01 10:00:00')",
                [&user],
            )?;
            Ok(())
        })
        .unwrap();

        let mnemonic = db.get_mnemonic("m1", &user).unwrap().unwrap().into_mnemonic().unwrap();
        assert_eq!(
            mnemonic.commands,
            vec![MnemonicCommand::new("git pull"), MnemonicCommand::new("make")]
        );
        assert_eq!(mnemonic.created_at.to_rfc3339(), "2024-01-01T10:00:00+00:00");
    }

    #[test]
    fn empty_commands_get_a_blank_row_for_editing() {
        let (db, user) = db_with_user("a@example.com");
        db.create_mnemonic("m1", &user, None, "empty", &[]).unwrap();

        let row = || db.get_mnemonic("m1", &user).unwrap().unwrap();
        assert!(row().into_mnemonic().unwrap().commands.is_empty());
        assert_eq!(row().into_editable().unwrap().commands, vec![MnemonicCommand::new("")]);
    }

    #[test]
    fn tokens_lookup_touch_and_revoke() {
        let (db, user) = db_with_user("a@example.com");
        db.create_token(&NewToken {
            id: "t1",
            user_id: &user,
            name: "laptop",
            token_id: "abc",
            hashed_token: "cipher",
        })
        .unwrap();

        assert!(db.token_name_exists(&user, "laptop", None).unwrap());
        let found = db.find_token(&user, "abc").unwrap().unwrap();
        assert!(found.last_used.is_none());

        let at = Utc::now();
        db.touch_token("t1", at).unwrap();
        let info = db.find_token(&user, "abc").unwrap().unwrap().into_info();
        assert_eq!(info.last_used.map(|t| t.timestamp_millis()), Some(at.timestamp_millis()));

        assert!(db.delete_token("t1", &user).unwrap());
        assert!(db.find_token(&user, "abc").unwrap().is_none());
        assert!(!db.delete_token("t1", &user).unwrap());
    }

    #[test]
    fn sessions() {
        let (db, user) = db_with_user("a@example.com");
        let expires = Utc::now() + chrono::Duration::days(30);
        db.create_session("s1", &user, expires).unwrap();
        assert_eq!(db.get_session("s1").unwrap().unwrap().user_id, user);
        assert!(db.delete_session("s1").unwrap());
        assert!(db.get_session("s1").unwrap().is_none());
    }
}
