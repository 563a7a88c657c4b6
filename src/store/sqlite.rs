use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use serde::de::DeserializeOwned;

use super::schema::SCHEMA;
use super::{
    CharacterRepository, ChatRepository, MessageRepository, Repository, Store, UserRepository,
};
use crate::auth::{
    SessionStore, expiry, generate_session_token, hash_session_token, parse_token,
};
use crate::error::{Error, Result};
use crate::types::*;

const USER_SELECT: &str = "SELECT id, owner_id, status, created_at, updated_at,
        username, email, password_hash, role
     FROM users";

const CHARACTER_SELECT: &str = "SELECT id, owner_id, status, created_at, updated_at,
        name, description, system_prompt, short_greeting,
        profile_image_small, profile_image_medium, profile_image_large, custom_fields
     FROM characters";

const CHAT_SELECT: &str = "SELECT id, owner_id, status, created_at, updated_at, character_id
     FROM chats";

const MESSAGE_SELECT: &str = "SELECT id, owner_id, status, created_at, updated_at,
        chat_id, role, content, timestamp, versions, current_version_index
     FROM messages";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, mostly useful for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn query_one<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        self.conn()
            .query_row(sql, params, map)
            .optional()
            .map_err(Error::from)
    }

    fn query_all<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width so that lexical order in SQL matches chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_status(s: &str) -> ResourceStatus {
    ResourceStatus::parse(s).unwrap_or_else(|| {
        tracing::error!("Invalid resource status in database: '{}'", s);
        ResourceStatus::None
    })
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceMeta> {
    Ok(ResourceMeta {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        status: parse_status(&row.get::<_, String>(2)?),
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        meta: meta_from_row(row)?,
        username: row.get(5)?,
        email: row.get(6)?,
        password_hash: row.get(7)?,
        role: Role::parse(&row.get::<_, String>(8)?).unwrap_or_default(),
    })
}

fn character_from_row(row: &Row<'_>) -> rusqlite::Result<Character> {
    Ok(Character {
        meta: meta_from_row(row)?,
        name: row.get(5)?,
        description: row.get(6)?,
        system_prompt: row.get(7)?,
        short_greeting: row.get(8)?,
        profile_image_small: row.get(9)?,
        profile_image_medium: row.get(10)?,
        profile_image_large: row.get(11)?,
        custom_fields: json_column(row, 12)?,
    })
}

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        meta: meta_from_row(row)?,
        character_id: row.get(5)?,
        messages: Vec::new(),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        meta: meta_from_row(row)?,
        chat_id: row.get(5)?,
        role: MessageRole::parse(&row.get::<_, String>(6)?).unwrap_or_default(),
        content: row.get(7)?,
        timestamp: parse_datetime(&row.get::<_, String>(8)?),
        versions: json_column(row, 9)?,
        current_version_index: row.get::<_, i64>(10)?.max(0) as usize,
    })
}

fn insert_message_row(conn: &Connection, message: &Message, chat_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, owner_id, status, created_at, updated_at,
             chat_id, role, content, timestamp, versions, current_version_index)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            message.meta.id,
            message.meta.owner_id,
            message.meta.status.as_str(),
            format_datetime(&message.meta.created_at),
            format_datetime(&message.meta.updated_at),
            chat_id,
            message.role.as_str(),
            message.content,
            format_datetime(&message.timestamp),
            serde_json::to_string(&message.versions)?,
            message.current_version_index as i64,
        ],
    )?;
    Ok(())
}

fn map_unique_violation(err: rusqlite::Error, message: &str) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            Error::Conflict(message.to_string())
        }
        e => Error::from(e),
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn users(&self) -> &dyn UserRepository {
        self
    }

    fn characters(&self) -> &dyn CharacterRepository {
        self
    }

    fn chats(&self) -> &dyn ChatRepository {
        self
    }

    fn messages(&self) -> &dyn MessageRepository {
        self
    }

    fn soft_delete_character_cascade(&self, character_id: &str) -> Result<CascadeCounts> {
        let deleted = ResourceStatus::Deleted.as_str();
        let now = format_datetime(&Utc::now());

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let messages = tx.execute(
            "UPDATE messages SET status = ?1, updated_at = ?2
             WHERE chat_id IN (SELECT id FROM chats WHERE character_id = ?3)",
            params![deleted, now, character_id],
        )?;

        let chats = tx.execute(
            "UPDATE chats SET status = ?1, updated_at = ?2 WHERE character_id = ?3",
            params![deleted, now, character_id],
        )?;

        let characters = tx.execute(
            "UPDATE characters SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![deleted, now, character_id],
        )?;

        if characters == 0 {
            return Err(Error::not_found("Character"));
        }

        tx.commit()?;
        Ok(CascadeCounts { messages, chats })
    }
}

// User operations

impl Repository<User> for SqliteStore {
    fn find_all(&self) -> Result<Vec<User>> {
        self.query_all(&format!("{USER_SELECT} ORDER BY created_at"), [], user_from_row)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.query_one(&format!("{USER_SELECT} WHERE id = ?1"), params![id], user_from_row)
    }

    fn insert(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, owner_id, status, created_at, updated_at,
                     username, email, password_hash, role)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.meta.id,
                    user.meta.owner_id,
                    user.meta.status.as_str(),
                    format_datetime(&user.meta.created_at),
                    format_datetime(&user.meta.updated_at),
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                ],
            )
            .map_err(|e| map_unique_violation(e, "Username or email already exists"))?;
        Ok(())
    }

    fn update(&self, user: &User) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE users SET owner_id = ?1, status = ?2, created_at = ?3, updated_at = ?4,
                     username = ?5, email = ?6, password_hash = ?7, role = ?8
                 WHERE id = ?9",
                params![
                    user.meta.owner_id,
                    user.meta.status.as_str(),
                    format_datetime(&user.meta.created_at),
                    format_datetime(&user.meta.updated_at),
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.meta.id,
                ],
            )
            .map_err(|e| map_unique_violation(e, "Username or email already exists"))?;

        if rows == 0 {
            return Err(Error::not_found("User"));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

impl UserRepository for SqliteStore {
    fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.query_one(
            &format!("{USER_SELECT} WHERE username = ?1"),
            params![username],
            user_from_row,
        )
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_one(
            &format!("{USER_SELECT} WHERE email = ?1"),
            params![email],
            user_from_row,
        )
    }

    fn exists_by_username(&self, username: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn exists_by_email(&self, email: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

// Character operations

impl Repository<Character> for SqliteStore {
    fn find_all(&self) -> Result<Vec<Character>> {
        self.query_all(
            &format!("{CHARACTER_SELECT} ORDER BY created_at"),
            [],
            character_from_row,
        )
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Character>> {
        self.query_one(
            &format!("{CHARACTER_SELECT} WHERE id = ?1"),
            params![id],
            character_from_row,
        )
    }

    fn insert(&self, c: &Character) -> Result<()> {
        self.conn().execute(
            "INSERT INTO characters (id, owner_id, status, created_at, updated_at,
                 name, description, system_prompt, short_greeting,
                 profile_image_small, profile_image_medium, profile_image_large, custom_fields)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                c.meta.id,
                c.meta.owner_id,
                c.meta.status.as_str(),
                format_datetime(&c.meta.created_at),
                format_datetime(&c.meta.updated_at),
                c.name,
                c.description,
                c.system_prompt,
                c.short_greeting,
                c.profile_image_small,
                c.profile_image_medium,
                c.profile_image_large,
                serde_json::to_string(&c.custom_fields)?,
            ],
        )?;
        Ok(())
    }

    fn update(&self, c: &Character) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE characters SET owner_id = ?1, status = ?2, created_at = ?3, updated_at = ?4,
                 name = ?5, description = ?6, system_prompt = ?7, short_greeting = ?8,
                 profile_image_small = ?9, profile_image_medium = ?10, profile_image_large = ?11,
                 custom_fields = ?12
             WHERE id = ?13",
            params![
                c.meta.owner_id,
                c.meta.status.as_str(),
                format_datetime(&c.meta.created_at),
                format_datetime(&c.meta.updated_at),
                c.name,
                c.description,
                c.system_prompt,
                c.short_greeting,
                c.profile_image_small,
                c.profile_image_medium,
                c.profile_image_large,
                serde_json::to_string(&c.custom_fields)?,
                c.meta.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("Character"));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM characters WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

impl CharacterRepository for SqliteStore {
    fn find_by_status(&self, status: ResourceStatus) -> Result<Vec<Character>> {
        self.query_all(
            &format!("{CHARACTER_SELECT} WHERE status = ?1 ORDER BY created_at"),
            params![status.as_str()],
            character_from_row,
        )
    }

    fn find_by_status_and_owner(
        &self,
        status: ResourceStatus,
        owner_id: &str,
    ) -> Result<Vec<Character>> {
        self.query_all(
            &format!("{CHARACTER_SELECT} WHERE status = ?1 AND owner_id = ?2 ORDER BY created_at"),
            params![status.as_str(), owner_id],
            character_from_row,
        )
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Character>> {
        self.query_one(
            &format!("{CHARACTER_SELECT} WHERE name = ?1 ORDER BY created_at LIMIT 1"),
            params![name],
            character_from_row,
        )
    }
}

// Chat operations

impl Repository<Chat> for SqliteStore {
    fn find_all(&self) -> Result<Vec<Chat>> {
        self.query_all(&format!("{CHAT_SELECT} ORDER BY created_at"), [], chat_from_row)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Chat>> {
        self.query_one(&format!("{CHAT_SELECT} WHERE id = ?1"), params![id], chat_from_row)
    }

    /// Inserts the chat and any messages it already carries.
    fn insert(&self, chat: &Chat) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO chats (id, owner_id, status, created_at, updated_at, character_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chat.meta.id,
                chat.meta.owner_id,
                chat.meta.status.as_str(),
                format_datetime(&chat.meta.created_at),
                format_datetime(&chat.meta.updated_at),
                chat.character_id,
            ],
        )?;

        for message in &chat.messages {
            insert_message_row(&tx, message, &chat.meta.id)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update(&self, chat: &Chat) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE chats SET owner_id = ?1, status = ?2, created_at = ?3, updated_at = ?4,
                 character_id = ?5
             WHERE id = ?6",
            params![
                chat.meta.owner_id,
                chat.meta.status.as_str(),
                format_datetime(&chat.meta.created_at),
                format_datetime(&chat.meta.updated_at),
                chat.character_id,
                chat.meta.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("Chat"));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM chats WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

impl ChatRepository for SqliteStore {
    fn find_with_messages(&self, id: &str) -> Result<Option<Chat>> {
        let Some(mut chat) = Repository::<Chat>::find_by_id(self, id)? else {
            return Ok(None);
        };
        chat.messages = self.find_by_chat(id)?;
        Ok(Some(chat))
    }

    fn find_latest_by_character_and_owner(
        &self,
        character_id: &str,
        owner_id: &str,
    ) -> Result<Option<Chat>> {
        self.query_one(
            &format!(
                "{CHAT_SELECT}
                 WHERE character_id = ?1 AND owner_id = ?2 AND status != 'DELETED'
                 ORDER BY created_at DESC, updated_at DESC
                 LIMIT 1"
            ),
            params![character_id, owner_id],
            chat_from_row,
        )
    }

    fn find_all_by_character_and_owner(
        &self,
        character_id: &str,
        owner_id: &str,
    ) -> Result<Vec<Chat>> {
        self.query_all(
            &format!(
                "{CHAT_SELECT}
                 WHERE character_id = ?1 AND owner_id = ?2 AND status != 'DELETED'
                 ORDER BY updated_at DESC, created_at DESC"
            ),
            params![character_id, owner_id],
            chat_from_row,
        )
    }

    fn append_message(&self, message: &Message) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), message.chat_id],
        )?;
        if rows == 0 {
            return Err(Error::not_found("Chat"));
        }

        insert_message_row(&tx, message, &message.chat_id)?;

        tx.commit()?;
        Ok(())
    }
}

// Message operations

impl Repository<Message> for SqliteStore {
    fn find_all(&self) -> Result<Vec<Message>> {
        self.query_all(
            &format!("{MESSAGE_SELECT} ORDER BY timestamp"),
            [],
            message_from_row,
        )
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Message>> {
        self.query_one(
            &format!("{MESSAGE_SELECT} WHERE id = ?1"),
            params![id],
            message_from_row,
        )
    }

    fn insert(&self, message: &Message) -> Result<()> {
        insert_message_row(&self.conn(), message, &message.chat_id)
    }

    fn update(&self, message: &Message) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE messages SET owner_id = ?1, status = ?2, created_at = ?3, updated_at = ?4,
                 chat_id = ?5, role = ?6, content = ?7, timestamp = ?8, versions = ?9,
                 current_version_index = ?10
             WHERE id = ?11",
            params![
                message.meta.owner_id,
                message.meta.status.as_str(),
                format_datetime(&message.meta.created_at),
                format_datetime(&message.meta.updated_at),
                message.chat_id,
                message.role.as_str(),
                message.content,
                format_datetime(&message.timestamp),
                serde_json::to_string(&message.versions)?,
                message.current_version_index as i64,
                message.meta.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("Message"));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

impl MessageRepository for SqliteStore {
    fn find_by_chat(&self, chat_id: &str) -> Result<Vec<Message>> {
        self.query_all(
            &format!(
                "{MESSAGE_SELECT}
                 WHERE chat_id = ?1 AND status != 'DELETED'
                 ORDER BY timestamp ASC, created_at ASC"
            ),
            params![chat_id],
            message_from_row,
        )
    }
}

// Session operations

impl SessionStore for SqliteStore {
    fn issue(&self, user_id: &str, ttl: Option<Duration>) -> Result<String> {
        let now = Utc::now();
        let expires_at = expiry(now, ttl)?;
        let token = generate_session_token();

        self.conn().execute(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                hash_session_token(&token),
                user_id,
                format_datetime(&now),
                expires_at.as_ref().map(format_datetime),
            ],
        )?;

        Ok(token)
    }

    fn lookup(&self, token: &str) -> Result<Option<String>> {
        if parse_token(token).is_err() {
            return Ok(None);
        }
        let token_hash = hash_session_token(token);

        let conn = self.conn();
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        if let Some(expires_at) = expires_at {
            if parse_datetime(&expires_at) < Utc::now() {
                conn.execute(
                    "DELETE FROM sessions WHERE token_hash = ?1",
                    params![token_hash],
                )?;
                return Ok(None);
            }
        }

        Ok(Some(user_id))
    }

    fn revoke(&self, token: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![hash_session_token(token)],
        )?;
        Ok(())
    }
}
