pub const SCHEMA: &str = r#"
-- Accounts; role ADMIN bypasses ownership checks
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    owner_id TEXT,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'USER'
);

-- Personas; custom_fields is a JSON object of string -> string
CREATE TABLE IF NOT EXISTS characters (
    id TEXT PRIMARY KEY,
    owner_id TEXT,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    name TEXT NOT NULL,
    description TEXT,
    system_prompt TEXT,
    short_greeting TEXT,
    profile_image_small TEXT,
    profile_image_medium TEXT,
    profile_image_large TEXT,
    custom_fields TEXT NOT NULL DEFAULT '{}'
);

-- Conversations; no FK on character_id, character cleanup is explicit
CREATE TABLE IF NOT EXISTS chats (
    id TEXT PRIMARY KEY,
    owner_id TEXT,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    character_id TEXT NOT NULL
);

-- Conversational turns; versions is a JSON array of prior contents
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    owner_id TEXT,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    versions TEXT NOT NULL DEFAULT '[]',
    current_version_index INTEGER NOT NULL DEFAULT 0
);

-- Bearer sessions; only the SHA-256 of the token is kept
CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT            -- NULL = until logout
);

CREATE INDEX IF NOT EXISTS idx_characters_owner ON characters(owner_id, status);
CREATE INDEX IF NOT EXISTS idx_chats_character_owner ON chats(character_id, owner_id);
CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;
