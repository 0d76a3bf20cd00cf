//! Database query implementations

use crate::error::{Error, Result, StorageError};
use crate::types::*;
use rusqlite::{params, Connection, OptionalExtension};

// ===== Session Queries =====

/// Insert a new session row (turns are stored separately)
pub fn insert_session(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO sessions (id, agent_id, model_id, system_prompt, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            session.id,
            session.agent_id,
            session.model_id,
            session.system_prompt,
            session.created_at.to_rfc3339(),
            session.updated_at.to_rfc3339(),
        ],
    )?;

    for turn in &session.turns {
        append_turn(conn, &session.id, turn)?;
    }

    Ok(())
}

/// Get a session with all of its turns
pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
    let row = conn
        .query_row(
            r#"
            SELECT id, agent_id, model_id, system_prompt, created_at, updated_at
            FROM sessions
            WHERE id = ?
            "#,
            params![session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, agent_id, model_id, system_prompt, created_at, updated_at)) = row else {
        return Ok(None);
    };

    let turns = get_session_turns(conn, &id)?;

    Ok(Some(Session {
        id,
        agent_id,
        model_id,
        system_prompt,
        turns,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    }))
}

/// List session ids for an agent, most recently updated first
pub fn list_agent_sessions(conn: &Connection, agent_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id FROM sessions
        WHERE agent_id = ?
        ORDER BY updated_at DESC
        "#,
    )?;

    let ids = stmt
        .query_map(params![agent_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(ids)
}

/// Delete a session and its turns
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?", params![session_id])?;
    Ok(())
}

// ===== Turn Queries =====

/// Append a turn at the end of a session
pub fn append_turn(conn: &Connection, session_id: &str, turn: &Turn) -> Result<i64> {
    let exists: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE id = ?",
        params![session_id],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(Error::Storage(StorageError::NotFound(format!(
            "session {}",
            session_id
        ))));
    }

    let tool_calls = if turn.tool_calls.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&turn.tool_calls)?)
    };
    let stop_reason = turn
        .stop_reason
        .map(|r| serde_json::to_string(&r))
        .transpose()?;

    conn.execute(
        r#"
        INSERT INTO turns (session_id, seq_order, role, content, tool_calls, stop_reason, created_at)
        VALUES (?, (SELECT COALESCE(MAX(seq_order), -1) + 1 FROM turns WHERE session_id = ?), ?, ?, ?, ?, ?)
        "#,
        params![
            session_id,
            session_id,
            turn.role.as_str(),
            turn.content,
            tool_calls,
            stop_reason,
            turn.timestamp.to_rfc3339(),
        ],
    )?;
    let row_id = conn.last_insert_rowid();

    conn.execute(
        "UPDATE sessions SET updated_at = ? WHERE id = ?",
        params![chrono::Utc::now().to_rfc3339(), session_id],
    )?;

    Ok(row_id)
}

/// Get the turns of a session in append order
pub fn get_session_turns(conn: &Connection, session_id: &str) -> Result<Vec<Turn>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT role, content, tool_calls, stop_reason, created_at
        FROM turns
        WHERE session_id = ?
        ORDER BY seq_order ASC
        "#,
    )?;

    let rows = stmt
        .query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(role, content, tool_calls, stop_reason, created_at)| -> Result<Turn> {
            let role = TurnRole::parse(&role).ok_or_else(|| {
                Error::Storage(StorageError::Corrupt(format!("unknown turn role: {}", role)))
            })?;
            let tool_calls = match tool_calls {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Vec::new(),
            };
            let stop_reason = stop_reason
                .map(|raw| serde_json::from_str::<StopReason>(&raw))
                .transpose()?;

            Ok(Turn {
                role,
                content,
                tool_calls,
                stop_reason,
                timestamp: parse_timestamp(&created_at)?,
            })
        })
        .collect()
}

// ===== Settings Queries =====

/// Get a setting value
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let result = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    Ok(result)
}

/// Set a setting value
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
        params![key, value],
    )?;

    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| Error::Storage(StorageError::Corrupt(format!("bad timestamp {}: {}", raw, e))))
}
