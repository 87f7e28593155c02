use crate::shared::errors::AppResult;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Asia::Tokyo;
use rusqlite::{params, Connection, OptionalExtension};

/// ロックまでの連続失敗回数
pub const MAX_FAILED_ATTEMPTS: i64 = 5;

/// 失敗回数を数える時間枠（分）
pub const FAILURE_WINDOW_MINUTES: i64 = 15;

/// ロック継続時間（分）
pub const LOCKOUT_MINUTES: i64 = 30;

/// ログイン試行の行
struct AttemptRow {
    failed_count: i64,
    window_started_at: String,
    locked_until: Option<String>,
}

fn find_row(conn: &Connection, user_email: &str) -> AppResult<Option<AttemptRow>> {
    let row = conn
        .query_row(
            "SELECT failed_count, window_started_at, locked_until
             FROM login_attempts WHERE user_email = ?1",
            params![user_email],
            |row| {
                Ok(AttemptRow {
                    failed_count: row.get(0)?,
                    window_started_at: row.get(1)?,
                    locked_until: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// RFC3339文字列をUTC時刻として解釈する
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// ログイン失敗を記録する
///
/// 15分以内に5回失敗するとアカウントを30分間ロックする。
///
/// # 引数
/// * `conn` - データベース接続
/// * `user_email` - 対象ユーザーのメールアドレス
///
/// # 戻り値
/// 記録後にロック状態であればtrue
pub fn record_failure(conn: &Connection, user_email: &str) -> AppResult<bool> {
    record_failure_at(conn, user_email, Utc::now())
}

/// 指定時刻でログイン失敗を記録する
pub fn record_failure_at(
    conn: &Connection,
    user_email: &str,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let now_str = now.with_timezone(&Tokyo).to_rfc3339();

    let Some(row) = find_row(conn, user_email)? else {
        conn.execute(
            "INSERT INTO login_attempts
                 (user_email, failed_count, window_started_at, locked_until, updated_at)
             VALUES (?1, 1, ?2, NULL, ?2)",
            params![user_email, now_str],
        )?;
        return Ok(false);
    };

    // すでにロック中なら回数は更新しない
    if let Some(locked_until) = row.locked_until.as_deref().and_then(parse_timestamp) {
        if now < locked_until {
            return Ok(true);
        }
    }

    if window_expired(&row.window_started_at, now) {
        // 時間枠を過ぎていたら数え直す
        conn.execute(
            "UPDATE login_attempts
             SET failed_count = 1, window_started_at = ?1, locked_until = NULL, updated_at = ?1
             WHERE user_email = ?2",
            params![now_str, user_email],
        )?;
        return Ok(false);
    }

    let new_count = row.failed_count + 1;
    if new_count >= MAX_FAILED_ATTEMPTS {
        let locked_until = (now + Duration::minutes(LOCKOUT_MINUTES))
            .with_timezone(&Tokyo)
            .to_rfc3339();
        log::warn!("ログイン失敗が{MAX_FAILED_ATTEMPTS}回に達したためロックします: {user_email}");
        conn.execute(
            "UPDATE login_attempts
             SET failed_count = ?1, locked_until = ?2, updated_at = ?3
             WHERE user_email = ?4",
            params![new_count, locked_until, now_str, user_email],
        )?;
        return Ok(true);
    }

    conn.execute(
        "UPDATE login_attempts SET failed_count = ?1, updated_at = ?2 WHERE user_email = ?3",
        params![new_count, now_str, user_email],
    )?;
    Ok(false)
}

/// アカウントがロック中か確認する
pub fn is_locked(conn: &Connection, user_email: &str) -> AppResult<bool> {
    is_locked_at(conn, user_email, Utc::now())
}

/// 指定時刻でロック状態を確認する
pub fn is_locked_at(conn: &Connection, user_email: &str, now: DateTime<Utc>) -> AppResult<bool> {
    let Some(row) = find_row(conn, user_email)? else {
        return Ok(false);
    };
    let locked = row
        .locked_until
        .as_deref()
        .and_then(parse_timestamp)
        .map(|until| now < until)
        .unwrap_or(false);
    Ok(locked)
}

/// ログイン成功時に失敗記録を消去する
pub fn clear(conn: &Connection, user_email: &str) -> AppResult<()> {
    conn.execute(
        "DELETE FROM login_attempts WHERE user_email = ?1",
        params![user_email],
    )?;
    Ok(())
}

/// 時間枠の開始時刻が期限切れかを判定する
fn window_expired(started_at: &str, now: DateTime<Utc>) -> bool {
    match parse_timestamp(started_at) {
        Some(started) => now - started > Duration::minutes(FAILURE_WINDOW_MINUTES),
        // 解釈できない開始時刻は期限切れ扱いで数え直す
        None => true,
    }
}
