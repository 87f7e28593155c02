use crate::shared::errors::{AppError, AppResult};
use crate::shared::now_jst_rfc3339;
use rusqlite::{params, Connection, OptionalExtension};
use std::net::IpAddr;

/// IP制限ルールのモード定数
pub mod mode {
    pub const ALLOW: &str = "allow";
    pub const DENY: &str = "deny";
}

/// IP制限ルールの行
#[derive(Debug, Clone)]
pub struct IpRestriction {
    pub id: i64,
    pub ip: String,
    pub mode: String,
    pub note: Option<String>,
    pub created_at: String,
}

/// IPアドレス文字列を検証する
fn validate_ip(ip: &str) -> AppResult<()> {
    ip.parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| AppError::validation(format!("不正なIPアドレスです: {ip}")))
}

/// IP制限ルールを追加する
///
/// 同じIPのルールが既にある場合はモードと備考を上書きする。
///
/// # 引数
/// * `conn` - データベース接続
/// * `ip` - 対象IPアドレス
/// * `rule_mode` - `allow`または`deny`
/// * `note` - 備考（任意）
pub fn add_rule(conn: &Connection, ip: &str, rule_mode: &str, note: Option<&str>) -> AppResult<()> {
    validate_ip(ip)?;
    if rule_mode != mode::ALLOW && rule_mode != mode::DENY {
        return Err(AppError::validation(format!(
            "不正なモードです: {rule_mode}"
        )));
    }

    let now = now_jst_rfc3339();
    conn.execute(
        "INSERT INTO ip_restrictions (ip, mode, note, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(ip) DO UPDATE SET mode = ?2, note = ?3",
        params![ip, rule_mode, note, now],
    )?;
    log::info!("IP制限ルールを登録しました: {ip} ({rule_mode})");
    Ok(())
}

/// IP制限ルールを削除する
///
/// # 戻り値
/// ルールが存在して削除された場合はtrue
pub fn remove_rule(conn: &Connection, ip: &str) -> AppResult<bool> {
    let deleted = conn.execute("DELETE FROM ip_restrictions WHERE ip = ?1", params![ip])?;
    Ok(deleted > 0)
}

/// 登録済みのルールを全件取得する
pub fn find_all(conn: &Connection) -> AppResult<Vec<IpRestriction>> {
    let mut stmt = conn.prepare(
        "SELECT id, ip, mode, note, created_at FROM ip_restrictions ORDER BY created_at",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(IpRestriction {
            id: row.get(0)?,
            ip: row.get(1)?,
            mode: row.get(2)?,
            note: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    let mut rules = Vec::new();
    for rule in rows {
        rules.push(rule?);
    }
    Ok(rules)
}

/// 指定IPからのアクセスを許可するか判定する
///
/// 拒否ルールが最優先。許可ルールが1件でもあれば許可リスト方式になり、
/// リストにないIPは拒否される。ルールがなければ既定で許可。
///
/// # 引数
/// * `conn` - データベース接続
/// * `ip` - 判定対象のIPアドレス
///
/// # 戻り値
/// アクセスを許可する場合はtrue
pub fn is_allowed(conn: &Connection, ip: &str) -> AppResult<bool> {
    validate_ip(ip)?;

    let rule_mode: Option<String> = conn
        .query_row(
            "SELECT mode FROM ip_restrictions WHERE ip = ?1",
            params![ip],
            |row| row.get(0),
        )
        .optional()?;

    if rule_mode.as_deref() == Some(mode::DENY) {
        return Ok(false);
    }

    let allow_rules: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ip_restrictions WHERE mode = 'allow'",
        [],
        |row| row.get(0),
    )?;

    if allow_rules > 0 {
        return Ok(rule_mode.as_deref() == Some(mode::ALLOW));
    }

    Ok(true)
}
