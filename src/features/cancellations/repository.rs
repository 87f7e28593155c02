use super::models::CancellationRequest;
use crate::features::billing::RefundCalculation;
use crate::shared::errors::AppError;
use crate::shared::now_jst_rfc3339;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, subscription_id, reason, status, refund_amount, used_months,
     service_end_date, requested_at, processed_at, created_at, updated_at";

/// 行をCancellationRequestにマッピングする
fn map_row(row: &Row<'_>) -> rusqlite::Result<CancellationRequest> {
    Ok(CancellationRequest {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        reason: row.get(2)?,
        status: row.get(3)?,
        refund_amount: row.get(4)?,
        used_months: row.get(5)?,
        service_end_date: row.get(6)?,
        requested_at: row.get(7)?,
        processed_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// 解約申請を作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `subscription_id` - 対象のサブスクリプションID
/// * `reason` - 解約理由（任意）
///
/// # 戻り値
/// 作成された解約申請、または失敗時はエラー
pub fn create(
    conn: &Connection,
    subscription_id: i64,
    reason: Option<String>,
) -> Result<CancellationRequest, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = now_jst_rfc3339();

    conn.execute(
        "INSERT INTO cancellation_requests
         (id, subscription_id, reason, status, requested_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6)",
        params![id, subscription_id, reason, now, now, now],
    )?;

    find_by_id(conn, &id)
}

/// IDで解約申請を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 解約申請ID
///
/// # 戻り値
/// 解約申請、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: &str) -> Result<CancellationRequest, AppError> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM cancellation_requests WHERE id = ?1"),
        params![id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("ID {id} の解約申請が見つかりません"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

/// 承認待ちの解約申請一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 承認待ち解約申請のリスト（申請日時順）、または失敗時はエラー
pub fn find_pending(conn: &Connection) -> Result<Vec<CancellationRequest>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM cancellation_requests
         WHERE status = 'pending' ORDER BY requested_at"
    ))?;
    let requests = stmt.query_map([], map_row)?;

    requests
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// 指定サブスクリプションに承認待ちの申請があるかを確認する
///
/// # 引数
/// * `conn` - データベース接続
/// * `subscription_id` - サブスクリプションID
///
/// # 戻り値
/// 承認待ちの申請が存在すればtrue
pub fn has_pending_for_subscription(
    conn: &Connection,
    subscription_id: i64,
) -> Result<bool, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cancellation_requests
         WHERE subscription_id = ?1 AND status = 'pending'",
        params![subscription_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// 解約申請を承認済みにし、返金計算の結果を転記する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 解約申請ID
/// * `calculation` - 返金計算の結果
///
/// # 戻り値
/// 更新された解約申請、または失敗時はエラー
pub fn mark_approved(
    conn: &Connection,
    id: &str,
    calculation: &RefundCalculation,
) -> Result<CancellationRequest, AppError> {
    let now = now_jst_rfc3339();

    let rows_affected = conn.execute(
        "UPDATE cancellation_requests
         SET status = 'approved', refund_amount = ?1, used_months = ?2,
             service_end_date = ?3, processed_at = ?4, updated_at = ?5
         WHERE id = ?6 AND status = 'pending'",
        params![
            calculation.refund_amount,
            calculation.used_months,
            calculation.service_end_date.format("%Y-%m-%d").to_string(),
            now,
            now,
            id
        ],
    )?;

    if rows_affected == 0 {
        return Err(AppError::validation(format!(
            "承認待ちの解約申請 {id} が見つかりません"
        )));
    }

    find_by_id(conn, id)
}

/// 解約申請を却下する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - 解約申請ID
///
/// # 戻り値
/// 更新された解約申請、または失敗時はエラー
pub fn mark_rejected(conn: &Connection, id: &str) -> Result<CancellationRequest, AppError> {
    let now = now_jst_rfc3339();

    let rows_affected = conn.execute(
        "UPDATE cancellation_requests
         SET status = 'rejected', processed_at = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![now, now, id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::validation(format!(
            "承認待ちの解約申請 {id} が見つかりません"
        )));
    }

    find_by_id(conn, id)
}
