use super::models::{status, CreateSubscriptionDto, Subscription};
use crate::features::billing::{BillingInterval, MONTHLY_EQUIVALENT_RATE_YEN};
use crate::shared::errors::AppError;
use crate::shared::now_jst_rfc3339;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::str::FromStr;

const SELECT_COLUMNS: &str = "id, user_email, plan, price_yen, start_date, status,
     service_end_date, canceled_at, processor_subscription_id, processor_customer_id,
     created_at, updated_at";

/// 行をSubscriptionにマッピングする
fn map_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_email: row.get(1)?,
        plan: row.get(2)?,
        price_yen: row.get(3)?,
        start_date: row.get(4)?,
        status: row.get(5)?,
        service_end_date: row.get(6)?,
        canceled_at: row.get(7)?,
        processor_subscription_id: row.get(8)?,
        processor_customer_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// サブスクリプションを作成する
///
/// # 引数
/// * `conn` - データベース接続
/// * `dto` - サブスクリプション作成用DTO
///
/// # 戻り値
/// 作成されたサブスクリプション、または失敗時はエラー
pub fn create(conn: &Connection, dto: CreateSubscriptionDto) -> Result<Subscription, AppError> {
    // プラン文字列と開始日を検証してから挿入する
    BillingInterval::from_str(&dto.plan)?;
    NaiveDate::parse_from_str(&dto.start_date, "%Y-%m-%d")
        .map_err(|e| AppError::validation(format!("契約開始日が不正です: {e}")))?;

    let now = now_jst_rfc3339();

    conn.execute(
        "INSERT INTO subscriptions
         (user_email, plan, price_yen, start_date, status,
          processor_subscription_id, processor_customer_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?7, ?8)",
        params![
            dto.user_email,
            dto.plan,
            dto.price_yen,
            dto.start_date,
            dto.processor_subscription_id,
            dto.processor_customer_id,
            now,
            now
        ],
    )?;

    let id = conn.last_insert_rowid();
    find_by_id(conn, id)
}

/// IDでサブスクリプションを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// サブスクリプション、または失敗時はエラー
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Subscription, AppError> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM subscriptions WHERE id = ?1"),
        params![id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("ID {id} のサブスクリプションが見つかりません"))
        }
        _ => AppError::Database(e.to_string()),
    })
}

/// 決済プロバイダー側のIDでサブスクリプションを取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `processor_id` - 決済プロバイダー側のサブスクリプションID
///
/// # 戻り値
/// サブスクリプション、または失敗時はエラー
pub fn find_by_processor_id(
    conn: &Connection,
    processor_id: &str,
) -> Result<Subscription, AppError> {
    conn.query_row(
        &format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions WHERE processor_subscription_id = ?1"
        ),
        params![processor_id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!(
            "決済ID {processor_id} のサブスクリプションが見つかりません"
        )),
        _ => AppError::Database(e.to_string()),
    })
}

/// サブスクリプション一覧を取得する
///
/// # 引数
/// * `conn` - データベース接続
/// * `active_only` - 利用中のサブスクリプションのみを取得するか
///
/// # 戻り値
/// サブスクリプションのリスト、または失敗時はエラー
pub fn find_all(conn: &Connection, active_only: bool) -> Result<Vec<Subscription>, AppError> {
    let query = if active_only {
        format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions WHERE status = 'active'
             ORDER BY user_email"
        )
    } else {
        format!("SELECT {SELECT_COLUMNS} FROM subscriptions ORDER BY user_email")
    };

    let mut stmt = conn.prepare(&query)?;
    let subscriptions = stmt.query_map([], map_row)?;

    subscriptions
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))
}

/// サブスクリプションの状態を更新する
fn update_status(conn: &Connection, id: i64, new_status: &str) -> Result<Subscription, AppError> {
    let now = now_jst_rfc3339();

    let rows_affected = conn.execute(
        "UPDATE subscriptions SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![new_status, now, id],
    )?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "ID {id} のサブスクリプションが見つかりません"
        )));
    }

    find_by_id(conn, id)
}

/// サブスクリプションを利用中に戻す
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// 更新されたサブスクリプション、または失敗時はエラー
pub fn mark_active(conn: &Connection, id: i64) -> Result<Subscription, AppError> {
    update_status(conn, id, status::ACTIVE)
}

/// サブスクリプションを支払い遅延中にする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
///
/// # 戻り値
/// 更新されたサブスクリプション、または失敗時はエラー
pub fn mark_past_due(conn: &Connection, id: i64) -> Result<Subscription, AppError> {
    update_status(conn, id, status::PAST_DUE)
}

/// サブスクリプションを解約済みにする
///
/// # 引数
/// * `conn` - データベース接続
/// * `id` - サブスクリプションID
/// * `service_end_date` - サービス終了日
/// * `canceled_at` - 解約日時（RFC3339）
///
/// # 戻り値
/// 更新されたサブスクリプション、または失敗時はエラー
pub fn mark_canceled(
    conn: &Connection,
    id: i64,
    service_end_date: NaiveDate,
    canceled_at: &str,
) -> Result<Subscription, AppError> {
    let now = now_jst_rfc3339();

    let rows_affected = conn.execute(
        "UPDATE subscriptions
         SET status = 'canceled', service_end_date = ?1, canceled_at = ?2, updated_at = ?3
         WHERE id = ?4",
        params![
            service_end_date.format("%Y-%m-%d").to_string(),
            canceled_at,
            now,
            id
        ],
    )?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "ID {id} のサブスクリプションが見つかりません"
        )));
    }

    find_by_id(conn, id)
}

/// 利用中サブスクリプションの月割り換算の売上合計を計算する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 月割り換算の合計金額（円）、または失敗時はエラー
pub fn monthly_revenue_total(conn: &Connection) -> Result<i64, AppError> {
    let subscriptions = find_all(conn, true)?;

    let total = subscriptions.iter().fold(0i64, |acc, sub| {
        let monthly_amount = match sub.plan.as_str() {
            "monthly" => sub.price_yen,
            "yearly" => MONTHLY_EQUIVALENT_RATE_YEN,
            _ => 0,
        };
        acc + monthly_amount
    });

    Ok(total)
}
