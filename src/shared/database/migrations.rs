use rusqlite::{Connection, Result};

/// すべてのデータベースマイグレーションを実行する
///
/// # 引数
/// * `conn` - データベース接続
///
/// # 戻り値
/// 成功時はOk(())、失敗時はエラー
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // サブスクリプションテーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_email TEXT NOT NULL,
            plan TEXT NOT NULL CHECK(plan IN ('monthly', 'yearly')),
            price_yen INTEGER NOT NULL,
            start_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK(status IN ('active', 'past_due', 'canceled')),
            service_end_date TEXT,
            canceled_at TEXT,
            processor_subscription_id TEXT,
            processor_customer_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // サブスクリプションテーブルのインデックスを作成
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_status ON subscriptions(status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_processor_id
         ON subscriptions(processor_subscription_id)",
        [],
    )?;

    // 解約申請テーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cancellation_requests (
            id TEXT PRIMARY KEY,
            subscription_id INTEGER NOT NULL REFERENCES subscriptions(id),
            reason TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK(status IN ('pending', 'approved', 'rejected')),
            refund_amount INTEGER,
            used_months INTEGER,
            service_end_date TEXT,
            requested_at TEXT NOT NULL,
            processed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cancellation_requests_status
         ON cancellation_requests(status)",
        [],
    )?;

    // Webhookイベントテーブルを作成（重複配送の検出用）
    conn.execute(
        "CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            received_at TEXT NOT NULL
        )",
        [],
    )?;

    // ログイン試行テーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS login_attempts (
            user_email TEXT PRIMARY KEY,
            failed_count INTEGER NOT NULL DEFAULT 0,
            window_started_at TEXT NOT NULL,
            locked_until TEXT,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // IP制限テーブルを作成
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ip_restrictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip TEXT NOT NULL UNIQUE,
            mode TEXT NOT NULL CHECK(mode IN ('allow', 'deny')),
            note TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_migrations_creates_tables() {
        // マイグレーションで全テーブルが作成されることをテスト
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('subscriptions', 'cancellation_requests',
                              'webhook_events', 'login_attempts', 'ip_restrictions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_run_migrations_is_idempotent() {
        // 複数回実行してもエラーにならないことをテスト
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn test_plan_check_constraint() {
        // planのCHECK制約をテスト
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO subscriptions
             (user_email, plan, price_yen, start_date, created_at, updated_at)
             VALUES ('a@example.com', 'weekly', 550, '2025-01-01', '', '')",
            [],
        );
        assert!(result.is_err());
    }
}
