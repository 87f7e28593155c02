use crate::features::subscriptions;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::{now_jst_rfc3339, today_jst};
use rusqlite::{params, Connection};
use serde::Deserialize;

/// 決済プロバイダーから受信するWebhookイベント
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// イベントID（重複配送の検出に使う）
    pub id: String,
    /// イベント種別
    #[serde(rename = "type")]
    pub event_type: String,
    /// イベント本体
    pub data: WebhookEventData,
}

/// Webhookイベントの本体
#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookObject,
}

/// イベント対象のオブジェクト
#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    /// 決済プロバイダー側のサブスクリプションID
    #[serde(default)]
    pub subscription: Option<String>,
    /// オブジェクト自身のID（subscriptionイベントではサブスクリプションID）
    #[serde(default)]
    pub id: Option<String>,
}

impl WebhookObject {
    /// イベントから決済側サブスクリプションIDを取り出す
    fn processor_subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or(self.id.as_deref())
    }
}

/// Webhookイベントの処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// 処理して行を更新した
    Processed,
    /// 既に処理済みのイベントだった
    Duplicate,
    /// 対応していないイベント種別だった
    Ignored,
}

/// 受信済みイベントとして記録する
///
/// # 戻り値
/// 新規イベントならtrue、既に記録済みならfalse
fn record_event(conn: &Connection, event: &WebhookEvent) -> AppResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO webhook_events (id, event_type, received_at)
         VALUES (?1, ?2, ?3)",
        params![event.id, event.event_type, now_jst_rfc3339()],
    )?;
    Ok(inserted > 0)
}

/// Webhookイベントを処理する
///
/// # 引数
/// * `conn` - データベース接続
/// * `payload` - 受信したJSONペイロード
///
/// # 戻り値
/// 処理結果、または失敗時はエラー
///
/// # 対応イベント
/// - `checkout.session.completed` - サブスクリプションを利用中にする
/// - `invoice.paid` - 支払い遅延からの復帰
/// - `invoice.payment_failed` - 支払い遅延中にする
/// - `customer.subscription.deleted` - 解約済みにする（終了日は当日）
///
/// 未対応の種別はログだけ残して受理する。同じイベントIDの再配送は無視する。
///
/// イベントIDの記録と行の更新は同じトランザクションで確定する。
/// 処理に失敗した場合はイベントIDも記録されず、再配送をやり直せる。
pub fn handle_event(conn: &Connection, payload: &str) -> AppResult<WebhookOutcome> {
    let event: WebhookEvent = serde_json::from_str(payload)?;

    let tx = conn.unchecked_transaction()?;

    if !record_event(&tx, &event)? {
        log::info!("重複配送されたWebhookイベントを無視します: id={}", event.id);
        return Ok(WebhookOutcome::Duplicate);
    }

    let outcome = apply_event(&tx, &event)?;
    tx.commit()?;
    Ok(outcome)
}

/// イベント種別を判別してサブスクリプション行を更新する
fn apply_event(conn: &Connection, event: &WebhookEvent) -> AppResult<WebhookOutcome> {
    let processor_id = match event.data.object.processor_subscription_id() {
        Some(id) => id,
        None => {
            log::warn!(
                "サブスクリプションIDのないWebhookイベントを無視します: id={}, type={}",
                event.id,
                event.event_type
            );
            return Ok(WebhookOutcome::Ignored);
        }
    };

    match event.event_type.as_str() {
        "checkout.session.completed" | "invoice.paid" => {
            let subscription = subscriptions::find_by_processor_id(conn, processor_id)?;
            subscriptions::mark_active(conn, subscription.id)?;
            log::info!(
                "Webhookによりサブスクリプションを利用中にしました: id={}, event={}",
                subscription.id,
                event.event_type
            );
            Ok(WebhookOutcome::Processed)
        }
        "invoice.payment_failed" => {
            let subscription = subscriptions::find_by_processor_id(conn, processor_id)?;
            subscriptions::mark_past_due(conn, subscription.id)?;
            log::warn!(
                "Webhookによりサブスクリプションを支払い遅延中にしました: id={}",
                subscription.id
            );
            Ok(WebhookOutcome::Processed)
        }
        "customer.subscription.deleted" => {
            let subscription = subscriptions::find_by_processor_id(conn, processor_id)?;
            subscriptions::mark_canceled(conn, subscription.id, today_jst(), &now_jst_rfc3339())?;
            log::info!(
                "Webhookによりサブスクリプションを解約済みにしました: id={}",
                subscription.id
            );
            Ok(WebhookOutcome::Processed)
        }
        other => {
            log::debug!("未対応のWebhookイベント種別を受理しました: type={other}");
            Ok(WebhookOutcome::Ignored)
        }
    }
}

/// 不正なペイロードをバリデーションエラーに変換して処理する
///
/// HTTPハンドラーから使うための薄いラッパー。JSON解析エラーを
/// 外部入力起因のバリデーションエラーとして扱う。
pub fn handle_payload(conn: &Connection, payload: &str) -> AppResult<WebhookOutcome> {
    match handle_event(conn, payload) {
        Err(AppError::Json(e)) => Err(AppError::validation(format!(
            "Webhookペイロードの解析に失敗しました: {e}"
        ))),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::subscriptions::CreateSubscriptionDto;
    use crate::shared::database::run_migrations;
    use serde_json::json;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn create_subscription(conn: &Connection) -> i64 {
        subscriptions::create(
            conn,
            CreateSubscriptionDto {
                user_email: "taro@example.com".to_string(),
                plan: "yearly".to_string(),
                price_yen: 5500,
                start_date: "2025-01-15".to_string(),
                processor_subscription_id: Some("sub_123".to_string()),
                processor_customer_id: Some("cus_123".to_string()),
            },
        )
        .unwrap()
        .id
    }

    fn event_payload(id: &str, event_type: &str) -> String {
        json!({
            "id": id,
            "type": event_type,
            "data": { "object": { "subscription": "sub_123" } }
        })
        .to_string()
    }

    #[test]
    fn test_payment_failed_marks_past_due() {
        // 支払い失敗イベントで支払い遅延中になる
        let conn = test_conn();
        let sub_id = create_subscription(&conn);

        let outcome =
            handle_event(&conn, &event_payload("evt_1", "invoice.payment_failed")).unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        let subscription = subscriptions::find_by_id(&conn, sub_id).unwrap();
        assert_eq!(subscription.status, "past_due");
    }

    #[test]
    fn test_invoice_paid_reactivates() {
        // 支払い成功イベントで利用中に戻る
        let conn = test_conn();
        let sub_id = create_subscription(&conn);
        subscriptions::mark_past_due(&conn, sub_id).unwrap();

        handle_event(&conn, &event_payload("evt_2", "invoice.paid")).unwrap();

        let subscription = subscriptions::find_by_id(&conn, sub_id).unwrap();
        assert_eq!(subscription.status, "active");
    }

    #[test]
    fn test_subscription_deleted_marks_canceled() {
        // 解約イベントで解約済みになり終了日が入る
        let conn = test_conn();
        let sub_id = create_subscription(&conn);

        handle_event(
            &conn,
            &json!({
                "id": "evt_3",
                "type": "customer.subscription.deleted",
                "data": { "object": { "id": "sub_123" } }
            })
            .to_string(),
        )
        .unwrap();

        let subscription = subscriptions::find_by_id(&conn, sub_id).unwrap();
        assert_eq!(subscription.status, "canceled");
        assert!(subscription.service_end_date.is_some());
    }

    #[test]
    fn test_duplicate_event_is_ignored() {
        // 同じイベントIDの再配送では行が変化しない
        let conn = test_conn();
        let sub_id = create_subscription(&conn);

        let payload = event_payload("evt_dup", "invoice.payment_failed");
        assert_eq!(
            handle_event(&conn, &payload).unwrap(),
            WebhookOutcome::Processed
        );

        subscriptions::mark_active(&conn, sub_id).unwrap();
        assert_eq!(
            handle_event(&conn, &payload).unwrap(),
            WebhookOutcome::Duplicate
        );

        // 再配送では状態が変わらない
        let subscription = subscriptions::find_by_id(&conn, sub_id).unwrap();
        assert_eq!(subscription.status, "active");
    }

    #[test]
    fn test_failed_event_can_be_redelivered() {
        // 処理に失敗したイベントの再配送が重複扱いにならないことをテスト
        let conn = test_conn();
        let payload = event_payload("evt_retry", "invoice.payment_failed");

        // サブスクリプション作成前に届いたイベントは失敗する
        let result = handle_event(&conn, &payload);
        assert!(matches!(result, Err(AppError::NotFound(_))));

        // 失敗時はイベントIDが記録されず、同じIDの再配送で処理できる
        let sub_id = create_subscription(&conn);
        let outcome = handle_event(&conn, &payload).unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed);

        let subscription = subscriptions::find_by_id(&conn, sub_id).unwrap();
        assert_eq!(subscription.status, "past_due");
    }

    #[test]
    fn test_unknown_event_type_is_acknowledged() {
        // 未対応イベントはエラーにせず受理する
        let conn = test_conn();
        create_subscription(&conn);

        let outcome = handle_event(&conn, &event_payload("evt_4", "charge.refunded")).unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[test]
    fn test_unknown_subscription_is_error() {
        // 未知のサブスクリプションIDはNotFound
        let conn = test_conn();

        let result = handle_event(&conn, &event_payload("evt_5", "invoice.paid"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_malformed_payload_is_validation_error() {
        // 壊れたJSONはバリデーションエラーとして扱う
        let conn = test_conn();

        let result = handle_payload(&conn, "{not json");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
