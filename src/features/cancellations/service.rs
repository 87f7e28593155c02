use super::models::{status, CancellationRequest};
use super::repository;
use crate::features::billing::{calculate_refund, BillingInterval, RefundCalculation};
use crate::features::notifications::{cancellation_approved_body, Mailer};
use crate::features::payments::PaymentClient;
use crate::features::subscriptions::{self, status as subscription_status};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::now_jst_rfc3339;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::str::FromStr;

/// 解約申請の承認ワークフローを担うサービス
///
/// データベースの状態更新が主処理で、失敗すると申請処理全体が失敗する。
/// 決済側の返金・解約とメール通知は副次処理で、失敗してもログに残して続行する。
#[derive(Clone)]
pub struct CancellationService {
    /// 決済APIクライアント
    payment: PaymentClient,
    /// メール配信クライアント
    mailer: Mailer,
}

impl CancellationService {
    /// 新しいCancellationServiceを作成する
    ///
    /// # 引数
    /// * `payment` - 決済APIクライアント
    /// * `mailer` - メール配信クライアント
    ///
    /// # 戻り値
    /// CancellationServiceインスタンス
    pub fn new(payment: PaymentClient, mailer: Mailer) -> Self {
        Self { payment, mailer }
    }

    /// 解約申請を受け付ける
    ///
    /// # 引数
    /// * `conn` - データベース接続
    /// * `subscription_id` - 対象のサブスクリプションID
    /// * `reason` - 解約理由（任意）
    ///
    /// # 戻り値
    /// 作成された解約申請、または失敗時はエラー
    ///
    /// # 検証内容
    /// - サブスクリプションが利用中であること
    /// - 同じサブスクリプションに承認待ちの申請がないこと
    pub fn submit(
        &self,
        conn: &Connection,
        subscription_id: i64,
        reason: Option<String>,
    ) -> AppResult<CancellationRequest> {
        let subscription = subscriptions::find_by_id(conn, subscription_id)?;

        if subscription.status != subscription_status::ACTIVE {
            return Err(AppError::validation(format!(
                "利用中でないサブスクリプションは解約申請できません（現在の状態: {}）",
                subscription.status
            )));
        }

        if repository::has_pending_for_subscription(conn, subscription_id)? {
            return Err(AppError::validation(
                "このサブスクリプションには承認待ちの解約申請が既にあります",
            ));
        }

        let request = repository::create(conn, subscription_id, reason)?;
        log::info!(
            "解約申請を受け付けました: id={}, subscription_id={subscription_id}",
            request.id
        );
        Ok(request)
    }

    /// 解約申請を承認する
    ///
    /// # 引数
    /// * `conn` - データベース接続
    /// * `request_id` - 解約申請ID
    /// * `cancel_date` - 解約の評価日（返金計算に使う）
    ///
    /// # 戻り値
    /// 承認済みの申請と返金計算の結果、または失敗時はエラー
    ///
    /// # 処理内容
    /// 1. 返金計算を実行
    /// 2. サブスクリプションと申請の状態更新を1トランザクションで実行
    /// 3. 決済側の返金・解約を実行（失敗はログのみ）
    /// 4. ユーザーへ通知メールを送信（失敗はログのみ）
    pub async fn approve(
        &self,
        conn: &mut Connection,
        request_id: &str,
        cancel_date: NaiveDate,
    ) -> AppResult<(CancellationRequest, RefundCalculation)> {
        let request = repository::find_by_id(conn, request_id)?;
        if request.status != status::PENDING {
            return Err(AppError::validation(format!(
                "承認待ちでない解約申請は承認できません（現在の状態: {}）",
                request.status
            )));
        }

        let subscription = subscriptions::find_by_id(conn, request.subscription_id)?;
        let interval = BillingInterval::from_str(&subscription.plan)?;
        let start = NaiveDate::parse_from_str(&subscription.start_date, "%Y-%m-%d")
            .map_err(|e| AppError::validation(format!("契約開始日が不正です: {e}")))?;

        let calculation = calculate_refund(start, interval, cancel_date)?;

        // 主となる状態更新は1トランザクションで行う
        let canceled_at = now_jst_rfc3339();
        let approved = {
            let tx = conn.transaction()?;
            subscriptions::mark_canceled(
                &tx,
                subscription.id,
                calculation.service_end_date,
                &canceled_at,
            )?;
            let approved = repository::mark_approved(&tx, request_id, &calculation)?;
            tx.commit()?;
            approved
        };

        log::info!(
            "解約申請を承認しました: id={request_id}, 返金額={}円, サービス終了日={}",
            calculation.refund_amount,
            calculation.service_end_date
        );

        // 決済側の処理の失敗はログに残して続行する
        match &subscription.processor_subscription_id {
            Some(processor_id) => {
                if calculation.should_refund {
                    if let Err(e) = self
                        .payment
                        .create_refund(processor_id, calculation.refund_amount)
                        .await
                    {
                        log::error!("返金の作成に失敗しました: {}", e.details());
                    }
                }
                if let Err(e) = self.payment.cancel_subscription(processor_id).await {
                    log::error!(
                        "決済側サブスクリプションの解約に失敗しました: {}",
                        e.details()
                    );
                }
            }
            None => {
                log::warn!(
                    "決済IDが未設定のため決済側の処理をスキップします: subscription_id={}",
                    subscription.id
                );
            }
        }

        // メール通知の失敗もログに残して続行する
        let body =
            cancellation_approved_body(calculation.service_end_date, calculation.refund_amount);
        if let Err(e) = self
            .mailer
            .send(&subscription.user_email, "解約手続き完了のお知らせ", &body)
            .await
        {
            log::error!("解約通知メールの送信に失敗しました: {}", e.details());
        }

        Ok((approved, calculation))
    }

    /// 解約申請を却下する
    ///
    /// # 引数
    /// * `conn` - データベース接続
    /// * `request_id` - 解約申請ID
    ///
    /// # 戻り値
    /// 却下済みの申請、または失敗時はエラー
    pub fn reject(&self, conn: &Connection, request_id: &str) -> AppResult<CancellationRequest> {
        let rejected = repository::mark_rejected(conn, request_id)?;
        log::info!("解約申請を却下しました: id={request_id}");
        Ok(rejected)
    }
}
