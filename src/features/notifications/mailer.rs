use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

/// メールアドレスの形式チェック用正規表現
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("メールアドレス正規表現のコンパイルに失敗しました")
});

/// メールアドレスの形式を検証する
///
/// # 引数
/// * `address` - 検証対象のメールアドレス
///
/// # 戻り値
/// 成功時はOk(())、失敗時はバリデーションエラー
pub fn validate_address(address: &str) -> AppResult<()> {
    if EMAIL_PATTERN.is_match(address) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "メールアドレスの形式が不正です: {address}"
        )))
    }
}

/// メール配信クライアント
///
/// Resend互換のJSON APIに対して通知メールを送信する。
#[derive(Clone)]
pub struct Mailer {
    /// HTTPクライアント
    http_client: reqwest::Client,
    /// メール配信APIのベースURL
    base_url: String,
    /// APIキー
    api_key: String,
    /// 送信元アドレス
    from: String,
}

impl Mailer {
    /// 新しいMailerを作成する
    ///
    /// # 引数
    /// * `base_url` - メール配信APIのベースURL
    /// * `api_key` - APIキー
    /// * `from` - 送信元アドレス
    ///
    /// # 戻り値
    /// Mailerインスタンス
    pub fn new(base_url: String, api_key: String, from: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            api_key,
            from,
        }
    }

    /// 通知メールを送信する
    ///
    /// # 引数
    /// * `to` - 宛先アドレス
    /// * `subject` - 件名
    /// * `body` - 本文（プレーンテキスト）
    ///
    /// # 戻り値
    /// 成功時はOk(())、失敗時はエラー
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        validate_address(to)?;

        let url = format!("{}/emails", self.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "text": body,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "メール配信API".to_string(),
                format!("ステータス {status}: {detail}"),
            ));
        }

        log::info!("通知メールを送信しました: to={to}, subject={subject}");
        Ok(())
    }
}

/// 解約承認通知の本文を作成する
///
/// # 引数
/// * `service_end_date` - サービス終了日
/// * `refund_amount` - 返金額（円）
///
/// # 戻り値
/// プレーンテキストの通知本文
pub fn cancellation_approved_body(service_end_date: NaiveDate, refund_amount: i64) -> String {
    let mut body = format!(
        "解約のお申し込みを承りました。\n\nサービスは{}までご利用いただけます。\n",
        service_end_date.format("%Y年%m月%d日")
    );

    if refund_amount > 0 {
        body.push_str(&format!(
            "ご返金額は{refund_amount}円です。決済時のお支払い方法へ返金いたします。\n"
        ));
    } else {
        body.push_str("ご返金はありません。\n");
    }

    body.push_str("\nご利用ありがとうございました。\n");
    body
}
