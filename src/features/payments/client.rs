use crate::shared::errors::{AppError, AppResult};
use serde::Deserialize;
use serde_json::json;

/// 決済プロバイダーの返金レスポンス
#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
}

/// 決済プロバイダーAPIクライアント
///
/// 返金の作成とサブスクリプションの解約だけを扱う薄いクライアント。
/// ベースURLを差し替えられるのでテストではモックサーバーを指せる。
#[derive(Clone)]
pub struct PaymentClient {
    /// HTTPクライアント
    http_client: reqwest::Client,
    /// 決済APIのベースURL
    base_url: String,
    /// APIキー
    api_key: String,
}

impl PaymentClient {
    /// 新しいPaymentClientを作成する
    ///
    /// # 引数
    /// * `base_url` - 決済APIのベースURL
    /// * `api_key` - APIキー
    ///
    /// # 戻り値
    /// PaymentClientインスタンス
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// エンドポイントの完全なURLを組み立てる
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// 返金を作成する
    ///
    /// # 引数
    /// * `payment_ref` - 返金対象の決済参照ID
    /// * `amount_yen` - 返金額（円）
    ///
    /// # 戻り値
    /// 作成された返金のID、または失敗時はエラー
    pub async fn create_refund(&self, payment_ref: &str, amount_yen: i64) -> AppResult<String> {
        if amount_yen <= 0 {
            return Err(AppError::validation("返金額は1円以上である必要があります"));
        }

        let response = self
            .http_client
            .post(self.endpoint("refunds"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "payment_intent": payment_ref,
                "amount": amount_yen,
                "currency": "jpy",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "決済API".to_string(),
                format!("返金作成に失敗しました: ステータス {status}: {detail}"),
            ));
        }

        let refund: RefundResponse = response.json().await?;
        log::info!(
            "返金を作成しました: refund_id={}, amount={amount_yen}円",
            refund.id
        );
        Ok(refund.id)
    }

    /// 決済プロバイダー側のサブスクリプションを解約する
    ///
    /// # 引数
    /// * `processor_subscription_id` - 決済プロバイダー側のサブスクリプションID
    ///
    /// # 戻り値
    /// 成功時はOk(())、失敗時はエラー
    pub async fn cancel_subscription(&self, processor_subscription_id: &str) -> AppResult<()> {
        let response = self
            .http_client
            .delete(self.endpoint(&format!("subscriptions/{processor_subscription_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "決済API".to_string(),
                format!("サブスクリプション解約に失敗しました: ステータス {status}: {detail}"),
            ));
        }

        log::info!("決済側サブスクリプションを解約しました: id={processor_subscription_id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        // 末尾スラッシュの有無にかかわらず同じURLになることをテスト
        let with_slash = PaymentClient::new("https://api.example.com/v1/".to_string(), "sk".into());
        let without = PaymentClient::new("https://api.example.com/v1".to_string(), "sk".into());

        assert_eq!(with_slash.endpoint("refunds"), "https://api.example.com/v1/refunds");
        assert_eq!(without.endpoint("refunds"), "https://api.example.com/v1/refunds");
        assert_eq!(
            without.endpoint("subscriptions/sub_123"),
            "https://api.example.com/v1/subscriptions/sub_123"
        );
    }

    #[tokio::test]
    async fn test_create_refund_rejects_non_positive_amount() {
        // 0円以下の返金はAPI呼び出し前に拒否される
        let client = PaymentClient::new("http://127.0.0.1:1".to_string(), "sk_test".to_string());
        let result = client.create_refund("pi_123", 0).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
