use serde::{Deserialize, Serialize};

/// サブスクリプションデータモデル
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    pub id: i64,
    pub user_email: String,
    pub plan: String,
    pub price_yen: i64,
    pub start_date: String,
    pub status: String,
    pub service_end_date: Option<String>,
    pub canceled_at: Option<String>,
    pub processor_subscription_id: Option<String>,
    pub processor_customer_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// サブスクリプション作成用DTO
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionDto {
    pub user_email: String,
    pub plan: String,
    pub price_yen: i64,
    pub start_date: String,
    pub processor_subscription_id: Option<String>,
    pub processor_customer_id: Option<String>,
}

/// サブスクリプションの状態を表す定数
pub mod status {
    /// 利用中
    pub const ACTIVE: &str = "active";
    /// 支払い遅延中
    pub const PAST_DUE: &str = "past_due";
    /// 解約済み
    pub const CANCELED: &str = "canceled";
}
