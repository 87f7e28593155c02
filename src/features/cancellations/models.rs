use serde::{Deserialize, Serialize};

/// 解約申請データモデル
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CancellationRequest {
    pub id: String,
    pub subscription_id: i64,
    pub reason: Option<String>,
    pub status: String,
    pub refund_amount: Option<i64>,
    pub used_months: Option<i64>,
    pub service_end_date: Option<String>,
    pub requested_at: String,
    pub processed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// 解約申請の状態を表す定数
pub mod status {
    /// 承認待ち
    pub const PENDING: &str = "pending";
    /// 承認済み
    pub const APPROVED: &str = "approved";
    /// 却下
    pub const REJECTED: &str = "rejected";
}
