use crate::shared::errors::AppError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 請求間隔を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// 月額プラン
    Monthly,
    /// 年額プラン
    Yearly,
}

impl BillingInterval {
    /// データベースのTEXTカラムに保存する文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for BillingInterval {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingInterval::Monthly),
            "yearly" => Ok(BillingInterval::Yearly),
            other => Err(AppError::validation(format!(
                "不明な請求間隔です: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 返金計算の結果
///
/// 計算時点の入力だけから決まる値オブジェクトで、どこにも永続化されない。
/// 解約申請の承認時に計算され、承認レコードへ転記される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCalculation {
    /// 返金が発生するか
    pub should_refund: bool,
    /// 返金額（円）
    pub refund_amount: i64,
    /// 利用済み月数（端数月は1ヶ月として数える）
    pub used_months: i64,
    /// 利用済み相当額（円）
    pub used_amount: i64,
    /// サービス終了日
    pub service_end_date: NaiveDate,
    /// 計算根拠の説明文
    pub reason: String,
}
