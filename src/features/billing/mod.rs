/// 課金計算モジュール
///
/// 解約時の返金額・サービス終了日の計算と、その補助関数を提供する。
/// すべて純粋関数で、データベースや外部サービスには触れない。
pub mod constants;
pub mod models;
pub mod refund;

// 公開インターフェース
pub use constants::{
    CANCEL_CUTOFF_DAYS, MONTHLY_EQUIVALENT_RATE_YEN, MONTHLY_PRICE_YEN, RENEWAL_NOTICE_DAYS,
    YEARLY_PRICE_YEN,
};
pub use models::{BillingInterval, RefundCalculation};
pub use refund::{
    calculate_refund, calculate_refund_now, calculate_service_end_date, can_cancel_before_renewal,
    days_until_renewal, is_service_active,
};
