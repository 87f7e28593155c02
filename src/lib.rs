//! swingtrack-billing: ゴルフショット管理サービスの課金コア
//!
//! プレミアムプラン（月額550円 / 年額5,500円）のサブスクリプション管理、
//! 解約申請の承認ワークフロー、日割りならぬ月割りの返金計算、
//! 決済プロセッサからのWebhook受信、およびログイン試行・IP制限の
//! 管理を提供するライブラリクレート。

pub mod features;
pub mod shared;

pub use features::billing::{
    calculate_refund, calculate_refund_now, BillingInterval, RefundCalculation,
};
pub use features::cancellations::CancellationService;
pub use features::notifications::Mailer;
pub use features::payments::{PaymentClient, WebhookServer};
pub use shared::config::AppConfig;
pub use shared::errors::{AppError, AppResult};
