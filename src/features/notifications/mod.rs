/// 通知機能モジュール
///
/// メール配信APIへの送信と通知本文の組み立てを提供する。
pub mod mailer;

pub use mailer::{cancellation_approved_body, validate_address, Mailer};
