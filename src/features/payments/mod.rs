//! 決済プロセッサ連携機能
//!
//! 決済API呼び出し(返金・サブスクリプション解約)と、
//! プロセッサから受信するWebhookイベントの処理を提供する。

pub mod client;
pub mod server;
pub mod webhook;

pub use client::PaymentClient;
pub use server::WebhookServer;
pub use webhook::{handle_payload, WebhookEvent, WebhookOutcome};
