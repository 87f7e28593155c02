//! 機能モジュール群

pub mod billing;
pub mod cancellations;
pub mod notifications;
pub mod payments;
pub mod security;
pub mod subscriptions;
