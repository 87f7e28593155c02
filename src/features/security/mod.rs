//! アカウント保護機能
//!
//! ログイン失敗回数によるアカウントロックと、
//! IPアドレスによるアクセス制限を提供する。

pub mod ip_restriction;
pub mod login_attempts;
