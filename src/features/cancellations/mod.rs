/// 解約申請機能モジュール
///
/// このモジュールは、解約申請の受け付けから管理者承認までの
/// ワークフローを提供します：
/// - 解約申請の作成、取得
/// - 承認（返金計算・状態更新・決済側処理・メール通知）
/// - 却下
pub mod models;
pub mod repository;
pub mod service;

// 公開インターフェース
pub use models::{status, CancellationRequest};
pub use repository::{create, find_by_id, find_pending, mark_approved, mark_rejected};
pub use service::CancellationService;
