/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション行の管理に関連する機能を提供します：
/// - サブスクリプションの作成、読み取り
/// - 状態遷移（利用中・支払い遅延・解約済み）
/// - 月割り換算の売上合計の計算
pub mod models;
pub mod repository;

// 公開インターフェース
pub use models::{status, CreateSubscriptionDto, Subscription};

pub use repository::{
    create, find_all, find_by_id, find_by_processor_id, mark_active, mark_canceled,
    mark_past_due, monthly_revenue_total,
};
