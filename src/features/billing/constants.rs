/// 月額プランの料金（円）
pub const MONTHLY_PRICE_YEN: i64 = 550;

/// 年額プランの料金（円）
pub const YEARLY_PRICE_YEN: i64 = 5500;

/// 年額プランの月割り換算額（円）
///
/// 年額料金の12分の1を切り捨てた値。年額料金を変更する場合は
/// この定数も合わせて更新すること（下のテストが乖離を検出する）。
pub const MONTHLY_EQUIVALENT_RATE_YEN: i64 = 458;

/// 解約締切日数
///
/// 更新基準日の5日前までに解約申請があれば、サービス終了日が
/// 翌月の基準日になる。それを過ぎると翌々月の基準日まで延びる。
pub const CANCEL_CUTOFF_DAYS: i64 = 5;

/// 更新前解約の案内日数
///
/// `can_cancel_before_renewal` だけが使う7日の閾値。
/// CANCEL_CUTOFF_DAYS（5日）とは別の業務ルールなので統合しないこと。
pub const RENEWAL_NOTICE_DAYS: i64 = 7;
