use super::constants::{
    CANCEL_CUTOFF_DAYS, MONTHLY_EQUIVALENT_RATE_YEN, MONTHLY_PRICE_YEN, RENEWAL_NOTICE_DAYS,
    YEARLY_PRICE_YEN,
};
use super::models::{BillingInterval, RefundCalculation};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::today_jst;
use chrono::{Datelike, Duration, NaiveDate};

/// 指定した年月の日数を取得する
fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// 基準日から指定ヶ月後の更新基準日を取得する
///
/// # 引数
/// * `reference` - 起点となる日付（この日付の属する月を基準とする）
/// * `months_ahead` - 何ヶ月後の基準日を求めるか
/// * `base_day` - 基準日（契約開始日の「日」）
///
/// # 戻り値
/// 対象月における基準日の日付
///
/// # 日付あふれの扱い
/// 基準日が対象月の日数を超える場合は月末日に丸める
/// （例: 基準日31日 → 4月は30日、平年2月は28日）。
fn renewal_anchor(reference: NaiveDate, months_ahead: i32, base_day: u32) -> NaiveDate {
    let total_months = reference.year() * 12 + reference.month0() as i32 + months_ahead;
    let year = total_months.div_euclid(12);
    let month = total_months.rem_euclid(12) as u32 + 1;
    let day = base_day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(reference)
}

/// 解約時の返金額とサービス終了日を計算する
///
/// # 引数
/// * `subscription_start` - 契約開始日
/// * `interval` - 請求間隔（月額または年額）
/// * `cancel_date` - 解約申請の評価日
///
/// # 戻り値
/// 返金計算の結果、または解約日が契約開始日より前の場合はエラー
///
/// # 計算ルール
/// - 月額プランは返金しない。サービス終了日は契約開始日の1ヶ月後。
/// - 年額プランは契約開始日の「日」を更新基準日とし、解約月の基準日の
///   5日前までの申請なら翌月の基準日、それを過ぎると翌々月の基準日を
///   サービス終了日とする。
/// - 利用済み月数は契約開始から解約日までの暦月差（最低1ヶ月）。
/// - 返金額は年額料金から月割り換算額×利用済み月数を差し引いた額
///   （マイナスにはならない）。
pub fn calculate_refund(
    subscription_start: NaiveDate,
    interval: BillingInterval,
    cancel_date: NaiveDate,
) -> AppResult<RefundCalculation> {
    if cancel_date < subscription_start {
        return Err(AppError::validation(
            "解約日が契約開始日より前に指定されています",
        ));
    }

    match interval {
        BillingInterval::Monthly => {
            let service_end_date =
                renewal_anchor(subscription_start, 1, subscription_start.day());

            Ok(RefundCalculation {
                should_refund: false,
                refund_amount: 0,
                used_months: 1,
                used_amount: MONTHLY_PRICE_YEN,
                service_end_date,
                reason: format!(
                    "月額プランは返金対象外です。サービスは{}まで利用できます",
                    service_end_date.format("%Y-%m-%d")
                ),
            })
        }
        BillingInterval::Yearly => {
            let base_day = subscription_start.day();

            // 解約月の基準日と翌月の基準日が終了日の候補になる
            let current_anchor = renewal_anchor(cancel_date, 0, base_day);
            let cutoff = current_anchor - Duration::days(CANCEL_CUTOFF_DAYS);

            let service_end_date = if cancel_date <= cutoff {
                renewal_anchor(cancel_date, 1, base_day)
            } else {
                renewal_anchor(cancel_date, 2, base_day)
            };

            // 暦月差で利用済み月数を求める。開始月内の解約でも1ヶ月分とする
            let month_delta = (cancel_date.year() - subscription_start.year()) as i64 * 12
                + cancel_date.month() as i64
                - subscription_start.month() as i64;
            let used_months = month_delta.max(1);

            let used_amount = used_months * MONTHLY_EQUIVALENT_RATE_YEN;
            let refund_amount = (YEARLY_PRICE_YEN - used_amount).max(0);
            let should_refund = refund_amount > 0;

            let reason = if should_refund {
                format!(
                    "利用済み{used_months}ヶ月分（{used_amount}円）を年額料金から差し引いた額を返金します"
                )
            } else {
                format!(
                    "利用済み{used_months}ヶ月分（{used_amount}円）が年額料金に達しているため返金はありません"
                )
            };

            Ok(RefundCalculation {
                should_refund,
                refund_amount,
                used_months,
                used_amount,
                service_end_date,
                reason,
            })
        }
    }
}

/// 現在のJST日付を解約日として返金計算を行う
///
/// # 引数
/// * `subscription_start` - 契約開始日
/// * `interval` - 請求間隔
///
/// # 戻り値
/// 返金計算の結果、または失敗時はエラー
pub fn calculate_refund_now(
    subscription_start: NaiveDate,
    interval: BillingInterval,
) -> AppResult<RefundCalculation> {
    calculate_refund(subscription_start, interval, today_jst())
}

/// 契約開始日から1ヶ月後のサービス終了日を計算する
///
/// # 引数
/// * `start` - 契約開始日
///
/// # 戻り値
/// 1ヶ月後の同日（存在しない場合は月末日）
pub fn calculate_service_end_date(start: NaiveDate) -> NaiveDate {
    renewal_anchor(start, 1, start.day())
}

/// サービスが利用可能かどうかを判定する
///
/// # 引数
/// * `current` - 判定対象の日付
/// * `service_end` - サービス終了日
///
/// # 戻り値
/// サービス終了日当日を含めて利用可能ならtrue
pub fn is_service_active(current: NaiveDate, service_end: NaiveDate) -> bool {
    current <= service_end
}

/// 次回更新日までの日数を取得する
///
/// # 引数
/// * `renewal` - 次回更新日
/// * `current` - 現在の日付
///
/// # 戻り値
/// 更新日までの日数（更新日を過ぎている場合はマイナス）
pub fn days_until_renewal(renewal: NaiveDate, current: NaiveDate) -> i64 {
    (renewal - current).num_days()
}

/// 更新前に解約申請が間に合うかどうかを判定する
///
/// # 引数
/// * `renewal` - 次回更新日
/// * `current` - 現在の日付
///
/// # 戻り値
/// 更新日の7日前までならtrue
///
/// 返金計算内部の5日締切（CANCEL_CUTOFF_DAYS）とは別の閾値。
pub fn can_cancel_before_renewal(renewal: NaiveDate, current: NaiveDate) -> bool {
    days_until_renewal(renewal, current) >= RENEWAL_NOTICE_DAYS
}
