pub mod config;
pub mod database;
pub mod errors;

/// JSTの現在時刻をRFC3339形式で取得する
///
/// # 戻り値
/// created_at / updated_at カラムに保存するタイムスタンプ文字列
pub fn now_jst_rfc3339() -> String {
    chrono::Utc::now()
        .with_timezone(&chrono_tz::Asia::Tokyo)
        .to_rfc3339()
}

/// JSTの今日の日付を取得する
///
/// # 戻り値
/// JSTタイムゾーンでの本日の暦日
pub fn today_jst() -> chrono::NaiveDate {
    chrono::Utc::now()
        .with_timezone(&chrono_tz::Asia::Tokyo)
        .date_naive()
}
