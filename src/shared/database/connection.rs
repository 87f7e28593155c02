use super::migrations::run_migrations;
use crate::shared::config::{get_database_filename, Environment};
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::PathBuf;

/// アプリデータディレクトリ内のデータベースファイルパスを取得する
///
/// # 引数
/// * `env` - 実行環境
///
/// # 戻り値
/// データベースファイルのパス、または失敗時はエラー
///
/// # 動作
/// OSのデータディレクトリ配下に swingtrack-billing ディレクトリを作成し、
/// 環境に応じたファイル名を連結して返す。
pub fn get_db_path(env: Environment) -> AppResult<PathBuf> {
    let base_dir = dirs::data_dir()
        .ok_or_else(|| AppError::configuration("データディレクトリを特定できません"))?;

    let app_dir = base_dir.join("swingtrack-billing");
    std::fs::create_dir_all(&app_dir)?;

    Ok(app_dir.join(get_database_filename(env)))
}

/// データベース接続を初期化し、マイグレーションを実行する
///
/// # 引数
/// * `env` - 実行環境
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. データベースファイルのパスを解決
/// 2. データベース接続を開く
/// 3. マイグレーションを実行
pub fn initialize_database(env: Environment) -> AppResult<Connection> {
    let db_path = get_db_path(env)?;

    let conn = Connection::open(&db_path)
        .map_err(|e| AppError::Database(format!("データベースのオープンに失敗しました: {e}")))?;

    run_migrations(&conn)?;

    log::info!("データベースを初期化しました: {}", db_path.display());

    Ok(conn)
}
