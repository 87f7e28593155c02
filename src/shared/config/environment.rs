use crate::shared::errors::{AppError, AppResult};

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

impl Environment {
    /// プロダクション環境かどうかを判定する
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// 現在の実行環境を判定する
///
/// # 戻り値
/// 現在の実行環境（Development または Production）
///
/// # 判定ロジック
/// 1. コンパイル時埋め込み環境変数を最優先
/// 2. 実行時環境変数 ENVIRONMENT を確認
/// 3. デバッグビルドの場合は Development
/// 4. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    // コンパイル時埋め込み環境変数を最優先
    if let Some(embedded_env) = option_env!("EMBEDDED_ENVIRONMENT") {
        let env = match embedded_env {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: コンパイル時埋め込み値を使用 -> {embedded_env} -> {env:?}");
        return env;
    }

    // 実行時環境変数を確認
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = match env_var.as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    }
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # 引数
/// * `env` - 実行環境
///
/// # 戻り値
/// データベースファイル名
///
/// # ファイル名の規則
/// - 開発環境: "dev_billing.db"
/// - プロダクション環境: "billing.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_billing.db",
        Environment::Production => "billing.db",
    }
}

/// アプリケーション設定
///
/// 環境変数から読み込まれる設定値を保持する。
/// 決済APIキー・Webhook署名シークレット・メール配信APIキーは
/// プロダクション環境では必須。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 実行環境
    pub environment: Environment,
    /// 決済APIのベースURL
    pub payment_api_base_url: String,
    /// 決済APIキー
    pub payment_api_key: String,
    /// Webhook署名検証用シークレット
    pub webhook_secret: String,
    /// メール配信APIのベースURL
    pub mail_api_base_url: String,
    /// メール配信APIキー
    pub mail_api_key: String,
    /// 通知メールの送信元アドレス
    pub mail_from: String,
    /// Webhookサーバーの待ち受けポート
    pub webhook_port: u16,
    /// ログレベル
    pub log_level: String,
}

impl AppConfig {
    /// 環境変数からアプリケーション設定を読み込む
    ///
    /// # 戻り値
    /// アプリケーション設定、または失敗時はエラー
    pub fn from_env() -> AppResult<Self> {
        let environment = get_environment();

        let config = Self {
            environment,
            payment_api_base_url: std::env::var("PAYMENT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            payment_api_key: std::env::var("PAYMENT_API_KEY").unwrap_or_default(),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            mail_api_base_url: std::env::var("MAIL_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            mail_api_key: std::env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "noreply@swingtrack.example".to_string()),
            webhook_port: std::env::var("WEBHOOK_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8787),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// 設定値を検証する
    ///
    /// # 戻り値
    /// 成功時はOk(())、失敗時はエラー
    ///
    /// # 検証内容
    /// - ベースURLが解析可能であること
    /// - プロダクション環境ではAPIキーとWebhookシークレットが設定されていること
    pub fn validate(&self) -> AppResult<()> {
        url::Url::parse(&self.payment_api_base_url)
            .map_err(|e| AppError::configuration(format!("決済APIのURLが不正です: {e}")))?;
        url::Url::parse(&self.mail_api_base_url)
            .map_err(|e| AppError::configuration(format!("メール配信APIのURLが不正です: {e}")))?;

        if self.environment.is_production() {
            if self.payment_api_key.is_empty() {
                return Err(AppError::configuration(
                    "本番環境では PAYMENT_API_KEY の設定が必須です",
                ));
            }
            if self.webhook_secret.is_empty() {
                return Err(AppError::configuration(
                    "本番環境では WEBHOOK_SECRET の設定が必須です",
                ));
            }
            if self.mail_api_key.is_empty() {
                return Err(AppError::configuration(
                    "本番環境では MAIL_API_KEY の設定が必須です",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> AppConfig {
        AppConfig {
            environment: Environment::Development,
            payment_api_base_url: "https://api.stripe.com/v1".to_string(),
            payment_api_key: String::new(),
            webhook_secret: String::new(),
            mail_api_base_url: "https://api.resend.com".to_string(),
            mail_api_key: String::new(),
            mail_from: "noreply@swingtrack.example".to_string(),
            webhook_port: 8787,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_get_database_filename() {
        // 開発環境のデータベースファイル名をテスト
        assert_eq!(
            get_database_filename(Environment::Development),
            "dev_billing.db"
        );

        // プロダクション環境のデータベースファイル名をテスト
        assert_eq!(get_database_filename(Environment::Production), "billing.db");
    }

    #[test]
    fn test_environment_equality() {
        // Environment列挙型の等価性をテスト
        assert_eq!(Environment::Development, Environment::Development);
        assert_ne!(Environment::Development, Environment::Production);
        assert!(Environment::Production.is_production());
        assert!(!Environment::Development.is_production());
    }

    #[test]
    fn test_validate_development_allows_empty_keys() {
        // 開発環境ではAPIキー未設定を許容する
        let config = dev_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_production_requires_keys() {
        // 本番環境ではAPIキー未設定を拒否する
        let mut config = dev_config();
        config.environment = Environment::Production;
        assert!(config.validate().is_err());

        config.payment_api_key = "sk_live_xxx".to_string();
        config.webhook_secret = "whsec_xxx".to_string();
        config.mail_api_key = "re_xxx".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_invalid_url() {
        // 不正なURLを拒否する
        let mut config = dev_config();
        config.payment_api_base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
