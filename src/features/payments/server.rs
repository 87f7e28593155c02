use super::webhook::{self, WebhookOutcome};
use crate::shared::errors::AppError;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// 署名ヘッダーの名前
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Webhookサーバーの共有状態
struct ServerContext {
    /// データベース接続
    db: Mutex<Connection>,
    /// 署名検証用シークレット
    secret: String,
}

/// Webhook受信用HTTPサーバー
pub struct WebhookServer {
    /// 待ち受けポート番号
    port: u16,
    /// 共有状態
    context: Arc<ServerContext>,
}

impl WebhookServer {
    /// 新しいWebhookサーバーを作成する
    ///
    /// # 引数
    /// * `port` - 待ち受けポート番号
    /// * `secret` - 署名検証用シークレット
    /// * `db` - データベース接続
    ///
    /// # 戻り値
    /// WebhookServerインスタンス
    pub fn new(port: u16, secret: String, db: Connection) -> Self {
        Self {
            port,
            context: Arc::new(ServerContext {
                db: Mutex::new(db),
                secret,
            }),
        }
    }

    /// サーバーを開始してWebhookを受信し続ける
    ///
    /// # 戻り値
    /// 待ち受けに失敗した場合のみエラーを返す
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Webhookサーバーを開始しました: http://{addr}");

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let context = Arc::clone(&self.context);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service =
                            service_fn(move |req| handle_request(req, Arc::clone(&context)));

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            log::error!("HTTP接続処理エラー: {e}");
                        }
                    });
                }
                Err(e) => {
                    log::error!("接続受け入れエラー: {e}");
                    return Err(Box::new(e));
                }
            }
        }
    }
}

/// ペイロードの署名を計算する
///
/// # 引数
/// * `secret` - 署名検証用シークレット
/// * `payload` - 受信したペイロード
///
/// # 戻り値
/// SHA-256ダイジェストの16進文字列
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b".");
    hasher.update(payload);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// 受信した署名を検証する
///
/// 一致した前置部分の長さが応答時間に現れないよう、
/// 全バイトを比較してから判定する。
fn verify_signature(secret: &str, payload: &[u8], received: &str) -> bool {
    let expected = compute_signature(secret, payload);
    let expected = expected.as_bytes();
    let received = received.as_bytes();
    if expected.len() != received.len() {
        return false;
    }
    expected
        .iter()
        .zip(received)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// JSONレスポンスを作成する
fn json_response(status: StatusCode, body: String) -> Response<String> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(body)
        .unwrap_or_default()
}

/// エラーをHTTPステータスに変換する
fn status_for_error(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Security(_) => StatusCode::UNAUTHORIZED,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// HTTPリクエストを処理する
async fn handle_request<B>(
    req: Request<B>,
    context: Arc<ServerContext>,
) -> Result<Response<String>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    log::debug!(
        "Webhookサーバーがリクエストを受信: {} {}",
        req.method(),
        req.uri()
    );

    match (req.method().clone(), req.uri().path().to_string()) {
        (Method::POST, path) if path == "/webhook" => {
            let signature = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    log::error!("リクエストボディの読み込みに失敗しました: {e}");
                    return Ok(json_response(
                        StatusCode::BAD_REQUEST,
                        r#"{"error":"invalid body"}"#.to_string(),
                    ));
                }
            };

            // 署名が一致しないリクエストは処理せずに拒否する
            let valid = signature
                .as_deref()
                .map(|s| verify_signature(&context.secret, &body, s))
                .unwrap_or(false);
            if !valid {
                log::warn!("Webhook署名の検証に失敗しました");
                return Ok(json_response(
                    StatusCode::UNAUTHORIZED,
                    r#"{"error":"invalid signature"}"#.to_string(),
                ));
            }

            let payload = String::from_utf8_lossy(&body).to_string();

            let result = {
                let db = match context.db.lock() {
                    Ok(db) => db,
                    Err(e) => {
                        log::error!("データベースロックエラー: {e}");
                        return Ok(json_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            r#"{"error":"internal error"}"#.to_string(),
                        ));
                    }
                };
                webhook::handle_payload(&db, &payload)
            };

            match result {
                Ok(outcome) => {
                    let outcome_str = match outcome {
                        WebhookOutcome::Processed => "processed",
                        WebhookOutcome::Duplicate => "duplicate",
                        WebhookOutcome::Ignored => "ignored",
                    };
                    Ok(json_response(
                        StatusCode::OK,
                        format!(r#"{{"received":true,"outcome":"{outcome_str}"}}"#),
                    ))
                }
                Err(e) => {
                    log::error!("Webhookイベントの処理に失敗しました: {}", e.details());
                    Ok(json_response(
                        status_for_error(&e),
                        format!(r#"{{"error":"{}"}}"#, e.user_message()),
                    ))
                }
            }
        }
        (Method::GET, path) if path == "/health" => Ok(json_response(
            StatusCode::OK,
            r#"{"status":"ok"}"#.to_string(),
        )),
        (method, path) => {
            log::debug!("未対応のリクエスト: {method} {path}");
            Ok(json_response(
                StatusCode::NOT_FOUND,
                r#"{"error":"not found"}"#.to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::subscriptions::{self, CreateSubscriptionDto};
    use crate::shared::database::run_migrations;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use serde_json::json;

    fn test_context(secret: &str) -> Arc<ServerContext> {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        subscriptions::create(
            &conn,
            CreateSubscriptionDto {
                user_email: "taro@example.com".to_string(),
                plan: "yearly".to_string(),
                price_yen: 5500,
                start_date: "2025-01-15".to_string(),
                processor_subscription_id: Some("sub_123".to_string()),
                processor_customer_id: Some("cus_123".to_string()),
            },
        )
        .unwrap();

        Arc::new(ServerContext {
            db: Mutex::new(conn),
            secret: secret.to_string(),
        })
    }

    fn webhook_request(payload: &str, signature: Option<&str>) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(Method::POST).uri("/webhook");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder
            .body(Full::new(Bytes::from(payload.to_string())))
            .unwrap()
    }

    fn event_payload() -> String {
        json!({
            "id": "evt_1",
            "type": "invoice.payment_failed",
            "data": { "object": { "subscription": "sub_123" } }
        })
        .to_string()
    }

    #[test]
    fn test_compute_signature_is_deterministic() {
        // 同じ入力から同じ署名が得られることをテスト
        let sig1 = compute_signature("whsec_test", b"payload");
        let sig2 = compute_signature("whsec_test", b"payload");
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);

        // シークレットやペイロードが変わると署名も変わる
        assert_ne!(sig1, compute_signature("whsec_other", b"payload"));
        assert_ne!(sig1, compute_signature("whsec_test", b"other"));
    }

    #[test]
    fn test_verify_signature_matches_exact_digest_only() {
        // 正しい署名だけが受理されることをテスト
        let payload = b"payload";
        let signature = compute_signature("whsec_test", payload);
        assert!(verify_signature("whsec_test", payload, &signature));

        // 長さ違い（前置一致・切り詰め）は拒否される
        assert!(!verify_signature("whsec_test", payload, &signature[..63]));
        let extended = format!("{signature}0");
        assert!(!verify_signature("whsec_test", payload, &extended));

        // 同じ長さで1文字だけ違う署名も拒否される
        let mut altered = signature.into_bytes();
        altered[0] = if altered[0] == b'0' { b'1' } else { b'0' };
        assert!(!verify_signature(
            "whsec_test",
            payload,
            std::str::from_utf8(&altered).unwrap()
        ));
    }

    #[tokio::test]
    async fn test_valid_signature_processes_event() {
        // 正しい署名のリクエストが処理されることをテスト
        let context = test_context("whsec_test");
        let payload = event_payload();
        let signature = compute_signature("whsec_test", payload.as_bytes());

        let response = handle_request(
            webhook_request(&payload, Some(&signature)),
            Arc::clone(&context),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().contains("processed"));

        let db = context.db.lock().unwrap();
        let subscription = subscriptions::find_by_processor_id(&db, "sub_123").unwrap();
        assert_eq!(subscription.status, "past_due");
    }

    #[tokio::test]
    async fn test_invalid_signature_is_rejected() {
        // 署名不一致のリクエストが拒否されることをテスト
        let context = test_context("whsec_test");
        let payload = event_payload();

        let response = handle_request(
            webhook_request(&payload, Some("deadbeef")),
            Arc::clone(&context),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // 署名ヘッダーなしも拒否される
        let response = handle_request(webhook_request(&payload, None), Arc::clone(&context))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // 行は変化していない
        let db = context.db.lock().unwrap();
        let subscription = subscriptions::find_by_processor_id(&db, "sub_123").unwrap();
        assert_eq!(subscription.status, "active");
    }

    #[tokio::test]
    async fn test_malformed_payload_returns_bad_request() {
        // 壊れたJSONには400を返す
        let context = test_context("whsec_test");
        let payload = "{not json";
        let signature = compute_signature("whsec_test", payload.as_bytes());

        let response = handle_request(webhook_request(payload, Some(&signature)), context)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        // ヘルスチェックをテスト
        let context = test_context("whsec_test");
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = handle_request(request, context).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().contains("ok"));
    }

    #[tokio::test]
    async fn test_unknown_path_returns_not_found() {
        // 未対応のパスには404を返す
        let context = test_context("whsec_test");
        let request = Request::builder()
            .method(Method::GET)
            .uri("/unknown")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = handle_request(request, context).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
