use bloodwork_server::{AppConfig, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

async fn start_server(cfg: AppConfig) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(&cfg).expect("build app");
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

fn secured_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.enabled = true;
    cfg.auth.jwt_secret = Some("test-secret-0123456789".into());
    cfg.auth.admin_password = Some("hunter2".into());
    cfg
}

async fn login(client: &reqwest::Client, base: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{base}/api/v1/auth/login"))
        .header("content-type", "application/json")
        .body(json!({"username": "admin", "password": password}).to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let (base, shutdown_tx, handle) = start_server(secured_config()).await;
    let client = reqwest::Client::new();

    // Health and capability endpoints stay public
    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let resp = client
        .get(format!("{base}/fhir/metadata"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base}/api/v1/patients"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(resp.headers()["www-authenticate"], "Bearer");
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["resourceType"], "OperationOutcome");

    let resp = client
        .get(format!("{base}/fhir/Patient"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = login(&client, &base, "wrong").await;
    assert_eq!(resp.status(), 401);

    let resp = login(&client, &base, "hunter2").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"], "admin");
    let token = body["access_token"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("{base}/api/v1/patients"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base}/fhir/Patient"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn login_is_unavailable_when_auth_is_disabled() {
    let (base, shutdown_tx, handle) = start_server(AppConfig::default()).await;
    let client = reqwest::Client::new();

    let resp = login(&client, &base, "anything").await;
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{base}/api/v1/patients"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
