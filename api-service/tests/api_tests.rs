mod common;

use auth::Claims;
use common::TestApp;
use common::STRONG_PASSWORD;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_register_success() {
    let app = TestApp::spawn().await;

    let response = app
        .register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status_code"], 201);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert_eq!(body["data"]["is_active"], true);
    assert!(body["data"]["id"].is_string());

    // No password material in the response
    let data = body["data"].as_object().unwrap();
    assert!(data.keys().all(|key| !key.contains("password")));
    assert!(!body.to_string().contains(STRONG_PASSWORD));
}

#[tokio::test]
async fn test_register_weak_password_reports_reason() {
    let app = TestApp::spawn().await;

    let response = app.register("alice", "alice@example.com", "Weak1!").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body["data"]["message"],
        "Password must be at least 12 characters long"
    );
}

#[tokio::test]
async fn test_register_missing_character_class() {
    let app = TestApp::spawn().await;

    let response = app
        .register("alice", "alice@example.com", "alllowercase123!")
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("uppercase letter"));
}

#[tokio::test]
async fn test_register_invalid_username() {
    let app = TestApp::spawn().await;

    let response = app
        .register("al ice", "alice@example.com", STRONG_PASSWORD)
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    let response = app
        .register("alice", "other@example.com", STRONG_PASSWORD)
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("already exists"));
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    let response = app
        .register("alice2", "alice@example.com", STRONG_PASSWORD)
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_login_and_fetch_profile() {
    let app = TestApp::spawn().await;

    let weak = app.register("alice", "alice@example.com", "Weak1!").await;
    assert_eq!(weak.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let created = app
        .register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let response = app.login("alice", STRONG_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["token_type"], "bearer");
    assert!(body["data"]["expires_at"].is_string());
    let token = body["data"]["access_token"].as_str().unwrap();

    // The token carries the username as its subject
    let claims: Claims = app.jwt_handler.decode(token).unwrap();
    assert_eq!(claims.sub.as_deref(), Some("alice"));

    let me = app
        .get_authenticated("/api/users/me", token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(me.status(), StatusCode::OK);

    let body: serde_json::Value = me.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"]["last_login_at"].is_string());
}

#[tokio::test]
async fn test_login_by_email() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    let response = app.login("alice@example.com", STRONG_PASSWORD).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    let wrong_password = app.login("alice", "WrongHorse9!Battery").await;
    let unknown_user = app.login("mallory", STRONG_PASSWORD).await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    let wrong_body: serde_json::Value = wrong_password.json().await.unwrap();
    let unknown_body: serde_json::Value = unknown_user.json().await.unwrap();
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["data"]["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_current_user_requires_token() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/api/users/me")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_current_user_rejects_invalid_token() {
    let app = TestApp::spawn().await;

    let response = app
        .get_authenticated("/api/users/me", "not.a.token")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["message"], "Invalid token");
}

#[tokio::test]
async fn test_current_user_rejects_expired_token() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    let now = chrono::Utc::now().timestamp();
    let expired = app
        .jwt_handler
        .encode(
            &Claims::new()
                .with_subject("alice")
                .with_issued_at(now - 120)
                .with_expiration(now - 60),
        )
        .unwrap();

    let response = app
        .get_authenticated("/api/users/me", &expired)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["message"], "Token has expired");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    let forged = auth::JwtHandler::new(b"some-other-secret-at-least-32-bytes-long")
        .encode(
            &Claims::new()
                .with_subject("alice")
                .with_expiration(chrono::Utc::now().timestamp() + 600),
        )
        .unwrap();

    let response = app
        .get_authenticated("/api/users/me", &forged)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;
    let token = app.token_for("alice", STRONG_PASSWORD).await;

    let wrong_current = app
        .put_authenticated("/api/users/me/password", &token)
        .json(&json!({
            "current_password": "WrongHorse9!Battery",
            "new_password": "Another7$Secret"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(wrong_current.status(), StatusCode::UNAUTHORIZED);

    let weak_new = app
        .put_authenticated("/api/users/me/password", &token)
        .json(&json!({
            "current_password": STRONG_PASSWORD,
            "new_password": "short"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(weak_new.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let changed = app
        .put_authenticated("/api/users/me/password", &token)
        .json(&json!({
            "current_password": STRONG_PASSWORD,
            "new_password": "Another7$Secret"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(changed.status(), StatusCode::NO_CONTENT);

    // Old password no longer works, new one does
    assert_eq!(
        app.login("alice", STRONG_PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.login("alice", "Another7$Secret").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_deactivated_user_cannot_log_in_or_use_tokens() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;
    let token = app.token_for("alice", STRONG_PASSWORD).await;

    let response = app
        .delete_authenticated("/api/users/me", &token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let me = app
        .get_authenticated("/api/users/me", &token)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        app.login("alice", STRONG_PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = TestApp::spawn_with_login_limits(&["3 per day"]).await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    for _ in 0..3 {
        let response = app.login("alice", "WrongHorse9!Battery").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let throttled = app.login("alice", STRONG_PASSWORD).await;
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(throttled.headers().contains_key("retry-after"));

    let body: serde_json::Value = throttled.json().await.unwrap();
    assert_eq!(body["data"]["message"], "Too many requests");
}

#[tokio::test]
async fn test_forwarded_for_from_direct_client_does_not_reset_throttle() {
    let app = TestApp::spawn_with_login_limits(&["5 per day"]).await;

    let mut admitted = 0;
    for i in 0..20 {
        let response = app
            .login_request("alice", "WrongHorse9!Battery")
            .header("X-Forwarded-For", format!("198.51.100.{}", i))
            .send()
            .await
            .expect("Failed to execute request");
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 5);
}

#[tokio::test]
async fn test_trusted_proxy_counts_forwarded_clients_separately() {
    let app = TestApp::spawn_behind_proxy(&["2 per day"]).await;
    app.register("alice", "alice@example.com", STRONG_PASSWORD)
        .await;

    let login_from = |client: &'static str| {
        app.login_request("alice", STRONG_PASSWORD)
            // A spoofed left-most hop is ignored in favour of the proxy's entry
            .header("X-Forwarded-For", format!("192.0.2.99, {}", client))
            .send()
    };

    for _ in 0..2 {
        let response = login_from("203.0.113.1").await.expect("Failed to execute request");
        assert_eq!(response.status(), StatusCode::OK);
    }
    let throttled = login_from("203.0.113.1").await.expect("Failed to execute request");
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_client = login_from("203.0.113.2").await.expect("Failed to execute request");
    assert_eq!(other_client.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::spawn_with_login_limits(&["1 per day"]).await;

    let ping = app
        .get("/api/ping")
        .send()
        .await
        .expect("Failed to execute request");
    app.login("nobody", STRONG_PASSWORD).await;
    let throttled = app.login("nobody", STRONG_PASSWORD).await;
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);

    for response in [&ping, &throttled] {
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
        assert!(headers["content-security-policy"]
            .to_str()
            .unwrap()
            .starts_with("default-src 'self'"));
    }
}

#[tokio::test]
async fn test_ping() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/api/ping")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["rate_limit_backend"], "memory");
}
