//! API endpoint integration tests

use serde_json::json;

use crate::common::{CallerFixtures, TestApp};

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/health", None).await;
    response.assert_ok();
    assert_eq!(response.data()["status"], "healthy");

    app.get("/api/v1/health/live", None).await.assert_ok();
    app.get("/api/v1/health/ready", None).await.assert_ok();

    let detailed = app.get("/api/v1/health/detailed", None).await;
    detailed.assert_ok();
    assert_eq!(detailed.data()["components"]["database"]["status"], "healthy");
}

#[tokio::test]
async fn test_key_routes_require_bearer_token() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/keys", None).await;
    response.assert_unauthorized();
    assert_eq!(response.error_kind(), "unauthenticated");

    let response = app
        .post_json("/api/v1/keys/resolve", json!({"service": "openai"}), Some("not-a-jwt"))
        .await;
    response.assert_unauthorized();
    assert_eq!(response.error_kind(), "unauthenticated");
}

#[tokio::test]
async fn test_save_key_returns_summary_without_secret() {
    let app = TestApp::new().await;
    let user = CallerFixtures::acme_user();
    let token = app.token_for(&user);

    let response = app
        .post_json(
            "/api/v1/keys",
            json!({"service": "openai", "key": "sk-proj-abcdefgh5678", "name": "My key"}),
            Some(&token),
        )
        .await;
    response.assert_created();

    let data = response.data();
    assert_eq!(data["hint"], "5678");
    assert_eq!(data["scope"], "private");
    assert_eq!(data["owner_id"], user.id.to_string());
    assert_eq!(data["name"], "My key");
    assert!(data.get("ciphertext").is_none());
    assert!(!response.text().contains("sk-proj-abcdefgh5678"));
}

#[tokio::test]
async fn test_save_then_resolve() {
    let app = TestApp::new().await;
    let user = CallerFixtures::acme_user();
    let token = app.token_for(&user);

    let saved = app
        .post_json(
            "/api/v1/keys",
            json!({"service": "openai", "key": "sk-live-0001"}),
            Some(&token),
        )
        .await
        .data();

    let response = app
        .post_json("/api/v1/keys/resolve", json!({"service": "openai"}), Some(&token))
        .await;
    response.assert_ok();

    let data = response.data();
    assert_eq!(data["key"], "sk-live-0001");
    assert_eq!(data["key_id"], saved["id"]);
    assert_eq!(data["scope"], "private");
    assert!(data.get("ciphertext").is_none());
}

#[tokio::test]
async fn test_resolve_responses_are_not_cacheable() {
    let app = TestApp::new().await;
    let user = CallerFixtures::acme_user();
    let token = app.token_for(&user);

    app.post_json(
        "/api/v1/keys",
        json!({"service": "openai", "key": "sk-live-0001"}),
        Some(&token),
    )
    .await
    .assert_created();

    let response = app
        .post_json("/api/v1/keys/resolve", json!({"service": "openai"}), Some(&token))
        .await;

    let cache_control = response.headers.get("cache-control").unwrap().to_str().unwrap();
    assert!(cache_control.contains("no-store"));
    assert!(response.headers.contains_key("x-content-type-options"));
}

#[tokio::test]
async fn test_resolve_not_found_carries_hint() {
    let app = TestApp::new().await;
    let token = app.token_for(&CallerFixtures::acme_user());

    let response = app
        .post_json("/api/v1/keys/resolve", json!({"service": "mistral"}), Some(&token))
        .await;
    response.assert_not_found();

    let body = response.json();
    assert_eq!(body["error"], "not_found");
    assert!(body["hint"].as_str().unwrap().contains("mistral"));
}

#[tokio::test]
async fn test_missing_fields_are_invalid_input() {
    let app = TestApp::new().await;
    let token = app.token_for(&CallerFixtures::acme_user());

    let response = app
        .post_json("/api/v1/keys", json!({"service": "openai"}), Some(&token))
        .await;
    response.assert_bad_request();
    assert_eq!(response.error_kind(), "invalid_input");

    let response = app
        .post_json("/api/v1/keys/resolve", json!({}), Some(&token))
        .await;
    response.assert_bad_request();
    assert_eq!(response.error_kind(), "invalid_input");

    let response = app.post_raw("/api/v1/keys", "{not json", Some(&token)).await;
    response.assert_bad_request();
    assert_eq!(response.error_kind(), "invalid_input");

    let response = app.delete("/api/v1/keys/not-a-uuid", Some(&token)).await;
    response.assert_bad_request();
    assert_eq!(response.error_kind(), "invalid_input");
}

#[tokio::test]
async fn test_org_admin_cannot_create_platform_key() {
    let app = TestApp::new().await;
    let token = app.token_for(&CallerFixtures::acme_admin());

    let response = app
        .post_json(
            "/api/v1/keys",
            json!({"service": "openai", "key": "sk-1", "scope": "platform"}),
            Some(&token),
        )
        .await;
    response.assert_forbidden();
    assert_eq!(response.error_kind(), "forbidden");
}

#[tokio::test]
async fn test_change_scope_flow() {
    let app = TestApp::new().await;
    let admin = CallerFixtures::acme_admin();
    let admin_token = app.token_for(&admin);
    let root_token = app.token_for(&CallerFixtures::super_admin());

    let saved = app
        .post_json(
            "/api/v1/keys",
            json!({"service": "openai", "key": "sk-team", "scope": "organization"}),
            Some(&admin_token),
        )
        .await
        .data();
    let id = saved["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/keys/{}/scope", id);

    app.patch_json(&uri, json!({"scope": "platform"}), Some(&admin_token))
        .await
        .assert_forbidden();

    let response = app
        .patch_json(&uri, json!({"scope": "platform"}), Some(&root_token))
        .await;
    response.assert_ok();
    assert_eq!(response.data(), json!({"id": id, "scope": "platform"}));

    let response = app
        .patch_json(&uri, json!({"scope": "galaxy"}), Some(&root_token))
        .await;
    response.assert_bad_request();
}

#[tokio::test]
async fn test_list_keys_reports_capabilities() {
    let app = TestApp::new().await;
    let admin = CallerFixtures::acme_admin();
    let user = CallerFixtures::acme_user();
    let admin_token = app.token_for(&admin);
    let user_token = app.token_for(&user);

    app.post_json(
        "/api/v1/keys",
        json!({"service": "openai", "key": "sk-team", "scope": "organization"}),
        Some(&admin_token),
    )
    .await
    .assert_created();
    app.post_json(
        "/api/v1/keys",
        json!({"service": "gemini", "key": "sk-admin-own"}),
        Some(&admin_token),
    )
    .await
    .assert_created();

    let listing = app.get("/api/v1/keys", Some(&user_token)).await.data();
    assert_eq!(listing["keys"].as_array().unwrap().len(), 1);
    assert_eq!(listing["can_create_platform"], false);
    assert_eq!(listing["can_create_organization"], false);

    let listing = app
        .get("/api/v1/keys?service=gemini", Some(&admin_token))
        .await
        .data();
    let keys = listing["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["service"], "gemini");
    assert_eq!(listing["can_create_organization"], true);
}

#[tokio::test]
async fn test_delete_requires_ownership() {
    let app = TestApp::new().await;
    let owner = CallerFixtures::acme_user();
    let colleague = CallerFixtures::acme_user();
    let owner_token = app.token_for(&owner);
    let colleague_token = app.token_for(&colleague);

    let saved = app
        .post_json(
            "/api/v1/keys",
            json!({"service": "openai", "key": "sk-mine"}),
            Some(&owner_token),
        )
        .await
        .data();
    let uri = format!("/api/v1/keys/{}", saved["id"].as_str().unwrap());

    app.delete(&uri, Some(&colleague_token)).await.assert_forbidden();

    let response = app.delete(&uri, Some(&owner_token)).await;
    response.assert_ok();
    assert_eq!(response.data()["deleted"], true);

    app.delete(&uri, Some(&owner_token)).await.assert_not_found();
}

#[tokio::test]
async fn test_record_usage() {
    let app = TestApp::new().await;
    let token = app.token_for(&CallerFixtures::globex_user());

    let response = app
        .post_json(
            "/api/v1/usage",
            json!({
                "service": "openai",
                "endpoint": "chat.completions",
                "input_tokens": 812,
                "output_tokens": 64,
                "cost_usd": 0.0131,
                "metadata": {"model": "gpt-4o-mini"}
            }),
            Some(&token),
        )
        .await;
    response.assert_ok();
    assert_eq!(response.data()["recorded"], true);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_events WHERE endpoint = ?")
        .bind("chat.completions")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let response = app
        .post_json("/api/v1/usage", json!({"service": "openai", "input_tokens": -1}), Some(&token))
        .await;
    response.assert_bad_request();
}
