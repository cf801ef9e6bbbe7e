mod common;

use anyhow::Result;
use reqwest::StatusCode;
use school_erp_api::auth::{encode_token, Claims, Role};
use serde_json::json;

#[tokio::test]
async fn system_routes_require_token() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/v1/setup/trusts")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn malformed_token_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .get(server.url("/api/v1/system/health"))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn trust_admin_cannot_use_setup() -> Result<()> {
    let server = common::ensure_server().await?;
    let claims = Claims::trust(3, "admin@gvt.edu".into(), Role::TrustAdmin, 1);
    let token = encode_token(&claims, common::TEST_JWT_SECRET)?;

    let res = reqwest::Client::new()
        .post(server.url("/api/v1/setup/trusts"))
        .bearer_auth(token)
        .json(&json!({ "trust_name": "Green Valley" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn system_login_validates_before_touching_database() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .post(server.url("/api/v1/auth/system/login"))
        .json(&json!({ "username": "", "password": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["username"], "is required");
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .post(server.url("/api/v1/auth/system/login"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"]["code"], "INVALID_JSON");
    Ok(())
}
