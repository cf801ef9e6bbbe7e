mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/health")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn root_lists_api_areas() -> Result<()> {
    let server = common::ensure_server().await?;

    let body = reqwest::get(server.url("/")).await?.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["name"], "School ERP API");
    assert!(body["data"]["endpoints"]["students"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_enveloped_404() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::get(server.url("/api/v1/nothing-here")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    Ok(())
}
