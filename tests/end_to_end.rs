//! End-to-end tests over a real socket.

use serde_json::{json, Value};

use lambda_offline::functions::{sync_handler_fn, HandlerTable, StaticResolver};
use lambda_offline::http_server::{EmulatorConfig, HttpServer};

fn local_config() -> EmulatorConfig {
    EmulatorConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_post_echo_over_http() {
    let resolver = StaticResolver::new().with(
        "test_post",
        sync_handler_fn(|event: Value, _, _| {
            Ok(Some(json!({"statusCode": 200, "body": event["body"].clone()})))
        }),
    );
    let server = HttpServer::new(local_config(), HandlerTable::from_static(&resolver)).unwrap();
    let handle = server.spawn().await.unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/dev/test", handle.local_addr()))
        .json(&json!({"foo": "bar"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"foo": "bar"}));

    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_source_ip_comes_from_the_connection() {
    let resolver = StaticResolver::new().with(
        "whoami_get",
        sync_handler_fn(|event: Value, _, _| {
            Ok(Some(json!({
                "body": event["requestContext"]["identity"]["sourceIp"].clone()
            })))
        }),
    );
    let server = HttpServer::new(local_config(), HandlerTable::from_static(&resolver)).unwrap();
    let handle = server.spawn().await.unwrap();

    let body = reqwest::get(format!("http://{}/dev/whoami", handle.local_addr()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "127.0.0.1");

    handle.stop().await.unwrap();
}

#[cfg(unix)]
mod executable {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_executable(path: &Path, script: &str) {
        fs::write(path, script).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_discovered_executable_handler_is_served() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("lambdas")).unwrap();
        fs::create_dir(root.path().join("out")).unwrap();
        fs::write(root.path().join("lambdas").join("hello_get.js"), "").unwrap();
        fs::write(root.path().join("lambdas").join("missing_get.js"), "").unwrap();
        write_executable(
            &root.path().join("out").join("hello_get"),
            "#!/bin/sh\ncat > /dev/null\necho '{\"statusCode\": 200, \"body\": \"hello from sh\"}'\n",
        );

        let config = EmulatorConfig {
            root: root.path().to_path_buf(),
            ..local_config()
        };
        let handle = HttpServer::from_directory(config)
            .unwrap()
            .spawn()
            .await
            .unwrap();
        let base = format!("http://{}", handle.local_addr());

        let response = reqwest::get(format!("{}/dev/hello", base)).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "hello from sh");

        let response = reqwest::get(format!("{}/dev/missing", base)).await.unwrap();
        assert_eq!(response.status().as_u16(), 502);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["errorType"], "HANDLER_NOT_FOUND");

        handle.stop().await.unwrap();
    }
}
