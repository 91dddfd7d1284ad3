use std::fs;
use std::path::Path;
use tracing::info;

// Adds automatic logging to test
mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_page_server(body: &str, status: u16) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gold"))
            .respond_with(
                ResponseTemplate::new(status).set_body_raw(body.to_string(), "text/html; charset=utf-8"),
            )
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub async fn create_metal_api_server(mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }
}

fn write_config(dir: &Path, page_url: &str, api_url: &str, with_fallback: bool) -> String {
    let fallback = if with_fallback {
        r#"
          - name: "static fallback"
            sources:
              - type: fixed
                price: 920.0"#
    } else {
        ""
    };
    let config_content = format!(
        r#"
        storage:
          data_path: "{}"
        resolver:
          attempt_timeout_secs: 5
        tiers:
          - name: "regional market"
            markup_percentage: 0
            sources:
              - type: page
                name: "Test Market"
                url: "{page_url}/gold"
                keywords: ["水贝"]
          - name: "international"
            markup_percentage: 8
            sources:
              - type: metal_price_api
                base_url: "{api_url}"
                api_key: "test"{fallback}
        "#,
        dir.join("data").display(),
    );

    let config_path = dir.join("config.yaml");
    fs::write(&config_path, config_content).expect("Failed to write config file");
    config_path.to_str().unwrap().to_string()
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_page_source() {
    let page_server =
        test_utils::create_page_server("<p>今日水贝金价 918.5元/克</p>", 200).await;
    let api_server = test_utils::create_metal_api_server(r#"{"rates": {"CNY": 28000.0}}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &page_server.uri(), &api_server.uri(), true);

    let result = aurum::run_command(aurum::AppCommand::Single, Some(&config_path)).await;
    assert!(result.is_ok(), "Single fetch failed with: {:?}", result.err());

    let json = fs::read_to_string(dir.path().join("data").join("gold_prices.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    info!(?records, "Recorded quotes");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["price"], 918.5);
    assert_eq!(records[0]["source"], "Test Market");

    let result = aurum::run_command(aurum::AppCommand::Stats { days: 7 }, Some(&config_path)).await;
    assert!(result.is_ok(), "Stats failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_falls_back_to_international_tier_with_markup() {
    let page_server = test_utils::create_page_server("", 503).await;
    let api_server = test_utils::create_metal_api_server(r#"{"rates": {"CNY": 28000.0}}"#).await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &page_server.uri(), &api_server.uri(), true);

    aurum::run_command(aurum::AppCommand::Single, Some(&config_path))
        .await
        .unwrap();

    let csv = fs::read_to_string(dir.path().join("data").join("gold_prices.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,source,price,raw_text,error,note")
    );
    let row = lines.next().unwrap();
    // 28000 / 31.1035 = 900.22, plus 8%
    assert!(row.contains("MetalPriceAPI (estimated)"));
    assert!(row.contains("972.24"));
}

#[test_log::test(tokio::test)]
async fn test_exhausted_sources_fail_but_are_recorded() {
    let page_server = test_utils::create_page_server("", 500).await;
    let api_server = test_utils::create_metal_api_server("{}").await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &page_server.uri(), &api_server.uri(), false);

    let result = aurum::run_command(aurum::AppCommand::Single, Some(&config_path)).await;
    assert!(result.is_err());

    let json = fs::read_to_string(dir.path().join("data").join("gold_prices.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0]["price"].is_null());
    assert_eq!(records[0]["error"], "no source available");
}

#[test_log::test(tokio::test)]
async fn test_history_maintenance_commands() {
    let page_server =
        test_utils::create_page_server("<p>水贝 930元/克</p>", 200).await;
    let api_server = test_utils::create_metal_api_server("{}").await;
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), &page_server.uri(), &api_server.uri(), true);

    aurum::run_command(aurum::AppCommand::Single, Some(&config_path))
        .await
        .unwrap();
    aurum::run_command(aurum::AppCommand::Test, Some(&config_path))
        .await
        .unwrap();

    let export_path = dir.path().join("export.csv");
    aurum::run_command(
        aurum::AppCommand::Export {
            file: Some(export_path.clone()),
        },
        Some(&config_path),
    )
    .await
    .unwrap();
    let exported = fs::read(&export_path).unwrap();
    assert!(exported.starts_with(b"\xEF\xBB\xBF"));
    assert_eq!(String::from_utf8_lossy(&exported).lines().count(), 2);

    aurum::run_command(aurum::AppCommand::Prune { days: 1 }, Some(&config_path))
        .await
        .unwrap();
    aurum::run_command(aurum::AppCommand::Clear, Some(&config_path))
        .await
        .unwrap();

    let json = fs::read_to_string(dir.path().join("data").join("gold_prices.json")).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert!(records.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.yaml");

    let result = aurum::run_command(
        aurum::AppCommand::Stats { days: 7 },
        Some(missing.to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());
}
