use chrono::{TimeZone, Utc};
use fleet_trips::config::ClientOptions;
use fleet_trips::wialon::UnitStatus;
use fleet_trips::FleetClient;
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn params_mention(text: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |req: &Request| {
        req.url
            .query_pairs()
            .any(|(k, v)| k == "params" && v.contains(text))
    }
}

async fn mock_svc(server: &MockServer, svc: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/wialon/ajax.html"))
        .and(query_param("svc", svc))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn session_server() -> MockServer {
    let server = MockServer::start().await;
    mock_svc(
        &server,
        "token/login",
        json!({ "eid": "sid-9", "user": { "id": 3, "nm": "dispatch" } }),
    )
    .await;
    server
}

fn client(server: &MockServer) -> FleetClient {
    let options = ClientOptions::default().with_wialon_url(&server.uri());
    FleetClient::new_with_options("https://fleet.example.com", "anon-key", options)
}

#[tokio::test]
async fn test_units_with_bound_drivers() {
    let server = session_server().await;
    Mock::given(method("GET"))
        .and(path("/wialon/ajax.html"))
        .and(query_param("svc", "core/update_data_flags"))
        .and(params_mention("avl_unit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "i": 101, "f": 5121, "d": {
                "id": 101, "nm": "21H - ADS 4865",
                "pos": { "t": 1721466000, "y": -17.82, "x": 31.04, "s": 72, "c": 180, "z": 1480, "sc": 12 },
                "sens": {}
            }},
            { "i": 102, "f": 5121, "d": { "id": 102, "nm": "22H - AGZ 1286", "pos": null, "sens": [] } },
            { "i": 103, "f": 0, "d": null }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wialon/ajax.html"))
        .and(query_param("svc", "core/update_data_flags"))
        .and(params_mention("avl_resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "i": 7, "f": 257, "d": {
                "id": 7, "nm": "Matanuska",
                "drvrs": {
                    "1": { "id": 1, "n": "Tendai Moyo", "bu": 101, "p": "+263771000000" },
                    "2": { "id": 2, "n": "Spare", "bu": 0 }
                }
            }}
        ])))
        .mount(&server)
        .await;

    let session = client(&server).wialon();
    session.initialize("token").await.unwrap();
    let units = session.get_units().await.unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(units[0].status, UnitStatus::Moving);
    assert_eq!(units[0].position.as_ref().unwrap().speed, 72.0);
    assert_eq!(units[0].driver.as_ref().unwrap().name, "Tendai Moyo");
    assert_eq!(units[1].status, UnitStatus::Offline);
    assert!(units[1].driver.is_none());
}

#[tokio::test]
async fn test_resources_and_history() {
    let server = session_server().await;
    mock_svc(
        &server,
        "core/update_data_flags",
        json!([{ "i": 7, "f": 8193, "d": {
            "id": 7, "nm": "Matanuska",
            "rep": { "1": { "id": 1, "n": "Trips", "ct": "avl_unit" } }
        }}]),
    )
    .await;
    mock_svc(
        &server,
        "messages/load_interval",
        json!({ "count": 2, "messages": [
            { "t": 1721466000, "pos": { "t": 1721466000, "y": -17.8, "x": 31.0, "s": 0 }, "p": { "ign": 0 } },
            { "t": 1721466060, "pos": null, "p": {} }
        ]}),
    )
    .await;

    let session = client(&server).wialon();
    session.initialize("token").await.unwrap();

    let resources = session.get_resources().await.unwrap();
    assert_eq!(resources[0].name, "Matanuska");
    assert_eq!(resources[0].reports[0].name, "Trips");
    assert_eq!(resources[0].reports[0].item_type, "avl_unit");

    let from = Utc.with_ymd_and_hms(2024, 7, 20, 9, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2024, 7, 20, 10, 0, 0).unwrap();
    let messages = session.unit_history(101, from, to).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].position.as_ref().unwrap().latitude, -17.8);
    assert_eq!(messages[0].params["ign"], 0);
    assert!(messages[1].position.is_none());
}

#[tokio::test]
async fn test_execute_command() {
    let server = session_server().await;
    mock_svc(
        &server,
        "core/search_item",
        json!({ "item": { "id": 101, "nm": "21H - ADS 4865", "cmds": [] }, "flags": 513 }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/wialon/ajax.html"))
        .and(query_param("svc", "unit/exec_cmd"))
        .and(query_param("sid", "sid-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).wialon();
    session.initialize("token").await.unwrap();
    let result = session
        .execute_command(101, "engine_unblock", &HashMap::new())
        .await
        .unwrap();
    assert_eq!(result.message, "Command executed successfully");
}

#[tokio::test]
async fn test_expired_session_is_reported() {
    let server = session_server().await;
    mock_svc(&server, "core/search_item", json!({ "error": 1 })).await;

    let session = client(&server).wialon();
    session.initialize("token").await.unwrap();
    let err = session.get_unit(101).await.unwrap_err();
    assert_eq!(err.to_string(), "Wialon error 1: Invalid session");
}

#[tokio::test]
async fn test_malformed_unit_is_an_error() {
    let server = session_server().await;
    mock_svc(
        &server,
        "core/search_item",
        json!({ "item": { "id": 101, "pos": null }, "flags": 1025 }),
    )
    .await;
    mock_svc(
        &server,
        "core/update_data_flags",
        json!([{ "i": 101, "f": 5121, "d": { "id": 101, "sens": {} } }]),
    )
    .await;

    let session = client(&server).wialon();
    session.initialize("token").await.unwrap();

    let err = session.get_unit(101).await.unwrap_err();
    assert!(err.to_string().contains("nm"), "{}", err);
    let err = session.get_units().await.unwrap_err();
    assert!(err.to_string().contains("nm"), "{}", err);
}

#[tokio::test]
async fn test_unknown_unit_is_none() {
    let server = session_server().await;
    mock_svc(&server, "core/search_item", json!({ "item": null })).await;

    let session = client(&server).wialon();
    session.initialize("token").await.unwrap();
    assert!(session.get_unit(404).await.unwrap().is_none());
}
