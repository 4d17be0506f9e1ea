mod common;

use bff_gateway::services::registry::ServiceDescriptor;
use bff_gateway::services::warmup::{
    ProbeStatus, ServiceHealth, WarmupMode, WarmupResult, HTTP_ONLY_MESSAGE, INVALID_PONG_MESSAGE,
};
use common::{health_endpoint, slow_health_endpoint, warmup_service, TestApp};
use serde_json::json;
use service_core::bus::InMemoryBus;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record<'a>(result: &'a WarmupResult, name: &str) -> &'a ServiceHealth {
    result
        .services
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no record for {}", name))
}

/// `a` takes part in the bus, `b` is HTTP-only.
fn two_service_registry(a_url: &str, b_url: &str) -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::bus_participant("a", a_url, "a.ping"),
        ServiceDescriptor::http_only("b", b_url),
    ]
}

#[tokio::test]
async fn full_warmup_all_healthy() {
    let a = slow_health_endpoint(Duration::from_millis(10)).await;
    let b = slow_health_endpoint(Duration::from_millis(8)).await;
    let bus = InMemoryBus::new();
    bus.reply_after(
        "a.ping",
        &json!({ "pong": true, "service": "a" }),
        Duration::from_millis(5),
    );

    let warmup = warmup_service(two_service_registry(&a.uri(), &b.uri()), &bus);
    let result = warmup.run(WarmupMode::Full).await;

    assert!(result.success);
    assert!(result.bus_connected);
    assert_eq!(result.summary.total, 2);
    assert_eq!(result.summary.http_healthy, 2);
    assert_eq!(result.summary.bus_healthy, 1);
    assert_eq!(result.summary.fully_healthy, 2);

    let a_record = record(&result, "a");
    assert_eq!(a_record.http_status, ProbeStatus::Ok);
    assert_eq!(a_record.bus_status, ProbeStatus::Ok);
    assert!(a_record.http_response_time_ms >= 10);

    let b_record = record(&result, "b");
    assert_eq!(b_record.http_status, ProbeStatus::Ok);
    assert_eq!(b_record.bus_status, ProbeStatus::Skipped);
    assert_eq!(b_record.bus_message.as_deref(), Some(HTTP_ONLY_MESSAGE));

    // Only the participant was pinged, with the ping payload.
    let requests = bus.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].subject, "a.ping");
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].payload).unwrap();
    assert_eq!(sent["ping"], true);
    assert!(sent["timestamp"].is_string());
}

#[tokio::test]
async fn bus_timeout_only_affects_its_own_service() {
    let a = health_endpoint(200).await;
    let b = health_endpoint(200).await;
    let bus = InMemoryBus::new();
    bus.reply("a.ping", &json!({ "pong": true }));

    let warmup = warmup_service(two_service_registry(&a.uri(), &b.uri()), &bus);
    let healthy = warmup.run(WarmupMode::Full).await;
    assert!(healthy.success);

    bus.hang("a.ping");
    let degraded = warmup.run(WarmupMode::Full).await;

    let a_record = record(&degraded, "a");
    assert_eq!(a_record.http_status, ProbeStatus::Ok);
    assert_eq!(a_record.bus_status, ProbeStatus::Error);
    assert!(a_record.bus_response_time_ms >= common::BUS_TIMEOUT_MS);
    assert_eq!(degraded.summary.fully_healthy, 1);
    assert_eq!(degraded.summary.bus_healthy, 0);
    assert!(!degraded.success);
    assert!(!degraded.bus_connected);

    let before = record(&healthy, "b");
    let after = record(&degraded, "b");
    assert_eq!(before.http_status, after.http_status);
    assert_eq!(before.bus_status, after.bus_status);
    assert_eq!(before.bus_message, after.bus_message);
}

#[tokio::test]
async fn one_failing_http_endpoint_out_of_three() {
    let ok_one = health_endpoint(200).await;
    let ok_two = health_endpoint(200).await;
    let failing = health_endpoint(500).await;
    let bus = InMemoryBus::new();
    bus.reply("auth.ping", &json!({ "pong": true }));
    bus.reply("course.ping", &json!({ "pong": true }));

    let services = vec![
        ServiceDescriptor::bus_participant("auth-service", ok_one.uri(), "auth.ping"),
        ServiceDescriptor::http_only("user-api", failing.uri()),
        ServiceDescriptor::bus_participant("course-service", ok_two.uri(), "course.ping"),
    ];
    let result = warmup_service(services, &bus).run(WarmupMode::Full).await;

    assert_eq!(result.summary.http_healthy, 2);
    assert_eq!(result.summary.fully_healthy, 2);
    assert!(result.bus_connected);
    assert!(!result.success);

    let user_api = record(&result, "user-api");
    assert_eq!(user_api.http_status, ProbeStatus::Error);
    assert_eq!(user_api.http_message.as_deref(), Some("HTTP 500"));
    assert_eq!(user_api.bus_status, ProbeStatus::Skipped);

    assert_eq!(record(&result, "auth-service").http_status, ProbeStatus::Ok);
    assert_eq!(record(&result, "course-service").http_status, ProbeStatus::Ok);

    // Registry order is preserved.
    let names: Vec<_> = result.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["auth-service", "user-api", "course-service"]);
}

#[tokio::test]
async fn non_participant_is_skipped_in_every_mode() {
    let a = health_endpoint(200).await;
    let b = health_endpoint(503).await;
    let bus = InMemoryBus::new();
    bus.reply("a.ping", &json!({ "pong": true }));

    let warmup = warmup_service(two_service_registry(&a.uri(), &b.uri()), &bus);

    for mode in [WarmupMode::Full, WarmupMode::HttpOnly, WarmupMode::BusOnly] {
        let result = warmup.run(mode).await;
        let b_record = record(&result, "b");
        assert_eq!(b_record.bus_status, ProbeStatus::Skipped, "mode {:?}", mode);
        assert_eq!(
            b_record.bus_message.as_deref(),
            Some(HTTP_ONLY_MESSAGE),
            "mode {:?}",
            mode
        );
    }
}

#[tokio::test]
async fn http_only_mode_never_touches_the_bus() {
    let a = health_endpoint(200).await;
    let b = health_endpoint(200).await;
    let bus = InMemoryBus::new();

    let result = warmup_service(two_service_registry(&a.uri(), &b.uri()), &bus)
        .run(WarmupMode::HttpOnly)
        .await;

    assert!(bus.requests().is_empty());
    assert!(result
        .services
        .iter()
        .all(|s| s.bus_status == ProbeStatus::Skipped));
    assert_eq!(result.summary.http_healthy, 2);
    assert_eq!(result.summary.bus_healthy, 0);
    assert_eq!(result.summary.fully_healthy, 2);
    assert!(result.success);
}

#[tokio::test]
async fn bus_only_mode_never_touches_http() {
    let untouched = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&untouched)
        .await;

    let bus = InMemoryBus::new();
    bus.reply("a.ping", &json!({ "pong": true }));

    let result = warmup_service(two_service_registry(&untouched.uri(), &untouched.uri()), &bus)
        .run(WarmupMode::BusOnly)
        .await;

    assert!(result
        .services
        .iter()
        .all(|s| s.http_status == ProbeStatus::Skipped));
    assert_eq!(result.summary.bus_healthy, 1);
    assert_eq!(result.summary.http_healthy, 0);
    // `b` was never probed, so only `a` counts.
    assert_eq!(result.summary.fully_healthy, 1);
    assert!(!result.success);
    assert!(result.bus_connected);
}

#[tokio::test]
async fn bus_only_mode_succeeds_when_every_service_pongs() {
    let bus = InMemoryBus::new();
    bus.reply("a.ping", &json!({ "pong": true }));
    bus.reply("c.ping", &json!({ "pong": true }));

    let services = vec![
        ServiceDescriptor::bus_participant("a", "http://127.0.0.1:1", "a.ping"),
        ServiceDescriptor::bus_participant("c", "http://127.0.0.1:1", "c.ping"),
    ];
    let result = warmup_service(services, &bus).run(WarmupMode::BusOnly).await;

    assert_eq!(result.summary.bus_healthy, 2);
    assert_eq!(result.summary.fully_healthy, 2);
    assert!(result.success);
    assert!(result.bus_connected);
}

#[tokio::test]
async fn repeated_runs_report_the_same_statuses() {
    let a = health_endpoint(200).await;
    let b = health_endpoint(502).await;
    let bus = InMemoryBus::new();
    bus.reply("a.ping", &json!({ "pong": true }));

    let warmup = warmup_service(two_service_registry(&a.uri(), &b.uri()), &bus);
    let first = warmup.run(WarmupMode::Full).await;
    let second = warmup.run(WarmupMode::Full).await;

    let statuses = |r: &WarmupResult| -> Vec<_> {
        r.services
            .iter()
            .map(|s| (s.name.clone(), s.http_status, s.bus_status))
            .collect()
    };
    assert_eq!(statuses(&first), statuses(&second));
    assert_eq!(first.summary.fully_healthy, second.summary.fully_healthy);
}

#[tokio::test]
async fn ping_without_pong_is_an_error() {
    let a = health_endpoint(200).await;
    let b = health_endpoint(200).await;
    let bus = InMemoryBus::new();
    bus.reply("a.ping", &json!({ "pong": false }));

    let result = warmup_service(two_service_registry(&a.uri(), &b.uri()), &bus)
        .run(WarmupMode::Full)
        .await;

    let a_record = record(&result, "a");
    assert_eq!(a_record.bus_status, ProbeStatus::Error);
    assert_eq!(a_record.bus_message.as_deref(), Some(INVALID_PONG_MESSAGE));
}

#[tokio::test]
async fn declared_error_and_missing_responder_are_bus_errors() {
    let a = health_endpoint(200).await;
    let bus = InMemoryBus::new();
    bus.reject("a.ping", "SYS_002", "Service unavailable");

    let services = vec![
        ServiceDescriptor::bus_participant("a", a.uri(), "a.ping"),
        ServiceDescriptor::bus_participant("ghost", a.uri(), "ghost.ping"),
    ];
    let result = warmup_service(services, &bus).run(WarmupMode::BusOnly).await;

    let a_record = record(&result, "a");
    assert_eq!(a_record.bus_status, ProbeStatus::Error);
    assert_eq!(a_record.bus_message.as_deref(), Some("Service unavailable"));

    let ghost = record(&result, "ghost");
    assert_eq!(ghost.bus_status, ProbeStatus::Error);
    assert!(ghost.bus_message.as_deref().unwrap().contains("ghost.ping"));
}

#[tokio::test]
async fn slow_and_unreachable_http_services_are_errors() {
    let slow = slow_health_endpoint(Duration::from_millis(common::HTTP_TIMEOUT_MS * 3)).await;
    let bus = InMemoryBus::new();

    let services = vec![
        ServiceDescriptor::http_only("slow", slow.uri()),
        // Nothing listens on the discard port.
        ServiceDescriptor::http_only("down", "http://127.0.0.1:9"),
    ];
    let result = warmup_service(services, &bus).run(WarmupMode::HttpOnly).await;

    let slow_record = record(&result, "slow");
    assert_eq!(slow_record.http_status, ProbeStatus::Error);
    assert!(slow_record
        .http_message
        .as_deref()
        .unwrap()
        .starts_with("Timed out"));
    assert!(slow_record.http_response_time_ms >= common::HTTP_TIMEOUT_MS);

    let down = record(&result, "down");
    assert_eq!(down.http_status, ProbeStatus::Error);
    assert!(down.http_message.is_some());

    assert_eq!(result.summary.http_healthy, 0);
    assert!(!result.success);
}

#[tokio::test]
async fn probes_run_concurrently() {
    let delay = Duration::from_millis(300);
    let one = slow_health_endpoint(delay).await;
    let two = slow_health_endpoint(delay).await;
    let three = slow_health_endpoint(delay).await;
    let bus = InMemoryBus::new();

    let services = vec![
        ServiceDescriptor::http_only("one", one.uri()),
        ServiceDescriptor::http_only("two", two.uri()),
        ServiceDescriptor::http_only("three", three.uri()),
    ];
    let result = warmup_service(services, &bus).run(WarmupMode::HttpOnly).await;

    assert_eq!(result.summary.http_healthy, 3);
    // Sequential probing would take at least three delays.
    assert!(result.summary.total_time_ms < 900);
}

#[tokio::test]
async fn warmup_endpoints_always_answer_200() {
    let a = health_endpoint(500).await;
    let b = health_endpoint(500).await;
    let bus = InMemoryBus::new();
    bus.hang("a.ping");

    let app = TestApp::spawn(two_service_registry(&a.uri(), &b.uri()), bus).await;

    let (status, body) = app.get_json("/system/warmup").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["busConnected"], false);
    assert_eq!(body["summary"]["total"], 2);
    assert_eq!(body["summary"]["fullyHealthy"], 0);
    assert_eq!(body["services"][0]["httpStatus"], "error");
    assert_eq!(body["services"][0]["busStatus"], "error");
    assert_eq!(body["services"][1]["busStatus"], "skipped");

    let (status, body) = app.get_json("/system/warmup/http").await;
    assert_eq!(status, 200);
    assert_eq!(body["services"][0]["busStatus"], "skipped");

    let (status, body) = app.get_json("/system/warmup/bus").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["summary"]["fullyHealthy"], 0);
    assert_eq!(body["services"][0]["httpStatus"], "skipped");
    assert_eq!(body["services"][0]["busStatus"], "error");
}
