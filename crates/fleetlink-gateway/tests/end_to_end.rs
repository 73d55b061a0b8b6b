//! Gateway scenarios over the simulated fleet.

use fleetlink_core::{DeviceId, DeviceStatus, ErrorKind};
use fleetlink_gateway::{Gateway, GatewayConfig, GatewayError};
use fleetlink_router::{BusinessDomain, DeviceMessage};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

const CHANNEL: &str = "fleetlink:device:status:change";

fn demo() -> Gateway {
    Gateway::new(GatewayConfig::demo()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_first_round_brings_fleet_online() {
    let gateway = demo();

    let reports = gateway.check_all().await;

    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(|r| r.reachable && r.status == DeviceStatus::Online));
    assert_eq!(gateway.cache().published(CHANNEL).len(), 5);
    assert_eq!(gateway.stats().total, 5);

    // A second round changes nothing.
    gateway.check_all().await;
    assert_eq!(gateway.cache().published(CHANNEL).len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_offline_device_recovers() {
    let gateway = demo();
    let cam = DeviceId::from("CAM002");
    gateway.check_device(&cam).await.unwrap();

    gateway
        .simulator("DAHUA")
        .unwrap()
        .fail_next(ErrorKind::DeviceOffline, 1);
    let report = gateway.check_device(&cam).await.unwrap();

    assert!(!report.reachable);
    assert_eq!(report.status, DeviceStatus::Offline);
    // Not retryable: one attempt only.
    assert_eq!(report.retry_count, 0);

    let report = gateway.check_device(&cam).await.unwrap();
    assert!(report.reachable);
    assert_eq!(report.status, DeviceStatus::Online);
}

#[tokio::test(start_paused = true)]
async fn test_network_errors_exhaust_retries() {
    let gateway = demo();
    let handle = gateway.simulator("hikvision").unwrap();
    handle.fail_next(ErrorKind::NetworkError, 10);

    let report = gateway.check_device(&DeviceId::from("CAM001")).await.unwrap();

    assert!(!report.reachable);
    assert_eq!(report.retry_count, 3);
    assert_eq!(handle.calls_for("test_connection"), 4);
    assert_eq!(report.status, DeviceStatus::Offline);
}

#[tokio::test(start_paused = true)]
async fn test_device_fault_records_message() {
    let gateway = demo();
    let id = DeviceId::from("POS-01");
    gateway
        .simulator("ENTROPY")
        .unwrap()
        .fail_next(ErrorKind::DeviceFault, 1);

    let report = gateway.check_device(&id).await.unwrap();
    assert_eq!(report.status, DeviceStatus::Fault);

    let record = gateway.coordinator().status_record(&id).await.unwrap();
    let message = record.last_error_message.unwrap();
    assert!(message.contains("DEVICE_FAULT"), "{message}");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_device() {
    let gateway = demo();
    let err = gateway
        .check_device(&DeviceId::from("NOPE"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnknownDevice(_)));
}

#[rstest]
#[case(BusinessDomain::Access, "ACC-01", json!({"card_number": "0042"}))]
#[case(BusinessDomain::Attendance, "ATT-01", json!({"person_id": "P7"}))]
#[case(BusinessDomain::Consume, "POS-01", json!({"amount": 12.5}))]
#[tokio::test]
async fn test_domain_events_mark_device_online(
    #[case] domain: BusinessDomain,
    #[case] device: &str,
    #[case] payload: serde_json::Value,
) {
    let gateway = demo();
    let message = DeviceMessage::new(device, "event", payload);

    let reply = gateway.handle_event(domain, &message).await.unwrap();

    assert_eq!(reply["accepted"], json!(true));
    assert_eq!(reply["domain"], json!(domain.as_key()));
    assert_eq!(
        gateway.coordinator().get_status(&DeviceId::from(device)).await,
        DeviceStatus::Online
    );
}

#[tokio::test]
async fn test_domain_event_validation() {
    let gateway = demo();
    let message = DeviceMessage::new("ACC-01", "card_swipe", json!({}));

    let err = gateway
        .handle_event(BusinessDomain::Access, &message)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::ValidationFailed);
    assert_eq!(
        gateway.coordinator().get_status(&DeviceId::from("ACC-01")).await,
        DeviceStatus::Unknown
    );
}

#[tokio::test(start_paused = true)]
async fn test_command_reaches_adapter() {
    let gateway = demo();
    let message = DeviceMessage::new(
        "ACC-01",
        "dispatch_person",
        json!({"person_id": "P1", "name": "Ana", "card_number": "0042"}),
    );

    let reply = gateway.handle_command(&message).await.unwrap();

    assert_eq!(reply["succeeded"], json!(1));
    assert_eq!(reply["retryCount"], json!(0));
    assert_eq!(gateway.simulator("ZKTECO").unwrap().stored_persons(), vec!["P1"]);

    let query = DeviceMessage::new("ACC-01", "query_persons", json!({}));
    let reply = gateway.handle_command(&query).await.unwrap();
    assert_eq!(reply["persons"], json!(["P1"]));
}

#[tokio::test(start_paused = true)]
async fn test_adapter_route_must_match_device_protocol() {
    let gateway = demo();
    let message = DeviceMessage::new("ACC-01", "test_connection", json!({}));

    let err = gateway
        .router()
        .dispatch_to_adapter("dahua", &message)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::DeviceNotSupported);
    assert_eq!(gateway.simulator("DAHUA").unwrap().calls_for("test_connection"), 0);
    assert_eq!(gateway.simulator("ZKTECO").unwrap().calls_for("test_connection"), 0);
    assert_eq!(
        gateway.coordinator().get_status(&DeviceId::from("ACC-01")).await,
        DeviceStatus::Unknown
    );

    gateway
        .router()
        .dispatch_to_adapter("ZKTECO", &message)
        .await
        .unwrap();
    assert_eq!(gateway.simulator("ZKTECO").unwrap().calls_for("test_connection"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_command_failure_updates_status() {
    let gateway = demo();
    gateway
        .simulator("ZKTECO")
        .unwrap()
        .fail_next(ErrorKind::AuthenticationFailed, 1);

    let message = DeviceMessage::new("ACC-01", "query_status", json!({}));
    let err = gateway.handle_command(&message).await.unwrap_err();

    assert!(matches!(err, GatewayError::Protocol(ref e) if e.kind == ErrorKind::AuthenticationFailed));
    assert_eq!(
        gateway.coordinator().get_status(&DeviceId::from("ACC-01")).await,
        DeviceStatus::Fault
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_rounds() {
    let gateway = demo();
    let history = gateway.run(2, Duration::from_secs(5)).await;

    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|round| round.len() == 5));

    let table = gateway.status_table().await;
    assert_eq!(table.len(), 5);
    assert!(table.iter().all(|r| r.status == DeviceStatus::Online));
}

#[tokio::test]
async fn test_status_table_before_any_check() {
    let gateway = demo();
    let table = gateway.status_table().await;
    assert!(table.iter().all(|r| r.status == DeviceStatus::Unknown));
    // Nothing was persisted for unseen devices.
    assert!(gateway.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_gateway_from_toml() {
    let config = GatewayConfig::from_toml_str(
        r#"
        [pipeline.retry]
        max_retries = 1

        [heartbeat]
        enabled = false

        [[devices]]
        id = "GATE-1"
        device_type = "ACCESS"
        protocol = "ZKTECO"
        manufacturer = "ZKTECO"
        "#,
    )
    .unwrap();
    let gateway = Gateway::new(config).unwrap();
    let handle = gateway.simulator("ZKTECO").unwrap();
    handle.fail_next(ErrorKind::DeviceBusy, 5);

    let report = gateway.check_device(&DeviceId::from("GATE-1")).await.unwrap();

    assert_eq!(report.retry_count, 1);
    assert_eq!(handle.calls_for("test_connection"), 2);
    // Busy says nothing about the device's status.
    assert_eq!(report.status, DeviceStatus::Unknown);
    assert_eq!(gateway.adapter_descriptors().len(), 5);
}
