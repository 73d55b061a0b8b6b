//! Routing flows across both tables.

use fleetlink_core::{ErrorKind, Transport};
use fleetlink_router::{BusinessDomain, DeviceMessage, MessageRouter, handler_fn};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_access_dispatch_before_and_after_registration() {
    let router = MessageRouter::new();
    let message = DeviceMessage::new("ACC-01", "card_swipe", json!({"card": "0004412"}));

    let err = router.dispatch("ACCESS", &message).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DeviceNotSupported);

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    router.register_handler(
        "ACCESS",
        handler_fn(move |m: DeviceMessage| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"card": m.payload["card"], "granted": true}))
            }
        }),
    );

    let reply = router.dispatch("ACCESS", &message).await.unwrap();
    assert_eq!(reply, json!({"card": "0004412", "granted": true}));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[rstest]
#[case(BusinessDomain::Access, "ACCESS")]
#[case(BusinessDomain::Attendance, "ATTENDANCE")]
#[case(BusinessDomain::Consume, "CONSUME")]
#[tokio::test]
async fn test_domain_keys(#[case] domain: BusinessDomain, #[case] key: &str) {
    let router = MessageRouter::new();
    router.register_handler(
        domain,
        handler_fn(|m: DeviceMessage| async move { Ok(json!(m.message_type)) }),
    );

    let message = DeviceMessage::new("D1", "event", json!(null));
    assert_eq!(router.dispatch(key, &message).await.unwrap(), json!("event"));
    assert_eq!(domain.to_string(), key);
}

#[tokio::test]
async fn test_concurrent_dispatch_while_rebinding() {
    let router = Arc::new(MessageRouter::new());
    router.register_handler(
        BusinessDomain::Attendance,
        handler_fn(|_m: DeviceMessage| async { Ok(json!(0)) }),
    );

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let router = Arc::clone(&router);
        tasks.spawn(async move {
            if i % 2 == 0 {
                router.register_handler(
                    BusinessDomain::Attendance,
                    handler_fn(move |_m: DeviceMessage| async move { Ok(json!(i)) }),
                );
            }
            let message = DeviceMessage::new(format!("ATT-{i}"), "punch", json!({}))
                .with_transport(Transport::Udp);
            router.dispatch(BusinessDomain::Attendance, &message).await
        });
    }

    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().unwrap().is_number());
    }
}
