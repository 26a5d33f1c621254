//! Registry and engine lifecycle against the in-process container.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;

use port_registry::config::{OverrideConfig, TlsConfig};
use port_registry::engine::{EngineError, EngineRegistry, EngineState, Protocol};
use port_registry::net::MemoryContainerFactory;
use port_registry::routing::{ConflictKind, MatchMode};

mod common;
use common::{body_string, echo_handler, exact_handler, prefix_handler, url, TrackedHandler};

fn setup() -> (MemoryContainerFactory, EngineRegistry) {
    let factory = MemoryContainerFactory::new();
    let registry = EngineRegistry::new(Arc::new(factory.clone()));
    (factory, registry)
}

#[tokio::test]
async fn prefix_servant_serves_descendants_only() {
    let (factory, registry) = setup();
    let engine = registry
        .create_for_protocol(Some("127.0.0.1"), 8080, Protocol::Http)
        .unwrap();
    engine
        .add_servant(&url("http", 8080, "/hello/test"), echo_handler(MatchMode::PrefixDescendant))
        .unwrap();

    let hit = factory.get(8080, "/hello/test/extra").await.unwrap();
    assert_eq!(hit.status(), StatusCode::OK);
    assert_eq!(body_string(hit).await, "/hello/test/extra");

    let miss = factory.get(8080, "/hello2/test").await.unwrap();
    assert_eq!(miss.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn exact_servant_rejects_descendants() {
    let (factory, registry) = setup();
    let engine = registry.get_or_create(None, 8081, None).unwrap();
    engine
        .add_servant(&url("http", 8081, "/exact"), exact_handler("exact"))
        .unwrap();

    assert_eq!(factory.get(8081, "/exact").await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        factory.get(8081, "/exact/x").await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
}

#[test]
fn duplicate_and_nested_registrations_conflict() {
    let (_factory, registry) = setup();
    let engine = registry.get_or_create(None, 8082, None).unwrap();
    let original = prefix_handler("original");
    engine
        .add_servant(&url("http", 8082, "/a/b"), Arc::clone(&original))
        .unwrap();

    let cases = [
        ("/a/b", ConflictKind::Duplicate),
        ("/a", ConflictKind::ParentOfExisting),
        ("/a/b/c", ConflictKind::ChildOfExisting),
    ];
    for (path, kind) in cases {
        match engine.add_servant(&url("http", 8082, path), prefix_handler("other")) {
            Err(EngineError::Conflict(conflict)) => {
                assert_eq!(conflict.kind, kind, "{path}");
                assert_eq!(conflict.existing, "/a/b");
            }
            other => panic!("expected conflict for {path}, got {other:?}"),
        }
    }

    engine
        .add_servant(&url("http", 8082, "/a/c"), prefix_handler("sibling"))
        .unwrap();
    let found = engine.get_servant(&url("http", 8082, "/a/b")).unwrap();
    assert!(Arc::ptr_eq(&found, &original));
    assert_eq!(engine.servant_count(), 2);
}

#[test]
fn concurrent_callers_share_one_engine() {
    let (_factory, registry) = setup();
    let engines: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..32)
            .map(|_| s.spawn(|| registry.create_for_protocol(None, 8083, Protocol::Http).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let canonical = registry.retrieve(8083).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(engines.iter().all(|e| Arc::ptr_eq(e, &canonical)));
}

#[test]
fn concurrent_distinct_registrations_all_land() {
    let (factory, registry) = setup();
    let engine = registry.get_or_create(None, 8084, None).unwrap();

    std::thread::scope(|s| {
        for i in 0..16 {
            let engine = &engine;
            s.spawn(move || {
                let path = format!("/svc{i}");
                engine
                    .add_servant(&url("http", 8084, &path), prefix_handler("svc"))
                    .unwrap();
            });
        }
    });

    assert_eq!(engine.servant_count(), 16);
    assert_eq!(factory.listener(8084).unwrap().start_count(), 1);
}

#[test]
fn removing_unknown_servant_is_not_an_error() {
    let (_factory, registry) = setup();
    let engine = registry.get_or_create(None, 8085, None).unwrap();
    engine
        .add_servant(&url("http", 8085, "/known"), prefix_handler("known"))
        .unwrap();

    assert!(engine.remove_servant(&url("http", 8085, "/unknown")).is_none());
    assert_eq!(engine.servant_count(), 1);
}

#[test]
fn tls_request_on_plain_port_is_rejected() {
    let (factory, registry) = setup();
    let plain = registry
        .create_for_protocol(None, 8443, Protocol::Http)
        .unwrap();
    plain
        .add_servant(&url("http", 8443, "/plain"), prefix_handler("plain"))
        .unwrap();

    let err = registry
        .create_for_protocol(None, 8443, Protocol::Https)
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("http") && msg.contains("https"), "{msg}");
    assert_eq!(plain.state(), EngineState::Running);
    assert!(factory.is_listening(8443));
    assert!(matches!(
        registry.set_tls_params_for_port(None, 8443, Some(TlsConfig::new("c.pem", "k.pem"))),
        Err(EngineError::TlsAfterStart { port: 8443 })
    ));
}

#[test]
fn destroy_waits_for_last_servant() {
    let (factory, registry) = setup();
    let engine = registry.get_or_create(None, 8086, None).unwrap();
    let handler = TrackedHandler::new();
    let target = url("http", 8086, "/svc");
    engine.add_servant(&target, handler.clone()).unwrap();

    assert!(!registry.destroy_for_port(8086));
    assert!(registry.retrieve(8086).is_some());
    assert!(factory.is_listening(8086));

    assert!(engine.remove_servant(&target).is_some());
    assert_eq!(handler.removals(), 1);
    assert!(registry.destroy_for_port(8086));
    assert!(registry.retrieve(8086).is_none());
    assert!(!factory.is_listening(8086));
}

#[test]
fn released_port_can_be_recreated() {
    let (factory, registry) = setup();
    let first = registry.get_or_create(None, 8087, None).unwrap();
    first
        .add_servant(&url("http", 8087, "/a"), prefix_handler("a"))
        .unwrap();
    first.remove_servant(&url("http", 8087, "/a"));
    assert!(registry.destroy_for_port(8087));

    let second = registry.get_or_create(None, 8087, None).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    second
        .add_servant(&url("http", 8087, "/a"), prefix_handler("a"))
        .unwrap();
    assert_eq!(factory.listener(8087).unwrap().start_count(), 2);
}

#[test]
fn global_overrides_apply_to_every_port() {
    let factory = MemoryContainerFactory::new();
    let overrides = OverrideConfig {
        skip_path_check: true,
        always_release: true,
        ..Default::default()
    };
    let registry = EngineRegistry::new(Arc::new(factory.clone())).with_overrides(overrides);
    let engine = registry.get_or_create(None, 8088, None).unwrap();
    engine
        .add_servant(&url("http", 8088, "/a/b"), prefix_handler("child"))
        .unwrap();
    engine
        .add_servant(&url("http", 8088, "/a"), prefix_handler("parent"))
        .unwrap();

    let report = registry.shutdown();
    assert_eq!(report.released, vec![8088]);
    assert!(!factory.is_listening(8088));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatch_tracks_concurrent_registration_churn() {
    let (factory, registry) = setup();
    let engine = registry.get_or_create(None, 8089, None).unwrap();
    engine
        .add_servant(&url("http", 8089, "/stable"), prefix_handler("stable"))
        .unwrap();

    let churning = Arc::new(AtomicBool::new(true));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let factory = factory.clone();
            let churning = Arc::clone(&churning);
            tokio::spawn(async move {
                loop {
                    let res = factory.get(8089, "/stable/item").await.unwrap();
                    assert_eq!(res.status(), StatusCode::OK);
                    if !churning.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let factory = factory.clone();
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for round in 0..24 {
                    let path = format!("/dyn{w}/r{round}");
                    let target = url("http", 8089, &path);
                    engine.add_servant(&target, prefix_handler("dyn")).unwrap();

                    let res = factory.get(8089, &path).await.unwrap();
                    assert_eq!(res.status(), StatusCode::OK, "{path} after add");

                    if round % 2 == 0 {
                        engine.remove_servant(&target).unwrap();
                        let res = factory.get(8089, &path).await.unwrap();
                        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{path} after remove");
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }
    churning.store(false, Ordering::SeqCst);
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(engine.servant_count(), 1 + 8 * 12);
    for w in 0..8 {
        let kept = factory.get(8089, &format!("/dyn{w}/r23/leaf")).await.unwrap();
        assert_eq!(kept.status(), StatusCode::OK);
        let dropped = factory.get(8089, &format!("/dyn{w}/r22")).await.unwrap();
        assert_eq!(dropped.status(), StatusCode::NOT_FOUND);
    }
    assert_eq!(factory.listener(8089).unwrap().start_count(), 1);
}
