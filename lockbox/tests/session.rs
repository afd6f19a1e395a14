//! Session handler lifecycle.

mod common;

use std::time::Duration;

use bytes::Bytes;
use lockbox::{LockingSessionHandler, ReadOutcome, SessionHandler, SessionOptions};
use lockbox_backend::{BackendError, KvBackend, LockStatus};
use lockbox_moka::MokaBackend;
use pretty_assertions::assert_eq;

use common::{FailingBackend, fast_options, init_tracing, moka};

fn session_handler(
    backend: &MokaBackend,
    lock_max_wait: Duration,
) -> LockingSessionHandler<MokaBackend> {
    LockingSessionHandler::new(backend.clone(), fast_options(lock_max_wait))
}

fn data(raw: &'static [u8]) -> ReadOutcome {
    ReadOutcome::Data(Bytes::from_static(raw))
}

#[tokio::test]
async fn end_to_end_contention_scenario() {
    init_tracing();
    let backend = moka();
    let first = session_handler(&backend, Duration::from_secs(5));
    let second = session_handler(&backend, Duration::from_millis(100));

    assert!(first.write("abc", Bytes::from_static(b"X")).await.unwrap());

    assert_eq!(first.read("abc").await.unwrap(), data(b"X"));
    assert!(first.is_locked().await);

    assert_eq!(second.read("abc").await.unwrap(), ReadOutcome::Contended);
    assert!(!second.is_locked().await);

    assert!(first.close().await.unwrap());
    assert!(!first.is_locked().await);

    assert_eq!(second.read("abc").await.unwrap(), data(b"X"));
    assert!(second.close().await.unwrap());
}

#[tokio::test]
async fn read_under_foreign_lock_returns_no_data() {
    let backend = moka();
    backend
        .set("sessionabc", Bytes::from_static(b"secret"), None)
        .await
        .unwrap();
    backend
        .set_nx(
            "sessionabc.lock",
            Bytes::from_static(b"someone-else"),
            Duration::from_secs(30),
        )
        .await
        .unwrap();

    let handler = session_handler(&backend, Duration::from_millis(50));
    let read = handler.read("abc").await.unwrap();
    assert!(read.is_contended());
    assert_eq!(read.data(), None);

    // Closing must not remove a lock this handler never owned.
    handler.close().await.unwrap();
    assert!(backend.get("sessionabc.lock").await.unwrap().is_some());
}

#[tokio::test]
async fn missing_session_reads_empty() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(1));
    assert_eq!(handler.read("nope").await.unwrap(), data(b""));
    assert!(handler.is_locked().await);
}

#[tokio::test]
async fn close_is_idempotent() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(1));

    assert!(handler.close().await.unwrap());

    handler.read("abc").await.unwrap();
    assert!(handler.close().await.unwrap());
    assert!(handler.close().await.unwrap());
    assert!(!handler.is_locked().await);
    assert_eq!(backend.get("sessionabc.lock").await.unwrap(), None);
}

#[tokio::test]
async fn repeated_reads_reuse_the_lock() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_millis(100));
    handler
        .write("abc", Bytes::from_static(b"v1"))
        .await
        .unwrap();

    assert_eq!(handler.read("abc").await.unwrap(), data(b"v1"));
    // A second acquire would contend with our own lock.
    assert_eq!(handler.read("abc").await.unwrap(), data(b"v1"));
}

#[tokio::test]
async fn reading_another_session_moves_the_lock() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(1));

    handler.read("one").await.unwrap();
    handler.read("two").await.unwrap();

    assert_eq!(backend.get("sessionone.lock").await.unwrap(), None);
    assert!(backend.get("sessiontwo.lock").await.unwrap().is_some());
    handler.close().await.unwrap();
}

#[tokio::test]
async fn write_applies_ttl() {
    let backend = moka();
    let options = SessionOptions {
        gc_maxlifetime: 1,
        ..fast_options(Duration::from_secs(1))
    };
    let handler = LockingSessionHandler::new(backend.clone(), options);
    assert_eq!(handler.ttl(), Some(Duration::from_secs(1)));

    handler
        .write("abc", Bytes::from_static(b"X"))
        .await
        .unwrap();
    assert!(backend.get("sessionabc").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(backend.get("sessionabc").await.unwrap(), None);
}

#[tokio::test]
async fn write_without_ttl_persists() {
    let backend = moka();
    let options = SessionOptions {
        gc_maxlifetime: 0,
        cookie_lifetime: 0,
        ..fast_options(Duration::from_secs(1))
    };
    let handler = LockingSessionHandler::new(backend.clone(), options);
    assert_eq!(handler.ttl(), None);

    handler.write("abc", Bytes::from_static(b"X")).await.unwrap();
    assert!(handler.update_timestamp("abc", b"X").await.unwrap());
    assert_eq!(
        backend.get("sessionabc").await.unwrap(),
        Some(Bytes::from_static(b"X"))
    );
}

#[tokio::test]
async fn update_timestamp_extends_lifetime() {
    let backend = moka();
    let options = SessionOptions {
        gc_maxlifetime: 5,
        ..fast_options(Duration::from_secs(1))
    };
    let handler = LockingSessionHandler::new(backend.clone(), options);
    backend
        .set(
            "sessionabc",
            Bytes::from_static(b"X"),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap();

    assert!(handler.update_timestamp("abc", b"X").await.unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(backend.get("sessionabc").await.unwrap().is_some());

    // Touching a missing session still reports success.
    assert!(handler.update_timestamp("gone", b"").await.unwrap());
}

#[tokio::test]
async fn destroy_removes_data_and_releases_lock() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(1));
    handler.write("abc", Bytes::from_static(b"X")).await.unwrap();
    handler.read("abc").await.unwrap();

    assert!(handler.destroy("abc").await.unwrap());
    assert!(!handler.is_locked().await);
    assert_eq!(backend.get("sessionabc").await.unwrap(), None);
    assert_eq!(backend.get("sessionabc.lock").await.unwrap(), None);
}

#[tokio::test]
async fn empty_write_destroys_session() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(1));
    handler.write("abc", Bytes::from_static(b"X")).await.unwrap();
    handler.read("abc").await.unwrap();

    assert!(handler.write("abc", Bytes::new()).await.unwrap());
    assert_eq!(backend.get("sessionabc").await.unwrap(), None);
    assert!(!handler.is_locked().await);
}

#[tokio::test]
async fn validate_id_prefetches_the_read() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(1));
    assert!(!handler.validate_id("abc").await.unwrap());

    backend
        .set("sessionabc", Bytes::from_static(b"later"), None)
        .await
        .unwrap();
    // The next read returns what validation saw.
    assert_eq!(handler.read("abc").await.unwrap(), data(b""));
    assert_eq!(handler.read("abc").await.unwrap(), data(b"later"));

    let other = session_handler(&backend, Duration::from_secs(1));
    other.close().await.unwrap();
    handler.close().await.unwrap();
    assert!(other.validate_id("abc").await.unwrap());
}

#[tokio::test]
async fn locking_can_be_disabled() {
    let backend = moka();
    let options = SessionOptions {
        locking: false,
        ..fast_options(Duration::from_secs(1))
    };
    let first = LockingSessionHandler::new(backend.clone(), options.clone());
    let second = LockingSessionHandler::new(backend.clone(), options);
    first.write("abc", Bytes::from_static(b"X")).await.unwrap();

    assert_eq!(first.read("abc").await.unwrap(), data(b"X"));
    assert_eq!(second.read("abc").await.unwrap(), data(b"X"));
    assert!(!first.is_locked().await);
    assert_eq!(backend.get("sessionabc.lock").await.unwrap(), None);
}

#[tokio::test]
async fn custom_and_empty_prefix() {
    let backend = moka();
    let options = SessionOptions {
        prefix: "app:sess:".to_owned(),
        ..fast_options(Duration::from_secs(1))
    };
    let handler = LockingSessionHandler::new(backend.clone(), options);
    assert_eq!(handler.session_key("abc"), "app:sess:abc");
    handler.write("abc", Bytes::from_static(b"X")).await.unwrap();
    assert!(backend.get("app:sess:abc").await.unwrap().is_some());

    let bare = LockingSessionHandler::new(
        backend.clone(),
        SessionOptions {
            prefix: String::new(),
            ..fast_options(Duration::from_secs(1))
        },
    );
    assert_eq!(bare.session_key("abc"), "abc");
}

#[tokio::test]
async fn open_and_gc_always_succeed() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(1));
    assert!(handler.open("/tmp", "PHPSESSID").await.unwrap());
    assert!(handler.gc(Duration::from_secs(1440)).await.unwrap());
}

#[tokio::test]
async fn dropping_a_handler_releases_its_lock() {
    init_tracing();
    let backend = moka();
    {
        let handler = session_handler(&backend, Duration::from_secs(30));
        handler.read("abc").await.unwrap();
        assert!(backend.get("sessionabc.lock").await.unwrap().is_some());
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.get("sessionabc.lock").await.unwrap(), None);
}

#[tokio::test]
async fn scoped_closes_on_success_and_error() {
    let backend = moka();
    let handler = session_handler(&backend, Duration::from_secs(30));
    handler.write("abc", Bytes::from_static(b"X")).await.unwrap();

    let read = handler
        .scoped(|session| async move { session.read("abc").await })
        .await
        .unwrap();
    assert_eq!(read, data(b"X"));
    assert!(!handler.is_locked().await);

    let result: Result<(), BackendError> = handler
        .scoped(|session| async move {
            session.read("abc").await?;
            Err(BackendError::InternalError("request failed".into()))
        })
        .await;
    assert!(result.is_err());
    assert!(!handler.is_locked().await);
    assert_eq!(
        backend
            .set_nx(
                "sessionabc.lock",
                Bytes::from_static(b"next"),
                Duration::from_secs(1)
            )
            .await
            .unwrap(),
        LockStatus::Acquired
    );
}

#[tokio::test]
async fn backend_failures_propagate() {
    let backend = FailingBackend::default();
    let handler = LockingSessionHandler::new(backend.clone(), SessionOptions::default());

    assert!(handler.read("abc").await.unwrap_err().is_connection_error());
    assert!(handler.write("abc", Bytes::from_static(b"X")).await.is_err());
    assert!(handler.destroy("abc").await.is_err());
    assert!(handler.update_timestamp("abc", b"X").await.is_err());
    // Nothing held, nothing to release.
    assert!(handler.close().await.unwrap());
}

#[tokio::test]
async fn works_through_a_shared_backend() {
    let shared: lockbox::SharedBackend = std::sync::Arc::new(moka());
    let handler =
        LockingSessionHandler::new(shared.clone(), fast_options(Duration::from_secs(1)));
    handler.write("abc", Bytes::from_static(b"X")).await.unwrap();
    assert_eq!(handler.read("abc").await.unwrap(), data(b"X"));
    handler.close().await.unwrap();
    assert_eq!(shared.get("sessionabc.lock").await.unwrap(), None);
}
