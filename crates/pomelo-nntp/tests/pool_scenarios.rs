//! End-to-end pool scenarios against scripted in-memory servers.

use std::time::Duration;

use pomelo_nntp::testing::ScriptConnector;
use pomelo_nntp::{NntpError, PoolConfig, ServerConfig, SessionPool};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pool_config(max_size: usize, wait: Duration) -> PoolConfig {
    PoolConfig {
        max_size,
        monitor_interval: Duration::from_secs(3600),
        idle_timeout: Duration::from_secs(3600),
        wait_timeout: wait,
    }
}

/// Single-slot pool: a holder keeps the only client, a zero-patience caller
/// fails distinguishably, and after release the same client serves again.
#[tokio::test]
async fn single_slot_pool_blocks_then_recovers() {
    init_tracing();
    let connector = ScriptConnector::boxed(vec![vec![
        ("DATE", "111 20260825120000\r\n"),
        ("DATE", "111 20260825120001\r\n"),
        ("QUIT", "205 bye\r\n"),
    ]]);
    let pool = SessionPool::with_connector(
        ServerConfig::new("news.example", 119, false),
        pool_config(1, Duration::from_millis(1)),
        connector,
    )
    .unwrap();

    let mut held = pool.get_lease().await.unwrap();
    let holder_id = held.id();
    assert!(held.date().await.unwrap().success);

    let err = pool.get_lease().await.unwrap_err();
    assert!(matches!(err, NntpError::NoClientAvailable(_)));

    held.release().await.unwrap();

    let mut lease = pool.get_lease().await.unwrap();
    assert_eq!(lease.id(), holder_id);
    assert!(lease.date().await.unwrap().success);
    lease.release().await.unwrap();
    pool.shutdown().await;
}

/// A miss (430, no data block) must not desynchronize the stream: the
/// following ARTICLE sees its own status line and its complete block.
#[tokio::test]
async fn missing_article_then_full_fetch() {
    init_tracing();
    let connector = ScriptConnector::boxed(vec![vec![
        ("BODY <gone@example>", "430 no such article\r\n"),
        (
            "ARTICLE <kept@example>",
            "220 0 <kept@example>\r\nSubject: kept\r\n\r\n..body starts with a dot\r\n.\r\n",
        ),
        ("QUIT", "205 bye\r\n"),
    ]]);
    let pool = SessionPool::with_connector(
        ServerConfig::new("news.example", 119, false),
        pool_config(1, Duration::from_secs(1)),
        connector,
    )
    .unwrap();

    let mut lease = pool.get_lease().await.unwrap();

    let miss = lease.body("<gone@example>").await.unwrap();
    assert!(!miss.response.success);
    assert_eq!(miss.response.code, 430);
    assert!(miss.lines.is_empty());
    assert!(!lease.is_errored());

    let hit = lease.article("<kept@example>").await.unwrap();
    assert!(hit.response.success);
    assert_eq!(hit.response.code, 220);
    assert_eq!(
        hit.lines,
        vec![
            b"Subject: kept".to_vec(),
            Vec::new(),
            b".body starts with a dot".to_vec(),
        ]
    );

    lease.release().await.unwrap();
    pool.shutdown().await;
}

/// Authentication happens once per wrapper, during the first lease, and the
/// authenticated session is reused afterwards.
#[tokio::test]
async fn authentication_runs_once_per_connection() {
    init_tracing();
    let connector = ScriptConnector::boxed(vec![vec![
        ("AUTHINFO USER reader", "381 password required\r\n"),
        ("AUTHINFO PASS s3cret", "281 authentication accepted\r\n"),
        ("GROUP misc.test", "211 3 1 3 misc.test\r\n"),
        ("STAT <a@example>", "223 1 <a@example>\r\n"),
        ("QUIT", "205 bye\r\n"),
    ]]);
    let server = ServerConfig::new("news.example", 563, false)
        .with_credentials("reader", Some("s3cret".into()));
    let pool = SessionPool::with_connector(
        server,
        pool_config(1, Duration::from_secs(1)),
        connector,
    )
    .unwrap();

    let mut lease = pool.get_lease().await.unwrap();
    assert!(lease.is_authenticated());
    assert!(lease.group("misc.test").await.unwrap().success);
    lease.release().await.unwrap();

    // the script has no second AUTHINFO exchange, so reuse must skip it
    let mut lease = pool.get_lease().await.unwrap();
    assert!(lease.stat("<a@example>").await.unwrap().success);
    lease.release().await.unwrap();
    pool.shutdown().await;
}

/// Two concurrent borrowers on a two-slot pool each get their own client,
/// and both wrappers survive release.
#[tokio::test]
async fn concurrent_borrowers_get_distinct_clients() {
    init_tracing();
    let connector = ScriptConnector::boxed(vec![
        vec![
            ("BODY <one@example>", "222 0 <one@example>\r\npart one\r\n.\r\n"),
            ("QUIT", "205 bye\r\n"),
        ],
        vec![
            ("BODY <two@example>", "222 0 <two@example>\r\npart two\r\n.\r\n"),
            ("QUIT", "205 bye\r\n"),
        ],
    ]);
    let pool = SessionPool::with_connector(
        ServerConfig::new("news.example", 119, false),
        pool_config(2, Duration::from_secs(1)),
        connector,
    )
    .unwrap();

    let mut a = pool.get_lease().await.unwrap();
    let mut b = pool.get_lease().await.unwrap();
    assert_ne!(a.id(), b.id());

    let one = a.body("<one@example>").await.unwrap();
    let two = b.body("<two@example>").await.unwrap();
    assert_eq!(one.lines, vec![b"part one".to_vec()]);
    assert_eq!(two.lines, vec![b"part two".to_vec()]);

    a.release().await.unwrap();
    b.release().await.unwrap();
    assert_eq!(pool.available_count(), 2);
    pool.shutdown().await;
}
