//! End-to-end transfers over loopback.

use std::net::SocketAddr;
use std::time::Duration;

use lanspeed::session::{Orchestrator, SessionConfig, SessionError, SessionState};
use lanspeed::throughput::engine::{self, NullObserver, TransferObserver};
use lanspeed::throughput::transport::{self, TransportError, TransportListener};
use lanspeed::{Evaluation, ProbeConfig};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const TEN_MIB: u64 = 10_485_760;

/// Forwards the server's listening address to the test.
struct AddrReporter(Option<oneshot::Sender<SocketAddr>>);

impl TransferObserver for AddrReporter {
    fn on_listening(&mut self, addr: SocketAddr) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(addr);
        }
    }
}

async fn spawn_server(
    config: &ProbeConfig,
) -> (SocketAddr, JoinHandle<Result<Evaluation, SessionError>>) {
    let (tx, rx) = oneshot::channel();
    let session = SessionConfig::server(config)
        .unwrap()
        .with_bind_address("127.0.0.1")
        .with_port(0)
        .with_accept_timeout(Duration::from_secs(10));

    let handle = tokio::spawn(async move {
        let mut orchestrator = Orchestrator::new();
        let mut observer = AddrReporter(Some(tx));
        orchestrator.run(&session, &mut observer).await
    });

    (rx.await.unwrap(), handle)
}

async fn run_client(
    config: &ProbeConfig,
    addr: SocketAddr,
    payload_bytes: u64,
) -> Result<Evaluation, SessionError> {
    let session = SessionConfig::client(config, "127.0.0.1", payload_bytes)
        .unwrap()
        .with_port(addr.port());
    let mut orchestrator = Orchestrator::new();
    let result = orchestrator.run(&session, &mut NullObserver).await;
    assert_eq!(orchestrator.state(), SessionState::Idle);
    result
}

#[tokio::test]
async fn test_server_counts_exact_client_payload() {
    let config = ProbeConfig::default();
    let (addr, server) = spawn_server(&config).await;

    let client = run_client(&config, addr, TEN_MIB).await.unwrap();
    let server = server.await.unwrap().unwrap();

    assert_eq!(client.total_bytes(), TEN_MIB);
    assert_eq!(server.total_bytes(), TEN_MIB);
}

#[tokio::test]
async fn test_byte_count_independent_of_chunk_size() {
    let mut server_config = ProbeConfig::default();
    server_config.transfer.chunk_bytes = 4096;
    let mut client_config = ProbeConfig::default();
    client_config.transfer.chunk_bytes = 65_537;

    let (addr, server) = spawn_server(&server_config).await;
    let client = run_client(&client_config, addr, TEN_MIB).await.unwrap();
    let server = server.await.unwrap().unwrap();

    assert_eq!(client.total_bytes(), TEN_MIB);
    assert_eq!(server.total_bytes(), TEN_MIB);
}

#[tokio::test]
async fn test_measured_report_is_consistent() {
    let config = ProbeConfig::default();
    let (addr, server) = spawn_server(&config).await;
    run_client(&config, addr, TEN_MIB).await.unwrap();

    match server.await.unwrap().unwrap() {
        Evaluation::Measured(report) => {
            let expected = TEN_MIB as f64 / 1_048_576.0 / report.elapsed_secs;
            assert!((report.speed_mbps - expected).abs() < 1e-6);
            assert!((report.percent_of_gigabit - expected / 125.0 * 100.0).abs() < 1e-6);
            assert_eq!(
                report.advisory.is_empty(),
                report.rating == lanspeed::RatingTier::Excellent
            );
        }
        Evaluation::Undeterminable { .. } => {
            panic!("a 10 MiB loopback transfer should have a measurable duration")
        }
    }
}

#[tokio::test]
async fn test_zero_payload_completes_immediately() {
    let listener = TransportListener::bind("127.0.0.1", 0).await.unwrap();
    let port = listener.local_addr().port();

    let outcome = tokio::time::timeout(Duration::from_secs(5), async move {
        let accept = listener.accept(None);
        let dial = transport::dial("127.0.0.1", port, None);
        let (server, client) = tokio::join!(accept, dial);
        let (mut server, mut client) = (server.unwrap(), client.unwrap());

        let sent = engine::send_payload(&mut client, 0, 1_048_576, &mut NullObserver)
            .await
            .unwrap();
        client.close().await;
        let received = engine::receive_all(&mut server, 1_048_576, &mut NullObserver)
            .await
            .unwrap();
        (sent, received)
    })
    .await
    .expect("zero-byte transfer must not hang");

    assert_eq!(outcome.0.total_bytes(), 0);
    assert_eq!(outcome.1.total_bytes(), 0);
}

#[tokio::test]
async fn test_server_without_client_times_out() {
    let session = SessionConfig::server(&ProbeConfig::default())
        .unwrap()
        .with_bind_address("127.0.0.1")
        .with_port(0)
        .with_accept_timeout(Duration::from_millis(100));

    let mut orchestrator = Orchestrator::new();
    let result = orchestrator.run(&session, &mut NullObserver).await;

    assert!(matches!(
        result,
        Err(SessionError::Transport(TransportError::Timeout {
            operation: "accept",
            ..
        }))
    ));
    assert_eq!(orchestrator.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_connect_refused_is_connect_failure() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();

    let result = run_client(&ProbeConfig::default(), addr, TEN_MIB).await;
    assert!(matches!(
        result,
        Err(SessionError::Transport(TransportError::ConnectFailure { .. }))
    ));
}

#[tokio::test]
async fn test_peer_reset_mid_transfer_is_io_error() {
    let listener = TransportListener::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr();

    // Accept and hang up without reading.
    let server = tokio::spawn(async move {
        let session = listener.accept(Some(Duration::from_secs(10))).await.unwrap();
        drop(session);
    });

    let result = run_client(&ProbeConfig::default(), addr, 64 * 1_048_576).await;
    server.await.unwrap();

    assert!(matches!(
        result,
        Err(SessionError::Transport(TransportError::Io {
            operation: "send",
            ..
        }))
    ));
}

#[tokio::test]
async fn test_orchestrator_supports_consecutive_runs() {
    let config = ProbeConfig::default();
    let mut orchestrator = Orchestrator::new();

    for payload in [1_048_576u64, 3 * 1_048_576] {
        let (addr, server) = spawn_server(&config).await;
        let session = SessionConfig::client(&config, "127.0.0.1", payload)
            .unwrap()
            .with_port(addr.port());

        let evaluation = orchestrator.run(&session, &mut NullObserver).await.unwrap();
        assert_eq!(evaluation.total_bytes(), payload);
        assert_eq!(server.await.unwrap().unwrap().total_bytes(), payload);
        assert_eq!(orchestrator.state(), SessionState::Idle);
    }

    orchestrator.terminate();
    assert_eq!(orchestrator.state(), SessionState::Terminated);
}
