use std::os::unix::net::UnixListener as StdUnixListener;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use similar_asserts::assert_eq;
use test_log::test;
use tokio_util::sync::CancellationToken;
use uds_bidir_comm::ClientConfig;
use uds_bidir_comm::CommError;
use uds_bidir_comm::RequestProcessor;
use uds_bidir_comm::ServerConfig;
use uds_bidir_comm::UdsClient;
use uds_bidir_comm::UdsServer;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct SimpleRequest {
    id: u32,
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct SimpleResponse {
    request_id: u32,
    processed_message: String,
}

#[derive(Default)]
struct SimpleProcessor {
    processed: AtomicUsize,
}

impl RequestProcessor<SimpleRequest, SimpleResponse> for SimpleProcessor {
    fn process(&self, request: SimpleRequest) -> SimpleResponse {
        self.processed.fetch_add(1, Ordering::SeqCst);
        if request.message == "slow" {
            std::thread::sleep(Duration::from_millis(500));
        }
        SimpleResponse {
            request_id: request.id,
            processed_message: format!("Processed: {}", request.message),
        }
    }
}

fn assert_send<T: Send>(_: &T) {}

fn request(id: u32, message: &str) -> SimpleRequest {
    SimpleRequest {
        id,
        message: message.to_string(),
    }
}

#[test(tokio::test)]
async fn requests_are_answered_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("simple.sock");

    let server = UdsServer::<SimpleRequest, SimpleResponse>::bind(&path).expect("bind");
    let processor = Arc::new(SimpleProcessor::default());
    let token = CancellationToken::new();
    let serving = tokio::spawn(server.serve(processor.clone(), token.clone()));

    let mut client = UdsClient::<SimpleRequest, SimpleResponse>::connect(ClientConfig::new(&path))
        .await
        .expect("connect");

    for id in 0..3 {
        let response = client
            .call(&request(id, &format!("message {id}")))
            .await
            .expect("call");
        assert_eq!(response, SimpleResponse {
            request_id: id,
            processed_message: format!("Processed: message {id}"),
        });
    }
    assert_eq!(processor.processed.load(Ordering::SeqCst), 3);

    token.cancel();
    serving.await.expect("join").expect("serve");
    assert!(!path.exists(), "socket file should be removed on shutdown");
}

#[test(tokio::test)]
async fn slow_response_times_out_and_breaks_client() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("slow.sock");

    let server = UdsServer::<SimpleRequest, SimpleResponse>::bind(&path).expect("bind");
    let token = CancellationToken::new();
    let serving = tokio::spawn(server.serve(Arc::new(SimpleProcessor::default()), token.clone()));

    let config = ClientConfig::new(&path).with_request_timeout(Duration::from_millis(100));
    let mut client = UdsClient::<SimpleRequest, SimpleResponse>::connect(config)
        .await
        .expect("connect");

    let err = client.call(&request(1, "slow")).await.expect_err("should time out");
    assert!(matches!(err.current_context(), CommError::Timeout { millis: 100 }));

    let err = client.call(&request(2, "fast")).await.expect_err("client is broken");
    assert!(matches!(err.current_context(), CommError::NotConnected));

    token.cancel();
    serving.await.expect("join").expect("serve");
}

#[test(tokio::test)]
async fn connect_to_missing_socket_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing.sock");

    let result = UdsClient::<SimpleRequest, SimpleResponse>::connect(ClientConfig::new(&path)).await;
    let err = result.err().expect("connect should fail");
    assert!(matches!(err.current_context(), CommError::Network { .. }));
}

#[test(tokio::test)]
async fn stale_socket_file_is_replaced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stale.sock");

    // leave a socket file behind without anyone listening on it
    drop(StdUnixListener::bind(&path).expect("bind std listener"));
    assert!(path.exists());

    let server = UdsServer::<SimpleRequest, SimpleResponse>::bind(&path).expect("rebind");
    let token = CancellationToken::new();
    let serving = tokio::spawn(server.serve(Arc::new(SimpleProcessor::default()), token.clone()));

    let mut client = UdsClient::<SimpleRequest, SimpleResponse>::connect(ClientConfig::new(&path))
        .await
        .expect("connect");
    let response = client.call(&request(9, "again")).await.expect("call");
    assert_eq!(response.request_id, 9);

    token.cancel();
    serving.await.expect("join").expect("serve");
}

#[test(tokio::test)]
async fn regular_file_at_socket_path_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("not-a-socket");
    std::fs::write(&path, b"data").expect("write");

    let err = UdsServer::<SimpleRequest, SimpleResponse>::bind(&path)
        .err()
        .expect("bind should fail");
    assert!(matches!(err.current_context(), CommError::Configuration { .. }));
    assert!(path.exists());
}

#[test(tokio::test)]
async fn cancelled_server_refuses_new_connections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cancel.sock");

    let server = UdsServer::<SimpleRequest, SimpleResponse>::bind(&path).expect("bind");
    let token = CancellationToken::new();
    let serving = tokio::spawn(server.serve(Arc::new(SimpleProcessor::default()), token.clone()));

    token.cancel();
    serving.await.expect("join").expect("serve");

    let result = UdsClient::<SimpleRequest, SimpleResponse>::connect(ClientConfig::new(&path)).await;
    assert!(result.is_err());
}

#[test(tokio::test)]
async fn serve_future_is_send_and_reports_socket_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("send.sock");

    let server = UdsServer::<SimpleRequest, SimpleResponse>::bind(&path).expect("bind");
    assert_eq!(server.path(), path.as_path());

    let token = CancellationToken::new();
    let serving = server.serve(Arc::new(SimpleProcessor::default()), token.clone());
    assert_send(&serving);

    token.cancel();
    serving.await.expect("serve");
    assert!(!path.exists());
}

#[test(tokio::test)]
async fn stale_socket_is_kept_when_replacement_is_disabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("kept.sock");
    drop(StdUnixListener::bind(&path).expect("bind std listener"));

    let config = ServerConfig {
        remove_stale_socket: false,
        ..ServerConfig::default()
    };
    let err = UdsServer::<SimpleRequest, SimpleResponse>::bind_with_config(&path, config)
        .err()
        .expect("address in use");

    assert!(matches!(err.current_context(), CommError::Network { .. }));
    assert!(path.exists());
}
