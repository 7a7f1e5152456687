//! Loopback tests for the TCP front end.

use hardware_gateway::config::ServerConfig;
use hardware_gateway::gateway::{Gateway, RetryPolicy};
use hardware_gateway::server::GatewayServer;
use hardware_gateway::transport::MockTransport;
use hardware_gateway::validator::ConfigParameter;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<hardware_gateway::GatewayResult<()>>,
}

async fn start_server(device: MockTransport, max_command_bytes: usize) -> RunningServer {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_command_bytes,
    };
    let gateway = Gateway::new(device, RetryPolicy::default());
    let server = GatewayServer::bind(&config, gateway)
        .await
        .expect("Failed to bind loopback");
    let addr = server.local_addr().expect("No local address");

    let (shutdown, rx) = oneshot::channel();
    let handle = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    RunningServer {
        addr,
        shutdown,
        handle,
    }
}

async fn request_line(reader: &mut BufReader<TcpStream>, command: &str) -> String {
    reader
        .get_mut()
        .write_all(format!("{command}\n").as_bytes())
        .await
        .unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line
}

#[tokio::test]
async fn test_line_protocol_round_trip() {
    let device = MockTransport::new();
    let server = start_server(device.clone(), 1024).await;
    let mut client = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

    assert_eq!(request_line(&mut client, "ping").await, "pong\n");
    assert_eq!(
        request_line(&mut client, "set_state=config").await,
        "state:config\n"
    );
    assert_eq!(request_line(&mut client, "trigger").await, "operation_err\n");
    assert_eq!(
        request_line(&mut client, "set_config=focus:1601").await,
        "validation_err\n"
    );
    assert_eq!(
        request_line(&mut client, "set_config=focus:1600").await,
        "focus:1600\n"
    );
    assert_eq!(
        device.config(ConfigParameter::Focus).as_deref(),
        Some("1600")
    );

    server.shutdown.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bare_buffer_reply_has_no_newline() {
    let server = start_server(MockTransport::new(), 1024).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();

    client.write_all(b"get_state").await.unwrap();
    let mut reply = [0u8; 10];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"state:idle");

    server.shutdown.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_clients_share_one_mirror() {
    let server = start_server(MockTransport::new(), 1024).await;
    let mut first = BufReader::new(TcpStream::connect(server.addr).await.unwrap());
    let mut second = BufReader::new(TcpStream::connect(server.addr).await.unwrap());

    assert_eq!(
        request_line(&mut first, "set_state=config").await,
        "state:config\n"
    );
    // The second client sees the state the first one set.
    assert_eq!(request_line(&mut second, "get_frame").await, "operation_err\n");

    server.shutdown.send(()).unwrap();
    server.handle.await.unwrap().unwrap();
}
