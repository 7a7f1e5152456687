//! Client-facing TCP server.
//!
//! Clients send plain-text commands, either newline terminated or one per
//! write. Every command is handed to the shared [`Gateway`] and the reply is
//! written back in the same framing: newline-terminated commands get a
//! newline-terminated reply, a bare buffer gets a bare reply.

use crate::config::ServerConfig;
use crate::error::GatewayResult;
use crate::gateway::{Gateway, Reply};
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// One unit of client input after framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A command, trimmed of whitespace and NUL padding.
    Command {
        /// Command text.
        text: String,
        /// Whether the client ended it with a newline.
        terminated: bool,
    },
    /// A line longer than the configured limit.
    Oversized {
        /// Whether the client ended it with a newline.
        terminated: bool,
    },
}

impl Frame {
    fn terminated(&self) -> bool {
        match self {
            Frame::Command { terminated, .. } | Frame::Oversized { terminated } => *terminated,
        }
    }
}

/// Splits a client byte stream into commands.
///
/// A read with no newline and nothing held is one bare command. Bytes after
/// the last newline of a read are held, and later reads extend them until a
/// newline arrives. A held line that outgrows the limit is reported once and
/// the rest of it, up to the next newline, is dropped.
#[derive(Debug)]
pub struct CommandFramer {
    pending: Vec<u8>,
    discarding: bool,
    max_command_bytes: usize,
}

impl CommandFramer {
    /// Framer that flags commands longer than `max_command_bytes`.
    pub fn new(max_command_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            discarding: false,
            max_command_bytes,
        }
    }

    /// Feed one read's worth of bytes and collect the completed frames.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut held = !self.pending.is_empty();

        if self.discarding {
            let Some(end) = chunk.iter().position(|&b| b == b'\n') else {
                return frames;
            };
            self.discarding = false;
            held = true;
            chunk = &chunk[end + 1..];
            if chunk.is_empty() {
                return frames;
            }
        }

        self.pending.extend_from_slice(chunk);

        if !chunk.contains(&b'\n') {
            if !held {
                let buffer = std::mem::take(&mut self.pending);
                frames.extend(self.frame(&buffer, false));
            } else if self.pending.len() > self.max_command_bytes {
                self.pending.clear();
                self.discarding = true;
                frames.push(Frame::Oversized { terminated: true });
            }
            return frames;
        }

        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            frames.extend(self.frame(&line[..end], true));
        }
        frames
    }

    fn frame(&self, bytes: &[u8], terminated: bool) -> Option<Frame> {
        if bytes.len() > self.max_command_bytes {
            return Some(Frame::Oversized { terminated });
        }
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        (!text.is_empty()).then(|| Frame::Command {
            text: text.to_string(),
            terminated,
        })
    }
}

/// Serve one client until it disconnects.
///
/// Generic over the stream so tests can drive it with an in-memory mock.
///
/// # Errors
/// Returns the I/O error that ended the session, if any.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: &str,
    gateway: Gateway,
    max_command_bytes: usize,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framer = CommandFramer::new(max_command_bytes);
    let mut buf = vec![0u8; max_command_bytes.max(1)];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            info!(peer, "client disconnected");
            return Ok(());
        }

        for frame in framer.push(&buf[..n]) {
            let reply = match &frame {
                Frame::Command { text, .. } => {
                    debug!(peer, command = %text, "received command");
                    gateway.dispatch(text).await
                }
                Frame::Oversized { .. } => {
                    warn!(peer, limit = max_command_bytes, "command too long");
                    Reply::ValidationError
                }
            };

            let mut out = reply.to_string().into_bytes();
            if frame.terminated() {
                out.push(b'\n');
            }
            stream.write_all(&out).await?;
        }
        stream.flush().await?;
    }
}

/// TCP listener that hands each connection its own task.
pub struct GatewayServer {
    listener: TcpListener,
    gateway: Gateway,
    max_command_bytes: usize,
}

impl GatewayServer {
    /// Bind the configured address.
    ///
    /// # Errors
    /// Returns [`GatewayError::Io`](crate::error::GatewayError::Io) if the address cannot be bound.
    pub async fn bind(config: &ServerConfig, gateway: Gateway) -> GatewayResult<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        info!(address = %listener.local_addr()?, "gateway listening");
        Ok(Self {
            listener,
            gateway,
            max_command_bytes: config.max_command_bytes,
        })
    }

    /// Address actually bound, useful when the configured port is 0.
    ///
    /// # Errors
    /// Returns an I/O error if the socket has no local address.
    pub fn local_addr(&self) -> GatewayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    ///
    /// # Errors
    /// Never returns under normal operation.
    pub async fn run(self) -> GatewayResult<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    ///
    /// # Errors
    /// Accept failures are logged, not returned.
    pub async fn run_until<F>(self, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, addr)) => self.spawn_client(socket, addr),
                    Err(e) => error!(error = %e, "accept failed"),
                },
            }
        }
    }

    fn spawn_client(&self, socket: tokio::net::TcpStream, addr: SocketAddr) {
        let gateway = self.gateway.clone();
        let max_command_bytes = self.max_command_bytes;
        tokio::spawn(async move {
            let peer = addr.to_string();
            info!(peer = %peer, "client connected");
            if let Err(e) = handle_connection(socket, &peer, gateway, max_command_bytes).await {
                warn!(peer = %peer, error = %e, "client session ended with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::RetryPolicy;
    use crate::transport::MockTransport;

    fn command(text: &str, terminated: bool) -> Frame {
        Frame::Command {
            text: text.to_string(),
            terminated,
        }
    }

    #[test]
    fn test_newline_framing() {
        let mut framer = CommandFramer::new(1024);
        assert_eq!(
            framer.push(b"ping\r\nget_state\n"),
            vec![command("ping", true), command("get_state", true)]
        );
    }

    #[test]
    fn test_bare_buffer_is_one_command() {
        let mut framer = CommandFramer::new(1024);
        assert_eq!(framer.push(b"ping\0\0\0"), vec![command("ping", false)]);
    }

    #[test]
    fn test_partial_line_held_until_newline() {
        let mut framer = CommandFramer::new(1024);
        assert_eq!(framer.push(b"ping\nget_st"), vec![command("ping", true)]);
        assert_eq!(framer.push(b"ate\n"), vec![command("get_state", true)]);
    }

    #[test]
    fn test_line_split_over_several_reads_keeps_newline_framing() {
        let mut framer = CommandFramer::new(1024);
        assert_eq!(framer.push(b"ping\nget"), vec![command("ping", true)]);
        assert!(framer.push(b"_state").is_empty());
        assert_eq!(framer.push(b"\n"), vec![command("get_state", true)]);
        // Nothing held any more, so a lone buffer is bare again.
        assert_eq!(framer.push(b"ping"), vec![command("ping", false)]);
    }

    #[test]
    fn test_overgrown_held_line_dropped_until_newline() {
        let mut framer = CommandFramer::new(8);
        assert_eq!(framer.push(b"ping\nset_st"), vec![command("ping", true)]);
        assert_eq!(
            framer.push(b"ate=con"),
            vec![Frame::Oversized { terminated: true }]
        );
        assert!(framer.push(b"fig").is_empty());
        assert_eq!(framer.push(b"\nping\n"), vec![command("ping", true)]);
    }

    #[tokio::test]
    async fn test_connection_answers_split_line_with_newline() {
        let gateway = Gateway::new(MockTransport::new(), RetryPolicy::default());
        let stream = tokio_test::io::Builder::new()
            .read(b"ping\nget")
            .write(b"pong\n")
            .read(b"_state")
            .read(b"\n")
            .write(b"state:idle\n")
            .build();

        handle_connection(stream, "test", gateway, 1024)
            .await
            .unwrap();
    }

    #[test]
    fn test_empty_lines_ignored() {
        let mut framer = CommandFramer::new(1024);
        assert!(framer.push(b"\n  \n").is_empty());
        assert!(framer.push(b"   ").is_empty());
    }

    #[test]
    fn test_oversized_line_flagged() {
        let mut framer = CommandFramer::new(8);
        assert_eq!(framer.push(b"ping\nset_st"), vec![command("ping", true)]);
        assert_eq!(
            framer.push(b"ate=config\n"),
            vec![Frame::Oversized { terminated: true }]
        );
    }

    #[tokio::test]
    async fn test_connection_replies_in_matching_framing() {
        let gateway = Gateway::new(MockTransport::new(), RetryPolicy::default());
        let stream = tokio_test::io::Builder::new()
            .read(b"ping\n")
            .write(b"pong\n")
            .read(b"get_state")
            .write(b"state:idle")
            .read(b"set_state=capturing\n")
            .write(b"validation_err\n")
            .build();

        handle_connection(stream, "test", gateway, 1024)
            .await
            .unwrap();
    }
}
