//! One TCP session against the status server
//!
//! Connect, then ping / read / render / notify until something fails. The
//! stream is owned by `run`, so it is closed on every exit path.

use std::io;
use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::codec::{self, ProtocolError, StatusResult};
use crate::config::Config;
use crate::notify::{Notifier, NotifyError};
use crate::template::{self, Flash};

/// Why a session ended
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot connect to {target}: {source}")]
    Connect { target: String, source: io::Error },
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol violation ({reason}): {0}", reason = .0.reason())]
    Protocol(#[from] ProtocolError),
    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),
}

pub struct Session<'a> {
    config: &'a Config,
    notifier: &'a Notifier,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a Config, notifier: &'a Notifier) -> Self {
        Self { config, notifier }
    }

    /// Run until the session fails. Never returns `Ok`.
    pub async fn run(&self, flash: &mut Flash) -> Result<(), SessionError> {
        debug!("Setting up connection");
        let mut stream = self.connect().await?;

        debug!("Connection set up. Pinging");
        loop {
            time::sleep(self.config.ping_delay()).await;
            self.tick(&mut stream, flash).await?;
        }
    }

    /// Resolve and connect; the server timeout bounds the whole step
    async fn connect(&self) -> Result<TcpStream, SessionError> {
        let deadline = Instant::now() + self.config.server_timeout();
        let host = self.config.server.host.as_str();
        let port = self.config.server.port;
        let target = format!("{host}:{port}");

        let addrs = time::timeout_at(deadline, lookup_host((host, port)))
            .await
            .map_err(|_| SessionError::Timeout("host lookup"))?
            .map_err(|source| SessionError::Connect {
                target: target.clone(),
                source,
            })?;

        connect_any(addrs, deadline)
            .await
            .map_err(|source| SessionError::Connect { target, source })
    }

    /// One ping/read/render/notify cycle
    async fn tick(&self, stream: &mut TcpStream, flash: &mut Flash) -> Result<StatusResult, SessionError> {
        let timeout = self.config.server_timeout();

        time::timeout(timeout, codec::write_ping(stream))
            .await
            .map_err(|_| SessionError::Timeout("ping write"))??;

        let result = time::timeout(timeout, codec::read_frame(stream, self.config.server_list()))
            .await
            .map_err(|_| SessionError::Timeout("frame read"))??;
        info!("Result: {:?}", result);

        let body = template::render(&self.config.webhook.online, &result, *flash);
        let outcome = self.notifier.notify(body).await?;
        debug!(
            "Webhook accepted: {} ({} byte body, waited {:?})",
            outcome.status,
            outcome.body.len(),
            outcome.retry_after
        );
        flash.flip();

        Ok(result)
    }
}

/// Try each address in turn until one connects or the deadline passes
async fn connect_any(
    addrs: impl IntoIterator<Item = SocketAddr>,
    deadline: Instant,
) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in addrs {
        match time::timeout_at(deadline, open(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
            Err(_) => {
                last_error = Some(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
                break;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved")))
}

async fn open(addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(true)?;
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}
