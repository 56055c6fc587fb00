/*!
Serveur de statut scripté pour tests sans vrai serveur de jeu

Accepte des connexions TCP locales, lit chaque ping de 8 octets et répond
selon un script. Le même script est rejoué pour chaque connexion; une fois
épuisé, la connexion est fermée au ping suivant. Les fermetures initiées par
le client (EOF) sont comptées séparément.
*/

use anyhow::Result;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Réponse à un ping
#[derive(Debug, Clone)]
pub enum Reply {
    /// Envoie ces octets tels quels
    Frame(Vec<u8>),
    /// Ne répond jamais, garde la connexion ouverte
    Silence,
}

pub struct StubStatusServer {
    addr: SocketAddr,
    pings: Arc<Mutex<Vec<[u8; 8]>>>,
    connections: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl StubStatusServer {
    /// Démarre le serveur sur un port local éphémère
    pub async fn start(script: Vec<Reply>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let pings = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        let accept_task = {
            let pings = pings.clone();
            let connections = connections.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                loop {
                    let (stream, peer) = match listener.accept().await {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            log::warn!("[STUB] accept error: {}", e);
                            continue;
                        }
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    log::info!("🔌 [STUB] Connection from {}", peer);

                    let script = script.clone();
                    let pings = pings.clone();
                    let closed = closed.clone();
                    tokio::spawn(async move {
                        match serve(stream, script, pings).await {
                            Ok(Ending::PeerClosed) => {
                                closed.fetch_add(1, Ordering::SeqCst);
                                log::info!("🔒 [STUB] {} closed the connection", peer);
                            }
                            Ok(Ending::ScriptDone) => {}
                            Err(e) => log::debug!("[STUB] connection from {} ended: {}", peer, e),
                        }
                    });
                }
            })
        };

        log::info!("📡 [STUB] Status server listening on {}", addr);
        Ok(Self {
            addr,
            pings,
            connections,
            closed,
            accept_task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Pings reçus, toutes connexions confondues
    pub fn pings(&self) -> Vec<[u8; 8]> {
        self.pings.lock().unwrap().clone()
    }

    /// Nombre de connexions acceptées
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Nombre de connexions fermées par le client
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Attend que le client ait fermé `count` connexions
    pub async fn wait_for_closed(&self, count: usize, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if self.closed() >= count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        anyhow::bail!(
            "Timeout waiting for {} closed connections ({} of {} closed)",
            count,
            self.closed(),
            self.connections()
        );
    }
}

impl Drop for StubStatusServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Comment une connexion servie s'est terminée
enum Ending {
    PeerClosed,
    ScriptDone,
}

async fn serve(
    mut stream: TcpStream,
    script: Vec<Reply>,
    pings: Arc<Mutex<Vec<[u8; 8]>>>,
) -> std::io::Result<Ending> {
    let mut replies = script.into_iter();
    loop {
        let mut ping = [0u8; 8];
        match stream.read_exact(&mut ping).await {
            Ok(_) => {}
            Err(e) if peer_closed(&e) => return Ok(Ending::PeerClosed),
            Err(e) => return Err(e),
        }
        pings.lock().unwrap().push(ping);

        match replies.next() {
            Some(Reply::Frame(bytes)) => {
                stream.write_all(&bytes).await?;
                stream.flush().await?;
            }
            Some(Reply::Silence) => {
                let mut sink = [0u8; 64];
                loop {
                    match stream.read(&mut sink).await {
                        Ok(0) => return Ok(Ending::PeerClosed),
                        Ok(_) => {}
                        Err(e) if peer_closed(&e) => return Ok(Ending::PeerClosed),
                        Err(e) => return Err(e),
                    }
                }
            }
            None => return Ok(Ending::ScriptDone),
        }
    }
}

/// Un client qui ferme avec des octets non lus envoie un RST plutôt qu'un FIN
fn peer_closed(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset)
}
