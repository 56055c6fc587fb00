//! Status protocol framing
//!
//! Ping (client -> server): magic (u32 BE) + version (u32 BE).
//! Reply (server -> client): magic, version, online (u16), max (u16), then the
//! sub-server list. Each sub-server is a 1-byte name length, the UTF-8 name and
//! four u16 counters (offline queue, deprecated queue, players, cap).

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAGIC: u32 = 0xEBAC_ABEE;
pub const VERSION: u32 = 3;

/// How the sub-server list length is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerList {
    /// One count byte precedes the records
    Counted,
    /// Exactly this many records follow, without a count byte
    Fixed(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubServer {
    pub name: String,
    pub offline_queue: u16,
    pub deprecated_queue: u16,
    pub players: u16,
    pub cap: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResult {
    pub online: u16,
    pub max: u16,
    pub servers: Vec<SubServer>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unexpected magic {found:#010x}")]
    BadMagic { found: u32 },
    #[error("unexpected version {found}")]
    BadVersion { found: u32 },
    #[error("frame truncated")]
    Truncated,
    #[error("sub-server name is not UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
    #[error("socket error: {0}")]
    Io(io::Error),
}

impl ProtocolError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadMagic { .. } => "bad_magic",
            Self::BadVersion { .. } => "bad_version",
            Self::Truncated => "truncated",
            Self::Decode(_) => "decode",
            Self::Io(_) => "io",
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

/// Write the 8-byte ping and flush it
pub async fn write_ping<W: AsyncWrite + Unpin>(writer: &mut W) -> io::Result<()> {
    let mut ping = [0u8; 8];
    ping[..4].copy_from_slice(&MAGIC.to_be_bytes());
    ping[4..].copy_from_slice(&VERSION.to_be_bytes());
    writer.write_all(&ping).await?;
    writer.flush().await
}

/// Read one reply frame. Nothing is returned unless the whole frame decodes.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    layout: ServerList,
) -> Result<StatusResult, ProtocolError> {
    let magic = reader.read_u32().await?;
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic { found: magic });
    }
    let version = reader.read_u32().await?;
    if version != VERSION {
        return Err(ProtocolError::BadVersion { found: version });
    }

    let online = reader.read_u16().await?;
    let max = reader.read_u16().await?;

    let count = match layout {
        ServerList::Counted => reader.read_u8().await?,
        ServerList::Fixed(count) => count,
    };

    let mut servers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        servers.push(read_server(reader).await?);
    }

    Ok(StatusResult { online, max, servers })
}

async fn read_server<R: AsyncRead + Unpin>(reader: &mut R) -> Result<SubServer, ProtocolError> {
    let name_len = reader.read_u8().await? as usize;
    let mut name = vec![0u8; name_len];
    reader.read_exact(&mut name).await?;
    let name = std::str::from_utf8(&name)?.to_owned();

    Ok(SubServer {
        name,
        offline_queue: reader.read_u16().await?,
        deprecated_queue: reader.read_u16().await?,
        players: reader.read_u16().await?,
        cap: reader.read_u16().await?,
    })
}
