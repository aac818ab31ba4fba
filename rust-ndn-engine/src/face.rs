//! Faces: framed packet transport to a forwarder.
//!
//! A face, once opened, is a pair of channels carrying whole TLV frames.
//! The Unix-stream face talks to a local NFD socket and reconnects with
//! exponential backoff; the memory face is a cross-connected in-process
//! pair for tests and loopback setups.

use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use rust_ndn_common::error::Error;
use rust_ndn_common::tlv::TlNum;
use rust_ndn_common::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

/// Default NFD socket path.
pub const DEFAULT_NFD_SOCKET: &str = "/var/run/nfd/nfd.sock";

/// Maximum size of an NDN packet accepted from a face.
pub const MAX_PACKET_SIZE: usize = 8800;

const RECONNECT_INITIAL: Duration = Duration::from_millis(100);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// An opened face: outgoing and incoming frame channels. Dropping the
/// sender closes the face; its I/O tasks stop once both sides are gone.
pub struct FaceConnection {
    pub tx: mpsc::UnboundedSender<Bytes>,
    pub rx: mpsc::UnboundedReceiver<Bytes>,
}

/// A transport endpoint to a forwarder.
pub enum Face {
    Unix(UnixFace),
    Memory(MemoryFace),
}

impl Face {
    /// A Unix-stream face to the given socket path.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Face::Unix(UnixFace { path: path.into() })
    }

    /// A Unix-stream face to the default NFD socket.
    pub fn default_unix() -> Self {
        Self::unix(DEFAULT_NFD_SOCKET)
    }

    /// Two directly connected in-process faces.
    pub fn memory_pair() -> (Face, Face) {
        let (a2b_tx, a2b_rx) = mpsc::unbounded_channel();
        let (b2a_tx, b2a_rx) = mpsc::unbounded_channel();
        (
            Face::Memory(MemoryFace {
                tx: a2b_tx,
                rx: b2a_rx,
            }),
            Face::Memory(MemoryFace {
                tx: b2a_tx,
                rx: a2b_rx,
            }),
        )
    }

    /// Open the face, spawning its I/O tasks where needed.
    pub async fn open(self) -> Result<FaceConnection> {
        match self {
            Face::Unix(face) => face.open().await,
            Face::Memory(face) => Ok(FaceConnection {
                tx: face.tx,
                rx: face.rx,
            }),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Unix-stream face
 * ---------------------------------------------------------------- */

/// TLV stream over a Unix domain socket.
pub struct UnixFace {
    path: PathBuf,
}

impl UnixFace {
    async fn open(self) -> Result<FaceConnection> {
        // Connect once up front so startup failures surface to the
        // caller; later disconnects are retried by the I/O task.
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| Error::Transport(format!("connect {:?}: {e}", self.path)))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_unix(self.path, Some(stream), out_rx, in_tx));
        Ok(FaceConnection {
            tx: out_tx,
            rx: in_rx,
        })
    }
}

async fn run_unix(
    path: PathBuf,
    mut initial: Option<UnixStream>,
    mut out_rx: mpsc::UnboundedReceiver<Bytes>,
    in_tx: mpsc::UnboundedSender<Bytes>,
) {
    let mut backoff = RECONNECT_INITIAL;
    loop {
        let stream = match initial.take() {
            Some(stream) => stream,
            None => match UnixStream::connect(&path).await {
                Ok(stream) => {
                    debug!("face reconnected to {path:?}");
                    stream
                }
                Err(e) => {
                    warn!("face reconnect to {path:?} failed: {e}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RECONNECT_MAX);
                    continue;
                }
            },
        };
        backoff = RECONNECT_INITIAL;

        if !serve_stream(stream, &mut out_rx, &in_tx).await {
            debug!("face to {path:?} closed");
            return;
        }
        if in_tx.is_closed() {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(RECONNECT_MAX);
    }
}

/// Pump one connection. Returns true to reconnect, false when the face
/// was closed locally.
async fn serve_stream(
    mut stream: UnixStream,
    out_rx: &mut mpsc::UnboundedReceiver<Bytes>,
    in_tx: &mpsc::UnboundedSender<Bytes>,
) -> bool {
    let mut buf = BytesMut::with_capacity(2 * MAX_PACKET_SIZE);
    loop {
        tokio::select! {
            read = stream.read_buf(&mut buf) => match read {
                Ok(0) => return true,
                Ok(_) => loop {
                    match extract_frame(&mut buf) {
                        Ok(Some(frame)) => {
                            if in_tx.send(frame).is_err() {
                                return false;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("dropping face stream: {e}");
                            return true;
                        }
                    }
                },
                Err(e) => {
                    warn!("face read error: {e}");
                    return true;
                }
            },
            frame = out_rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = stream.write_all(&frame).await {
                        warn!("face write error: {e}");
                        return true;
                    }
                }
                None => return false,
            },
        }
    }
}

/// Split one complete TLV frame off the front of the stream buffer.
fn extract_frame(buf: &mut BytesMut) -> Result<Option<Bytes>> {
    let Some((_, type_len)) = TlNum::peek(buf) else {
        return Ok(None);
    };
    let Some((length, len_len)) = TlNum::peek(&buf[type_len..]) else {
        return Ok(None);
    };
    if length.0 as usize > MAX_PACKET_SIZE {
        return Err(Error::Transport(format!(
            "oversized frame of {} bytes",
            length.0
        )));
    }
    let total = type_len + len_len + length.0 as usize;
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some(buf.split_to(total).freeze()))
}

/* ---------------------------------------------------------------- *
 * Memory face
 * ---------------------------------------------------------------- */

/// One end of an in-process face pair; each sent frame arrives whole at
/// the peer.
pub struct MemoryFace {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndn_common::tlv::encode_tlv;

    #[test]
    fn frame_extraction() {
        let mut buf = BytesMut::new();
        encode_tlv(0x05, b"abc", &mut buf);
        encode_tlv(0x06, b"defgh", &mut buf);
        buf.extend_from_slice(&[0x05]); // partial third frame

        let first = extract_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&first[2..], b"abc");
        let second = extract_frame(&mut buf).unwrap().unwrap();
        assert_eq!(&second[2..], b"defgh");
        assert!(extract_frame(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x05, 253]);
        buf.extend_from_slice(&(u16::MAX).to_be_bytes());
        assert!(extract_frame(&mut buf).is_err());
    }

    #[tokio::test]
    async fn memory_pair_delivers_frames() {
        let (a, b) = Face::memory_pair();
        let a = a.open().await.unwrap();
        let mut b = b.open().await.unwrap();

        a.tx.send(Bytes::from_static(b"frame")).unwrap();
        assert_eq!(b.rx.recv().await.unwrap(), Bytes::from_static(b"frame"));

        drop(a);
        assert!(b.rx.recv().await.is_none());
    }
}
