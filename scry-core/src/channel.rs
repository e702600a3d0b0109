//! Managed control-channel connection.
//!
//! Wraps a TCP stream in the [`ControlCodec`] and splits it into
//! background reader/writer tasks bridged by mpsc channels, so callers
//! get plain `send`/`recv` without owning the socket halves.

use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::ControlCodec;
use crate::error::ScryError;
use crate::message::ControlFrame;

/// Cloneable sender half of a control channel. Dropping all clones
/// (plus the owning [`ControlChannel`]) closes the writer task.
pub type ControlSender = mpsc::Sender<ControlFrame>;

/// A control connection to a single peer.
#[derive(Debug)]
pub struct ControlChannel {
    tx: mpsc::Sender<ControlFrame>,
    rx: mpsc::Receiver<ControlFrame>,
}

impl ControlChannel {
    /// Wrap an established stream, spawning the reader/writer tasks.
    pub fn new(stream: TcpStream) -> Self {
        let (mut net_writer, mut net_reader) = Framed::new(stream, ControlCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<ControlFrame>(100);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel::<ControlFrame>(100);

        // Writer task: User -> Network
        tokio::spawn(async move {
            while let Some(frame) = network_rx.recv().await {
                if let Err(e) = net_writer.send(frame).await {
                    debug!("control write error: {e}");
                    break;
                }
            }
        });

        // Reader task: Network -> User
        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(frame) => {
                        if network_tx.send(frame).await.is_err() {
                            // user_rx was dropped, stop reading
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("control read error: {e}");
                        break;
                    }
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
        }
    }

    /// Connect to `addr` and wrap the resulting stream.
    pub async fn connect(addr: &str) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Queue a frame for transmission.
    pub async fn send(&self, frame: ControlFrame) -> Result<(), ScryError> {
        self.tx.send(frame).await?;
        Ok(())
    }

    /// Receive the next frame. `None` means the connection closed.
    pub async fn recv(&mut self) -> Option<ControlFrame> {
        self.rx.recv().await
    }

    /// A cloneable handle for sending from other tasks.
    pub fn sender(&self) -> ControlSender {
        self.tx.clone()
    }
}
