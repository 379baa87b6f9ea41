use std::collections::HashMap;
use std::io::{self, prelude::*};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use super::backoff::{ExponentialBackoff, Retry};
use super::comm::{Communicator, Envelope, Tag};
use super::fault::Fault;
use super::mailbox::Mailbox;
use super::util;
use crate::error::Error;

const RETRY_WAIT: Duration = Duration::from_millis(10);
const RETRY_MAX_WAIT: Duration = Duration::from_millis(2000);
const CONNECT_ATTEMPTS: usize = 40;

type Outbound = crossbeam_channel::Sender<(usize, Envelope)>;
type Inbound = crossbeam_channel::Sender<Envelope>;

/// A communicator whose peers are reached over TCP. A listener thread
/// accepts connections from peers and forwards each received envelope to the
/// mailbox; a single sender thread owns one outgoing stream per peer and
/// writes envelopes in the order they were sent. Each frame is a
/// little-endian `u64` byte count followed by the CBOR-encoded envelope, and
/// is acknowledged by the receiver echoing the byte count.
///
/// When the sender thread gives up on a peer, the failure is raised on the
/// communicator's [Fault]: the envelope is lost, and every later `send` and
/// every blocked or later `recv` on this rank returns a transport error.
///
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    send_sink: Option<Outbound>,
    self_sink: Inbound,
    mailbox: Mailbox,
    fault: Fault,
    send_thread: Option<JoinHandle<()>>,
}

/// How a frame failed to go through.
enum FrameError {
    /// The frame was not fully written, so it is safe to send it again.
    Write(io::Error),
    /// The frame was written but not acknowledged; it may have arrived.
    Ack(io::Error),
}

impl TcpCommunicator {
    /// Bind this rank's listening address (`peers[rank]`) and start the
    /// transport threads.
    ///
    pub fn new(rank: usize, peers: Vec<SocketAddr>) -> Result<Self, Error> {
        let address = *peers
            .get(rank)
            .ok_or_else(|| Error::Transport(format!("no address given for rank {}", rank)))?;
        let listener = TcpListener::bind(address)?;
        Ok(Self::from_listener(rank, listener, peers))
    }

    /// Start the transport threads on an already bound listener. This is
    /// useful when the listening ports are chosen by the operating system.
    ///
    pub fn from_listener(rank: usize, listener: TcpListener, peers: Vec<SocketAddr>) -> Self {
        Self::with_connect_attempts(rank, listener, peers, CONNECT_ATTEMPTS)
    }

    /// Like `from_listener`, but give up on a peer after the given number of
    /// failed connection attempts.
    ///
    pub fn with_connect_attempts(
        rank: usize,
        listener: TcpListener,
        peers: Vec<SocketAddr>,
        connect_attempts: usize,
    ) -> Self {
        let num_peers = peers.len();
        let fault = Fault::new();
        let (recv_sink, recv_src) = crossbeam_channel::unbounded();
        let (send_sink, send_src) = crossbeam_channel::unbounded();

        Self::start_listener(listener, recv_sink.clone());
        let send_thread = Self::start_serial_sender(peers, send_src, connect_attempts, fault.clone());

        Self {
            rank,
            num_peers,
            send_sink: Some(send_sink),
            self_sink: recv_sink,
            mailbox: Mailbox::new(recv_src, fault.clone()),
            fault,
            send_thread: Some(send_thread),
        }
    }

    fn start_serial_sender(
        peers: Vec<SocketAddr>,
        send_src: crossbeam_channel::Receiver<(usize, Envelope)>,
        connect_attempts: usize,
        fault: Fault,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut table: HashMap<usize, TcpStream> = HashMap::new();

            for (rank, envelope) in send_src {
                if fault.is_raised() {
                    continue;
                }
                let mut frame = Vec::new();
                if let Err(e) = ciborium::ser::into_writer(&envelope, &mut frame) {
                    error!("failed to encode message for rank {}: {:?}", rank, e);
                    fault.raise(format!("failed to encode message for rank {}: {:?}", rank, e));
                    continue;
                }

                let mut attempts = 0;
                loop {
                    attempts += 1;

                    if !table.contains_key(&rank) {
                        match Self::connect_with_retry(peers[rank], connect_attempts) {
                            Some(stream) => {
                                table.insert(rank, stream);
                            }
                            None => {
                                error!("giving up on rank {} at {}", rank, peers[rank]);
                                fault.raise(format!("could not connect to rank {} at {}", rank, peers[rank]));
                                break;
                            }
                        }
                    }
                    let Some(client) = table.get_mut(&rank) else {
                        break;
                    };

                    match Self::write_frame(client, &frame) {
                        Ok(()) => break,
                        Err(FrameError::Ack(e)) => {
                            warn!("message to {} was not acknowledged: {}, dropping the connection", peers[rank], e);
                            table.remove(&rank);
                            break;
                        }
                        Err(FrameError::Write(e)) if attempts < 3 => {
                            warn!("failed to send message to {}: {}, reconnecting", peers[rank], e);
                            table.remove(&rank);
                        }
                        Err(FrameError::Write(e)) => {
                            error!("failed to send message to {}: {}", peers[rank], e);
                            fault.raise(format!("failed to send message to rank {} at {}: {}", rank, peers[rank], e));
                            break;
                        }
                    }
                }
            }
            debug!("sender thread shutting down");
        })
    }

    fn write_frame(client: &mut TcpStream, frame: &[u8]) -> Result<(), FrameError> {
        let size = frame.len() as u64;
        client.write_all(&size.to_le_bytes()).map_err(FrameError::Write)?;
        client.write_all(frame).map_err(FrameError::Write)?;
        let ack = util::read_u64(client).map_err(FrameError::Ack)?;

        if ack != size {
            return Err(FrameError::Ack(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("receiver acknowledged {} bytes but {} were sent", ack, size),
            )));
        }
        Ok(())
    }

    fn start_listener(listener: TcpListener, recv_sink: Inbound) {
        thread::spawn(move || {
            if let Ok(addr) = listener.local_addr() {
                info!("listening on {}", addr);
            }
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => Self::handle_connection(stream, recv_sink.clone()),
                    Err(e) => error!("failed to accept connection: {}", e),
                }
            }
        });
    }

    fn handle_connection(mut stream: TcpStream, recv_sink: Inbound) {
        let remote = stream.peer_addr().ok();
        debug!("receiving connection from {:?}", remote);

        thread::spawn(move || loop {
            let result = util::read_u64(&mut stream)
                .and_then(|size| util::read_bytes_vec(&mut stream, size as usize))
                .and_then(|bytes| {
                    let envelope: Envelope = ciborium::de::from_reader(&bytes[..])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e)))?;
                    recv_sink
                        .send(envelope)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
                    stream.write_all(&(bytes.len() as u64).to_le_bytes())
                });

            if let Err(e) = result {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    warn!("connection from {:?} failed: {}", remote, e);
                }
                break;
            }
        });
    }

    fn connect_with_retry(addr: SocketAddr, attempts: usize) -> Option<TcpStream> {
        ExponentialBackoff::new(RETRY_WAIT, RETRY_MAX_WAIT, 2)
            .take(attempts)
            .retry(
                || TcpStream::connect(addr),
                |e, delay| {
                    debug!("connect to {} failed: {}, retrying in {:?}", addr, e, delay);
                    thread::sleep(delay)
                },
            )
            .and_then(|result| result.ok())
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        self.fault.check()?;

        if rank >= self.num_peers {
            return Err(Error::Transport(format!("no rank {} among peers", rank)));
        }
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload: message,
        };
        if rank == self.rank {
            return self
                .self_sink
                .send(envelope)
                .map_err(|e| Error::Transport(e.to_string()));
        }
        self.send_sink
            .as_ref()
            .ok_or_else(|| Error::Transport("communicator is shutting down".to_string()))?
            .send((rank, envelope))
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        self.mailbox.recv(rank, tag)
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        // Closing the outbound channel lets the sender thread flush what is
        // queued and exit.
        self.send_sink.take();
        if let Some(handle) = self.send_thread.take() {
            if handle.join().is_err() {
                error!("sender thread panicked");
            }
        }
    }
}
