// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

use crate::com::backend_local::LocalFabric;
use crate::com::interface::{Cell, Fabric};
use crate::com::protocol::{self, fabric_pdu::Kind, FabricPdu};
use crate::error::Error;
use crate::error::Error::{Channel, Io};
use crate::timestamp::{Clock, ServerClock, Timestamp};
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, error, info, trace, warn};
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token, Waker};
use std::io::{ErrorKind, Read as _, Write as _};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timeout for establishing the connection to the fabric server
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Interval between clock synchronization requests
pub const SYNC_INTERVAL: Duration = Duration::from_secs(1);

const STREAM: Token = Token(0);
const WAKER: Token = Token(1);
const READ_CHUNK_SIZE: usize = 4096;
/// How long a dropped fabric waits for queued publishes to reach the socket
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_millis(100);

/// Client of a fabric server reached over TCP.
///
/// A background thread owns the socket. It keeps a local cache of all subscribed topics and
/// an estimate of the server clock. Reads are served from the cache without touching the
/// network; publishes are queued to the thread. When the connection is lost, the cache keeps
/// its last values (which then age out) and further publishes fail.
pub struct SocketFabric {
    cache: LocalFabric,
    clock: Arc<ServerClock>,
    outgoing: Mutex<mpsc::Sender<FabricPdu>>,
    waker: Arc<Waker>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SocketFabric {
    /// Connect to the fabric server at `address` and start the I/O thread
    pub fn connect(address: SocketAddr) -> Result<Self, Error> {
        info!("Connecting to fabric server at {address}");
        let stream = std::net::TcpStream::connect_timeout(&address, CONNECT_TIMEOUT)
            .map_err(|e| Io((e, "failed to connect to fabric server")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Io((e, "failed to set TCP_NODELAY")))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| Io((e, "failed to set socket nonblocking")))?;
        let mut stream = TcpStream::from_std(stream);

        let poll = Poll::new().map_err(|e| Io((e, "failed to create poll")))?;
        poll.registry()
            .register(&mut stream, STREAM, Interest::READABLE | Interest::WRITABLE)
            .map_err(|e| Io((e, "failed to register fabric stream")))?;
        let waker = Arc::new(
            Waker::new(poll.registry(), WAKER).map_err(|e| Io((e, "failed to create waker")))?,
        );

        let clock = Arc::new(ServerClock::new());
        let cache = LocalFabric::with_clock(clock.clone());
        let (sender, receiver) = mpsc::channel();
        let connected = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut io = IoLoop {
            stream,
            poll,
            outgoing: receiver,
            read_buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            write_buf: BytesMut::new(),
            cache: cache.clone(),
            clock: clock.clone(),
            shutdown: shutdown.clone(),
        };
        let thread_connected = connected.clone();
        let thread = thread::Builder::new()
            .name("fabric-io".to_owned())
            .spawn(move || {
                match io.run() {
                    Ok(()) => debug!("Fabric I/O thread stopped"),
                    Err(e) => error!("Fabric connection failed: {e}"),
                }
                thread_connected.store(false, Ordering::Release);
            })
            .map_err(|e| Io((e, "failed to spawn fabric i/o thread")))?;

        Ok(Self {
            cache,
            clock,
            outgoing: Mutex::new(sender),
            waker,
            connected,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Whether the connection to the server is still up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Whether the server clock estimate is based on at least one exchange
    pub fn is_clock_synced(&self) -> bool {
        self.clock.is_synced()
    }

    fn send(&self, pdu: FabricPdu) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Channel("fabric connection closed"));
        }
        self.outgoing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(pdu)
            .map_err(|_| Channel("fabric connection closed"))?;
        self.waker
            .wake()
            .map_err(|e| Io((e, "failed to wake fabric i/o thread")))
    }
}

impl Fabric for SocketFabric {
    fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Error> {
        protocol::check_publish_size(topic, &payload)?;
        trace!("Queueing publish of {} bytes on {topic}", payload.len());
        self.send(FabricPdu::publish(topic, payload))
    }

    fn subscribe(&self, topic: &str) -> Result<(), Error> {
        debug!("Subscribing to {topic}");
        self.send(FabricPdu::subscribe(topic))
    }

    fn latest(&self, topic: &str) -> Option<Cell> {
        self.cache.latest(topic)
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn is_clock_synced(&self) -> bool {
        SocketFabric::is_clock_synced(self)
    }
}

impl Drop for SocketFabric {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        _ = self.waker.wake(); // errors ignored
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Fabric I/O thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for SocketFabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketFabric")
            .field("connected", &self.is_connected())
            .field("clock_synced", &self.is_clock_synced())
            .finish()
    }
}

/// State owned by the I/O thread
struct IoLoop {
    stream: TcpStream,
    poll: Poll,
    outgoing: mpsc::Receiver<FabricPdu>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    cache: LocalFabric,
    clock: Arc<ServerClock>,
    shutdown: Arc<AtomicBool>,
}

impl IoLoop {
    fn run(&mut self) -> Result<(), Error> {
        let mut events = Events::with_capacity(16);
        let mut next_sync = Instant::now();

        loop {
            if Instant::now() >= next_sync {
                let request = FabricPdu::time_request(self.clock.local_now());
                protocol::encode_frame(&request, &mut self.write_buf)?;
                next_sync = Instant::now() + SYNC_INTERVAL;
            }
            self.drain_outgoing();
            self.flush()?;

            let timeout = next_sync.saturating_duration_since(Instant::now());
            if let Err(e) = self.poll.poll(&mut events, Some(timeout)) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(Io((e, "error while polling fabric stream")));
            }

            if self.shutdown.load(Ordering::Acquire) {
                return self.finish();
            }

            for event in events.iter() {
                match event.token() {
                    STREAM => {
                        if event.is_readable() && !self.receive()? {
                            info!("Fabric server closed the connection");
                            return Ok(());
                        }
                        if event.is_writable() {
                            self.flush()?;
                        }
                    }
                    WAKER => (),
                    token => warn!("Unexpected poll token {token:?}"),
                }
            }
        }
    }

    /// Move queued PDUs into the write buffer. A PDU that cannot be encoded is dropped.
    fn drain_outgoing(&mut self) {
        while let Ok(pdu) = self.outgoing.try_recv() {
            if let Err(e) = protocol::encode_frame(&pdu, &mut self.write_buf) {
                error!("Dropping outgoing pdu: {e}");
            }
        }
    }

    /// Send what was queued before shutdown, giving up after [SHUTDOWN_FLUSH_TIMEOUT]
    fn finish(&mut self) -> Result<(), Error> {
        self.drain_outgoing();
        let deadline = Instant::now() + SHUTDOWN_FLUSH_TIMEOUT;
        let mut events = Events::with_capacity(16);
        loop {
            self.flush()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self.write_buf.is_empty() || remaining.is_zero() {
                break;
            }
            if let Err(e) = self.poll.poll(&mut events, Some(remaining)) {
                if e.kind() != ErrorKind::Interrupted {
                    return Err(Io((e, "error while polling fabric stream")));
                }
            }
        }
        if !self.write_buf.is_empty() {
            warn!(
                "Dropping {} unsent bytes on shutdown",
                self.write_buf.len()
            );
        }
        Ok(())
    }

    /// Write as much of the write buffer as the socket takes
    fn flush(&mut self) -> Result<(), Error> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(Io((ErrorKind::WriteZero.into(), "fabric stream closed"))),
                Ok(n) => self.write_buf.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Io((e, "failed to write fabric stream"))),
            }
        }
        Ok(())
    }

    /// Read everything available and handle all complete PDUs. Returns false on end of stream.
    fn receive(&mut self) -> Result<bool, Error> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut open = true;
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    open = false;
                    break;
                }
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Io((e, "failed to read fabric stream"))),
            }
        }

        while let Some(pdu) = protocol::decode_frame(&mut self.read_buf)? {
            self.handle(pdu);
        }
        Ok(open)
    }

    fn handle(&mut self, pdu: FabricPdu) {
        match pdu.kind {
            Some(Kind::Update(update)) => {
                trace!(
                    "Update on {} at {}us",
                    update.topic,
                    update.server_time_us
                );
                let cell = Cell {
                    payload: update.payload,
                    server_time: Timestamp::from_micros(update.server_time_us),
                };
                self.cache.store(&update.topic, cell);
            }
            Some(Kind::TimeReply(reply)) => {
                let received = self.clock.local_now();
                let sent = Timestamp::from_micros(reply.client_time_us);
                let server = Timestamp::from_micros(reply.server_time_us);
                if self.clock.apply_sample(sent, server, received) {
                    trace!(
                        "Clock sample applied, round trip {:?}",
                        received.saturating_duration_since(sent)
                    );
                } else {
                    debug!(
                        "Clock sample dropped, round trip {:?}",
                        received.saturating_duration_since(sent)
                    );
                }
            }
            Some(other) => warn!("Ignoring unexpected pdu from server: {other:?}"),
            None => warn!("Ignoring empty pdu from server"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::SocketFabric;
    use crate::com::protocol::{self, fabric_pdu::Kind, FabricPdu};
    use crate::com::Fabric;
    use crate::error::Error;
    use crate::timestamp::Timestamp;
    use bytes::{Bytes, BytesMut};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::time::{Duration, Instant};

    fn read_pdu(stream: &mut TcpStream, buf: &mut BytesMut) -> FabricPdu {
        loop {
            if let Some(pdu) = protocol::decode_frame(buf).unwrap() {
                return pdu;
            }
            let mut chunk = [0u8; 256];
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "client closed the connection");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn write_pdu(stream: &mut TcpStream, pdu: &FabricPdu) {
        let mut buf = BytesMut::new();
        protocol::encode_frame(pdu, &mut buf).unwrap();
        stream.write_all(&buf).unwrap();
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn talks_the_fabric_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fabric = SocketFabric::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        let mut buf = BytesMut::new();

        // First thing on the wire is a clock synchronization request
        let request = match read_pdu(&mut server, &mut buf).kind {
            Some(Kind::TimeRequest(request)) => request,
            other => panic!("unexpected {other:?}"),
        };
        write_pdu(
            &mut server,
            &FabricPdu::time_reply(request.client_time_us, Timestamp::from_micros(50_000_000)),
        );

        fabric.subscribe("QuestNav/response").unwrap();
        fabric
            .publish("QuestNav/request", Bytes::from_static(b"cmd"))
            .unwrap();
        assert_eq!(
            read_pdu(&mut server, &mut buf),
            FabricPdu::subscribe("QuestNav/response")
        );
        assert_eq!(
            read_pdu(&mut server, &mut buf),
            FabricPdu::publish("QuestNav/request", Bytes::from_static(b"cmd"))
        );

        write_pdu(
            &mut server,
            &FabricPdu::update(
                "QuestNav/response",
                Bytes::from_static(b"resp"),
                Timestamp::from_micros(50_000_100),
            ),
        );
        wait_for(|| fabric.latest("QuestNav/response").is_some());
        let cell = fabric.latest("QuestNav/response").unwrap();
        assert_eq!(cell.payload, Bytes::from_static(b"resp"));
        assert_eq!(cell.server_time, Timestamp::from_micros(50_000_100));

        assert!(fabric.is_clock_synced());
        assert!(fabric.now() >= Timestamp::from_micros(50_000_000));
    }

    #[test]
    fn publish_fails_after_server_hangs_up() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fabric = SocketFabric::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(server);

        wait_for(|| !fabric.is_connected());
        assert!(fabric
            .publish("QuestNav/request", Bytes::from_static(b"cmd"))
            .is_err());
    }

    #[test]
    fn oversized_publish_is_refused_and_connection_survives() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fabric = SocketFabric::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        let mut buf = BytesMut::new();
        assert!(matches!(
            read_pdu(&mut server, &mut buf).kind,
            Some(Kind::TimeRequest(_))
        ));

        let result = fabric.publish("QuestNav/response", Bytes::from(vec![b'x'; 70 * 1024]));
        assert!(matches!(result, Err(Error::Io(_))));

        fabric
            .publish("QuestNav/response", Bytes::from_static(b"ok"))
            .unwrap();
        assert_eq!(
            read_pdu(&mut server, &mut buf),
            FabricPdu::publish("QuestNav/response", Bytes::from_static(b"ok"))
        );
        assert!(fabric.is_connected());
    }

    #[test]
    fn publish_right_before_drop_is_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fabric = SocketFabric::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        fabric
            .publish("QuestNav/request", Bytes::from_static(b"last"))
            .unwrap();
        drop(fabric);

        let mut buf = BytesMut::new();
        let pdu = loop {
            let pdu = read_pdu(&mut server, &mut buf);
            if !matches!(pdu.kind, Some(Kind::TimeRequest(_))) {
                break pdu;
            }
        };
        assert_eq!(
            pdu,
            FabricPdu::publish("QuestNav/request", Bytes::from_static(b"last"))
        );
    }
}
