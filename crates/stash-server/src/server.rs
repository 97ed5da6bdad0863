use std::{
    io,
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use mio::{Events, Interest, Poll, Token, event::Event, net::TcpListener};
use tracing::{debug, error, warn};

use crate::{
    cmd::Db,
    conn::{ConnState, Connection},
};

pub const DEFAULT_PORT: u16 = 1234;
/// Upper bound on one poll wait; only affects how quickly a shutdown request
/// is noticed, never correctness.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Reserved token of the listening socket; connections get `Token(slot + 1)`.
const LISTENER: Token = Token(0);

/// The readiness multiplexer: listener, per-token connection slots and the
/// stores, all driven from a single thread.
struct Engine {
    poll: Poll,
    listener: TcpListener,
    conns: Vec<Option<Connection>>,
    free: Vec<usize>,
    db: Db,
}

/// The network service. Bind once, then drive [`Server::run`] (or
/// [`Server::poll_once`] from a harness) until the stop flag is raised.
pub struct Server {
    events: Events,
    engine: Engine,
}

impl Server {
    /// Bind the listener (non-blocking, `SO_REUSEADDR`) and register it for
    /// read readiness.
    pub fn bind(addr: SocketAddr, max_level: usize) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Self {
            events: Events::with_capacity(256),
            engine: Engine {
                poll,
                listener,
                conns: Vec::new(),
                free: Vec::new(),
                db: Db::new(max_level),
            },
        })
    }

    /// Actual bound address; useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.engine.listener.local_addr()
    }

    /// Poll until `stop` is raised. The poll timeout bounds how stale the
    /// flag can get.
    pub fn run(&mut self, stop: &AtomicBool, timeout: Duration) -> io::Result<()> {
        while !stop.load(Ordering::Relaxed) {
            self.poll_once(timeout)?;
        }
        Ok(())
    }

    /// One readiness cycle: wait, then route every event.
    pub fn poll_once(&mut self, timeout: Duration) -> io::Result<()> {
        if let Err(err) = self.engine.poll.poll(&mut self.events, Some(timeout)) {
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }
        for event in self.events.iter() {
            self.engine.handle_event(event);
        }
        Ok(())
    }
}

impl Engine {
    fn handle_event(&mut self, event: &Event) {
        let token = event.token();
        if token == LISTENER {
            return self.accept_ready();
        }

        let idx = token.0 - 1;
        let Some(conn) = self.conns.get_mut(idx).and_then(Option::as_mut) else {
            debug!(?token, "event for vacated slot");
            return;
        };

        if event.is_error() {
            debug!(?token, "error event");
            conn.close();
        } else {
            conn.on_ready(&mut self.db);
        }

        if let Some(interest) = conn.interest() {
            if let Err(err) = self.poll.registry().reregister(conn.stream_mut(), token, interest)
            {
                warn!(?err, ?token, "rearm failed");
                conn.close();
            }
        }

        if conn.state() == ConnState::Closed {
            let mut conn = self.conns[idx].take().expect("slot occupied");
            let _ = self.poll.registry().deregister(conn.stream_mut());
            self.free.push(idx);
            debug!(?token, "connection closed");
        }
    }

    /// Accept everything currently pending; the poll is edge-triggered, so
    /// stopping early could strand connections until the next client shows
    /// up.
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        debug!(?err, "set_nodelay");
                    }
                    let idx = self.free.pop().unwrap_or_else(|| {
                        self.conns.push(None);
                        self.conns.len() - 1
                    });
                    let token = Token(idx + 1);
                    let mut conn = Connection::new(stream);
                    match self.poll.registry().register(
                        conn.stream_mut(),
                        token,
                        Interest::READABLE,
                    ) {
                        Ok(()) => {
                            debug!(?addr, ?token, "client connected");
                            self.conns[idx] = Some(conn);
                        }
                        Err(err) => {
                            error!(?err, "register accepted stream");
                            self.free.push(idx);
                        }
                    }
                }
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    error!(?err, "accept failed");
                    break;
                }
            }
        }
    }
}
