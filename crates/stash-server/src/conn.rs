use std::io::{self, Read, Write};

use mio::{Interest, net::TcpStream};
use stash_wire::{HEADER_LEN, MAX_MSG, parse_request};
use tracing::{debug, warn};

use crate::cmd::{self, Db};

/// Room for one maximal frame, header included.
const RBUF_CAP: usize = HEADER_LEN + MAX_MSG;
const WBUF_CAP: usize = HEADER_LEN + MAX_MSG;

/// Where a connection is in its request/response cycle.
///
/// READING collects bytes until at least one full request frame is buffered;
/// WRITING drains the pending reply; CLOSED means the socket is dead and the
/// event loop should reclaim the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Reading,
    Writing,
    Closed,
}

/// One client connection: the owned stream plus fixed receive and send
/// buffers. Frames are reassembled from partial reads and replies resumed
/// across partial writes; everything else is the state machine below.
pub(crate) struct Connection {
    stream: TcpStream,
    state: ConnState,
    rbuf: [u8; RBUF_CAP],
    rlen: usize,
    wbuf: [u8; WBUF_CAP],
    wlen: usize,
    wsent: usize,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            state: ConnState::Reading,
            rbuf: [0; RBUF_CAP],
            rlen: 0,
            wbuf: [0; WBUF_CAP],
            wlen: 0,
            wsent: 0,
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> ConnState {
        self.state
    }

    /// The poll interest matching the current state, or `None` once closed.
    pub(crate) fn interest(&self) -> Option<Interest> {
        match self.state {
            ConnState::Reading => Some(Interest::READABLE),
            ConnState::Writing => Some(Interest::WRITABLE),
            ConnState::Closed => None,
        }
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub(crate) fn close(&mut self) {
        self.state = ConnState::Closed;
    }

    /// Run the I/O routine for the current state until it stops making
    /// progress.
    pub(crate) fn on_ready(&mut self, db: &mut Db) {
        match self.state {
            ConnState::Reading => while self.try_fill(db) {},
            ConnState::Writing => while self.try_flush() {},
            ConnState::Closed => {}
        }
    }

    /// One non-blocking read into the free tail of the receive buffer, then
    /// the drain loop over every complete request now buffered. Returns
    /// whether another read is worth attempting.
    fn try_fill(&mut self, db: &mut Db) -> bool {
        debug_assert!(self.rlen < RBUF_CAP, "full receive buffer holds a complete frame");
        let read = loop {
            match self.stream.read(&mut self.rbuf[self.rlen..]) {
                Ok(n) => break n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return false,
                Err(err) => {
                    warn!(?err, "read failed");
                    self.state = ConnState::Closed;
                    return false;
                }
            }
        };
        if read == 0 {
            if self.rlen > 0 {
                warn!(buffered = self.rlen, "eof inside a frame");
            } else {
                debug!("client closed");
            }
            self.state = ConnState::Closed;
            return false;
        }
        self.rlen += read;

        while self.try_one_request(db) {}
        self.state == ConnState::Reading
    }

    /// Cut one complete request out of the receive buffer, dispatch it and
    /// stage the reply, then flush inline. Returns whether the connection is
    /// still READING, i.e. whether the next pipelined request should be
    /// tried.
    fn try_one_request(&mut self, db: &mut Db) -> bool {
        if self.rlen < HEADER_LEN {
            return false;
        }
        let len =
            u32::from_le_bytes(self.rbuf[..HEADER_LEN].try_into().expect("4 bytes")) as usize;
        if len > MAX_MSG {
            warn!(len, "frame over payload limit");
            self.state = ConnState::Closed;
            return false;
        }
        if HEADER_LEN + len > self.rlen {
            return false;
        }

        let args = match parse_request(&self.rbuf[HEADER_LEN..HEADER_LEN + len]) {
            Ok(args) => args,
            Err(err) => {
                warn!(%err, "bad request");
                self.state = ConnState::Closed;
                return false;
            }
        };
        let body = cmd::execute_to_bytes(&args, db);
        self.wbuf[..HEADER_LEN].copy_from_slice(&(body.len() as u32).to_le_bytes());
        self.wbuf[HEADER_LEN..HEADER_LEN + body.len()].copy_from_slice(&body);
        self.wlen = HEADER_LEN + body.len();
        self.wsent = 0;

        // pull the unconsumed tail to the front for the next request
        self.rbuf.copy_within(HEADER_LEN + len..self.rlen, 0);
        self.rlen -= HEADER_LEN + len;

        self.state = ConnState::Writing;
        while self.try_flush() {}
        self.state == ConnState::Reading
    }

    /// One non-blocking write of the unsent reply range. Returns whether
    /// more writing is worth attempting right now.
    fn try_flush(&mut self) -> bool {
        let written = loop {
            match self.stream.write(&self.wbuf[self.wsent..self.wlen]) {
                Ok(n) => break n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return false,
                Err(err) => {
                    warn!(?err, "write failed");
                    self.state = ConnState::Closed;
                    return false;
                }
            }
        };
        if written == 0 {
            warn!("write made no progress");
            self.state = ConnState::Closed;
            return false;
        }
        self.wsent += written;
        debug_assert!(self.wsent <= self.wlen);
        if self.wsent == self.wlen {
            self.wlen = 0;
            self.wsent = 0;
            self.state = ConnState::Reading;
            return false;
        }
        true
    }
}
