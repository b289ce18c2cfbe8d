//! TCP listener
//!
//! Accepts connections and serves each one on its own thread, so a slow
//! request only holds up its own connection.

use super::RequestHandler;
use crate::error::StoreError;
use crate::protocol::{read_frame, write_outcome, Request};
use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Thread-per-connection RPC server
pub struct RpcServer<H: RequestHandler> {
    name: &'static str,
    listener: TcpListener,
    handler: Arc<H>,
}

impl<H: RequestHandler> RpcServer<H> {
    /// Bind the listening socket. Port 0 picks a free port.
    pub fn bind<A: ToSocketAddrs>(name: &'static str, addr: A, handler: Arc<H>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            name,
            listener,
            handler,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop on the current thread
    pub fn run(&self) -> io::Result<()> {
        log::info!("{} listening on {}", self.name, self.local_addr()?);

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = Arc::clone(&self.handler);
                    let name = self.name;
                    thread::spawn(move || {
                        if let Err(e) = handle_client(stream, handler) {
                            log::warn!("{} client handler error: {}", name, e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("{} connection error: {}", self.name, e);
                }
            }
        }

        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.local_addr()?;
        let name = self.name;
        let handle = thread::Builder::new()
            .name(format!("{}-accept", name))
            .spawn(move || {
                if let Err(e) = self.run() {
                    log::error!("{} stopped: {}", name, e);
                }
            })?;
        Ok((addr, handle))
    }
}

/// Serve one connection until the peer hangs up
fn handle_client<H: RequestHandler>(stream: TcpStream, handler: Arc<H>) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    stream.set_nodelay(true)?;
    log::debug!("New connection from {}", peer);

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    loop {
        let (opcode, payload) = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                log::debug!("Client {} disconnected", peer);
                return Ok(());
            }
            Err(e) => {
                log::warn!("Error reading frame from {}: {}", peer, e);
                return Err(e);
            }
        };

        // a bad payload inside a good frame leaves the stream in sync
        let outcome = Request::decode(opcode, &payload).and_then(|request| {
            log::debug!("{} -> {:?}", peer, request.opcode());
            handler.handle(request)
        });
        if let Err(StoreError::Io(e)) = &outcome {
            log::warn!("Request {:?} from {} failed: {}", opcode, peer, e);
        }

        write_outcome(&mut writer, &outcome)?;
    }
}
