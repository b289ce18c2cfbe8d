//! A single framed connection to a node or to the admin plane

use super::ClientOptions;
use crate::error::StoreResult;
use crate::protocol::{read_outcome, write_request, Request, Response};
use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    /// Dial an endpoint, trying each resolved address in turn
    pub fn open(endpoint: &str, options: &ClientOptions) -> io::Result<Self> {
        let mut last_err = None;
        for addr in endpoint.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, options.connect_timeout) {
                Ok(stream) => return Self::from_stream(stream, options),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} did not resolve to any address", endpoint),
            )
        }))
    }

    fn from_stream(stream: TcpStream, options: &ClientOptions) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(options.io_timeout)?;
        stream.set_write_timeout(options.io_timeout)?;

        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(Self { reader, writer })
    }

    /// Send one request and wait for its outcome.
    ///
    /// `Err` is a transport failure and leaves the connection unusable;
    /// `Ok(Err(..))` is the peer's answer.
    pub fn call(&mut self, request: &Request) -> io::Result<StoreResult<Response>> {
        write_request(&mut self.writer, request)?;
        read_outcome(&mut self.reader)
    }

    pub fn shutdown(&self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}
