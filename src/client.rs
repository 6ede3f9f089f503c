//! One-shot probe connections.
//!
//! Every probe opens its own connection, issues a short command sequence
//! and drops it. There is no pooling and no reconnection; a broken
//! connection simply fails the probe that owns it.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::resp::{self, ParseError, RespValue};

/// A connected Redis or Sentinel peer with a per-operation deadline.
pub struct RedisConn {
    stream: TcpStream,
    buf: BytesMut,
    deadline: Duration,
    addr: String,
}

impl RedisConn {
    /// Connect under `deadline`. A connect timeout and a refused
    /// connection are reported as distinct errors but classified the
    /// same way by callers.
    pub async fn connect(endpoint: &Endpoint, deadline: Duration) -> Result<Self> {
        let addr = endpoint.addr();

        let connect_result = timeout(deadline, TcpStream::connect(&addr)).await;

        let stream = match connect_result {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(Error::Connect(addr, e.to_string())),
            Err(_) => return Err(Error::Timeout(deadline)),
        };

        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(4096),
            deadline,
            addr,
        })
    }

    /// Send one command and read one complete reply.
    ///
    /// Error replies are returned as `RespValue::Error`, not `Err`; the
    /// typed helpers decide what an error reply means for them.
    pub async fn command(&mut self, args: &[&[u8]]) -> Result<RespValue> {
        let encoded = resp::encode_command(args);

        let write_result = timeout(self.deadline, self.stream.write_all(&encoded)).await;
        match write_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::Connect(self.addr.clone(), e.to_string())),
            Err(_) => return Err(Error::Timeout(self.deadline)),
        }

        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<RespValue> {
        loop {
            if !self.buf.is_empty() {
                match resp::parse_reply(&self.buf) {
                    Ok((value, consumed)) => {
                        let _ = self.buf.split_to(consumed);
                        return Ok(value);
                    }
                    Err(ParseError::Incomplete) => {}
                    Err(ParseError::Invalid(msg)) => {
                        return Err(Error::Protocol(format!("{}: {}", self.addr, msg)));
                    }
                }
            }

            let mut chunk = [0u8; 4096];
            let read_result = timeout(self.deadline, self.stream.read(&mut chunk)).await;
            match read_result {
                Ok(Ok(0)) => {
                    return Err(Error::Protocol(format!(
                        "{}: connection closed mid-reply",
                        self.addr
                    )));
                }
                Ok(Ok(n)) => self.buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(Error::Connect(self.addr.clone(), e.to_string())),
                Err(_) => return Err(Error::Timeout(self.deadline)),
            }
        }
    }

    /// PING. Ok(true) on PONG, Ok(false) on any other well-formed reply
    /// (a node answering -LOADING is connected but not serving).
    pub async fn ping(&mut self) -> Result<bool> {
        let reply = self.command(&[b"PING"]).await?;
        Ok(reply.is_pong())
    }

    /// INFO, optionally restricted to one section. Returns the raw payload.
    pub async fn info(&mut self, section: Option<&str>) -> Result<String> {
        let reply = match section {
            Some(s) => self.command(&[b"INFO", s.as_bytes()]).await?,
            None => self.command(&[b"INFO"]).await?,
        };
        match reply {
            RespValue::BulkString(b) | RespValue::SimpleString(b) => {
                Ok(String::from_utf8_lossy(&b).into_owned())
            }
            RespValue::Error(e) => Err(Error::Protocol(format!(
                "{}: INFO failed: {}",
                self.addr,
                String::from_utf8_lossy(&e)
            ))),
            other => Err(Error::Protocol(format!(
                "{}: unexpected INFO reply {:?}",
                self.addr, other
            ))),
        }
    }

    /// DBSIZE. The key count of the currently selected database.
    pub async fn dbsize(&mut self) -> Result<u64> {
        let reply = self.command(&[b"DBSIZE"]).await?;
        match reply {
            RespValue::Integer(n) if n >= 0 => Ok(n as u64),
            RespValue::Error(e) => Err(Error::Protocol(format!(
                "{}: DBSIZE failed: {}",
                self.addr,
                String::from_utf8_lossy(&e)
            ))),
            other => Err(Error::Protocol(format!(
                "{}: unexpected DBSIZE reply {:?}",
                self.addr, other
            ))),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}
