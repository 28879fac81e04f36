//! NETCONF 1.0 session over the stdio of a child process.
//!
//! On the routing engine a script talks to the management daemon by
//! spawning `cli xml-mode netconf need-trailer` and exchanging
//! `]]>]]>`-delimited XML documents on its stdin/stdout. The framing is a
//! `tokio_util` codec so the session itself only deals in whole messages.

use std::process::Stdio;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures::{SinkExt, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};
use tracing::{debug, instrument, trace, warn};

use crate::error::{ScriptError, ScriptResult};
use crate::shell::CLI_CMD;
use crate::xml;

/// End-of-message marker for NETCONF 1.0 framing.
pub const MESSAGE_DELIMITER: &[u8] = b"]]>]]>";

/// Base capability advertised in the client hello.
pub const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";

static RPC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9_-]*)").expect("Invalid regex pattern"));

static REPLY_BODY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(?:[A-Za-z0-9_-]+:)?rpc-reply(?:\s[^>]*)?>(.*)</(?:[A-Za-z0-9_-]+:)?rpc-reply\s*>")
        .expect("Invalid regex pattern")
});

/// Splits a byte stream into NETCONF 1.0 messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetconfCodec;

impl NetconfCodec {
    pub fn new() -> Self {
        Self
    }
}

fn find_delimiter(data: &[u8]) -> Option<usize> {
    data.windows(MESSAGE_DELIMITER.len())
        .position(|window| window == MESSAGE_DELIMITER)
}

impl Decoder for NetconfCodec {
    type Item = String;
    type Error = ScriptError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match find_delimiter(buf) {
            Some(end) => {
                let frame = buf.split_to(end);
                buf.advance(MESSAGE_DELIMITER.len());
                Ok(Some(String::from_utf8_lossy(&frame).trim().to_string()))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        // Whitespace after the last delimiter is not a truncated message.
        if buf.iter().all(u8::is_ascii_whitespace) {
            buf.clear();
            Ok(None)
        } else {
            let pending = String::from_utf8_lossy(buf).to_string();
            buf.clear();
            Err(ScriptError::netconf(
                "read",
                format!("stream ended inside a message: {:.80}", pending),
            ))
        }
    }
}

impl Encoder<String> for NetconfCodec {
    type Error = ScriptError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + MESSAGE_DELIMITER.len() + 2);
        dst.extend_from_slice(item.as_bytes());
        dst.extend_from_slice(b"\n");
        dst.extend_from_slice(MESSAGE_DELIMITER);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

/// One `<rpc-error>` reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    /// `error` or `warning`; Junos omits it on some errors, which counts as `error`.
    pub severity: String,
    pub message: String,
}

impl RpcError {
    pub fn is_error(&self) -> bool {
        self.severity != "warning"
    }
}

/// A complete `<rpc-reply>` document.
#[derive(Debug, Clone)]
pub struct RpcReply {
    raw: String,
}

impl RpcReply {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Content between the `<rpc-reply>` tags, unescaped.
    pub fn body(&self) -> String {
        REPLY_BODY_RE
            .captures(&self.raw)
            .map(|caps| xml::unescape(caps[1].trim()))
            .unwrap_or_default()
    }

    /// Every `<rpc-error>` in the reply, warnings included.
    pub fn errors(&self) -> Vec<RpcError> {
        xml::element_contents(&self.raw, "rpc-error")
            .iter()
            .map(|content| RpcError {
                severity: xml::element_text(content, "error-severity")
                    .unwrap_or_else(|| "error".to_string()),
                message: xml::element_text(content, "error-message")
                    .unwrap_or_else(|| "unspecified error".to_string()),
            })
            .collect()
    }

    /// True when the reply carries no error-severity `<rpc-error>`.
    pub fn is_ok(&self) -> bool {
        self.errors().iter().all(|e| !e.is_error())
    }

    /// Converts error-severity `<rpc-error>`s into [`ScriptError::RpcRejected`].
    pub fn into_result(self, rpc: &str) -> ScriptResult<Self> {
        let messages: Vec<String> = self
            .errors()
            .into_iter()
            .filter(RpcError::is_error)
            .map(|e| e.message)
            .collect();
        if messages.is_empty() {
            Ok(self)
        } else {
            Err(ScriptError::rpc_rejected(rpc, messages.join("; ")))
        }
    }
}

/// How to reach the NETCONF server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Deadline for the hello exchange and for each RPC round trip.
    pub rpc_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: CLI_CMD.to_string(),
            args: vec![
                "xml-mode".to_string(),
                "netconf".to_string(),
                "need-trailer".to_string(),
            ],
            rpc_timeout: Duration::from_secs(30),
        }
    }
}

/// A live NETCONF session. Dropping it kills the child process.
pub struct NetconfSession {
    child: Child,
    writer: FramedWrite<ChildStdin, NetconfCodec>,
    reader: FramedRead<ChildStdout, NetconfCodec>,
    message_id: u64,
    rpc_timeout: Duration,
    capabilities: Vec<String>,
    closed: bool,
}

impl NetconfSession {
    /// Spawns the server process and exchanges hellos.
    #[instrument(skip(config), fields(program = %config.program))]
    pub async fn connect(config: &SessionConfig) -> ScriptResult<Self> {
        let command_line = format!("{} {}", config.program, config.args.join(" "));
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScriptError::ShellExec {
                command: command_line,
                source: e,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScriptError::netconf("connect", "child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScriptError::netconf("connect", "child stdout unavailable"))?;

        let mut session = Self {
            child,
            writer: FramedWrite::new(stdin, NetconfCodec::new()),
            reader: FramedRead::new(stdout, NetconfCodec::new()),
            message_id: 0,
            rpc_timeout: config.rpc_timeout,
            capabilities: Vec::new(),
            closed: false,
        };

        let server_hello = session.read_message("hello").await?;
        if !server_hello.contains("hello") {
            return Err(ScriptError::netconf(
                "hello",
                format!("unexpected first message: {:.80}", server_hello),
            ));
        }
        session.capabilities = xml::element_texts(&server_hello, "capability");
        debug!(
            capabilities = session.capabilities.len(),
            "Received server hello"
        );

        let client_hello = format!(
            "<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"><capabilities><capability>{}</capability></capabilities></hello>",
            BASE_CAPABILITY
        );
        session.writer.send(client_hello).await?;

        Ok(session)
    }

    /// Capabilities announced by the server.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sends one RPC and waits for its reply.
    ///
    /// `<rpc-error>`s are returned inside the reply; use
    /// [`RpcReply::into_result`] to turn them into an error.
    pub async fn rpc(&mut self, body: &str) -> ScriptResult<RpcReply> {
        if self.closed {
            return Err(ScriptError::SessionClosed);
        }
        let name = rpc_name(body);
        self.message_id += 1;
        let request = format!("<rpc message-id=\"{}\">{}</rpc>", self.message_id, body);
        trace!(rpc = %name, message_id = self.message_id, "Sending RPC");

        self.writer.send(request).await?;
        loop {
            let message = self.read_message(&name).await?;
            if message.contains("rpc-reply") {
                return Ok(RpcReply::new(message));
            }
            // Junos may interleave notifications; they are not ours.
            debug!(rpc = %name, "Skipping non-reply message");
        }
    }

    /// Ends the session politely and reaps the child. Safe to call twice.
    pub async fn close(&mut self) -> ScriptResult<()> {
        if self.closed {
            return Ok(());
        }
        let farewell = self.rpc("<close-session/>").await;
        self.closed = true;
        if let Err(e) = farewell {
            warn!(error = %e, "close-session did not complete cleanly");
        }

        match timeout(self.rpc_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "NETCONF server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(ScriptError::Io(e)),
            Err(_) => {
                warn!("NETCONF server did not exit, killing it");
                self.child.kill().await.map_err(ScriptError::Io)
            }
        }
    }

    async fn read_message(&mut self, operation: &str) -> ScriptResult<String> {
        match timeout(self.rpc_timeout, self.reader.next()).await {
            Ok(Some(message)) => message,
            Ok(None) => Err(ScriptError::netconf(
                operation,
                "server closed the session",
            )),
            Err(_) => Err(ScriptError::timeout(
                operation,
                self.rpc_timeout.as_secs(),
            )),
        }
    }
}

/// Name of the first element in an RPC body, for logs and errors.
pub fn rpc_name(body: &str) -> String {
    RPC_NAME_RE
        .captures(body)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "rpc".to_string())
}
