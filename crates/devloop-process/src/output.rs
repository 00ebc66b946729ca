//! Line pumps for captured child output

use std::borrow::Cow;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::handle::LineCallback;

/// Which output stream a pump reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// Spawn a task forwarding each line of `reader` to `callback` until EOF.
///
/// Line terminators (`\n` or `\r\n`) are stripped and invalid UTF-8 is
/// replaced, so a bad byte never ends the stream. Must be called from within
/// a tokio runtime.
pub fn pump_lines<R>(pid: u32, stream: Stream, reader: R, callback: LineCallback) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    trace!(pid = %pid, stream = stream.as_str(), "line");
                    callback(&*line);
                }
                Err(e) => {
                    debug!(pid = %pid, stream = stream.as_str(), error = %e, "Output stream closed with error");
                    break;
                }
            }
        }
    })
}

fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}
