//! newline-delimited JSON framing

use error_stack::Report;
use error_stack::ResultExt;
use futures::SinkExt;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tokio_util::codec::LinesCodec;

use crate::error::CommError;
use crate::error::CommResult;

/// A Unix stream carrying one JSON document per line.
pub(crate) type JsonLines = Framed<UnixStream, LinesCodec>;

pub(crate) fn framed(stream: UnixStream, max_frame_length: usize) -> JsonLines {
    Framed::new(stream, LinesCodec::new_with_max_length(max_frame_length))
}

pub(crate) async fn send_json<T: Serialize>(lines: &mut JsonLines, value: &T) -> CommResult<()> {
    let line = serde_json::to_string(value).change_context(CommError::Serialization {
        message: "Failed to serialize message".into(),
    })?;
    lines.send(line).await.change_context(CommError::Network {
        message: "Failed to write message".into(),
    })
}

/// Reads the next message, `None` once the peer has closed the stream.
pub(crate) async fn recv_json<T: DeserializeOwned>(lines: &mut JsonLines) -> CommResult<Option<T>> {
    let Some(line) = lines.next().await else {
        return Ok(None);
    };
    let line = line.change_context(CommError::Network {
        message: "Failed to read message".into(),
    })?;
    serde_json::from_str(&line).map(Some).map_err(|e| {
        Report::new(e)
            .change_context(CommError::Serialization {
                message: "Failed to deserialize message".into(),
            })
            .attach_printable(line)
    })
}
