// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON framing.

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Hard cap on a single inbound line. Anything larger is a protocol error;
/// the front-end size limit (1 MiB) is enforced separately by the gateway.
pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Errors from line framing and JSON parsing.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line exceeds {MAX_LINE_BYTES} bytes")]
    LineTooLong,
}

/// Write `value` as one JSON line and flush.
///
/// `serde_json` escapes embedded newlines, so the serialized form is always
/// a single line.
pub async fn write_json_line<W, T>(writer: &mut W, value: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one line, returning `None` on clean EOF.
///
/// The returned string has the trailing newline (and `\r`) stripped and is
/// not yet parsed; callers decide how to interpret malformed JSON.
pub async fn read_json_line<R>(reader: &mut R) -> Result<Option<String>, WireError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    if n > MAX_LINE_BYTES {
        return Err(WireError::LineTooLong);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let mut buf = Vec::new();
        write_json_line(&mut buf, &json!({"id": "m1", "type": "PING"})).await.unwrap();
        write_json_line(&mut buf, &json!({"id": "m2"})).await.unwrap();

        let mut reader = tokio::io::BufReader::new(buf.as_slice());
        let first = read_json_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&first).unwrap(),
            json!({"id": "m1", "type": "PING"})
        );
        let second = read_json_line(&mut reader).await.unwrap().unwrap();
        assert!(second.contains("m2"));
        assert!(read_json_line(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn embedded_newlines_stay_on_one_line() {
        let mut buf = Vec::new();
        write_json_line(&mut buf, &json!({"text": "line one\nline two"})).await.unwrap();
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[tokio::test]
    async fn crlf_is_stripped() {
        let mut reader = tokio::io::BufReader::new("{\"id\":\"x\"}\r\n".as_bytes());
        let line = read_json_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(line, "{\"id\":\"x\"}");
    }
}
