//! `Content-Length` framed JSON messages, as spoken over LSP stdio.

use std::io::{self, BufRead, Write};
use tsdef_core::error::ResolverError;

/// Read one framed message. `Ok(None)` on clean end of stream.
pub fn read_message(reader: &mut impl BufRead) -> Result<Option<serde_json::Value>, ResolverError> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            if saw_header {
                return Err(ResolverError::protocol("stream ended inside message header"));
            }
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ResolverError::protocol(format!("bad Content-Length `{}`", value.trim())))?;
            content_length = Some(parsed);
        }
    }

    let len = content_length.ok_or_else(|| ResolverError::protocol("missing Content-Length header"))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    let value = serde_json::from_slice(&body)
        .map_err(|e| ResolverError::protocol(format!("invalid JSON body: {e}")))?;
    Ok(Some(value))
}

pub fn write_message(writer: &mut impl Write, value: &serde_json::Value) -> io::Result<()> {
    let body = serde_json::to_string(value)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(body.as_bytes())?;
    writer.flush()
}
