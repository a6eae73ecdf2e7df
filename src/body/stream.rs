//! Reading an HTTP Request Body
//!
//! hyper hands a request body over as a sequence of frames: roughly one per
//! socket read for a `Content-Length` body, one per chunk for a chunked one.
//! Each data frame is appended to a [`RequestBodyAssembler`] as it arrives
//! and the running size is checked against the cap, so an oversized body is
//! refused as soon as it crosses the limit instead of after it is buffered.

use crate::body::{BodyError, RequestBodyAssembler};
use axum::body::Body;
use bytes::Bytes;
use http_body_util::BodyExt;
use thiserror::Error;
use tracing::trace;

/// Default cap on an assembled request body (64 KB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Errors from reading a request body off the wire.
#[derive(Debug, Error)]
pub enum BodyReadError {
    /// The declared or received size exceeds the cap
    #[error("request body too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    /// The client's framing was invalid or the connection dropped mid-body
    #[error("failed to read request body: {0}")]
    Transport(String),

    /// The assembler was driven out of order
    #[error(transparent)]
    Assembly(#[from] BodyError),
}

/// Reads `body` to the end, at most `max` bytes.
///
/// `declared_len` is the request's `Content-Length`, if it sent one; a
/// declared length over the cap is rejected before any byte is read.
pub async fn read_body(
    mut body: Body,
    declared_len: Option<usize>,
    max: usize,
) -> Result<Bytes, BodyReadError> {
    let mut assembler = match declared_len {
        Some(len) if len > max => return Err(BodyReadError::TooLarge { size: len, max }),
        Some(len) => RequestBodyAssembler::with_declared_len(len),
        None => RequestBodyAssembler::new(),
    };

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|err| BodyReadError::Transport(err.to_string()))?;
        // Trailers carry nothing the service reads.
        let Ok(data) = frame.into_data() else {
            continue;
        };

        let size = assembler.len() + data.len();
        if size > max {
            return Err(BodyReadError::TooLarge { size, max });
        }
        assembler.append(&data)?;
        trace!(piece = data.len(), total = size, "body piece appended");
    }

    assembler.finish()?;
    Ok(assembler.take()?)
}
