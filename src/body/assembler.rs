//! Request Body Assembly
//!
//! A request body can arrive split across any number of socket reads (and,
//! with chunked transfer coding, across any number of chunks). The assembler
//! collects those pieces and hands out the finished body exactly once.
//!
//! ## States
//!
//! ```text
//!            append()              finish()             take()
//!   Empty ─────────────> Accumulating ─────> Complete ─────────> Consumed
//!     │                   ▲      │                                 (terminal)
//!     │                   └──────┘ append()
//!     └──────────────────────────────────────> Complete
//!                       finish()  (empty body)
//! ```
//!
//! The assembler enforces no size limit; [`read_body`](super::read_body)
//! checks the cap before each append.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Upper bound on capacity reserved up front from a declared length.
const MAX_PREALLOCATION: usize = 64 * 1024;

/// Protocol violations by the code driving the assembler.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BodyError {
    /// `take` was called before `finish`
    #[error("request body is not complete")]
    Incomplete,

    /// `take` was called after the body was already taken
    #[error("request body already consumed")]
    AlreadyConsumed,

    /// `append` or `finish` was called after `finish`
    #[error("request body already complete")]
    Sealed,
}

/// Lifecycle state of a pending request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    Empty,
    Accumulating,
    Complete,
    Consumed,
}

/// Accumulates one request's body until end-of-body.
#[derive(Debug)]
pub struct RequestBodyAssembler {
    state: BodyState,
    buffer: BytesMut,
    declared_len: Option<usize>,
}

impl RequestBodyAssembler {
    pub fn new() -> Self {
        Self {
            state: BodyState::Empty,
            buffer: BytesMut::new(),
            declared_len: None,
        }
    }

    /// Creates an assembler for a body whose length the headers declared.
    pub fn with_declared_len(len: usize) -> Self {
        Self {
            state: BodyState::Empty,
            buffer: BytesMut::with_capacity(len.min(MAX_PREALLOCATION)),
            declared_len: Some(len),
        }
    }

    /// Appends one received piece of the body.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), BodyError> {
        match self.state {
            BodyState::Empty | BodyState::Accumulating => {
                self.buffer.extend_from_slice(chunk);
                self.state = BodyState::Accumulating;
                Ok(())
            }
            BodyState::Complete | BodyState::Consumed => Err(BodyError::Sealed),
        }
    }

    /// Marks end-of-body.
    pub fn finish(&mut self) -> Result<(), BodyError> {
        match self.state {
            BodyState::Empty | BodyState::Accumulating => {
                self.state = BodyState::Complete;
                Ok(())
            }
            BodyState::Complete | BodyState::Consumed => Err(BodyError::Sealed),
        }
    }

    /// Takes the completed body. Succeeds exactly once, after `finish`.
    pub fn take(&mut self) -> Result<Bytes, BodyError> {
        match self.state {
            BodyState::Complete => {
                self.state = BodyState::Consumed;
                Ok(std::mem::take(&mut self.buffer).freeze())
            }
            BodyState::Empty | BodyState::Accumulating => Err(BodyError::Incomplete),
            BodyState::Consumed => Err(BodyError::AlreadyConsumed),
        }
    }

    pub fn state(&self) -> BodyState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == BodyState::Complete
    }

    /// Length promised by `Content-Length`, if any.
    pub fn declared_len(&self) -> Option<usize> {
        self.declared_len
    }

    /// Bytes received so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for RequestBodyAssembler {
    fn default() -> Self {
        Self::new()
    }
}
