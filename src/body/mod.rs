//! Request Body Module
//!
//! Per-request accumulation of a body that may arrive in several pieces.
//!
//! - `assembler`: the Empty/Accumulating/Complete/Consumed state machine
//! - `stream`: drives an assembler from an HTTP request body, under a size cap
//!
//! ## Example
//!
//! ```
//! use contactd::body::RequestBodyAssembler;
//!
//! let mut body = RequestBodyAssembler::new();
//! body.append(b"{\"external_id\":").unwrap();
//! body.append(b"1}").unwrap();
//! body.finish().unwrap();
//!
//! let bytes = body.take().unwrap();
//! assert_eq!(&bytes[..], b"{\"external_id\":1}");
//! assert!(body.take().is_err());
//! ```

pub mod assembler;
pub mod stream;

// Re-export commonly used types
pub use assembler::{BodyError, BodyState, RequestBodyAssembler};
pub use stream::{read_body, BodyReadError, DEFAULT_MAX_BODY_BYTES};
