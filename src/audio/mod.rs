//! Audio handling: payload decoding and session windowing.
//!
//! ```text
//! base64 / data URL ──▶ decode (WAV or raw PCM, mono 16kHz, normalized)
//!                          │
//!                          ▼
//!                     Accumulator ──▶ Window (~3s, backlog merged)
//! ```

pub mod accumulator;
pub mod decode;

pub use accumulator::{Accumulator, AccumulatorConfig, Window};
pub use decode::{decode_bytes, decode_chunk, decode_data_url};
