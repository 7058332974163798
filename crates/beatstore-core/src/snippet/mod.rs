//! Preview snippets
//!
//! Full-length beats are turned into bounded-length 16-bit WAV previews on
//! demand and shared between consumers through a reference-counted cache.
//!
//! ```text
//!   source URL ──► AudioFetcher ──► decode (symphonia) ──► truncate ──► encode (hound)
//!                                                                         │
//!                                   SnippetCache ◄── handle URL ◄── HandleStore
//! ```

mod cache;
mod decode;
mod derive;
mod encode;
mod error;
mod fetch;
mod handles;

pub use cache::SnippetCache;
pub use decode::{decode_audio, DecodedAudio};
pub use derive::{snippet_frame_count, SnippetDeriver};
pub use encode::{encode_wav, quantize_i16, wav_header_len, WAV_HEADER_LEN};
pub use error::{Result, SnippetError};
pub use fetch::{AudioFetcher, SourceFetcher};
pub use handles::{HandleStore, SnippetAsset, HANDLE_PREFIX};

#[cfg(test)]
pub(crate) use derive::test_support;
