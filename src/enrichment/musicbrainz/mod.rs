//! MusicBrainz API integration
//!
//! Text search for recordings by artist and title, used when the baseline
//! lookup did not produce a complete descriptor.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

mod adapter;
mod client;
pub mod dto;

pub use client::MusicBrainzClient;
