//! `apio`: transport-edge helpers for the bridge.
//!
//! The network may hand us a single logical text message as several partial
//! segments. `segment::SegmentAssembler` owns the buffering so the protocol
//! layer only ever sees complete messages.

pub mod segment;

pub use segment::{SegmentAssembler, SegmentError};
