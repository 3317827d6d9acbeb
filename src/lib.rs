//! voicekey — press a hotkey, speak, press it again, and the cleaned-up
//! transcript is pasted into whatever window has focus.
//!
//! # Architecture
//!
//! ```text
//! HotkeyListener ──Toggle──▶ PipelineController ──▶ Recorder (16 kHz mono PCM)
//!                                   │
//!                                   ├─▶ Transcriber (blocking ASR gateway)
//!                                   ├─▶ collapse_punctuation
//!                                   ├─▶ TextCleaner  (async LLM gateway)
//!                                   └─▶ TextDelivery (clipboard + Ctrl+V)
//!
//! StatusObserver ◀── progress / phase / notifications (side channel)
//! ```
//!
//! The controller owns the single [`pipeline::Session`] and serializes every
//! phase transition through its lock: no two recordings and no two paste
//! operations ever overlap, and the hotkey callback never blocks on the
//! gateways.  Speech recognition and LLM cleanup are external black boxes
//! behind the [`stt::Transcriber`] and [`cleanup::TextCleaner`] traits.

pub mod audio;
pub mod cleanup;
pub mod config;
pub mod deliver;
pub mod hotkey;
pub mod instance;
pub mod pipeline;
pub mod status;
pub mod stt;
