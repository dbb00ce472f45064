//! facelab: a pixel-art camera booth.
//!
//! A live camera, imported still or looping clip is pixelated onto a 3:4
//! stage, decorated with particle effects and draggable text stickers, and
//! captured as a photo or a recorded clip. [`session::Session`] owns the
//! whole flow; the binary drives it from scripted gestures.

pub mod blob;
pub mod capture;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod effects;
pub mod event_loop;
pub mod pipeline;
pub mod profile;
pub mod render_loop;
pub mod save;
pub mod session;
pub mod source;
pub mod stage;
pub mod status;
pub mod text;
pub mod timer;
