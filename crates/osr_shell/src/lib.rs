//! Off-screen-rendering browser shell.
//!
//! An [`OsrWindow`] sits between a browser engine and a [`FrameCompositor`]:
//! engine paints arrive through [`EngineEventSink`], native input is mapped and
//! forwarded through [`BrowserHost`], and frame requests are paced by a
//! `frame_scheduler::FrameScheduler`. Windows live in a [`ShellState`] owned by
//! the UI thread.
//!
//! Internal layout:
//! - `host`: the engine-facing traits and [`PaintFrame`].
//! - `osr_window`: per-view glue.
//! - `registry` / `shell`: view ids, window lookup and UI task posting.
//! - `native_keys`: winit key events to raw key input.
//! - `config`: JSON config file plus command-line overrides.
//! - `gpu`: wgpu bootstrap for a winit window.
//! - `demo_engine`: a stand-in engine used by the binary.
//!
//! [`FrameCompositor`]: renderer::FrameCompositor

pub mod config;
pub mod demo_engine;
pub mod gpu;
pub mod host;
pub mod native_keys;
pub mod osr_window;
pub mod registry;
pub mod shell;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, ShellArguments, ShellConfig};
pub use demo_engine::{DemoEngine, EngineEvent, pump_engine};
pub use host::{BrowserHost, EngineEventSink, PaintFrame, WindowTaskPoster};
pub use native_keys::{NativeKey, NativeKeyboard};
pub use osr_window::OsrWindow;
pub use registry::{MapRegistry, ViewId, ViewIdAllocator, WindowRegistry};
pub use shell::{ShellState, UiWindowPoster, WindowHandle};
