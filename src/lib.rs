// Library surface for headless/integration tests and reuse.
// The binary only adds terminal setup and CLI parsing on top.
pub mod app;
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod content;
pub mod controller;
pub mod feedback;
pub mod http;
pub mod logging;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod surahs;
pub mod transliteration;
pub mod ui;
pub mod util;
