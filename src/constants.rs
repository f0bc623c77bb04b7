// Defaults for the runtime settings in config.rs. All of them can be
// overridden by flags or environment variables.

pub const DEFAULT_PORT: u16 = 9900;

pub const DEFAULT_CHAT_ENDPOINT: &str = "http://127.0.0.1:4000/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_SECS: f64 = 3.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_VANNA_ENDPOINT: &str = "https://ask.vanna.ai/rpc";
pub const DEFAULT_VANNA_MODEL: &str = "chinook";
pub const DEFAULT_DATABASE: &str = "https://vanna.ai/Chinook.sqlite";

/// Height of the embedded report frame, in pixels.
pub const REPORT_FRAME_HEIGHT: u32 = 600;
