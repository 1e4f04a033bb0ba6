pub mod app_settings;
pub mod engine;
pub mod fallback;
pub mod messages;
pub mod refresher;
