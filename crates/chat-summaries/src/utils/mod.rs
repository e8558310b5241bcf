//! Utilities module - text helpers shared by prompt and fallback builders

pub mod text_utils;

pub use text_utils::TextUtils;
