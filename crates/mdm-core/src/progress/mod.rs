//! Progress reducer: applies transfer engine events to the partition set.
//!
//! Owns the per-job progress scratch (percentage, status line, last UI push)
//! and throttles UI-facing notifications while keeping the value current.

mod format;
mod reducer;
mod throttle;

pub use format::{format_bytes, format_eta, status_line};
pub use reducer::{ProgressReducer, ProgressScratch, Reduction, UI_UPDATE_INTERVAL};
pub use throttle::RateLimitedNotify;
