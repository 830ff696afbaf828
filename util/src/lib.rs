pub mod backoff;
pub mod channel;

pub use channel::watch_depth;
