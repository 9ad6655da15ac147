pub mod content_sync;
pub mod practice;
pub mod registry;
