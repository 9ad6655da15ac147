pub mod adaptation_events;
pub mod attempts;
pub mod content;
pub mod practice_sessions;
