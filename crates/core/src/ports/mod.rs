mod event_source;
mod gateway;

pub use event_source::*;
pub use gateway::*;
