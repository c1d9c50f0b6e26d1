pub mod config;
pub mod event;

pub use event::{Data, Event, EventBuilder, SpecVersion};
