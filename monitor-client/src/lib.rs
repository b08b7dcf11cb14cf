#[macro_use]
extern crate tracing;

mod monitor;
#[cfg(test)]
mod testing;
mod trigger;

pub use monitor::MonitorClient;
pub use trigger::{
    CloudEvent,
    CloudEventParams,
    PostTrigger,
    ProtocolType,
    TriggerError,
};
