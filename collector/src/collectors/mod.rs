//! The collector contract and its implementations.
//!
//! - **`Collector` trait**: records measurements and aggregates a drained batch
//! - **`LatencyCollector`**: response times of the aviso REST and auth services
//! - **`EtcdCollector`**: store size, cluster status and key count of the etcd cluster
//! - **`EtcdProbe`**: polls the etcd members and records into an `EtcdCollector`
//! - **`Reporter`**: the closed set of collectors built by the factory

pub mod collector;
pub mod etcd;
pub mod latency;
pub mod reporter;

pub use collector::Collector;
pub use etcd::{
    EtcdCollector,
    EtcdProbe,
};
pub use latency::LatencyCollector;
pub use reporter::Reporter;
