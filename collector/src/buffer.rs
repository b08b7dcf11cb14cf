use crate::Measurement;
use aviso_monitoring_config::BufferPolicy;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Measurements recorded since the last drain.
///
/// Producers append from any task or thread; the transmitter drains. Draining
/// swaps the whole queue for an empty one while holding the lock, so a
/// measurement ends up in exactly one drain.
#[derive(Debug, Default)]
pub struct MeasurementBuffer {
    policy: BufferPolicy,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    measurements: VecDeque<Measurement>,
    dropped: u64,
}

/// Result of one drain.
#[derive(Debug, Default)]
pub struct Drained {
    pub measurements: Vec<Measurement>,
    /// Measurements discarded by the overflow policy since the previous drain.
    pub dropped: u64,
}

impl MeasurementBuffer {
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::default(),
        }
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Appends a measurement. Returns `false` if the overflow policy discarded it.
    pub fn push(&self, measurement: Measurement) -> bool {
        let mut inner = self.inner.lock();
        match self.policy {
            BufferPolicy::Unbounded => {}
            BufferPolicy::DropOldest { capacity } => {
                while inner.measurements.len() >= capacity {
                    inner.measurements.pop_front();
                    inner.dropped += 1;
                }
            }
            BufferPolicy::DropNewest { capacity } => {
                if inner.measurements.len() >= capacity {
                    inner.dropped += 1;
                    return false;
                }
            }
        }
        inner.measurements.push_back(measurement);
        true
    }

    pub fn drain(&self) -> Drained {
        let (measurements, dropped) = {
            let mut inner = self.inner.lock();
            (
                std::mem::take(&mut inner.measurements),
                std::mem::take(&mut inner.dropped),
            )
        };
        Drained {
            measurements: measurements.into(),
            dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        sync::Arc,
        thread,
    };

    fn values(drained: &Drained) -> Vec<f64> {
        drained
            .measurements
            .iter()
            .filter_map(|m| m.value.as_number())
            .collect()
    }

    #[test]
    fn drain_empties_the_buffer() {
        let buffer = MeasurementBuffer::default();
        buffer.push(Measurement::new("rest_resp_time", 1.0));
        buffer.push(Measurement::new("rest_resp_time", 2.0));

        let drained = buffer.drain();
        assert_eq!(values(&drained), vec![1.0, 2.0]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().measurements.is_empty());
    }

    #[test]
    fn overflow_policies() {
        let oldest = MeasurementBuffer::new(BufferPolicy::DropOldest { capacity: 2 });
        let newest = MeasurementBuffer::new(BufferPolicy::DropNewest { capacity: 2 });
        for value in [1.0, 2.0, 3.0] {
            oldest.push(Measurement::new("t", value));
            newest.push(Measurement::new("t", value));
        }

        let drained = oldest.drain();
        assert_eq!((values(&drained), drained.dropped), (vec![2.0, 3.0], 1));
        let drained = newest.drain();
        assert_eq!((values(&drained), drained.dropped), (vec![1.0, 2.0], 1));
        assert_eq!(newest.drain().dropped, 0);
    }

    #[test]
    fn concurrent_pushes_land_in_exactly_one_drain() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 5_000;

        let buffer = Arc::new(MeasurementBuffer::default());
        let producers = (0..PRODUCERS)
            .map(|producer| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        buffer.push(Measurement::new("t", (producer * PER_PRODUCER + i) as f64));
                    }
                })
            })
            .collect::<Vec<_>>();

        let mut seen = Vec::new();
        while producers.iter().any(|producer| !producer.is_finished()) {
            seen.extend(values(&buffer.drain()));
        }
        for producer in producers {
            producer.join().unwrap();
        }
        seen.extend(values(&buffer.drain()));

        seen.sort_by(f64::total_cmp);
        let expected = (0..PRODUCERS * PER_PRODUCER).map(|v| v as f64).collect::<Vec<_>>();
        assert_eq!(seen, expected);
    }
}
