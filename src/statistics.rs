use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// The type of information passed to the statistics counters.
#[derive(Debug, Clone, Copy)]
pub enum Stats {
    ReceivedBytes(usize),
    SendBytes(usize),
    ReceivedPkts(usize),
    SendPkts(usize),
    ErrorPkts(usize),
}

pub trait Number {
    fn add(&self, value: usize);
    fn get(&self) -> usize;
}

#[derive(Default)]
pub struct Count(AtomicUsize);

impl Number for Count {
    fn add(&self, value: usize) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Session-wide traffic counters.
#[derive(Default)]
pub struct Counts<T> {
    pub received_bytes: T,
    pub send_bytes: T,
    pub received_pkts: T,
    pub send_pkts: T,
    pub error_pkts: T,
}

impl<T: Number> Counts<T> {
    /// # Example
    ///
    /// ```
    /// use rtp_endpoint::statistics::*;
    ///
    /// let counts: Counts<Count> = Counts::default();
    ///
    /// counts.add(&Stats::ReceivedBytes(100));
    /// assert_eq!(counts.received_bytes.get(), 100);
    ///
    /// counts.add(&Stats::ReceivedPkts(1));
    /// assert_eq!(counts.received_pkts.get(), 1);
    ///
    /// counts.add(&Stats::SendBytes(100));
    /// assert_eq!(counts.send_bytes.get(), 100);
    ///
    /// counts.add(&Stats::SendPkts(1));
    /// assert_eq!(counts.send_pkts.get(), 1);
    /// ```
    pub fn add(&self, payload: &Stats) {
        match payload {
            Stats::ReceivedBytes(v) => self.received_bytes.add(*v),
            Stats::ReceivedPkts(v) => self.received_pkts.add(*v),
            Stats::SendBytes(v) => self.send_bytes.add(*v),
            Stats::SendPkts(v) => self.send_pkts.add(*v),
            Stats::ErrorPkts(v) => self.error_pkts.add(*v),
        }
    }
}

/// Shared handle to the session's counters.  Cloned into every task
/// that sends or receives packets.
#[derive(Default, Clone)]
pub struct Statistics(Arc<Counts<Count>>);

impl Statistics {
    pub fn send(&self, reports: &[Stats]) {
        for item in reports {
            self.0.add(item);
        }
    }

    /// A point-in-time copy of all counters.
    ///
    /// # Example
    ///
    /// ```
    /// use rtp_endpoint::statistics::*;
    ///
    /// let statistics = Statistics::default();
    /// statistics.send(&[Stats::SendBytes(172), Stats::SendPkts(1)]);
    ///
    /// let counts = statistics.get();
    /// assert_eq!(counts.send_bytes, 172);
    /// assert_eq!(counts.send_pkts, 1);
    /// assert_eq!(counts.received_pkts, 0);
    /// ```
    pub fn get(&self) -> Counts<usize> {
        Counts {
            received_bytes: self.0.received_bytes.get(),
            received_pkts: self.0.received_pkts.get(),
            send_bytes: self.0.send_bytes.get(),
            send_pkts: self.0.send_pkts.get(),
            error_pkts: self.0.error_pkts.get(),
        }
    }
}
