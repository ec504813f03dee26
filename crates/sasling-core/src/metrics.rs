use ::metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Tally {
    count: AtomicU64,
}

impl Tally {
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

static IO_STARTED: Tally = Tally {
    count: AtomicU64::new(0),
};
static IO_COMPLETED: Tally = Tally {
    count: AtomicU64::new(0),
};
static IO_REJECTED: Tally = Tally {
    count: AtomicU64::new(0),
};
static FRAMES_ROUTED: Tally = Tally {
    count: AtomicU64::new(0),
};
static FRAMES_DROPPED: Tally = Tally {
    count: AtomicU64::new(0),
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub io_started: u64,
    pub io_completed: u64,
    pub io_rejected: u64,
    pub frames_routed: u64,
    pub frames_dropped: u64,
}

pub fn observe_io_started() {
    counter!("sasling_io_started").increment(1);
    IO_STARTED.increment();
}

pub fn observe_io_completed() {
    counter!("sasling_io_completed").increment(1);
    IO_COMPLETED.increment();
}

pub fn observe_io_rejected() {
    counter!("sasling_io_rejected").increment(1);
    IO_REJECTED.increment();
}

pub fn observe_frame_routed() {
    counter!("sasling_frames_routed").increment(1);
    FRAMES_ROUTED.increment();
}

pub fn observe_frame_dropped() {
    counter!("sasling_frames_dropped").increment(1);
    FRAMES_DROPPED.increment();
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        io_started: IO_STARTED.get(),
        io_completed: IO_COMPLETED.get(),
        io_rejected: IO_REJECTED.get(),
        frames_routed: FRAMES_ROUTED.get(),
        frames_dropped: FRAMES_DROPPED.get(),
    }
}
