//! Snapshot cache: a bounded, time-limited store of recently rendered
//! frames.
//!
//! Remote control surfaces ask the viewer for PNG snapshots and may come
//! back for the same frame several times (or ask for "the latest stream
//! frame"). Snapshots are kept under one mutex with LRU eviction at a
//! fixed entry bound; a background sweeper removes entries untouched for
//! the TTL. The sweeper sleeps on a condition variable so dropping the
//! cache wakes and joins it promptly instead of stalling shutdown.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

/// Default bound on stored snapshots.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 100;

/// Default idle time before the sweeper discards a snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default sweep cadence.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Stream-frame ids remembered for the "latest frame" query.
const MAX_STREAM_FRAMES: usize = 32;

/// One stored frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub png_data: Bytes,
    pub width: i32,
    pub height: i32,
    last_access: Instant,
}

struct State {
    snapshots: HashMap<Uuid, Snapshot>,
    /// Front = most recent
    lru: VecDeque<Uuid>,
    stream_frames: VecDeque<Uuid>,
    running: bool,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
    max_snapshots: usize,
    ttl: Duration,
}

// =============================================================================
// SnapshotCache
// =============================================================================

/// Thread-safe snapshot store with TTL sweeping.
pub struct SnapshotCache {
    shared: Arc<Shared>,
    sweeper: Option<JoinHandle<()>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_SNAPSHOTS, DEFAULT_TTL, DEFAULT_CLEANUP_INTERVAL)
    }

    /// A `cleanup_interval` of zero disables the sweeper thread; entries
    /// then only leave through LRU eviction.
    pub fn with_config(max_snapshots: usize, ttl: Duration, cleanup_interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                snapshots: HashMap::new(),
                lru: VecDeque::new(),
                stream_frames: VecDeque::new(),
                running: true,
            }),
            wakeup: Condvar::new(),
            max_snapshots: max_snapshots.max(1),
            ttl,
        });

        let sweeper = if cleanup_interval > Duration::ZERO {
            let shared = shared.clone();
            Some(std::thread::spawn(move || {
                sweeper_loop(&shared, cleanup_interval)
            }))
        } else {
            None
        };

        Self { shared, sweeper }
    }

    /// Store a frame, evicting least-recently-used entries at the bound.
    /// Returns the generated id.
    pub fn add(&self, png_data: Bytes, width: i32, height: i32) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.shared.state.lock().unwrap();

        while state.snapshots.len() >= self.shared.max_snapshots {
            let Some(oldest) = state.lru.pop_back() else {
                break;
            };
            state.snapshots.remove(&oldest);
        }

        state.snapshots.insert(
            id,
            Snapshot {
                id,
                png_data,
                width,
                height,
                last_access: Instant::now(),
            },
        );
        state.lru.push_front(id);
        id
    }

    /// Fetch a frame, refreshing its recency and TTL clock.
    pub fn get(&self, id: &Uuid) -> Option<Snapshot> {
        let mut state = self.shared.state.lock().unwrap();

        let snapshot = state.snapshots.get_mut(id)?;
        snapshot.last_access = Instant::now();
        let snapshot = snapshot.clone();

        if let Some(position) = state.lru.iter().position(|entry| entry == id) {
            state.lru.remove(position);
        }
        state.lru.push_front(*id);
        Some(snapshot)
    }

    /// Record a streamed frame id in the recency ring.
    pub fn add_stream_frame(&self, id: Uuid) {
        let mut state = self.shared.state.lock().unwrap();
        state.stream_frames.push_back(id);
        while state.stream_frames.len() > MAX_STREAM_FRAMES {
            state.stream_frames.pop_front();
        }
    }

    /// Most recently streamed frame id, if any.
    pub fn latest_stream_frame(&self) -> Option<Uuid> {
        self.shared
            .state
            .lock()
            .unwrap()
            .stream_frames
            .back()
            .copied()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().unwrap().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries idle past the TTL. The sweeper calls this; exposed so
    /// callers (and tests) can force a pass.
    pub fn sweep(&self) {
        let mut state = self.shared.state.lock().unwrap();
        remove_expired(&mut state, self.shared.ttl);
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SnapshotCache {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.running = false;
        }
        self.shared.wakeup.notify_all();
        if let Some(sweeper) = self.sweeper.take() {
            let _ = sweeper.join();
        }
    }
}

fn sweeper_loop(shared: &Shared, interval: Duration) {
    let mut state = shared.state.lock().unwrap();
    while state.running {
        let (next, _timeout) = shared
            .wakeup
            .wait_timeout_while(state, interval, |state| state.running)
            .unwrap();
        state = next;
        if !state.running {
            break;
        }
        remove_expired(&mut state, shared.ttl);
    }
}

fn remove_expired(state: &mut State, ttl: Duration) {
    let now = Instant::now();
    let expired: Vec<Uuid> = state
        .snapshots
        .values()
        .filter(|snapshot| now.duration_since(snapshot.last_access) >= ttl)
        .map(|snapshot| snapshot.id)
        .collect();

    for id in &expired {
        state.snapshots.remove(id);
        if let Some(position) = state.lru.iter().position(|entry| entry == id) {
            state.lru.remove(position);
        }
    }
    if !expired.is_empty() {
        debug!(expired = expired.len(), "snapshot sweep");
    }
}

// =============================================================================
// Tests
// =============================================================================
