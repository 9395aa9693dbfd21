mod error;
mod mutations;
mod policy;
mod queries;

pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::{Generator, Ulid};

use crate::model::*;
use crate::wal::Wal;

pub type SharedSlotState = Arc<RwLock<SlotState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

/// The reservation engine: one shared slot map rebuilt from the WAL, with
/// per-slot-key atomicity. Each slot's read-decide-append-apply sequence
/// runs under that slot's write lock; slots are independent of each other
/// (the map is sharded by DashMap, serialization is per key).
pub struct Engine {
    pub(super) slots: DashMap<SlotKey, SharedSlotState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Monotonic booking ids — first-holder order survives same-millisecond
    /// bookings and restarts.
    booking_ids: Mutex<Generator>,
}

/// Apply an event directly to a SlotState (no locking — caller holds the lock).
fn apply_to_slot(state: &mut SlotState, event: &Event) {
    match event {
        Event::HolderAdded { booking_id, user, .. } => {
            state.insert_holder(Holder {
                booking_id: *booking_id,
                user: user.clone(),
            });
        }
        Event::SlotLocked { .. } => state.locked = true,
        Event::SlotUnlocked { .. } => state.locked = false,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            slots: DashMap::new(),
            wal_tx,
            booking_ids: Mutex::new(Generator::new()),
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never block here; this may run inside an
        // async context.
        for event in &events {
            let slot = engine.slot_entry(event.key());
            let mut guard = slot.try_write().expect("replay: uncontended write");
            apply_to_slot(&mut guard, event);
        }

        Ok(engine)
    }

    /// Get or lazily create the shared state for a slot key.
    pub(super) fn slot_entry(&self, key: SlotKey) -> SharedSlotState {
        self.slots
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(SlotState::new())))
            .value()
            .clone()
    }

    pub(super) fn next_booking_id(&self) -> Ulid {
        let mut generator = self.booking_ids.lock().expect("booking id generator lock");
        // Random-part overflow within one millisecond is the only failure;
        // a fresh id keeps going.
        generator.generate().unwrap_or_else(|_| Ulid::new())
    }

    /// Write an event to the WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply, in that order: a failed append leaves the
    /// in-memory state untouched and is reported to the caller, never retried.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut SlotState,
        event: &Event,
    ) -> Result<(), EngineError> {
        mutations::guard_lock_event(state, event)?;
        self.wal_append(event).await?;
        apply_to_slot(state, event);
        Ok(())
    }

    /// Minimal event set recreating current state: holders in booking order,
    /// then the lock mark for locked slots. Empty unlocked slots are implicit.
    async fn snapshot_events(&self) -> Vec<Event> {
        let mut keys: Vec<SlotKey> = self.slots.iter().map(|e| *e.key()).collect();
        keys.sort_by_key(|k| (k.date, k.time, k.court));

        let mut events = Vec::new();
        for key in keys {
            let Some(slot) = self.slots.get(&key).map(|e| e.value().clone()) else {
                continue;
            };
            let guard = slot.read().await;
            for holder in &guard.holders {
                events.push(Event::HolderAdded {
                    booking_id: holder.booking_id,
                    key,
                    user: holder.user.clone(),
                });
            }
            if guard.locked {
                events.push(Event::SlotLocked { key });
            }
        }
        events
    }

    /// Rewrite the WAL with only the events needed to recreate current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let events = self.snapshot_events().await;
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
