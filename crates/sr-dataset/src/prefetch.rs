//! Background batch loading with a bounded prefetch queue.
//!
//! burn's `DataLoader` yields batches in completion order, while training
//! here needs batch `p` of an epoch to always be the same crops.
//!
//! Workers pull positions of the epoch schedule from a shared cursor and
//! push finished batches into a `sync_channel`. The consumer reorders them,
//! so batches are always yielded in schedule order. Each position gets its
//! own RNG stream, which keeps crops identical whatever the worker count.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sr_core::{Error, LoaderConfig, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

use crate::sequence::{PairBatch, PairSequence};

/// RNG used to produce the batch at `position` of `epoch`.
pub fn batch_rng(seed: u64, epoch: usize, position: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
    rng.set_stream(position as u64);
    rng
}

/// Loads the batches of a [`PairSequence`] epoch by epoch
#[derive(Clone)]
pub struct BatchLoader {
    sequence: Arc<dyn PairSequence>,
    num_workers: usize,
    max_queue_size: usize,
    seed: u64,
}

impl BatchLoader {
    pub fn new(sequence: Arc<dyn PairSequence>, config: &LoaderConfig, seed: u64) -> Self {
        Self {
            sequence,
            num_workers: config.num_workers,
            max_queue_size: config.max_queue_size.max(1),
            seed,
        }
    }

    /// Loader over the same sequence with another seed.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }

    /// Batch indices for `steps` batches of `epoch`.
    ///
    /// The sequence is traversed as many times as needed; with `shuffle` each
    /// traversal uses a fresh permutation.
    pub fn schedule(&self, epoch: usize, steps: usize, shuffle: bool) -> Vec<usize> {
        let len = self.sequence.len();
        if len == 0 {
            return Vec::new();
        }

        let mut order_rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
        order_rng.set_stream(u64::MAX);

        let mut schedule = Vec::with_capacity(steps);
        let mut pass: Vec<usize> = (0..len).collect();
        while schedule.len() < steps {
            if shuffle {
                pass.shuffle(&mut order_rng);
            }
            let take = (steps - schedule.len()).min(len);
            schedule.extend_from_slice(&pass[..take]);
        }
        schedule
    }

    /// Iterate over the batches of one epoch.
    pub fn epoch(&self, epoch: usize, steps: usize, shuffle: bool) -> BatchIter {
        let schedule = Arc::new(self.schedule(epoch, steps, shuffle));
        if self.num_workers == 0 {
            return BatchIter {
                state: IterState::Inline {
                    sequence: Arc::clone(&self.sequence),
                    schedule,
                    seed: self.seed,
                    epoch,
                    next: 0,
                },
            };
        }

        let (sender, receiver) = sync_channel(self.max_queue_size);
        let cursor = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let workers = (0..self.num_workers)
            .map(|worker| {
                let sender = sender.clone();
                let cursor = Arc::clone(&cursor);
                let stop = Arc::clone(&stop);
                let schedule = Arc::clone(&schedule);
                let sequence = Arc::clone(&self.sequence);
                let seed = self.seed;

                std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let position = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(&index) = schedule.get(position) else {
                            break;
                        };
                        let mut rng = batch_rng(seed, epoch, position);
                        let result = sequence.get_batch(index, &mut rng);
                        if sender.send((position, result)).is_err() {
                            break;
                        }
                    }
                    debug!("batch loader worker {worker} finished");
                })
            })
            .collect();

        BatchIter {
            state: IterState::Workers {
                receiver: Some(receiver),
                pending: BTreeMap::new(),
                next: 0,
                total: schedule.len(),
                stop,
                workers,
            },
        }
    }
}

/// Batches of one epoch in schedule order
pub struct BatchIter {
    state: IterState,
}

enum IterState {
    Inline {
        sequence: Arc<dyn PairSequence>,
        schedule: Arc<Vec<usize>>,
        seed: u64,
        epoch: usize,
        next: usize,
    },
    Workers {
        receiver: Option<Receiver<(usize, Result<PairBatch>)>>,
        pending: BTreeMap<usize, Result<PairBatch>>,
        next: usize,
        total: usize,
        stop: Arc<AtomicBool>,
        workers: Vec<JoinHandle<()>>,
    },
}

impl Iterator for BatchIter {
    type Item = Result<PairBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            IterState::Inline {
                sequence,
                schedule,
                seed,
                epoch,
                next,
            } => {
                let index = *schedule.get(*next)?;
                let mut rng = batch_rng(*seed, *epoch, *next);
                *next += 1;
                Some(sequence.get_batch(index, &mut rng))
            }
            IterState::Workers {
                receiver,
                pending,
                next,
                total,
                ..
            } => {
                if *next >= *total {
                    return None;
                }
                if let Some(result) = pending.remove(next) {
                    *next += 1;
                    return Some(result);
                }

                let rx = receiver.as_ref()?;
                loop {
                    match rx.recv() {
                        Ok((position, result)) if position == *next => {
                            *next += 1;
                            return Some(result);
                        }
                        Ok((position, result)) => {
                            pending.insert(position, result);
                        }
                        Err(_) => {
                            *next = *total;
                            return Some(Err(Error::Dataset(
                                "batch loader workers stopped unexpectedly".to_string(),
                            )));
                        }
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.state {
            IterState::Inline { schedule, next, .. } => schedule.len().saturating_sub(*next),
            IterState::Workers { next, total, .. } => total.saturating_sub(*next),
        };
        (remaining, Some(remaining))
    }
}

impl Drop for BatchIter {
    fn drop(&mut self) {
        if let IterState::Workers {
            receiver,
            stop,
            workers,
            ..
        } = &mut self.state
        {
            stop.store(true, Ordering::Relaxed);
            // Unblocks workers waiting on a full queue.
            receiver.take();
            for handle in workers.drain(..) {
                if handle.join().is_err() {
                    warn!("batch loader worker panicked");
                }
            }
        }
    }
}
