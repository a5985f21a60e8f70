//! Bounded worker pool for deferred cell resolution.
//!
//! A fixed set of worker threads pulls [`PendingWork`] from a FIFO
//! queue and reports every produced value (and terminal failure) back
//! through a single ordered update channel.  Workers never touch table
//! state or the terminal; the coordinator drains the channel and
//! applies updates on its own thread.

use super::messages::{PendingWork, Producer, WorkUpdate};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// A fixed-capacity pool of execution slots.
pub struct WorkerPool {
    work_tx: Option<Sender<PendingWork>>,
    update_rx: Receiver<WorkUpdate>,
    aborted: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `max_workers` worker threads.
    pub fn new(max_workers: usize) -> Self {
        let workers = max_workers.max(1);
        let (work_tx, work_rx) = unbounded::<PendingWork>();
        let (update_tx, update_rx) = unbounded::<WorkUpdate>();
        let aborted = Arc::new(AtomicBool::new(false));

        debug!(workers, "spawning worker pool");
        let handles = (0..workers)
            .map(|i| {
                let work_rx = work_rx.clone();
                let update_tx = update_tx.clone();
                let aborted = aborted.clone();
                thread::Builder::new()
                    .name(format!("livetable-worker-{i}"))
                    .spawn(move || Self::run_loop(&work_rx, &update_tx, &aborted))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            work_tx: Some(work_tx),
            update_rx,
            aborted,
            handles,
        }
    }

    /// Enqueue one unit of work.  Never blocks; work queues in arrival
    /// order and is dispatched as slots free.
    pub fn submit(&self, work: PendingWork) {
        trace!(row = work.coord.row, column = %work.coord.column, "submitting work");
        if let Some(tx) = &self.work_tx {
            let _ = tx.send(work);
        }
    }

    /// The ordered update channel.
    pub const fn updates(&self) -> &Receiver<WorkUpdate> {
        &self.update_rx
    }

    /// Drop all queued-but-unstarted work.  In-flight work is not
    /// canceled; its result still arrives on the update channel.
    pub fn abort(&self) {
        debug!("aborting queued work");
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Close the queue and wait for the workers to finish.
    pub fn shutdown(mut self) {
        self.work_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    fn run_loop(
        work_rx: &Receiver<PendingWork>,
        update_tx: &Sender<WorkUpdate>,
        aborted: &AtomicBool,
    ) {
        while let Ok(work) = work_rx.recv() {
            if aborted.load(Ordering::Relaxed) {
                trace!(row = work.coord.row, "dropping queued work after abort");
                continue;
            }
            let coord = work.coord;
            let update = match work.producer {
                Producer::Once(f) => match f() {
                    Ok(value) => WorkUpdate::Value { coord, value },
                    Err(error) => WorkUpdate::Failed { coord, error },
                },
                Producer::Stream(mut iter) => match iter.next() {
                    None => WorkUpdate::StreamDone { coord },
                    Some(Ok(value)) => WorkUpdate::StreamYield {
                        coord,
                        value,
                        rest: iter,
                    },
                    Some(Err(error)) => WorkUpdate::Failed { coord, error },
                },
            };
            if update_tx.send(update).is_err() {
                break;
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.work_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::messages::{Coordinate, Datum};

    fn coord(row: usize, column: &str) -> Coordinate {
        Coordinate {
            row,
            column: column.to_owned(),
        }
    }

    #[test]
    fn once_producer_reports_value() {
        let pool = WorkerPool::new(2);
        pool.submit(PendingWork {
            coord: coord(0, "status"),
            producer: Producer::Once(Box::new(|| Ok(Datum::from("done")))),
        });
        match pool.updates().recv().unwrap() {
            WorkUpdate::Value { coord, value } => {
                assert_eq!(coord.row, 0);
                assert_eq!(value, Datum::from("done"));
            }
            _ => panic!("expected a value update"),
        }
        pool.shutdown();
    }

    #[test]
    fn failure_is_captured_not_rethrown() {
        let pool = WorkerPool::new(1);
        pool.submit(PendingWork {
            coord: coord(3, "status"),
            producer: Producer::Once(Box::new(|| Err("boom".into()))),
        });
        match pool.updates().recv().unwrap() {
            WorkUpdate::Failed { coord, error } => {
                assert_eq!(coord.row, 3);
                assert_eq!(error.to_string(), "boom");
            }
            _ => panic!("expected a failure update"),
        }
        pool.shutdown();
    }

    #[test]
    fn stream_yields_one_value_per_dispatch() {
        let pool = WorkerPool::new(1);
        let items = vec![Ok(Datum::from("a")), Ok(Datum::from("b"))];
        pool.submit(PendingWork {
            coord: coord(0, "pct"),
            producer: Producer::Stream(Box::new(items.into_iter())),
        });

        let rest = match pool.updates().recv().unwrap() {
            WorkUpdate::StreamYield { value, rest, .. } => {
                assert_eq!(value, Datum::from("a"));
                rest
            }
            _ => panic!("expected a stream yield"),
        };

        // The remainder only runs once re-enqueued.
        pool.submit(PendingWork {
            coord: coord(0, "pct"),
            producer: Producer::Stream(rest),
        });
        let rest = match pool.updates().recv().unwrap() {
            WorkUpdate::StreamYield { value, rest, .. } => {
                assert_eq!(value, Datum::from("b"));
                rest
            }
            _ => panic!("expected a stream yield"),
        };

        pool.submit(PendingWork {
            coord: coord(0, "pct"),
            producer: Producer::Stream(rest),
        });
        assert!(matches!(
            pool.updates().recv().unwrap(),
            WorkUpdate::StreamDone { .. }
        ));
        pool.shutdown();
    }

    #[test]
    fn abort_drops_queued_work() {
        let pool = WorkerPool::new(1);
        let (gate_tx, gate_rx) = unbounded::<()>();
        let (started_tx, started_rx) = unbounded::<()>();
        // Occupy the single slot until released.
        pool.submit(PendingWork {
            coord: coord(0, "a"),
            producer: Producer::Once(Box::new(move || {
                let _ = started_tx.send(());
                let _ = gate_rx.recv();
                Ok(Datum::from("slow"))
            })),
        });
        pool.submit(PendingWork {
            coord: coord(1, "a"),
            producer: Producer::Once(Box::new(|| Ok(Datum::from("queued")))),
        });
        // Only abort once the first unit is actually in flight, so the
        // second is the one sitting in the queue.
        started_rx.recv().unwrap();
        pool.abort();
        gate_tx.send(()).unwrap();

        // The in-flight unit still reports; the queued one is dropped.
        match pool.updates().recv().unwrap() {
            WorkUpdate::Value { value, .. } => assert_eq!(value, Datum::from("slow")),
            _ => panic!("expected the in-flight value"),
        }
        let updates = pool.updates().clone();
        pool.shutdown();
        assert!(updates.try_recv().is_err());
    }
}
