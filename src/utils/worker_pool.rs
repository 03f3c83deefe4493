use crossbeam::channel::{TrySendError, bounded};
use log::warn;
use std::thread;

/// Run `job` over `items` on `workers` threads fed from one bounded queue.
///
/// The queue holds at most `capacity` items; anything past that is dropped
/// with a warning. Jobs returning `None` produce no output. Output order is
/// unspecified.
pub fn run<T, R, F>(items: Vec<T>, workers: usize, capacity: usize, job: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Option<R> + Sync,
{
    let workers = workers.max(1);
    let capacity = capacity.max(1);

    let (work_tx, work_rx) = bounded(capacity);
    let mut queued = 0usize;
    let mut dropped = 0usize;
    for item in items {
        match work_tx.try_send(item) {
            Ok(()) => queued += 1,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => dropped += 1,
        }
    }
    drop(work_tx);

    if dropped > 0 {
        warn!("Work queue is capped at {capacity}; dropped {dropped} item(s)");
    }

    let (result_tx, result_rx) = bounded(queued.max(1));
    let job = &job;

    thread::scope(|scope| {
        for _ in 0..workers.min(queued.max(1)) {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for item in work_rx.iter() {
                    if let Some(result) = job(item) {
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    drop(result_tx);

    result_rx.try_iter().collect()
}
