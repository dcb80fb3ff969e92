// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A bounded multi-consumer queue tying submitted repair jobs to a pool of
//! worker threads. One mutex, three condition variables (jobs/space/
//! results), matching the monitor-style queue the legacy pipeline's
//! `BoundedQueue` is also drawn from.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::error::RepairJobStatus;
use crate::pipeline::{PerMeshPipeline, RepairJobConfig};
use crate::stats::MeshStatistics;

pub struct CompletedJob {
    pub job_id: u64,
    pub status: RepairJobStatus,
    pub stats: MeshStatistics,
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

struct QueuedJob {
    job_id: u64,
    config: RepairJobConfig,
}

struct Shared {
    jobs: Mutex<VecDeque<QueuedJob>>,
    results: Mutex<VecDeque<CompletedJob>>,
    capacity: usize,
    next_job_id: Mutex<u64>,
    stopping: std::sync::atomic::AtomicBool,
    cv_jobs: Condvar,
    cv_space: Condvar,
    cv_results: Condvar,
}

/// Drives `worker_threads` worker threads, each pulling one job at a time
/// and running it through [`PerMeshPipeline`] to completion.
pub struct RepairQueue {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl RepairQueue {
    pub fn new(capacity: usize, worker_threads: usize) -> Self {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(VecDeque::new()),
            results: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            next_job_id: Mutex::new(1),
            stopping: std::sync::atomic::AtomicBool::new(false),
            cv_jobs: Condvar::new(),
            cv_space: Condvar::new(),
            cv_results: Condvar::new(),
        });

        let workers = (0..worker_threads.max(1))
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || Self::worker_loop(shared))
            })
            .collect();

        RepairQueue { shared, workers }
    }

    fn worker_loop(shared: Arc<Shared>) {
        loop {
            let job = {
                let mut jobs = shared.jobs.lock().unwrap();
                loop {
                    if let Some(job) = jobs.pop_front() {
                        shared.cv_space.notify_one();
                        break Some(job);
                    }
                    if shared.stopping.load(std::sync::atomic::Ordering::SeqCst) {
                        break None;
                    }
                    jobs = shared.cv_jobs.wait(jobs).unwrap();
                }
            };

            let Some(job) = job else { break };

            let start = std::time::Instant::now();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| PerMeshPipeline::run(&job.config)));

            let completed = match outcome {
                Ok(Ok(report)) => CompletedJob {
                    job_id: job.job_id,
                    status: report.status,
                    stats: report.stats,
                    error: report.error,
                    elapsed_ms: start.elapsed().as_millis(),
                },
                Ok(Err(err)) => CompletedJob {
                    job_id: job.job_id,
                    status: RepairJobStatus::InternalError,
                    stats: MeshStatistics::default(),
                    error: Some(err.to_string()),
                    elapsed_ms: start.elapsed().as_millis(),
                },
                Err(_) => CompletedJob {
                    job_id: job.job_id,
                    status: RepairJobStatus::InternalError,
                    stats: MeshStatistics::default(),
                    error: Some("worker panicked".to_string()),
                    elapsed_ms: start.elapsed().as_millis(),
                },
            };

            let mut results = shared.results.lock().unwrap();
            results.push_back(completed);
            shared.cv_results.notify_one();
        }
    }

    /// Non-blocking. Fails when stopping or full; on success returns the new
    /// monotonically increasing job id.
    pub fn enqueue(&self, config: RepairJobConfig) -> (bool, u64) {
        if self.shared.stopping.load(std::sync::atomic::Ordering::SeqCst) {
            return (false, 0);
        }
        let mut jobs = self.shared.jobs.lock().unwrap();
        if jobs.len() >= self.shared.capacity {
            return (false, 0);
        }
        let job_id = {
            let mut next = self.shared.next_job_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        jobs.push_back(QueuedJob { job_id, config });
        self.shared.cv_jobs.notify_one();
        (true, job_id)
    }

    /// When `wait` is true, blocks until a result arrives or the queue is
    /// stopping with nothing left to report; otherwise returns immediately.
    pub fn pop_result(&self, wait: bool) -> Option<CompletedJob> {
        let mut results = self.shared.results.lock().unwrap();
        if wait {
            loop {
                if let Some(result) = results.pop_front() {
                    self.shared.cv_space.notify_one();
                    return Some(result);
                }
                if self.shared.stopping.load(std::sync::atomic::Ordering::SeqCst) && self.shared.jobs.lock().unwrap().is_empty() {
                    return None;
                }
                results = self.shared.cv_results.wait(results).unwrap();
            }
        } else {
            let result = results.pop_front();
            if result.is_some() {
                self.shared.cv_space.notify_one();
            }
            result
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.jobs.lock().unwrap().len()
    }

    /// Sets stopping, wakes all waiters, and joins all workers. In-flight
    /// jobs complete; jobs still queued may or may not run.
    pub fn shutdown(&mut self) {
        self.shared.stopping.store(true, std::sync::atomic::Ordering::SeqCst);
        self.shared.cv_jobs.notify_all();
        self.shared.cv_results.notify_all();
        self.shared.cv_space.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for RepairQueue {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial_config() -> RepairJobConfig {
        RepairJobConfig::in_memory_noop()
    }

    #[test]
    fn job_ids_are_strictly_increasing() {
        let mut queue = RepairQueue::new(4, 1);
        let mut ids = Vec::new();
        for _ in 0..4 {
            let (accepted, id) = queue.enqueue(trivial_config());
            assert!(accepted);
            ids.push(id);
        }
        assert_eq!(ids, vec![1, 2, 3, 4]);
        queue.shutdown();
    }

    #[test]
    fn enqueue_fails_once_capacity_is_reached() {
        let queue = RepairQueue::new(1, 0);
        // No workers draining: capacity 1 fills immediately.
        let (first, _) = queue.enqueue(trivial_config());
        assert!(first);
        let (second, _) = queue.enqueue(trivial_config());
        assert!(!second);
    }

    #[test]
    fn all_jobs_eventually_complete() {
        let mut queue = RepairQueue::new(4, 2);
        for _ in 0..4 {
            queue.enqueue(trivial_config());
        }
        let mut completed = 0;
        for _ in 0..4 {
            if queue.pop_result(true).is_some() {
                completed += 1;
            }
        }
        assert_eq!(completed, 4);
        queue.shutdown();
    }
}
