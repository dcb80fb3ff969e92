// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fixed-size thread pool with a FIFO task queue, and the bounded FIFO
//! primitive it shares with the legacy pipeline path. Ported from a
//! monitor-style C++ thread pool (one mutex, one condvar) into
//! `std::sync::{Mutex, Condvar}`.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    cv_pop: Condvar,
    stop: std::sync::atomic::AtomicBool,
}

/// A fixed-size pool of worker threads draining one shared task queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            cv_pop: Condvar::new(),
            stop: std::sync::atomic::AtomicBool::new(false),
        });
        let mut pool = ThreadPool {
            shared,
            workers: Vec::new(),
        };
        pool.start_workers(num_threads.max(1));
        pool
    }

    fn start_workers(&mut self, n: usize) {
        for _ in 0..n {
            let shared = Arc::clone(&self.shared);
            self.workers.push(std::thread::spawn(move || Self::worker_loop(shared)));
        }
    }

    fn worker_loop(shared: Arc<Shared>) {
        loop {
            let task = {
                let mut queue = shared.queue.lock().unwrap();
                loop {
                    if let Some(task) = queue.pop_front() {
                        break Some(task);
                    }
                    if shared.stop.load(std::sync::atomic::Ordering::SeqCst) {
                        break None;
                    }
                    queue = shared.cv_pop.wait(queue).unwrap();
                }
            };
            match task {
                Some(task) => {
                    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task));
                }
                None => break,
            }
        }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Submits a task. Returns `false` once the pool has been stopped (via
    /// [`Self::resize`] or drop).
    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) -> bool {
        if self.shared.stop.load(std::sync::atomic::Ordering::SeqCst) {
            return false;
        }
        self.shared.queue.lock().unwrap().push_back(Box::new(task));
        self.shared.cv_pop.notify_one();
        true
    }

    /// Drains and joins the current workers, clears the queue, then starts
    /// `n` new workers. Not safe to call concurrently with in-flight
    /// `enqueue` calls from other threads.
    pub fn resize(&mut self, n: usize) {
        self.stop_and_join();
        self.shared.queue.lock().unwrap().clear();
        self.shared.stop.store(false, std::sync::atomic::Ordering::SeqCst);
        self.start_workers(n.max(1));
    }

    fn stop_and_join(&mut self) {
        self.shared.stop.store(true, std::sync::atomic::Ordering::SeqCst);
        self.shared.cv_pop.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// A producer/consumer FIFO with a capacity and a `finish()` signal.
pub struct BoundedQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    cv_push: Condvar,
    cv_pop: Condvar,
    finished: std::sync::atomic::AtomicBool,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            inner: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            cv_push: Condvar::new(),
            cv_pop: Condvar::new(),
            finished: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Blocks until there is capacity or the queue is finished. Returns
    /// `false` if finished before space became available.
    pub fn push(&self, value: T) -> bool {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if self.finished.load(std::sync::atomic::Ordering::SeqCst) {
                return false;
            }
            if guard.len() < self.capacity {
                guard.push_back(value);
                self.cv_pop.notify_one();
                return true;
            }
            guard = self.cv_push.wait(guard).unwrap();
        }
    }

    /// Blocks until an item is available or the queue is finished and
    /// empty, in which case it returns `None`.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(value) = guard.pop_front() {
                self.cv_push.notify_one();
                return Some(value);
            }
            if self.finished.load(std::sync::atomic::Ordering::SeqCst) {
                return None;
            }
            guard = self.cv_pop.wait(guard).unwrap();
        }
    }

    pub fn finish(&self) {
        self.finished.store(true, std::sync::atomic::Ordering::SeqCst);
        self.cv_pop.notify_all();
        self.cv_push.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn thread_pool_runs_all_tasks() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            assert!(pool.enqueue(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn thread_pool_resize_restarts_workers() {
        let mut pool = ThreadPool::new(2);
        assert_eq!(pool.thread_count(), 2);
        pool.resize(5);
        assert_eq!(pool.thread_count(), 5);
        assert!(pool.enqueue(|| {}));
    }

    #[test]
    fn bounded_queue_respects_capacity_and_finish() {
        let queue = Arc::new(BoundedQueue::new(2));
        assert!(queue.push(1));
        assert!(queue.push(2));

        let q2 = Arc::clone(&queue);
        let handle = std::thread::spawn(move || q2.push(3));
        std::thread::sleep(std::time::Duration::from_millis(20));

        assert_eq!(queue.pop(), Some(1));
        assert!(handle.join().unwrap());

        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));

        queue.finish();
        assert_eq!(queue.pop(), None);
    }
}
