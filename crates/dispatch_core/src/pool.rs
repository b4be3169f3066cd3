//! Idle driver pool shared by every region.
//!
//! The pool is a mutex-guarded stack paired with a [Notify] that plays the
//! role of a condition variable: each release wakes at most one waiter, and a
//! waiter re-checks the stack after waking. Hand-out order is unspecified.

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::agents::Driver;
use crate::error::DispatchError;

/// Upper bound on idle drivers a dispatch holds unless configured otherwise.
pub const DEFAULT_MAX_DRIVERS: usize = 999;

#[derive(Debug)]
pub struct DriverPool {
    capacity: usize,
    idle: Mutex<Vec<Driver>>,
    returned: Notify,
}

impl DriverPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Mutex::new(Vec::with_capacity(capacity.min(64))),
            returned: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Puts a driver back into the pool and wakes one waiting booking.
    pub fn release(&self, driver: Driver) -> Result<(), DispatchError> {
        {
            let mut idle = self.idle.lock();
            if idle.len() >= self.capacity {
                return Err(DispatchError::PoolOverflow {
                    capacity: self.capacity,
                });
            }
            idle.push(driver);
        }
        self.returned.notify_one();
        Ok(())
    }

    /// Waits until a driver is idle and takes it out of the pool.
    ///
    /// Cancel safe: a dropped waiter that had been woken passes its wakeup on
    /// to the next waiter, so no released driver is stranded.
    pub async fn acquire(&self) -> Driver {
        loop {
            let notified = self.returned.notified();
            tokio::pin!(notified);
            // Register before checking so a release racing with the check
            // still wakes this waiter.
            notified.as_mut().enable();

            if let Some(driver) = self.try_acquire() {
                return driver;
            }
            notified.await;
        }
    }

    pub fn try_acquire(&self) -> Option<Driver> {
        self.idle.lock().pop()
    }
}

impl Default for DriverPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DRIVERS)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn driver(name: &str) -> Driver {
        Driver::new(name, Duration::ZERO)
    }

    #[test]
    fn release_beyond_capacity_overflows() {
        let pool = DriverPool::new(2);
        pool.release(driver("D-1")).expect("first fits");
        pool.release(driver("D-2")).expect("second fits");

        let err = pool.release(driver("D-3")).expect_err("third overflows");
        assert_eq!(err, DispatchError::PoolOverflow { capacity: 2 });
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test]
    async fn acquire_returns_idle_driver_immediately() {
        let pool = DriverPool::new(4);
        pool.release(driver("D-1")).expect("release");

        let got = pool.acquire().await;
        assert_eq!(got.name(), "D-1");
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn acquire_waits_until_a_driver_is_released() {
        let pool = Arc::new(DriverPool::new(4));
        let waiter = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.acquire().await }
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished(), "no driver yet, waiter must block");

        pool.release(driver("D-late")).expect("release");
        let got = waiter.await.expect("waiter task");
        assert_eq!(got.name(), "D-late");
    }

    #[tokio::test]
    async fn dropped_waiter_does_not_strand_a_driver() {
        let pool = Arc::new(DriverPool::new(4));
        let first = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.acquire().await }
        });
        let second = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.acquire().await }
        });
        tokio::task::yield_now().await;

        first.abort();
        let _ = first.await;
        pool.release(driver("D-1")).expect("release");

        let got = second.await.expect("second waiter");
        assert_eq!(got.name(), "D-1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn drivers_are_never_handed_out_twice() {
        let pool = Arc::new(DriverPool::new(8));
        for i in 0..3 {
            pool.release(driver(&format!("D-{i}"))).expect("seed pool");
        }
        let in_use = Arc::new(Mutex::new(HashSet::new()));

        let mut workers = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            let in_use = Arc::clone(&in_use);
            workers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let d = pool.acquire().await;
                    assert!(
                        in_use.lock().insert(d.name().to_string()),
                        "{} handed to two holders",
                        d.name()
                    );
                    tokio::task::yield_now().await;
                    in_use.lock().remove(d.name());
                    pool.release(d).expect("release");
                }
            }));
        }
        for worker in workers {
            worker.await.expect("worker");
        }
        assert_eq!(pool.idle_count(), 3);
    }
}
