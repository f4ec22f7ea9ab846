//! Fixed-size pool of download workers sharing one task queue.
//!
//! `run` enqueues every task, closes the queue and starts exactly
//! `concurrency` workers. Each worker takes one task at a time, writes the
//! body to the task's destination and acknowledges it, whether or not the
//! fetch succeeded. Workers exit once the closed queue is drained, so awaiting
//! all of them is the join barrier: when `run` returns every task has been
//! acknowledged.

use crate::error::{MangaBindError, Result};
use crate::models::{DownloadTask, PoolReport, TaskFailure};
use crate::progress::{ProgressEvent, SharedReporter};
use crate::traits::Fetcher;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

pub const DEFAULT_CONCURRENCY: usize = 10;

type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<DownloadTask>>>;

pub struct FetchPool {
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
    reporter: SharedReporter,
}

impl FetchPool {
    pub fn new(fetcher: Arc<dyn Fetcher>, concurrency: usize, reporter: SharedReporter) -> Result<Self> {
        if concurrency == 0 {
            return Err(MangaBindError::invalid_input(
                "pool concurrency must be at least 1",
            ));
        }
        Ok(Self {
            fetcher,
            concurrency,
            reporter,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Download every task and wait until all of them are acknowledged.
    ///
    /// Task-level failures are collected in the report. An `Err` is returned
    /// only if a worker itself died.
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> Result<PoolReport> {
        let total = tasks.len();
        let (tx, rx) = mpsc::unbounded_channel();
        for task in tasks {
            // The receiver is alive until the workers below finish.
            let _ = tx.send(task);
        }
        drop(tx);

        let queue: TaskQueue = Arc::new(Mutex::new(rx));
        let completed = Arc::new(AtomicUsize::new(0));

        debug!(
            "Starting {} download workers for {} images",
            self.concurrency, total
        );

        let workers: Vec<_> = (0..self.concurrency)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue.clone(),
                    fetcher: self.fetcher.clone(),
                    completed: completed.clone(),
                    total,
                    reporter: self.reporter.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let mut failures = Vec::new();
        for result in join_all(workers).await {
            match result {
                Ok(mut worker_failures) => failures.append(&mut worker_failures),
                Err(e) => {
                    error!("Download worker crashed: {}", e);
                    return Err(MangaBindError::Worker(e.to_string()));
                }
            }
        }
        failures.sort_by_key(|f| f.index);

        let report = PoolReport {
            total,
            completed: completed.load(Ordering::SeqCst),
            failures,
        };
        debug!(
            "Download finished: {}/{} images, {} failed",
            report.completed,
            report.total,
            report.failures.len()
        );
        Ok(report)
    }
}

struct Worker {
    id: usize,
    queue: TaskQueue,
    fetcher: Arc<dyn Fetcher>,
    completed: Arc<AtomicUsize>,
    total: usize,
    reporter: SharedReporter,
}

impl Worker {
    async fn run(self) -> Vec<TaskFailure> {
        let mut failures = Vec::new();
        loop {
            // The lock is released before the fetch starts.
            let next = self.queue.lock().await.recv().await;
            let Some(task) = next else { break };

            match self.process(&task).await {
                Ok(size) => {
                    let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(
                        "Worker {} stored {:?} ({} bytes) [{}/{}]",
                        self.id,
                        task.destination(),
                        size,
                        done,
                        self.total
                    );
                    self.reporter.on_event(&ProgressEvent::ImageFetched {
                        completed: done,
                        total: self.total,
                    });
                }
                Err(e) => {
                    error!("Worker {} failed on image {}: {}", self.id, task.index, e);
                    let failure = TaskFailure {
                        index: task.index,
                        url: task.url.clone(),
                        error: e.to_string(),
                    };
                    self.reporter.on_event(&ProgressEvent::ImageFailed {
                        index: failure.index,
                        url: failure.url.clone(),
                        error: failure.error.clone(),
                    });
                    failures.push(failure);
                }
            }
        }
        failures
    }

    async fn process(&self, task: &DownloadTask) -> Result<usize> {
        let body = self.fetcher.fetch_bytes(&task.url).await?;
        tokio::fs::write(task.destination(), &body).await?;
        Ok(body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageLink;
    use crate::progress::NoopProgress;
    use std::collections::BTreeSet;
    use std::time::Duration;

    /// Serves `body-<url>` for every URL except those listed as failing.
    struct FakeFetcher {
        failing: Vec<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch_text(&self, _url: &str) -> Result<String> {
            unreachable!("pool only fetches bytes")
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.iter().any(|f| f == url) {
                return Err(MangaBindError::parse(format!("refused {}", url)));
            }
            Ok(format!("body-{}", url).into_bytes())
        }
    }

    fn tasks(dir: &std::path::Path, n: usize) -> Vec<DownloadTask> {
        (1..=n)
            .map(|index| {
                DownloadTask::new(
                    dir,
                    &ImageLink {
                        index,
                        url: format!("http://img/{}", index),
                    },
                )
            })
            .collect()
    }

    fn listing(dir: &std::path::Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn pool(fetcher: Arc<FakeFetcher>, concurrency: usize) -> FetchPool {
        FetchPool::new(fetcher, concurrency, Arc::new(NoopProgress)).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_task_lands_as_its_indexed_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = pool(Arc::new(FakeFetcher::new(&[])), DEFAULT_CONCURRENCY)
            .run(tasks(dir.path(), 25))
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.completed, 25);
        let expected: BTreeSet<String> = (1..=25).map(|i| format!("{}.jpg", i)).collect();
        assert_eq!(listing(dir.path()), expected);
        assert_eq!(
            std::fs::read(dir.path().join("7.jpg")).unwrap(),
            b"body-http://img/7"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_size_does_not_change_the_result() {
        let serial = tempfile::tempdir().unwrap();
        let parallel = tempfile::tempdir().unwrap();

        pool(Arc::new(FakeFetcher::new(&[])), 1)
            .run(tasks(serial.path(), 12))
            .await
            .unwrap();
        pool(Arc::new(FakeFetcher::new(&[])), 10)
            .run(tasks(parallel.path(), 12))
            .await
            .unwrap();

        assert_eq!(listing(serial.path()), listing(parallel.path()));
        for i in 1..=12 {
            let name = format!("{}.jpg", i);
            assert_eq!(
                std::fs::read(serial.path().join(&name)).unwrap(),
                std::fs::read(parallel.path().join(&name)).unwrap()
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_bounded_by_pool_size() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(&[]));
        pool(fetcher.clone(), 3)
            .run(tasks(dir.path(), 20))
            .await
            .unwrap();

        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn failed_tasks_are_acknowledged_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let report = pool(Arc::new(FakeFetcher::new(&["http://img/2"])), 4)
            .run(tasks(dir.path(), 3))
            .await
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.completed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 2);
        assert!(!dir.path().join("2.jpg").exists());
    }

    #[tokio::test]
    async fn write_errors_are_task_failures() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("removed");
        let report = pool(Arc::new(FakeFetcher::new(&[])), 2)
            .run(tasks(&gone, 2))
            .await
            .unwrap();

        assert_eq!(report.completed, 0);
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn empty_task_list_returns_immediately() {
        let report = pool(Arc::new(FakeFetcher::new(&[])), DEFAULT_CONCURRENCY)
            .run(Vec::new())
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert!(report.is_complete());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let result = FetchPool::new(
            Arc::new(FakeFetcher::new(&[])),
            0,
            Arc::new(NoopProgress),
        );
        assert!(matches!(result, Err(MangaBindError::InvalidInput(_))));
    }
}
