use crate::{Broker, BrokerConfig, Error};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_stream::StreamExt;

const JOB_COST: Duration = Duration::from_millis(10);

/// Submits `num_jobs` string jobs, consumes the stream concurrently, and
/// asserts every result arrives in submission order. Returns the wall time
/// between the first submit and stream close.
async fn run_ordered_delivery(concurrency: usize, num_jobs: usize) -> Duration {
    let broker = Arc::new(
        Broker::new(concurrency, |job: String| {
            std::thread::sleep(JOB_COST);
            job.starts_with("job-")
        })
        .unwrap(),
    );

    let mut results = broker.results().unwrap();
    let started = Instant::now();

    let submitter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            for i in 0..num_jobs {
                broker.submit(format!("job-{i}")).await.unwrap();
            }
            broker.finalize().await.unwrap();
        })
    };

    let mut delivered = 0;
    while let Some(done) = results.next().await {
        assert_eq!(done.key, format!("job-{delivered}"));
        assert!(done.result);
        delivered += 1;
    }
    let elapsed = started.elapsed();

    submitter.await.unwrap();
    assert_eq!(delivered, num_jobs);
    elapsed
}

#[tokio::test]
async fn one_worker_runs_jobs_sequentially_in_order() {
    let elapsed = run_ordered_delivery(1, 10).await;
    // Ten 10ms jobs through one worker cannot finish faster than serially.
    assert!(
        elapsed >= Duration::from_millis(100),
        "ten serial 10ms jobs finished in {elapsed:?}"
    );
    // Generous ceiling for loaded CI machines.
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[tokio::test]
async fn two_workers_deliver_twenty_jobs_in_order() {
    run_ordered_delivery(2, 20).await;
}

#[tokio::test]
async fn ten_workers_deliver_fifty_jobs_in_order() {
    run_ordered_delivery(10, 50).await;
}

#[tokio::test]
async fn slow_head_gates_faster_completions() {
    // The 1ms job finishes first but must wait for the 100ms job submitted
    // ahead of it.
    let latencies = [100_u64, 1, 50];

    let broker = Arc::new(
        Broker::new(4, |ms: u64| {
            std::thread::sleep(Duration::from_millis(ms));
            ms % 2 == 0
        })
        .unwrap(),
    );

    let mut results = broker.results().unwrap();
    for ms in latencies {
        broker.submit(ms).await.unwrap();
    }
    broker.finalize().await.unwrap();

    let mut emitted = Vec::new();
    while let Some(done) = results.next().await {
        assert_eq!(done.result, done.key % 2 == 0);
        emitted.push(done.key);
    }
    assert_eq!(emitted, latencies);
}

#[tokio::test]
async fn order_holds_under_randomized_latency() {
    use rand::Rng;

    const JOBS: usize = 32;

    let broker = Arc::new(
        Broker::new(8, |n: usize| {
            let ms = rand::rng().random_range(0..10_u64);
            std::thread::sleep(Duration::from_millis(ms));
            n * 2
        })
        .unwrap(),
    );

    let mut results = broker.results().unwrap();
    let submitter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            for n in 0..JOBS {
                broker.submit(n).await.unwrap();
            }
            broker.finalize().await.unwrap();
        })
    };

    let mut expected = 0;
    while let Some(done) = results.next().await {
        assert_eq!(done.key, expected);
        assert_eq!(done.result, expected * 2);
        expected += 1;
    }
    submitter.await.unwrap();
    assert_eq!(expected, JOBS);
}

#[tokio::test]
async fn at_most_n_callbacks_run_concurrently() {
    const CONCURRENCY: usize = 3;
    const JOBS: usize = 12;

    let active = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));

    let broker = Arc::new(
        Broker::new(CONCURRENCY, {
            let active = Arc::clone(&active);
            let high_water = Arc::clone(&high_water);
            move |n: usize| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
                n
            }
        })
        .unwrap(),
    );

    let mut results = broker.results().unwrap();
    let submitter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            for n in 0..JOBS {
                broker.submit(n).await.unwrap();
            }
            broker.finalize().await.unwrap();
        })
    };

    let mut delivered = 0;
    while let Some(done) = results.next().await {
        assert_eq!(done.key, delivered);
        delivered += 1;
    }
    submitter.await.unwrap();

    assert_eq!(delivered, JOBS);
    assert!(
        high_water.load(Ordering::SeqCst) <= CONCURRENCY,
        "saw {} concurrent callbacks",
        high_water.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn empty_broker_finalize_closes_stream_promptly() {
    let broker = Broker::new(1, |n: u32| n).unwrap();
    let mut results = broker.results().unwrap();
    broker.finalize().await.unwrap();

    let end = tokio::time::timeout(Duration::from_secs(1), results.next())
        .await
        .expect("stream should close well within a second");
    assert!(end.is_none());
}

#[tokio::test]
async fn duplicate_in_flight_key_is_rejected() {
    let broker = Broker::new(2, |ms: u64| {
        std::thread::sleep(Duration::from_millis(50));
        ms
    })
    .unwrap();

    broker.submit(7).await.unwrap();
    assert!(matches!(broker.submit(7).await, Err(Error::DuplicateJob)));
    broker.submit(8).await.unwrap();

    let mut results = broker.results().unwrap();
    broker.finalize().await.unwrap();

    let mut emitted = Vec::new();
    while let Some(done) = results.next().await {
        emitted.push(done.key);
    }
    assert_eq!(emitted, [7, 8]);
}

#[tokio::test]
async fn submit_or_finalize_after_finalize_is_an_error() {
    let broker = Broker::new(1, |n: u32| n).unwrap();
    broker.finalize().await.unwrap();

    assert!(matches!(broker.submit(1).await, Err(Error::Finalized)));
    assert!(matches!(broker.finalize().await, Err(Error::Finalized)));
}

#[tokio::test]
async fn results_stream_can_only_be_taken_once() {
    let broker = Broker::new(1, |n: u32| n).unwrap();
    let _results = broker.results().unwrap();
    assert!(matches!(broker.results(), Err(Error::ResultsTaken)));
}

#[tokio::test]
async fn invalid_configs_are_rejected() {
    assert!(matches!(
        Broker::new(0, |n: u32| n),
        Err(Error::InvalidConfig { .. })
    ));

    let config = BrokerConfig::new(2).intake_capacity(0);
    assert!(matches!(
        Broker::with_config(config, |n: u32| n),
        Err(Error::InvalidConfig { .. })
    ));
}

#[tokio::test]
async fn pending_jobs_snapshot_is_independent() {
    let broker = Arc::new(
        Broker::new(3, |key: u64| {
            std::thread::sleep(Duration::from_millis(200));
            key
        })
        .unwrap(),
    );

    for key in [1, 2, 3] {
        broker.submit(key).await.unwrap();
    }

    // All three jobs are still executing: none can have left the ledger.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = broker.pending_jobs().unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.first(), Some(1));

    // Mutating the snapshot must not disturb delivery.
    assert_eq!(snapshot.pop(), Some(3));

    let mut results = broker.results().unwrap();
    broker.finalize().await.unwrap();

    let mut emitted = Vec::new();
    while let Some(done) = results.next().await {
        emitted.push(done.key);
    }
    assert_eq!(emitted, [1, 2, 3]);
}

#[tokio::test]
async fn dropping_the_broker_still_drains_queued_jobs() {
    let broker = Broker::new(2, |n: u32| n + 1).unwrap();
    let mut results = broker.results().unwrap();

    broker.submit(1).await.unwrap();
    broker.submit(2).await.unwrap();
    drop(broker);

    let mut emitted = Vec::new();
    while let Some(done) = results.next().await {
        emitted.push((done.key, done.result));
    }
    assert_eq!(emitted, [(1, 2), (2, 3)]);
}

#[tokio::test]
async fn concurrency_accessor_reports_configuration() {
    for concurrency in [2, 5] {
        let broker = Broker::new(concurrency, |n: u32| n).unwrap();
        assert_eq!(broker.concurrency(), concurrency);
    }
}
