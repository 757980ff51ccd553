//! Integration tests for supervised stream topologies

use std::collections::HashSet;
use std::time::Duration;

use stagewire::prelude::*;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

const DEADLINE: Duration = Duration::from_secs(5);

/// Drain `results` until the feeding topology closes it.
async fn collect<T>(results: mpsc::Receiver<T>) -> Vec<T> {
    let drained = async move {
        let mut results = results;
        let mut items = Vec::new();
        while let Some(item) = results.recv().await {
            items.push(item);
        }
        items
    };
    tokio::time::timeout(DEADLINE, drained)
        .await
        .expect("topology did not close its output")
}

async fn wait_dead(supervisor: &Supervisor) -> Result<()> {
    tokio::time::timeout(DEADLINE, supervisor.wait())
        .await
        .expect("topology did not terminate")
}

fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items
}

fn test_label(n: u64) -> String {
    format!("Test-{n}")
}

#[tokio::test]
async fn test_map() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..3u64)
        .via(Map::new(&supervisor, |n: u64| async move { Ok(test_label(n)) }, 2))?;
    supervisor.attach(flow.to(sink));

    let out = collect(results).await;
    assert_eq!(sorted(out), vec!["Test-0", "Test-1", "Test-2"]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_map_error() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..3u64).via(Map::new(
        &supervisor,
        |n: u64| async move {
            if n == 1 {
                return Err(Error::from("error!"));
            }
            Ok(test_label(n))
        },
        2,
    ))?;
    supervisor.attach(flow.to(sink));

    let out = collect(results).await;
    assert!(out.len() < 3, "got {out:?}");
    assert!(!out.contains(&test_label(1)));

    let err = assert_err!(wait_dead(&supervisor).await);
    assert_eq!(err.to_string(), "error!");
    Ok(())
}

#[tokio::test]
async fn test_map_timeout() -> Result<()> {
    let supervisor = Supervisor::with_timeout(Duration::from_millis(10));
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..6u64).via(Map::new(
        &supervisor,
        |n: u64| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(n)
        },
        2,
    ))?;
    supervisor.attach(flow.to(sink));

    let out = collect(results).await;
    assert!(out.len() < 6, "got {out:?}");

    let err = assert_err!(wait_dead(&supervisor).await);
    assert!(matches!(err, Error::Timeout { duration_ms: 10 }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn test_flat_map() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..3u64).via(FlatMap::new(
        &supervisor,
        |n: u64| async move { Ok(vec![n.to_string(), n.to_string()]) },
        2,
    ))?;
    supervisor.attach(flow.to(sink));

    let out = collect(results).await;
    assert_eq!(sorted(out), vec!["0", "0", "1", "1", "2", "2"]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_flat_map_error() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..3u64).via(FlatMap::new(
        &supervisor,
        |n: u64| async move {
            if n == 1 {
                return Err(Error::from("error!"));
            }
            Ok(vec![n.to_string(), n.to_string()])
        },
        2,
    ))?;
    supervisor.attach(flow.to(sink));

    let out = collect(results).await;
    assert!(out.len() < 6, "got {out:?}");
    assert!(!out.contains(&"1".to_string()));

    let err = assert_err!(wait_dead(&supervisor).await);
    assert_eq!(err.to_string(), "error!");
    Ok(())
}

#[tokio::test]
async fn test_filter() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..3u64)
        .via(Filter::new(&supervisor, |n: &u64| Ok(n % 2 == 0), 2))?;
    supervisor.attach(flow.to(sink));

    let out = collect(results).await;
    assert_eq!(sorted(out), vec![0, 2]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_filter_to_stdout() -> Result<()> {
    let supervisor = Supervisor::new();

    let flow = IterSource::new(&supervisor, 0..3u64)
        .via(Filter::new(&supervisor, |n: &u64| Ok(n % 2 == 0), 2))?;
    flow.to(StdoutSink::with_prefix(&supervisor, "filter")).await?;

    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_filter_error() -> Result<()> {
    let supervisor = Supervisor::new();

    let flow = IterSource::new(&supervisor, 0..3u64).via(Filter::new(
        &supervisor,
        |n: &u64| {
            if *n == 1 {
                return Err(Error::from("error!"));
            }
            Ok(n % 2 == 0)
        },
        2,
    ))?;
    flow.to(StdoutSink::new(&supervisor)).await?;

    let err = assert_err!(wait_dead(&supervisor).await);
    assert_eq!(err.to_string(), "error!");
    Ok(())
}

#[tokio::test]
async fn test_pipeline() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..3u64)
        .via(Filter::new(&supervisor, |n: &u64| Ok(n % 2 == 0), 2))?
        .via(Map::new(&supervisor, |n: u64| async move { Ok(test_label(n)) }, 2))?
        .via(FlatMap::new(
            &supervisor,
            |label: String| async move { Ok(vec![label.clone(), label]) },
            2,
        ))?;
    supervisor.attach(flow.to(sink));

    let out = collect(results).await;
    assert_eq!(sorted(out), vec!["Test-0", "Test-0", "Test-2", "Test-2"]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_order_with_single_worker() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0..3u64)
        .via(Map::new(&supervisor, |n: u64| async move { Ok(test_label(n)) }, 1))?;
    supervisor.attach(flow.to(sink));

    assert_eq!(collect(results).await, vec!["Test-0", "Test-1", "Test-2"]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_branches() -> Result<()> {
    let supervisor = Supervisor::new();
    let evens = IterSource::new(&supervisor, 0..3u64)
        .via(Filter::new(&supervisor, |n: &u64| Ok(n % 2 == 0), 2))?;

    let mut branches = fan_out(evens, 2).into_iter();
    let labels = assert_ok!(branches
        .next()
        .ok_or("missing branch")?
        .via(Map::new(&supervisor, |n: u64| async move { Ok(test_label(n)) }, 2)));
    let doubled = assert_ok!(branches.next().ok_or("missing branch")?.via(FlatMap::new(
        &supervisor,
        |n: u64| async move { Ok(vec![n.to_string(), n.to_string()]) },
        2,
    )));

    let merged = merge(vec![labels.into_feed(), doubled.into_feed()])?;
    let (sink, results) = ChanSink::channel();
    supervisor.attach(merged.to(sink));

    let out = collect(results).await;
    assert_eq!(sorted(out), vec!["0", "0", "2", "2", "Test-0", "Test-2"]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_branch_errors() -> Result<()> {
    let supervisor = Supervisor::new();
    let evens = IterSource::new(&supervisor, 0..3u64)
        .via(Filter::new(&supervisor, |n: &u64| Ok(n % 2 == 0), 2))?;

    let mut branches = fan_out(evens, 2).into_iter();
    let labels = branches
        .next()
        .ok_or("missing branch")?
        .via(Map::new(&supervisor, |n: u64| async move { Ok(test_label(n)) }, 2))?;
    let failing = branches.next().ok_or("missing branch")?.via(FlatMap::new(
        &supervisor,
        |_: u64| async move { Err::<Vec<String>, _>(Error::from("error!")) },
        2,
    ))?;

    let merged = merge([labels.into_feed(), failing.into_feed()])?;
    merged.to(IgnoreSink::new(&supervisor)).await?;

    let err = assert_err!(wait_dead(&supervisor).await);
    assert_eq!(err.to_string(), "error!");
    Ok(())
}

#[tokio::test]
async fn test_parent_cancellation() -> Result<()> {
    let parent = CancellationToken::new();
    let supervisor = Supervisor::with_parent(parent.clone());
    let (sink, mut results) = ChanSink::channel();

    let flow = IterSource::new(&supervisor, 0u64..)
        .via(Map::new(&supervisor, |n: u64| async move { Ok(n + 1) }, 4))?;
    supervisor.attach(flow.to(sink));

    assert!(results.recv().await.is_some());
    parent.cancel();
    collect(results).await;

    let err = assert_err!(wait_dead(&supervisor).await);
    assert!(err.is_cancellation());
    Ok(())
}

#[tokio::test]
async fn test_external_id_feed() -> Result<()> {
    let supervisor = Supervisor::new();
    let ids: Vec<String> = (0..5).map(|id| format!("id-{id}")).collect();
    let feed = generate_ids(supervisor.token(), ids.clone());
    let (sink, results) = ChanSink::channel();

    let flow = ChanSource::new(&supervisor, feed).via(Map::new(
        &supervisor,
        |id: String| async move { Ok(id.to_uppercase()) },
        3,
    ))?;
    supervisor.attach(flow.to(sink));

    let out: HashSet<String> = collect(results).await.into_iter().collect();
    let expected: HashSet<String> = ids.iter().map(|id| id.to_uppercase()).collect();
    assert_eq!(out, expected);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_feed_as_stream() -> Result<()> {
    let supervisor = Supervisor::new();
    let flow = IterSource::new(&supervisor, 1..=4u64)
        .via(Map::new(&supervisor, |n: u64| async move { Ok(n * n) }, 1))?;

    let squares: Vec<u64> = flow.into_feed().into_stream().collect().await;
    assert_eq!(squares, vec![1, 4, 9, 16]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_connecting_twice_is_rejected() -> Result<()> {
    let supervisor = Supervisor::new();
    let mut sink = ChanSink::<u64>::new(mpsc::channel(1).0);
    let _inlet = sink.take_inlet();

    let flow = IterSource::new(&supervisor, 0..3u64).via(PassThrough::new(&supervisor))?;
    let err = assert_err!(flow.to(sink).await);
    assert!(matches!(err, Error::AlreadyConnected));
    Ok(())
}

#[tokio::test]
async fn test_single_element_source_survives_late_wiring() -> Result<()> {
    let supervisor = Supervisor::new();
    let source = IterSource::new(&supervisor, vec![42u64]);
    tokio::task::yield_now().await;

    let (sink, results) = ChanSink::channel();
    let flow = source.via(Map::new(&supervisor, |n: u64| async move { Ok(n + 1) }, 1))?;
    tokio::task::yield_now().await;
    supervisor.attach(flow.to(sink));

    assert_eq!(collect(results).await, vec![43]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_empty_source_terminates_cleanly() -> Result<()> {
    let supervisor = Supervisor::new();
    let source = IterSource::new(&supervisor, Vec::<u64>::new());
    tokio::task::yield_now().await;

    let (sink, results) = ChanSink::channel();
    let flow = source.via(Map::new(&supervisor, |n: u64| async move { Ok(n + 1) }, 1))?;
    supervisor.attach(flow.to(sink));

    assert!(collect(results).await.is_empty());
    wait_dead(&supervisor).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_late_wiring_on_multi_thread_runtime() -> Result<()> {
    for round in 0..50u64 {
        let supervisor = Supervisor::new();
        let source = IterSource::new(&supervisor, vec![round]);
        tokio::time::sleep(Duration::from_micros(200)).await;

        let (sink, results) = ChanSink::channel();
        let flow = source.via(Map::new(&supervisor, |n: u64| async move { Ok(n * 2) }, 2))?;
        tokio::time::sleep(Duration::from_micros(200)).await;
        supervisor.attach(flow.to(sink));

        assert_eq!(collect(results).await, vec![round * 2], "round {round}");
        wait_dead(&supervisor).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_to_delivers_last_element_when_awaited() -> Result<()> {
    let supervisor = Supervisor::new();
    let (sink, results) = ChanSink::channel();
    let flow = IterSource::new(&supervisor, 0..3u64).via(PassThrough::new(&supervisor))?;

    let drained = tokio::spawn(collect(results));
    flow.to(sink).await?;

    assert_eq!(drained.await.expect("collector panicked"), vec![0, 1, 2]);
    wait_dead(&supervisor).await
}

#[tokio::test]
async fn test_termination_under_cancellation_at_any_time() {
    for delay_ms in [0u64, 1, 2, 5, 10, 20] {
        let supervisor = Supervisor::with_timeout(Duration::from_millis(delay_ms));

        let flow = IterSource::new(&supervisor, 0u64..)
            .via(Map::new(
                &supervisor,
                |n: u64| async move {
                    tokio::task::yield_now().await;
                    Ok(n)
                },
                4,
            ))
            .and_then(|flow| flow.via(Filter::new(&supervisor, |n: &u64| Ok(n % 2 == 0), 2)));
        let flow = assert_ok!(flow);
        supervisor.attach(flow.to(IgnoreSink::new(&supervisor)));

        let err = assert_err!(wait_dead(&supervisor).await);
        assert!(
            matches!(err, Error::Timeout { .. }),
            "delay {delay_ms}ms: got {err:?}"
        );
        assert_eq!(supervisor.active_workers(), 0);
    }
}
