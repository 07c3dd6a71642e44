use breakwater_core::ResourceKey;
use breakwater_supervisor::{
    LoadState, LoadSupervisor, SupervisorConfig, SupervisorError, SupervisorEvent,
};
use breakwater_test_utils::StaticProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_test::assert_ok;

fn fast_config(max_retries: u32) -> SupervisorConfig {
    SupervisorConfig {
        load_timeout_ms: 40,
        max_retries,
        retry_base_delay_ms: 10,
    }
}

fn game_key(id: u32) -> ResourceKey {
    ResourceKey::get(format!("https://games.example/embed/{}", id))
}

/// Receive events until the predicate matches, with an overall deadline.
async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<SupervisorEvent>,
    mut predicate: F,
) -> SupervisorEvent
where
    F: FnMut(&SupervisorEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_successful_load() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let key = game_key(1);

    tokio_test::assert_ok!(supervisor.begin_load(&key).await);
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Loading));

    assert!(supervisor.notify_loaded(&key).await);
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Loaded));
    assert_eq!(supervisor.attempts(&key).await, 0);
}

#[tokio::test]
async fn test_timeout_fires_without_load_signal() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let key = game_key(2);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&key).await.unwrap();
    let event = wait_for_event(&mut rx, |e| matches!(e, SupervisorEvent::TimedOut { .. })).await;
    assert_eq!(event, SupervisorEvent::TimedOut { key: key.clone() });
}

#[tokio::test]
async fn test_timeouts_retry_then_exhaust() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let key = game_key(3);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&key).await.unwrap();

    // never send a load signal: every attempt times out
    let mut retries = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("supervision stalled")
            .unwrap();
        match event {
            SupervisorEvent::RetryScheduled { attempt, delay_ms, .. } => {
                retries.push((attempt, delay_ms));
            }
            SupervisorEvent::Exhausted { key: exhausted_key } => {
                assert_eq!(exhausted_key, key);
                break;
            }
            _ => {}
        }
    }

    // exponential schedule off the 10ms base
    assert_eq!(retries, vec![(1, 10), (2, 20), (3, 40)]);
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Exhausted));
    assert_eq!(supervisor.attempts(&key).await, 3);
}

#[tokio::test]
async fn test_explicit_failure_signal_retries() {
    let supervisor = LoadSupervisor::new(fast_config(1), Arc::new(StaticProbe::reachable()));
    let key = game_key(4);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&key).await.unwrap();
    assert!(supervisor.notify_failed(&key, "embed crashed").await);

    let event =
        wait_for_event(&mut rx, |e| matches!(e, SupervisorEvent::LoadFailed { .. })).await;
    assert_eq!(
        event,
        SupervisorEvent::LoadFailed {
            key: key.clone(),
            reason: "embed crashed".to_string(),
        }
    );

    // the retry re-enters Loading
    wait_for_event(&mut rx, |e| {
        matches!(e, SupervisorEvent::LoadStarted { attempt: 1, .. })
    })
    .await;
    assert!(supervisor.notify_loaded(&key).await);
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Loaded));
}

#[tokio::test]
async fn test_unreachable_resource_exhausts_without_retrying() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::unreachable()));
    let key = game_key(5);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&key).await.unwrap();
    assert!(supervisor.notify_failed(&key, "boom").await);

    // verification runs when the scheduled retry fires; it goes straight
    // to Exhausted instead of a second load attempt
    wait_for_event(&mut rx, |e| matches!(e, SupervisorEvent::Exhausted { .. })).await;
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Exhausted));
    assert_eq!(supervisor.attempts(&key).await, 1);
}

#[tokio::test]
async fn test_exhausted_requires_explicit_reset() {
    let supervisor = LoadSupervisor::new(fast_config(0), Arc::new(StaticProbe::reachable()));
    let key = game_key(6);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&key).await.unwrap();
    supervisor.notify_failed(&key, "boom").await;
    wait_for_event(&mut rx, |e| matches!(e, SupervisorEvent::Exhausted { .. })).await;

    // exhausted sessions never self-recover
    assert_eq!(
        supervisor.begin_load(&key).await,
        Err(SupervisorError::Exhausted(key.clone()))
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Exhausted));

    supervisor.reset(&key).await;
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Idle));
    tokio_test::assert_ok!(supervisor.begin_load(&key).await);
}

#[tokio::test]
async fn test_late_timeout_after_load_is_a_no_op() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let key = game_key(7);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&key).await.unwrap();
    assert!(supervisor.notify_loaded(&key).await);

    // wait out the timeout window; the stale timer must not transition
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Loaded));

    // only the start and the load landed on the event stream
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            SupervisorEvent::LoadStarted {
                key: key.clone(),
                attempt: 0
            },
            SupervisorEvent::Loaded { key: key.clone() },
        ]
    );
}

#[tokio::test]
async fn test_duplicate_load_signal_is_ignored() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let key = game_key(8);

    supervisor.begin_load(&key).await.unwrap();
    assert!(supervisor.notify_loaded(&key).await);
    assert!(!supervisor.notify_loaded(&key).await);
    assert!(!supervisor.notify_failed(&key, "late error").await);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let healthy = game_key(9);
    let broken = game_key(10);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&healthy).await.unwrap();
    supervisor.begin_load(&broken).await.unwrap();

    supervisor.notify_loaded(&healthy).await;
    supervisor.notify_failed(&broken, "boom").await;

    wait_for_event(&mut rx, |e| {
        matches!(e, SupervisorEvent::RetryScheduled { .. })
    })
    .await;

    // the broken session's retries never touch the healthy one
    assert_eq!(supervisor.state(&healthy).await, Some(LoadState::Loaded));
    assert_eq!(supervisor.attempts(&healthy).await, 0);
    assert_eq!(supervisor.attempts(&broken).await, 1);
}

#[tokio::test]
async fn test_begin_load_rejects_while_active() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let key = game_key(11);

    supervisor.begin_load(&key).await.unwrap();
    assert_eq!(
        supervisor.begin_load(&key).await,
        Err(SupervisorError::AlreadyActive(key.clone()))
    );
}

#[tokio::test]
async fn test_reset_cancels_pending_retry() {
    let config = SupervisorConfig {
        load_timeout_ms: 40,
        max_retries: 3,
        retry_base_delay_ms: 200,
    };
    let supervisor = LoadSupervisor::new(config, Arc::new(StaticProbe::reachable()));
    let key = game_key(12);
    let mut rx = supervisor.subscribe();

    supervisor.begin_load(&key).await.unwrap();
    supervisor.notify_failed(&key, "boom").await;
    wait_for_event(&mut rx, |e| {
        matches!(e, SupervisorEvent::RetryScheduled { .. })
    })
    .await;

    supervisor.reset(&key).await;
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Idle));

    // the cancelled retry never fires
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(supervisor.state(&key).await, Some(LoadState::Idle));
    assert_eq!(supervisor.attempts(&key).await, 0);
}

#[tokio::test]
async fn test_abandon_drops_the_session() {
    let supervisor = LoadSupervisor::new(fast_config(3), Arc::new(StaticProbe::reachable()));
    let key = game_key(13);

    supervisor.begin_load(&key).await.unwrap();
    supervisor.abandon(&key).await;

    assert_eq!(supervisor.state(&key).await, None);
    assert!(supervisor.sessions().await.is_empty());
}
