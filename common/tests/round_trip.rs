// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use sensor_link_common::provider::{Measurement, ReadingProvider, StaticSource};
use sensor_link_common::relay::{LoopbackRelay, Relay};
use sensor_link_common::model::{Error, Reading};
use sensor_link_common::{AgentConfig, Console, ConsoleConfig, LogSink, TelemetryAgent};

fn provider() -> ReadingProvider<StaticSource> {
    ReadingProvider::new(StaticSource::new(
        (0..8)
            .map(|i| Measurement::new(22.0 - i as f64 * 0.5, 48.0))
            .collect(),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_history_round_trip() {
    let (device_end, console_end) = LoopbackRelay::pair();

    let agent = TelemetryAgent::new(device_end.clone(), provider(), AgentConfig::default());
    let device = tokio::spawn({
        let agent = agent.clone();
        async move { agent.run().await }
    });

    let console = Console::new(console_end.clone(), Arc::new(LogSink), ConsoleConfig::default());
    console.start_listening().await.unwrap();

    // let the first live reading arrive
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(console.buffer().len(), 1);

    console.request_history(3).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let sent = device_end
        .sent()
        .iter()
        .map(|payload| Reading::from_payload(payload).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(sent.len(), 4);

    let history = &sent[1..];
    for pair in history.windows(2) {
        assert_eq!(pair[0].timestamp - pair[1].timestamp, chrono::Duration::seconds(6));
    }

    // the newest reply extends the range upwards, the two older ones downwards
    let buffered = console.buffer().snapshot();
    assert_eq!(buffered.len(), 4);
    assert!(buffered.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(console.refresh().latest.map(|r| r.timestamp), Some(history[0].timestamp));

    assert!(matches!(console.request_history(0).await, Err(Error::InvalidInput { .. })));
    assert!(matches!(console.request_history(-1).await, Err(Error::InvalidInput { .. })));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(device_end.sent().len(), 4);

    agent.shutdown();
    device.await.unwrap().unwrap();
    console.shutdown().await.unwrap();

    assert_eq!(device_end.close_count(), 1);
    assert_eq!(console_end.close_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_command_keeps_device_alive() {
    let (device_end, console_end) = LoopbackRelay::pair();

    let agent = TelemetryAgent::new(device_end.clone(), provider(), AgentConfig::default());
    let device = tokio::spawn({
        let agent = agent.clone();
        async move { agent.run().await }
    });

    let console = Console::new(console_end.clone(), Arc::new(LogSink), ConsoleConfig::default());
    console.start_listening().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    console_end.send(br#"{"count": 3}"#.to_vec()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(device_end.sent().len(), 1);

    // still listening, and still publishing on schedule
    console.request_history(2).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(device_end.sent().len(), 4);
    assert!(!device.is_finished());

    agent.shutdown();
    device.await.unwrap().unwrap();
    console.shutdown().await.unwrap();
}
