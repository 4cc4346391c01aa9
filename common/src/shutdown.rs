// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! Process shutdown on SIGINT (Ctrl+C) or SIGTERM, shared by the device and the console.

use log::{error, info};
use tokio_util::sync::CancellationToken;

/// Waits until the process receives SIGINT or SIGTERM.
///
/// A signal whose handler cannot be installed is never reported, the other one still is.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Cancels `token` on the first SIGINT or SIGTERM.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = wait_for_signal() => {
                info!("Shutting down...");
                token.cancel();
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::signal::unix::{signal, SignalKind};

    #[tokio::test]
    async fn test_sigterm_cancels_token() {
        // keeps the default SIGTERM action from killing the test process
        let _installed = signal(SignalKind::terminate()).unwrap();

        let token = CancellationToken::new();
        cancel_on_signal(token.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!token.is_cancelled());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
    }
}
