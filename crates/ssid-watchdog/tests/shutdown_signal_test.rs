//! A supervisor stop (SIGTERM) must cancel the run like Ctrl-C does, so the
//! waiter gets a chance to restore logging.

#![cfg(unix)]

use std::process::Command;
use std::time::Duration;

use recovery::CancellationToken;
use ssid_watchdog::shutdown;

#[tokio::test]
async fn test_sigterm_cancels_run() {
    let cancel = CancellationToken::new();
    let listener = shutdown::spawn_listener(cancel.clone()).unwrap();

    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("kill -TERM {}", std::process::id()))
        .status()
        .unwrap();
    assert!(status.success());

    tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .expect("SIGTERM should end the listener")
        .unwrap();
    assert!(cancel.is_cancelled());
}
