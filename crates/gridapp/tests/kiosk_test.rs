use std::sync::Arc;

use gridapp::kiosk::{self, INITIALIZING, LOADING};
use gridapp_core::hub::{DetachedHub, LocalHub};
use gridapp_core::{ConnectionStatus, GridAppConfig, ItemId, MountedSession, Settings};
use tokio::io::{AsyncWriteExt, BufReader};

async fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    assert!(condition(), "condition not reached");
}

#[tokio::test]
async fn test_kiosk_renders_product_and_updates_cart() {
    let hub = LocalHub::new(Settings::new("Lamp", "10 USD"));
    let config = GridAppConfig {
        product_id: ItemId::from("TEMP-123"),
        ..GridAppConfig::default()
    };
    let session = MountedSession::mount(&config, Arc::new(hub.clone()));
    assert_eq!(session.wait_ready().await, ConnectionStatus::Ready);

    let (mut client, server) = tokio::io::duplex(64);
    let task = tokio::spawn(async move {
        let mut out = Vec::new();
        kiosk::run(session, BufReader::new(server), &mut out, std::future::pending())
            .await
            .map(|()| out)
    });

    client.write_all(b"add\n").await.unwrap();
    wait_until(|| hub.cart().quantity_of(&ItemId::from("TEMP-123")) == 1).await;
    client.write_all(b"quit\n").await.unwrap();

    let out = String::from_utf8(task.await.unwrap().unwrap()).unwrap();
    assert!(out.contains("Product name: Lamp"));
    assert!(out.contains("Product price: 10 USD"));
    assert!(out.contains("In cart: 1"));
    assert_eq!(hub.open_handles(), 0, "quitting unmounts the session");
}

#[tokio::test]
async fn test_kiosk_stays_loading_without_runtime() {
    let session = MountedSession::mount(&GridAppConfig::default(), Arc::new(DetachedHub));
    assert_eq!(session.wait_ready().await, ConnectionStatus::Failed);

    let mut out = Vec::new();
    kiosk::run(
        session,
        BufReader::new(&b"add\nbogus\n"[..]),
        &mut out,
        std::future::pending(),
    )
    .await
    .unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with(LOADING));
    assert!(!out.contains(INITIALIZING));
    assert!(out.contains("Unknown command: bogus"));
}

#[tokio::test]
async fn test_kiosk_dev_mode_shows_fallback_settings() {
    let dir = tempfile::tempdir().unwrap();
    let config = GridAppConfig {
        dev_mode: true,
        fallback_settings_path: dir.path().join("missing.json"),
        ..GridAppConfig::default()
    };
    let session = MountedSession::mount(&config, Arc::new(DetachedHub));

    let mut out = Vec::new();
    kiosk::run(session, BufReader::new(&b"show\n"[..]), &mut out, async {})
        .await
        .unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Product name: Default Product"));
}
