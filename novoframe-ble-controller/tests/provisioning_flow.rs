use std::time::Duration;

use novoframe_ble_controller::{
    DeviceId, EncryptionKey, Error, KeyStore, MemoryKeyStore, Provisioner, ProvisioningStatus, Remedy,
    SetupError, SetupFlow, SimulatedCentral, SimulatedFrame, WifiCredentials,
};
use tokio::time::Instant;

fn fleet() -> SimulatedCentral {
    SimulatedCentral::new(vec![
        SimulatedFrame::new("mock-1", -50).with_mac_address("AA:BB:CC:DD:EE:01"),
        SimulatedFrame::new("mock-2", -82).failing_wifi_for("BadNet"),
    ])
}

#[tokio::test(start_paused = true)]
async fn simulated_frame_end_to_end() {
    let provisioner = Provisioner::new(fleet());
    assert!(provisioner.is_enabled().await.unwrap());

    let mut found = Vec::new();
    provisioner.scan(|d| found.push(d), Duration::from_secs(15)).await.unwrap();
    assert_eq!(found.len(), 2);
    let frame = found.iter().find(|d| d.id == DeviceId::from("mock-1")).unwrap();
    assert_eq!(frame.name, "NovoFrame-Setup");
    assert_eq!(frame.rssi, -50);

    let mut session = provisioner.connect(&frame.id).await.unwrap();
    let mut watcher = provisioner.monitor_status(&session);
    let mac = provisioner.mac_address(&session).await;
    assert!(!mac.is_empty());

    let key = EncryptionKey::generate();
    assert_eq!(key.to_hex().len(), 64);
    provisioner
        .configure(&session, "HomeNet", "secret123", &key)
        .await
        .unwrap();

    let mut statuses = Vec::new();
    provisioner
        .wait_for_status_with(
            &mut session,
            ProvisioningStatus::WifiConnected,
            Duration::from_secs(30),
            |s| statuses.push(s),
        )
        .await
        .unwrap();
    assert_eq!(statuses.last(), Some(&ProvisioningStatus::WifiConnected));
    assert!(statuses.windows(2).all(|w| w[0] < w[1]), "{statuses:?}");
    assert_eq!(watcher.next().await, Some(ProvisioningStatus::Connecting));

    let keys = MemoryKeyStore::new();
    keys.save_encryption_key(&mac, &key).unwrap();
    assert_eq!(keys.encryption_key(&mac).unwrap(), Some(key));

    provisioner.disconnect(session).await;
    provisioner.stop_scan().await;
    provisioner.stop_scan().await;
    provisioner.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn silent_frame_times_out() {
    let provisioner = Provisioner::new(fleet());
    let mut session = provisioner.connect(&DeviceId::from("mock-1")).await.unwrap();
    // Nothing written, so the frame stops after `connecting`
    let start = Instant::now();
    let result = provisioner
        .wait_for_status(&mut session, ProvisioningStatus::WifiConnected, Duration::from_secs(30))
        .await;
    assert!(matches!(
        result,
        Err(Error::Timeout { status: ProvisioningStatus::WifiConnected, .. })
    ));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_millis(30_050));
    provisioner.disconnect(session).await;
}

#[tokio::test(start_paused = true)]
async fn wait_ends_when_session_is_gone() {
    let provisioner = Provisioner::new(fleet());
    let session = provisioner.connect(&DeviceId::from("mock-1")).await.unwrap();
    let mut watcher = provisioner.monitor_status(&session);
    assert_eq!(watcher.next().await, Some(ProvisioningStatus::Connecting));
    provisioner.disconnect(session).await;
    let result = watcher
        .wait_for(ProvisioningStatus::WifiConnected, Duration::from_secs(30), |_| {})
        .await;
    assert!(matches!(result, Err(Error::Disconnected)));
}

#[tokio::test(start_paused = true)]
async fn setup_flow_round_trip() {
    let mut flow = SetupFlow::new(Provisioner::new(fleet()), MemoryKeyStore::new())
        .with_scan_timeout(Duration::from_secs(5));
    flow.bluetooth_ready().await.unwrap();

    let devices = flow.scan(|_| {}).await.unwrap();
    assert_eq!(devices.len(), 2);
    let weak = devices.iter().find(|d| d.id == DeviceId::from("mock-2")).unwrap();
    assert_eq!(weak.signal_bars(), 1);

    let mut statuses = Vec::new();
    let frame = flow
        .provision(
            &DeviceId::from("mock-1"),
            &WifiCredentials::new("HomeNet", "secret123").unwrap(),
            |s| statuses.push(s),
        )
        .await
        .unwrap();
    assert_eq!(frame.mac_address, "AA:BB:CC:DD:EE:01");
    assert_eq!(statuses.last(), Some(&ProvisioningStatus::WifiConnected));
    assert_eq!(
        flow.keys().encryption_key(&frame.mac_address).unwrap(),
        Some(frame.encryption_key.clone())
    );

    let err = flow
        .provision(
            &DeviceId::from("mock-2"),
            &WifiCredentials::new("BadNet", "secret123").unwrap(),
            |_| {},
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SetupError::Provisioning(Error::DeviceFailed(ProvisioningStatus::WifiFailed))
    ));
    assert_eq!(err.remedy(), Remedy::ChangeWifi);
    assert!(!flow.has_session());

    flow.teardown().await;
    flow.teardown().await;
}
