//! Connects to a public broker and prints every merged vehicle record.

use fleet_monitor_sdk::{MonitorClient, MonitorConfig};

#[tokio::main]
async fn main() {
    // Setup logging so we can see what's happening
    tracing_subscriber::fmt::init();

    let client = MonitorClient::connect("mqtt://broker.hivemq.com:1883", MonitorConfig::default())
        .await
        .expect("Invalid broker URL");

    // Pre-seed the two demo trackers
    client.register("vehicle_001").await;
    client.register("vehicle_002").await;

    let _updates = client.subscribe(|state| {
        println!(
            "{:<12} {:<9} {:>6.1} km/h  {}",
            state.id,
            state.status.to_string(),
            state.speed_kmh,
            state
                .location
                .map(|l| format!("({:.5}, {:.5})", l.latitude, l.longitude))
                .unwrap_or_else(|| "no fix".to_string()),
        );
    });

    let mut connectivity = client.watch_connectivity();
    let mut last = *connectivity.borrow();
    println!("broker connected: {last}");
    while connectivity.changed().await.is_ok() {
        let now = *connectivity.borrow();
        if now != last {
            println!("broker connected: {now}");
            last = now;
        }
    }
}
