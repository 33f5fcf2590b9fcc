//! Publishes synthetic tracker telemetry on the four vehicle topics, with a
//! periodic simulated crash on the first vehicle. Pair with `fleet_watch`.

use rand::Rng;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

fn make_payloads(position: &mut (f64, f64), crash: bool) -> [(&'static str, Value); 3] {
    let mut rng = rand::thread_rng();

    // Drift the position by roughly a meter per tick
    position.0 += rng.gen_range(-0.00001..0.00001);
    position.1 += rng.gen_range(-0.00001..0.00001);

    let gps = json!({
        "latitude": position.0,
        "longitude": position.1,
        "speed": if crash { rng.gen_range(0.0..5.0) } else { rng.gen_range(30.0..80.0) },
    });

    let gyroscope = if crash {
        json!({
            "x": rng.gen_range(40.0..90.0),
            "y": rng.gen_range(40.0..90.0),
            "z": rng.gen_range(10.0..30.0),
        })
    } else {
        json!({
            "x": rng.gen_range(-10.0..10.0),
            "y": rng.gen_range(-10.0..10.0),
            "z": rng.gen_range(-10.0..10.0),
        })
    };

    let accelerometer = json!({
        "x": rng.gen_range(-1.0..1.0),
        "y": rng.gen_range(-1.0..1.0),
        "z": rng.gen_range(8.8..10.2),
    });

    [
        ("gps", gps),
        ("gyroscope", gyroscope),
        ("accelerometer", accelerometer),
    ]
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut options = MqttOptions::new("telemetry_publisher_demo", "broker.hivemq.com", 1883);
    options.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(options, 10);

    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                eprintln!("connection error: {e}");
                sleep(Duration::from_secs(1)).await;
            }
        }
    });

    let vehicles = ["vehicle_001", "vehicle_002"];
    let mut positions = [(-7.9666, 112.6326), (-7.9766, 112.6226)];
    let mut tick: u32 = 0;

    loop {
        for (i, id) in vehicles.iter().enumerate() {
            // Crash the first vehicle every 30 ticks, recover a few ticks later
            let crash = i == 0 && (20..23).contains(&(tick % 30));
            let payloads = make_payloads(&mut positions[i], crash);

            for (channel, payload) in payloads {
                let topic = format!("vehicles/{id}/{channel}");
                if let Err(e) = client
                    .publish(topic, QoS::AtMostOnce, false, payload.to_string())
                    .await
                {
                    eprintln!("publish failed: {e}");
                }
            }
        }
        tick += 1;
        sleep(Duration::from_secs(1)).await;
    }
}
