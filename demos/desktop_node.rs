//! Desktop block-signal node against a real MQTT broker.
//!
//! Runs the full node with mock lamps and sensors, so a control authority
//! (or `mosquitto_pub`) can drive the signals and watch the block report:
//!
//! ```sh
//! mosquitto_pub -t mqtt_n/bs-1/forward -m d80
//! mosquitto_sub -t 'mqtt_n/bs-1/#' -v
//! ```
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=info cargo run --example desktop_node --features mqtt
//!
//! # Load a JSON config and let a simulated train pass every 30 s
//! cargo run --example desktop_node --features mqtt -- node.json --simulate
//! ```
//!
//! The JSON file uses the `NodeConfig` field names; missing fields keep
//! their defaults:
//!
//! ```json
//! { "node": { "name": "bs-7" }, "mqtt": { "host": "192.168.1.100" } }
//! ```

use std::time::Duration;

use anyhow::Context;
use log::info;
use rs_blocksig::hal::{MockLamp, MockSensor, StdClock};
use rs_blocksig::services::RumqttLink;
use rs_blocksig::traits::Clock;
use rs_blocksig::{BlockNode, NodeConfig, Sensor, SignalDirection};

/// Time between simulated trains.
const TRAIN_EVERY_MS: u64 = 30_000;

/// How long the simulated train covers each sensor.
const SENSOR_DWELL_MS: u64 = 3_000;

/// Time between status lines.
const STATUS_EVERY_MS: u64 = 5_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path = None;
    let mut simulate = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--simulate" => simulate = true,
            path => config_path = Some(path.to_string()),
        }
    }

    let config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str::<NodeConfig>(&text).with_context(|| format!("parsing {path}"))?
        }
        None => NodeConfig::default(),
    };

    info!(
        "node {} on {}:{}, topics under {}",
        config.node.name,
        config.mqtt.host,
        config.mqtt.port,
        config.topic("")
    );

    let lamps = |direction| {
        let count = config.signals.get(direction).lamp_count;
        (0..count).map(|_| MockLamp::new()).collect::<Vec<_>>()
    };
    let forward = lamps(SignalDirection::Forward);
    let backward = lamps(SignalDirection::Backward);
    let link = RumqttLink::connect(&config);
    let tick_ms = u64::from(config.timing.tick_ms);

    let mut node = BlockNode::new(
        config,
        [MockSensor::new(), MockSensor::new()],
        forward,
        backward,
        link,
    );

    let clock = StdClock::new();
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    let mut next_status = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }

        let now = clock.now_ms();
        if simulate {
            simulate_train(&mut node, now);
        }
        // MockLamp never fails
        let _ = node.tick(now);

        if now >= next_status {
            next_status = now + STATUS_EVERY_MS;
            let state = node.state();
            let levels = |direction| {
                node.controller()
                    .signal(direction)
                    .lamps()
                    .iter()
                    .map(|lamp| lamp.brightness())
                    .collect::<Vec<_>>()
            };
            info!(
                "{:?} | block {} {:?} | forward {} {:?} | backward {} {:?} | link {}",
                state.phase,
                if state.occupied { "occupied" } else { "free" },
                state.direction,
                state.aspects[0].as_str(),
                levels(SignalDirection::Forward),
                state.aspects[1].as_str(),
                levels(SignalDirection::Backward),
                if state.link_up { "up" } else { "down" },
            );
        }
    }
}

/// A train entering at sensor one and leaving past sensor two.
fn simulate_train<M>(node: &mut BlockNode<MockSensor, MockLamp, M>, now_ms: u64)
where
    M: rs_blocksig::MqttClient,
{
    let t = now_ms % TRAIN_EVERY_MS;
    let one = t >= TRAIN_EVERY_MS / 2 && t < TRAIN_EVERY_MS / 2 + SENSOR_DWELL_MS;
    let two = t >= TRAIN_EVERY_MS / 2 + SENSOR_DWELL_MS / 2
        && t < TRAIN_EVERY_MS / 2 + SENSOR_DWELL_MS * 2;
    node.sensor_mut(Sensor::One).set_occupied(one);
    node.sensor_mut(Sensor::Two).set_occupied(two);
}
