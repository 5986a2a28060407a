//! ESP32-C3 SuperMini block-signal node.
//!
//! This is the main entry point for the physical node. It runs a fixed-rate
//! tick loop that:
//! - Samples the two IR block sensors
//! - Applies aspect commands from the control authority
//! - Animates the signal lamps (self-test, fades, flashing)
//! - Publishes occupancy and direction changes over MQTT (if enabled)
//!
//! The on-board LED is lit from power-up, blinks while WiFi is joining and
//! goes dark once connected.
//!
//! Without the `esp32-mqtt` feature the node runs on the bench on a
//! `NullLink`: always up, nothing sent or received, so signals stay at Stop
//! after the self-test and the status LED stays lit.
//!
//! # Build
//!
//! ```bash
//! # Lamps and sensors only
//! cargo build --release --features esp32
//!
//! # With WiFi + MQTT
//! WIFI_SSID=Layout WIFI_PASSWORD=secret MQTT_HOST=10.0.0.2 \
//!     cargo build --release --features esp32-mqtt
//! ```

use esp_idf_hal::gpio::{IOPin, OutputPin};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use log::info;
use rs_blocksig::config::{MqttConfig, NodeConfig, NodeIdentity, WifiConfig};
use rs_blocksig::hal::esp32::{spawn_status_led, Esp32Lamp, Esp32Sensor, Esp32StatusPin};
use rs_blocksig::hal::{PinBank, StdClock};
use rs_blocksig::traits::{Clock, LampOutput, MqttClient, SensorInput};
use rs_blocksig::{BlockNode, SignalDirection};
use std::thread;
use std::time::Duration;

/// Ticks between status log lines (every 5 s at the default 20 ms tick).
const STATUS_EVERY_TICKS: u32 = 250;

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();
    EspLogger::initialize_default();

    // =========================================================================
    // Configuration
    // =========================================================================
    let node_name = option_env!("NODE_NAME").unwrap_or("bs-1");
    let config = NodeConfig::default()
        .with_node(NodeIdentity::default().with_name(node_name))
        .with_wifi(
            WifiConfig::default()
                .with_ssid(option_env!("WIFI_SSID").unwrap_or(""))
                .with_password(option_env!("WIFI_PASSWORD").unwrap_or(""))
                .with_access_point(node_name, "block1234"),
        )
        .with_mqtt(
            MqttConfig::default().with_host(option_env!("MQTT_HOST").unwrap_or("localhost")),
        );

    log::set_max_level(if config.node.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    info!(
        "block-signal node {} (config {})",
        config.node.name, config.node.config_version
    );

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Status LED (GPIO8), lit until the network is up
    // =========================================================================
    let status_pin = Esp32StatusPin::new(peripherals.pins.gpio8.downgrade_output())?;
    let status = spawn_status_led(status_pin)?;

    // =========================================================================
    // Signal lamps (LEDC PWM on GPIO2-5)
    // =========================================================================
    let timer = Esp32Lamp::timer(peripherals.ledc.timer0)?;
    let forward_lamps = [
        Esp32Lamp::new(peripherals.ledc.channel0, &timer, peripherals.pins.gpio2)?,
        Esp32Lamp::new(peripherals.ledc.channel1, &timer, peripherals.pins.gpio3)?,
    ];
    let backward_lamps = [
        Esp32Lamp::new(peripherals.ledc.channel2, &timer, peripherals.pins.gpio4)?,
        Esp32Lamp::new(peripherals.ledc.channel3, &timer, peripherals.pins.gpio5)?,
    ];
    let forward_count = usize::from(config.signals.get(SignalDirection::Forward).lamp_count);
    let backward_count = usize::from(config.signals.get(SignalDirection::Backward).lamp_count);
    info!("lamps ready: {forward_count} forward, {backward_count} backward");

    // =========================================================================
    // Block sensors (GPIO6/7 unless configured otherwise)
    // =========================================================================
    let mut free_pins = PinBank::new([
        (0, peripherals.pins.gpio0.downgrade()),
        (1, peripherals.pins.gpio1.downgrade()),
        (6, peripherals.pins.gpio6.downgrade()),
        (7, peripherals.pins.gpio7.downgrade()),
        (9, peripherals.pins.gpio9.downgrade()),
        (10, peripherals.pins.gpio10.downgrade()),
    ]);
    let sensors = [
        Esp32Sensor::new(free_pins.take(config.block.sensor_one_pin)?)?,
        Esp32Sensor::new(free_pins.take(config.block.sensor_two_pin)?)?,
    ];
    info!(
        "sensors ready on GPIO{}/GPIO{}, debounce {} ms",
        config.block.sensor_one_pin, config.block.sensor_two_pin, config.block.debounce_ms
    );

    // =========================================================================
    // WiFi + MQTT
    // =========================================================================
    #[cfg(feature = "esp32-mqtt")]
    {
        use esp_idf_svc::eventloop::EspSystemEventLoop;
        use esp_idf_svc::nvs::EspDefaultNvsPartition;
        use rs_blocksig::hal::esp32::{Esp32Mqtt, Esp32Wifi};
        use rs_blocksig::status::NetworkStatus;

        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;
        let _ = status.send(NetworkStatus::Connecting);
        let _wifi = Esp32Wifi::new(peripherals.modem, sysloop, Some(nvs), &config.wifi)?;
        let _ = status.send(NetworkStatus::Connected);
        let mqtt = Esp32Mqtt::new(&config)?;

        let node = BlockNode::new(
            config,
            sensors,
            forward_lamps.into_iter().take(forward_count),
            backward_lamps.into_iter().take(backward_count),
            mqtt,
        );
        return run(node);
    }

    #[cfg(not(feature = "esp32-mqtt"))]
    {
        use rs_blocksig::hal::NullLink;

        log::warn!("built without esp32-mqtt, running without a control link");
        // No network on the bench, the status LED stays lit
        let _status = status;
        let node = BlockNode::new(
            config,
            sensors,
            forward_lamps.into_iter().take(forward_count),
            backward_lamps.into_iter().take(backward_count),
            NullLink::new(),
        );
        return run(node);
    }
}

// =========================================================================
// Main tick loop
// =========================================================================
fn run<S, L, M>(mut node: BlockNode<S, L, M>) -> anyhow::Result<()>
where
    S: SensorInput,
    L: LampOutput,
    L::Error: std::error::Error + Send + Sync + 'static,
    M: MqttClient,
{
    let clock = StdClock::new();
    let tick = Duration::from_millis(u64::from(node.config().timing.tick_ms));
    let mut ticks: u32 = 0;

    info!("starting tick loop ({} ms)", tick.as_millis());
    loop {
        node.tick(clock.now_ms())?;

        ticks = ticks.wrapping_add(1);
        if ticks % STATUS_EVERY_TICKS == 0 {
            let state = node.state();
            info!(
                "phase {:?}, occupied {}, direction {:?}, aspects {}/{}, link {}",
                state.phase,
                state.occupied,
                state.direction,
                state.aspects[0].as_str(),
                state.aspects[1].as_str(),
                if state.link_up { "up" } else { "down" },
            );
        }

        thread::sleep(tick);
    }
}
