//! MQTT control link for the ESP32-C3.
//!
//! Wraps the esp-idf-svc client. A background thread drains the connection
//! and forwards received messages over a channel, so
//! [`try_recv`](MqttClient::try_recv) never blocks the tick loop. The thread
//! also tracks `Connected`/`Disconnected` events, which the node uses for
//! link supervision and resubscription.
//!
//! # Example
//!
//! ```ignore
//! use rs_blocksig::hal::esp32::Esp32Mqtt;
//! use rs_blocksig::config::NodeConfig;
//! use rs_blocksig::traits::MqttClient;
//!
//! let config = NodeConfig::default();
//! let mut mqtt = Esp32Mqtt::new(&config)?;
//! mqtt.publish("mqtt_n/bs-1/s1", b"free", true)?;
//! ```

use crate::config::NodeConfig;
use crate::traits::{MqttClient, MqttMessage};
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Error type for ESP32 MQTT operations.
#[derive(Debug, thiserror::Error)]
#[error("MQTT error: {0}")]
pub struct Esp32MqttError(pub String);

/// MQTT client implementing [`MqttClient`].
pub struct Esp32Mqtt {
    client: EspMqttClient<'static>,
    message_rx: Receiver<MqttMessage>,
    connected: Arc<AtomicBool>,
}

impl Esp32Mqtt {
    /// Start the client. Connection happens in the background.
    ///
    /// The node name is the client id. Subscriptions are made by the node
    /// once the link reports connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new(config: &NodeConfig) -> anyhow::Result<Self> {
        let mqtt = &config.mqtt;
        let broker_url = format!("mqtt://{}:{}", mqtt.host, mqtt.port);

        let mqtt_config = MqttClientConfiguration {
            client_id: Some(config.node.name.as_str()),
            keep_alive_interval: Some(Duration::from_secs(u64::from(mqtt.keep_alive_secs))),
            username: mqtt.has_auth().then(|| mqtt.username.as_str()),
            password: mqtt.has_auth().then(|| mqtt.password.as_str()),
            ..Default::default()
        };

        let (message_tx, message_rx) = channel::<MqttMessage>();
        let connected = Arc::new(AtomicBool::new(false));

        let (client, mut connection) = EspMqttClient::new(&broker_url, &mqtt_config)?;

        let flag = Arc::clone(&connected);
        thread::Builder::new()
            .name("mqtt-events".into())
            .stack_size(6 * 1024)
            .spawn(move || handle_mqtt_events(&mut connection, message_tx, flag))?;

        info!("MQTT client started for {broker_url}");

        Ok(Self {
            client,
            message_rx,
            connected,
        })
    }
}

impl MqttClient for Esp32Mqtt {
    type Error = Esp32MqttError;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        self.client
            .enqueue(topic, QoS::AtLeastOnce, retain, payload)
            .map_err(|e| Esp32MqttError(format!("{e:?}")))?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| Esp32MqttError(format!("{e:?}")))?;
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        match self.message_rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.connected.store(false, Ordering::Relaxed);
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

fn handle_mqtt_events(
    connection: &mut EspMqttConnection,
    message_tx: Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match connection.next() {
            Err(e) => {
                warn!("MQTT connection error: {e:?}");
                connected.store(false, Ordering::Relaxed);
                thread::sleep(Duration::from_secs(1));
            }
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => {
                    connected.store(true, Ordering::Relaxed);
                }
                EventPayload::Disconnected => {
                    connected.store(false, Ordering::Relaxed);
                }
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    let msg = MqttMessage::new(topic, data.to_vec());
                    if message_tx.send(msg).is_err() {
                        debug!("MQTT receiver dropped, stopping event thread");
                        return;
                    }
                }
                _ => {}
            },
        }
    }
}
