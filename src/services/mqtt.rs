//! MQTT control link for desktop nodes.
//!
//! [`RumqttLink`] adapts the async `rumqttc` client to the synchronous
//! [`MqttClient`] trait the node ticks against. The event loop runs as a
//! tokio task and hands received publishes over a channel, so the tick loop
//! never awaits the network.
//!
//! ```ignore
//! let config = NodeConfig::default();
//! let link = RumqttLink::connect(&config);
//! let mut node = BlockNode::new(config, sensors, forward, backward, link);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::config::NodeConfig;
use crate::traits::{MqttClient, MqttMessage};

/// Requests buffered between the link and the event loop.
const REQUEST_CAPACITY: usize = 32;

/// Pause before the event loop retries after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Configuration
// ============================================================================

/// Build `rumqttc` options from the node configuration.
///
/// The node name is the client id so the broker shows which block a session
/// belongs to.
pub fn mqtt_options(config: &NodeConfig) -> MqttOptions {
    let mqtt = &config.mqtt;
    let mut options = MqttOptions::new(
        config.node.name.as_str(),
        mqtt.host.as_str(),
        mqtt.port,
    );
    options.set_keep_alive(Duration::from_secs(u64::from(mqtt.keep_alive_secs.max(5))));
    if mqtt.has_auth() {
        options.set_credentials(mqtt.username.as_str(), mqtt.password.as_str());
    }
    options
}

// ============================================================================
// Link
// ============================================================================

/// Errors from the desktop MQTT link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The request queue to the event loop is full or closed.
    #[error("MQTT request rejected: {0}")]
    Request(#[from] rumqttc::ClientError),
}

/// `rumqttc` client implementing [`MqttClient`].
pub struct RumqttLink {
    client: AsyncClient,
    message_rx: Receiver<MqttMessage>,
    connected: Arc<AtomicBool>,
}

impl RumqttLink {
    /// Start the client and spawn its event loop on the current tokio
    /// runtime.
    ///
    /// Returns immediately; the connection is made in the background and
    /// [`is_connected`](MqttClient::is_connected) turns true on `ConnAck`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect(config: &NodeConfig) -> Self {
        let options = mqtt_options(config);
        let (host, port) = options.broker_address();
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let (message_tx, message_rx) = channel();
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_eventloop(eventloop, message_tx, Arc::clone(&connected)));
        info!("MQTT link started for {host}:{port}");

        Self {
            client,
            message_rx,
            connected,
        }
    }
}

impl MqttClient for RumqttLink {
    type Error = LinkError;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), LinkError> {
        self.client.try_subscribe(topic, QoS::AtLeastOnce)?;
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

async fn run_eventloop(
    mut eventloop: EventLoop,
    message_tx: Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected");
                connected.store(true, Ordering::Relaxed);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = MqttMessage::new(publish.topic, publish.payload.to_vec());
                if message_tx.send(msg).is_err() {
                    debug!("MQTT link dropped, stopping event loop");
                    return;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::Relaxed) {
                    warn!("MQTT connection lost: {e}");
                } else {
                    debug!("MQTT connect failed: {e}");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
