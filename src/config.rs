//! Node configuration shared by the ESP32 firmware and the desktop demo.
//!
//! Strings are `heapless::String` so a config can be built without an
//! allocator and copied into the controller at start-up. Defaults match a
//! freshly flashed node named `bs-1` under the `mqtt_n` root topic.
//!
//! # Example
//!
//! ```rust
//! use rs_blocksig::aspect::SignalType;
//! use rs_blocksig::config::{MqttConfig, NodeConfig, SignalConfig, SignalsConfig};
//!
//! let config = NodeConfig::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.10"))
//!     .with_signals(SignalsConfig::default().with_backward(
//!         SignalConfig::new("backward", SignalType::Fsi3),
//!     ));
//!
//! assert_eq!(config.topic("s1").as_str(), "mqtt_n/bs-1/s1");
//! ```

use heapless::String as HString;

use crate::aspect::SignalType;
use crate::lamp::{fade_step, split_period};
use crate::signal::{SignalDirection, MAX_LAMPS};

/// Maximum length for short config strings (hostnames, ids, credentials)
pub const MAX_SHORT_STRING: usize = 32;

/// Maximum length for topics and URL paths
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

/// Copy `s` into a bounded string, truncating on a char boundary.
pub fn bounded<const N: usize>(s: &str) -> HString<N> {
    let mut out = HString::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Shorthand for [`bounded`] into a [`ShortString`].
pub fn short_string(s: &str) -> ShortString {
    bounded(s)
}

/// Shorthand for [`bounded`] into a [`LongString`].
pub fn long_string(s: &str) -> LongString {
    bounded(s)
}

// ============================================================================
// Node Config
// ============================================================================

/// Complete node configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NodeConfig {
    /// WiFi station and fallback access point
    pub wifi: WifiConfig,
    /// MQTT broker connection
    pub mqtt: MqttConfig,
    /// Node identity and topic root
    pub node: NodeIdentity,
    /// Remote configuration server
    pub remote: RemoteConfig,
    /// Block sensors and their topics
    pub block: BlockConfig,
    /// Forward and backward signals
    pub signals: SignalsConfig,
    /// Lamp brightness, self-test and flash timing
    pub lamps: LampConfig,
    /// Tick cadence and supervision timeouts
    pub timing: TimingConfig,
}

impl NodeConfig {
    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set node identity
    pub fn with_node(mut self, node: NodeIdentity) -> Self {
        self.node = node;
        self
    }

    /// Set remote configuration server
    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = remote;
        self
    }

    /// Set block configuration
    pub fn with_block(mut self, block: BlockConfig) -> Self {
        self.block = block;
        self
    }

    /// Set signal configuration
    pub fn with_signals(mut self, signals: SignalsConfig) -> Self {
        self.signals = signals;
        self
    }

    /// Set lamp configuration
    pub fn with_lamps(mut self, lamps: LampConfig) -> Self {
        self.lamps = lamps;
        self
    }

    /// Set timing configuration
    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Build `<root>/<node>/<subtopic>`.
    pub fn topic(&self, subtopic: &str) -> LongString {
        let mut topic = LongString::new();
        let _ = topic.push_str(self.node.root_topic.as_str());
        let _ = topic.push('/');
        let _ = topic.push_str(self.node.name.as_str());
        let _ = topic.push('/');
        let _ = topic.push_str(subtopic);
        topic
    }

    /// Fade step per tick derived from `tick_ms` and `fade_ms`.
    pub fn fade_step(&self) -> u8 {
        fade_step(self.timing.tick_ms, self.lamps.fade_ms)
    }
}

// ============================================================================
// Node Identity
// ============================================================================

/// Node name, topic root and firmware flags
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NodeIdentity {
    /// Node name, used as the middle topic level and the MQTT client id
    pub name: ShortString,
    /// First topic level shared by all nodes
    pub root_topic: ShortString,
    /// Config layout tag; a stored config with another tag is discarded
    pub config_version: ShortString,
    /// Verbose logging
    pub debug: bool,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            name: short_string("bs-1"),
            root_topic: short_string("mqtt_n"),
            config_version: short_string("test1"),
            debug: true,
        }
    }
}

impl NodeIdentity {
    /// Set the node name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the root topic
    pub fn with_root_topic(mut self, root: &str) -> Self {
        self.root_topic = short_string(root);
        self
    }

    /// Set the config version tag
    pub fn with_config_version(mut self, version: &str) -> Self {
        self.config_version = short_string(version);
        self
    }

    /// Enable or disable verbose logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Whether MQTT is enabled
    pub enabled: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 1883,
            username: ShortString::new(),
            password: ShortString::new(),
            keep_alive_secs: 30,
            enabled: true,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the keep-alive interval
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Enable or disable MQTT
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi station credentials and the fallback access point
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WifiConfig {
    /// Network to join
    pub ssid: ShortString,
    /// Network password
    pub password: ShortString,
    /// Access point name, also the station hostname
    pub ap_name: ShortString,
    /// Access point password
    pub ap_password: ShortString,
    /// Give up joining after this long (0 = no limit)
    pub connect_timeout_ms: u32,
    /// Maximum connection attempts (0 = unlimited)
    pub max_retries: u8,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            ap_name: short_string("bs-1"),
            ap_password: short_string("block1234"),
            connect_timeout_ms: 30_000,
            max_retries: 5,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the access point credentials
    pub fn with_access_point(mut self, name: &str, password: &str) -> Self {
        self.ap_name = short_string(name);
        self.ap_password = short_string(password);
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set the maximum retry count
    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Check if station credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }

    /// Whether another join attempt may start after `attempts` failed ones
    /// and `elapsed_ms` since the first began.
    pub fn retry_allowed(&self, attempts: u32, elapsed_ms: u64) -> bool {
        let attempts_left = self.max_retries == 0 || attempts < u32::from(self.max_retries);
        let time_left =
            self.connect_timeout_ms == 0 || elapsed_ms < u64::from(self.connect_timeout_ms);
        attempts_left && time_left
    }
}

// ============================================================================
// Remote Config
// ============================================================================

/// Where the node fetches its settings from at boot
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RemoteConfig {
    /// Configuration server host
    pub host: ShortString,
    /// Configuration server port
    pub port: u16,
    /// Request path
    pub path: LongString,
    /// Whether to fetch at boot
    pub enabled: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: short_string("configserver.000webhostapp.com"),
            port: 80,
            path: long_string("/?name="),
            enabled: false,
        }
    }
}

impl RemoteConfig {
    /// Set the server host and port
    pub fn with_server(mut self, host: &str, port: u16) -> Self {
        self.host = short_string(host);
        self.port = port;
        self
    }

    /// Set the request path
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = long_string(path);
        self
    }

    /// Enable or disable fetching
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

// ============================================================================
// Block Config
// ============================================================================

/// Block sensors, their topics and detection timing
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlockConfig {
    /// Subtopic for sensor one
    pub sensor_one_topic: ShortString,
    /// Subtopic for sensor two
    pub sensor_two_topic: ShortString,
    /// Subtopic for the travel direction
    pub direction_topic: ShortString,
    /// GPIO for sensor one (single track or up track)
    pub sensor_one_pin: u8,
    /// GPIO for sensor two (down track)
    pub sensor_two_pin: u8,
    /// A raw reading must be stable this long before it is accepted
    pub debounce_ms: u32,
    /// Trips of both sensors closer than this leave the direction unknown
    pub simultaneous_window_ms: u32,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            sensor_one_topic: short_string("s1"),
            sensor_two_topic: short_string("s2"),
            direction_topic: short_string("direction"),
            sensor_one_pin: 6,
            sensor_two_pin: 7,
            debounce_ms: 50,
            simultaneous_window_ms: 100,
        }
    }
}

impl BlockConfig {
    /// Set the sensor and direction subtopics
    pub fn with_topics(mut self, sensor_one: &str, sensor_two: &str, direction: &str) -> Self {
        self.sensor_one_topic = short_string(sensor_one);
        self.sensor_two_topic = short_string(sensor_two);
        self.direction_topic = short_string(direction);
        self
    }

    /// Set the sensor GPIOs
    pub fn with_pins(mut self, sensor_one: u8, sensor_two: u8) -> Self {
        self.sensor_one_pin = sensor_one;
        self.sensor_two_pin = sensor_two;
        self
    }

    /// Set the debounce time
    pub fn with_debounce_ms(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the simultaneity window
    pub fn with_simultaneous_window_ms(mut self, ms: u32) -> Self {
        self.simultaneous_window_ms = ms;
        self
    }
}

// ============================================================================
// Signal Config
// ============================================================================

/// One signal: its command subtopic, type and lamp count
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalConfig {
    /// Subtopic the signal's aspect commands arrive on
    pub id: ShortString,
    /// Capability class
    pub signal_type: SignalType,
    /// Number of lamp outputs wired to this signal
    pub lamp_count: u8,
}

impl SignalConfig {
    /// A signal with one lamp.
    pub fn new(id: &str, signal_type: SignalType) -> Self {
        Self {
            id: short_string(id),
            signal_type,
            lamp_count: 1,
        }
    }

    /// Set the lamp count (capped at the per-signal maximum)
    pub fn with_lamp_count(mut self, count: u8) -> Self {
        self.lamp_count = count.min(MAX_LAMPS as u8);
        self
    }
}

/// Both signals of the node
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SignalsConfig {
    /// Signal governing forward travel
    pub forward: SignalConfig,
    /// Signal governing backward travel
    pub backward: SignalConfig,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            forward: SignalConfig::new("forward", SignalType::Hsi5),
            backward: SignalConfig::new("backward", SignalType::Hsi5),
        }
    }
}

impl SignalsConfig {
    /// Set the forward signal
    pub fn with_forward(mut self, signal: SignalConfig) -> Self {
        self.forward = signal;
        self
    }

    /// Set the backward signal
    pub fn with_backward(mut self, signal: SignalConfig) -> Self {
        self.backward = signal;
        self
    }

    /// Signal for a direction
    pub fn get(&self, direction: SignalDirection) -> &SignalConfig {
        match direction {
            SignalDirection::Forward => &self.forward,
            SignalDirection::Backward => &self.backward,
        }
    }
}

// ============================================================================
// Lamp Config
// ============================================================================

/// Lamp brightness, self-test and flash timing
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LampConfig {
    /// Output ceiling; logical full ON is written as this level
    pub brightness: u8,
    /// ON/OFF cycles of the start-up self-test (0 = skip)
    pub flash_at_startup: u8,
    /// Full period of the main-signal and self-test flash (even duty)
    pub flash_slow_ms: u32,
    /// Full period of the distant-signal flash (lit 3/8)
    pub flash_fast_ms: u32,
    /// Duration of a full OFF↔ON fade
    pub fade_ms: u32,
}

impl Default for LampConfig {
    fn default() -> Self {
        Self {
            brightness: 125,
            flash_at_startup: 3,
            flash_slow_ms: 400,
            flash_fast_ms: 300,
            fade_ms: 60,
        }
    }
}

impl LampConfig {
    /// Set the brightness ceiling
    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    /// Set the number of self-test cycles
    pub fn with_flash_at_startup(mut self, cycles: u8) -> Self {
        self.flash_at_startup = cycles;
        self
    }

    /// Set the slow flash period
    pub fn with_flash_slow_ms(mut self, ms: u32) -> Self {
        self.flash_slow_ms = ms;
        self
    }

    /// Set the fast flash period
    pub fn with_flash_fast_ms(mut self, ms: u32) -> Self {
        self.flash_fast_ms = ms;
        self
    }

    /// On and off times of the slow flash
    pub fn slow_flash(&self) -> (u32, u32) {
        split_period(self.flash_slow_ms, 1, 2)
    }

    /// On and off times of the fast flash (3:5)
    pub fn fast_flash(&self) -> (u32, u32) {
        split_period(self.flash_fast_ms, 3, 8)
    }

    /// Set the fade duration
    pub fn with_fade_ms(mut self, ms: u32) -> Self {
        self.fade_ms = ms;
        self
    }
}

// ============================================================================
// Timing Config
// ============================================================================

/// Tick cadence and supervision timeouts
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingConfig {
    /// Main loop period
    pub tick_ms: u32,
    /// InitialSet gives up waiting for commands after this long
    pub initial_set_timeout_ms: u32,
    /// Link may be down this long before every signal is forced to Stop
    pub link_grace_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 20,
            initial_set_timeout_ms: 10_000,
            link_grace_ms: 5_000,
        }
    }
}

impl TimingConfig {
    /// Set the tick period
    pub fn with_tick_ms(mut self, ms: u32) -> Self {
        self.tick_ms = ms.max(1);
        self
    }

    /// Set the InitialSet timeout
    pub fn with_initial_set_timeout_ms(mut self, ms: u32) -> Self {
        self.initial_set_timeout_ms = ms;
        self
    }

    /// Set the link grace period
    pub fn with_link_grace_ms(mut self, ms: u32) -> Self {
        self.link_grace_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
