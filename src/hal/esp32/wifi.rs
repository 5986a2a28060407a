//! WiFi station bring-up for the ESP32-C3.
//!
//! Joins the configured network, giving up after `max_retries` attempts or
//! `connect_timeout_ms`, whichever comes first. The node name doubles as the
//! DHCP hostname so nodes are easy to find on the router.
//!
//! # Example
//!
//! ```ignore
//! use rs_blocksig::hal::esp32::Esp32Wifi;
//! use rs_blocksig::config::WifiConfig;
//!
//! let config = WifiConfig::default()
//!     .with_ssid("Layout")
//!     .with_password("secret123");
//!
//! let wifi = Esp32Wifi::new(modem, sysloop, nvs, &config)?;
//! log::info!("IP: {:?}", wifi.ip_addr());
//! ```

use crate::config::WifiConfig;
use anyhow::{bail, Context};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};
use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};

/// WiFi station connection.
///
/// Connected during construction and kept for the lifetime of this struct.
pub struct Esp32Wifi<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
}

impl<'a> Esp32Wifi<'a> {
    /// Join the configured network.
    ///
    /// # Errors
    ///
    /// Returns an error if no SSID is configured, the driver fails to start,
    /// or joining fails within the attempt and time limits.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &WifiConfig,
    ) -> anyhow::Result<Self> {
        if !config.is_configured() {
            bail!("no WiFi network configured");
        }

        let mut esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        esp_wifi
            .sta_netif_mut()
            .set_hostname(config.ap_name.as_str())
            .context("setting hostname")?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        let mut ssid: heapless::String<32> = heapless::String::new();
        let _ = ssid.push_str(config.ssid.as_str());
        let mut password: heapless::String<64> = heapless::String::new();
        let _ = password.push_str(config.password.as_str());
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid,
            password,
            auth_method,
            ..Default::default()
        }))?;
        wifi.start()?;

        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            info!("joining '{}' (attempt {attempt})", config.ssid);
            let result = wifi.connect();
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match result {
                Ok(()) => break,
                Err(err) if config.retry_allowed(attempt, elapsed_ms) => {
                    warn!("WiFi connect failed: {err}");
                    thread::sleep(Duration::from_secs(2));
                }
                Err(err) => {
                    return Err(err).context(format!("joining '{}'", config.ssid));
                }
            }
        }

        wifi.wait_netif_up()?;
        if let Ok(ip_info) = wifi.wifi().sta_netif().get_ip_info() {
            info!("WiFi up, IP {}", ip_info.ip);
        }

        Ok(Self { wifi })
    }

    /// Get the current IP address, if connected.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }

    /// Check if WiFi is connected.
    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }
}
