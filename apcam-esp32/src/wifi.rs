use std::net::Ipv4Addr;

use anyhow::{anyhow, Result};
use esp_idf_hal::modem::Modem;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration, EspWifi};
use log::info;

use crate::Config;

/// Brings up the soft access point and returns it with its address.
/// The driver must stay alive for the AP to keep running.
pub fn start_access_point(
    modem: impl Peripheral<P = Modem> + 'static,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    config: &Config,
) -> Result<(BlockingWifi<EspWifi<'static>>, Ipv4Addr)> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), Some(nvs))?, sysloop)?;

    let auth_method = if config.ap_password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
        ssid: config
            .ap_ssid
            .try_into()
            .map_err(|_| anyhow!("SSID too long"))?,
        ssid_hidden: config.ap_hidden,
        auth_method,
        password: config
            .ap_password
            .try_into()
            .map_err(|_| anyhow!("password too long"))?,
        channel: config.ap_channel,
        max_connections: config.ap_max_clients as u16,
        ..Default::default()
    }))?;

    info!("Starting soft AP \"{}\"...", config.ap_ssid);
    wifi.start()?;
    wifi.wait_netif_up()?;

    let ip = wifi.wifi().ap_netif().get_ip_info()?.ip;
    info!(
        "AP ready: ssid={} channel={} auth={:?} max_clients={} ip={}",
        config.ap_ssid, config.ap_channel, auth_method, config.ap_max_clients, ip
    );
    Ok((wifi, ip))
}
