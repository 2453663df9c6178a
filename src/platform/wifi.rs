//! Wi-Fi station bring-up.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::WifiModem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use crate::config::NetworkConfig;

/// Connect as a station and block until the interface has an address.
pub fn connect(
    modem: WifiModem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    config: &NetworkConfig,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;

    let ssid = config
        .wifi_ssid
        .try_into()
        .map_err(|_| anyhow::anyhow!("wifi ssid too long"))?;
    let password = config
        .wifi_password
        .try_into()
        .map_err(|_| anyhow::anyhow!("wifi password too long"))?;

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid,
        password,
        ..Default::default()
    }))?;

    wifi.start()?;
    log::info!("wifi started, connecting to {}...", config.wifi_ssid);

    wifi.connect()?;
    wifi.wait_netif_up()?;
    log::info!("wifi up, ip: {:?}", wifi.wifi().sta_netif().get_ip_info()?);

    Ok(wifi)
}
