use myrtio_ota::OtaConfig;
use myrtio_ota::config::{parse_flag, parse_millis};

pub(crate) struct WifiConfig {
    pub(crate) ssid: &'static str,
    pub(crate) password: &'static str,
    /// Join the network at boot
    pub(crate) auto_connect: bool,
}

pub(crate) struct DeviceConfig {
    pub(crate) hostname: &'static str,
    pub(crate) build_version: &'static str,
}

pub(crate) const WIFI: WifiConfig = WifiConfig {
    ssid: env!("WIFI_SSID"),
    password: env!("WIFI_PASSWORD"),
    auto_connect: match option_env!("WIFI_AUTO_CONNECT") {
        Some(value) => parse_flag(value),
        None => true,
    },
};

pub(crate) const DEVICE: DeviceConfig = DeviceConfig {
    hostname: "myrtio-ota",
    build_version: env!("BUILD_VERSION"),
};

const DOWNLOAD_TIMEOUT_MS: u64 = match option_env!("OTA_DOWNLOAD_TIMEOUT_MS") {
    Some(value) => parse_millis(value),
    None => 300_000,
};

pub(crate) const OTA: OtaConfig<'static> =
    OtaConfig::new(env!("OTA_FILE_URL")).with_timeout_ms(DOWNLOAD_TIMEOUT_MS);
