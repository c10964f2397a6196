use embassy_net::Runner;
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{
    ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState,
};
use log::{error, info, warn};

use crate::infrastructure::config;

/// Background task for connecting to the `WiFi` network
///
/// If the connection is lost, it tries to reconnect. Does nothing when
/// auto connect is disabled.
#[embassy_executor::task]
pub(crate) async fn wifi_connection_task(mut controller: WifiController<'static>) {
    if !config::WIFI.auto_connect {
        warn!("wifi: auto connect disabled, staying offline");
        // Holding the controller keeps the radio driver alive
        core::future::pending::<()>().await;
    }

    loop {
        // Wait until we're no longer connected
        if esp_radio::wifi::sta_state() == WifiStaState::Connected {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("wifi: disconnected");
            Timer::after(Duration::from_millis(2000)).await;
        }
        // Start the controller if it's not started
        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(config::WIFI.ssid.into())
                    .with_password(config::WIFI.password.into()),
            );
            if let Err(e) = controller.set_config(&client_config) {
                error!("wifi: invalid configuration: {e:?}");
                return;
            }
            if let Err(e) = controller.start_async().await {
                error!("wifi: failed to start: {e:?}");
                Timer::after(Duration::from_millis(5000)).await;
                continue;
            }
        }

        match controller.connect_async().await {
            Ok(()) => info!("wifi: connected to {}", config::WIFI.ssid),
            Err(e) => {
                warn!("wifi: failed to connect: {e:?}");
                Timer::after(Duration::from_millis(5000)).await;
            }
        }
    }
}

/// Background task for running the network stack
#[embassy_executor::task]
pub(crate) async fn network_runner_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}
