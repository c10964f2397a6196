#![no_std]
#![no_main]

mod controllers;
mod infrastructure;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::uart::{Config as UartConfig, UartRx};
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};
use log::{error, info};
use myrtio_ota::UpdateController;

use crate::controllers::ShellController;
use crate::infrastructure::config;
use crate::infrastructure::drivers::{
    TcpNetwork, init_flash_storage_mutex, init_network_stack, wait_for_connection,
};
use crate::infrastructure::repositories::BootManager;
use crate::infrastructure::tasks::{network_runner_task, shell_task, wifi_connection_task};
use crate::infrastructure::types::OtaController;

esp_bootloader_esp_idf::esp_app_desc!();

// static_cell::make_static! in main causes a compiler error
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();

    // Initialize hardware
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(
        #[unsafe(link_section = ".dram2_uninit")] size: 64 * 1024
    );

    // Start rtos
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("ota: firmware built {}", config::DEVICE.build_version);

    let flash = init_flash_storage_mutex(peripherals.FLASH);
    let boot = match BootManager::new(flash) {
        Ok(boot) => boot,
        Err(err) => {
            error!("ota: partition layout unusable ({:?}), updates disabled", err);
            loop {
                Timer::after(Duration::from_secs(60)).await;
            }
        }
    };

    // Initialize network stack and spawn network tasks
    let (stack, runner, controller) = init_network_stack(peripherals.WIFI);
    spawner.spawn(wifi_connection_task(controller)).ok();
    spawner.spawn(network_runner_task(runner)).ok();

    let slot = boot.alternate_slot();
    let ota = &*mk_static!(
        OtaController,
        OtaController::new(UpdateController::new(
            TcpNetwork::new(stack),
            slot,
            boot,
            config::OTA,
        ))
    );
    if let Err(err) = ota.init().await {
        error!("ota: {}", err);
    }

    // Console on UART0
    let rx = UartRx::new(peripherals.UART0, UartConfig::default())
        .expect("Failed to init console uart")
        .with_rx(peripherals.GPIO3)
        .into_async();
    spawner
        .spawn(shell_task(rx, ShellController::new(ota, spawner)))
        .ok();

    if config::WIFI.auto_connect {
        let net = wait_for_connection(stack).await;
        info!("network: got address {}", net.address);
    }

    loop {
        Timer::after(Duration::from_secs(5)).await;
    }
}
