use core::str::FromStr;

use embassy_net::dns::{self, DnsQueryType};
use embassy_net::tcp::{ConnectError, TcpSocket};
use embassy_net::{DhcpConfig, IpAddress, Ipv4Address, Runner, Stack, StackResources};
use embassy_time::{Duration, Timer};
use embedded_io_async::{ErrorType, Read, Write};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::wifi::{Config as WifiConfig, WifiController, WifiDevice};
use heapless::String;
use log::{debug, warn};
use myrtio_ota::ports::{Connection, Network, NetworkError};
use static_cell::make_static;

use crate::infrastructure::config;

const MAX_CONNECTIONS: usize = 4;

const DOWNLOAD_RX_BUFFER_SIZE: usize = 4096;
const DOWNLOAD_TX_BUFFER_SIZE: usize = 512;
/// Idle timeout of a single socket, the download deadline is enforced above
const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn init_network_stack(
    wifi_device: WIFI<'static>,
) -> (
    Stack<'static>,
    Runner<'static, WifiDevice<'static>>,
    WifiController<'static>,
) {
    let esp_radio_ctrl = &*make_static!(esp_radio::init().expect("Failed to init radio"));
    let wifi_config = WifiConfig::default();
    let (controller, interfaces) = esp_radio::wifi::new(esp_radio_ctrl, wifi_device, wifi_config)
        .expect("Failed to init wifi");
    let mut dhcp_config = DhcpConfig::default();
    let hostname = String::from_str(config::DEVICE.hostname).expect("Invalid hostname");
    dhcp_config.hostname = Some(hostname);

    let net_config = embassy_net::Config::dhcpv4(dhcp_config);

    let network_resources = make_static!(StackResources::<MAX_CONNECTIONS>::new());
    let (stack, runner) =
        embassy_net::new(interfaces.sta, net_config, network_resources, get_seed());

    (stack, runner, controller)
}

fn get_seed() -> u64 {
    let rng = Rng::new();
    u64::from(rng.random()) << 32 | u64::from(rng.random())
}

/// Wait until the station has a link and a DHCP lease
pub(crate) async fn wait_for_connection(stack: Stack<'_>) -> embassy_net::StaticConfigV4 {
    stack.wait_link_up().await;
    debug!("network: link up, waiting for dhcp lease");
    loop {
        stack.wait_config_up().await;
        if let Some(config) = stack.config_v4() {
            return config;
        }
        // Lease dropped between the wake-up and the read
        Timer::after(Duration::from_millis(100)).await;
    }
}

/// IPv4 literals skip the resolver; names take the first `A` record
async fn resolve_host(stack: Stack<'static>, host: &str) -> Result<IpAddress, NetworkError> {
    if let Ok(ip) = host.parse::<Ipv4Address>() {
        return Ok(IpAddress::Ipv4(ip));
    }

    match stack.dns_query(host, DnsQueryType::A).await {
        Ok(addresses) => addresses.first().copied().ok_or(NetworkError::Resolve),
        Err(dns::Error::InvalidName | dns::Error::NameTooLong) => Err(NetworkError::InvalidHost),
        Err(err) => {
            warn!("network: dns query for {} failed: {:?}", host, err);
            Err(NetworkError::Resolve)
        }
    }
}

/// TCP connections over the station interface.
///
/// Owns the socket buffers, so only one connection is open at a time.
pub(crate) struct TcpNetwork {
    stack: Stack<'static>,
    rx_buffer: [u8; DOWNLOAD_RX_BUFFER_SIZE],
    tx_buffer: [u8; DOWNLOAD_TX_BUFFER_SIZE],
}

impl TcpNetwork {
    pub(crate) fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            rx_buffer: [0; DOWNLOAD_RX_BUFFER_SIZE],
            tx_buffer: [0; DOWNLOAD_TX_BUFFER_SIZE],
        }
    }
}

impl Network for TcpNetwork {
    type Connection<'a> = TcpConnection<'a>;

    async fn connect(
        &mut self,
        host: &str,
        port: u16,
    ) -> Result<Self::Connection<'_>, NetworkError> {
        if !self.stack.is_config_up() {
            return Err(NetworkError::NoRoute);
        }

        let address = resolve_host(self.stack, host).await?;
        debug!("ota: {} resolved to {}", host, address);

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        socket
            .connect((address, port))
            .await
            .map_err(|err| match err {
                ConnectError::InvalidState => NetworkError::Socket,
                ConnectError::ConnectionReset => NetworkError::Refused,
                ConnectError::TimedOut => NetworkError::TimedOut,
                ConnectError::NoRoute => NetworkError::NoRoute,
            })?;

        Ok(TcpConnection { socket })
    }
}

pub(crate) struct TcpConnection<'a> {
    socket: TcpSocket<'a>,
}

impl ErrorType for TcpConnection<'_> {
    type Error = embassy_net::tcp::Error;
}

impl Read for TcpConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await
    }
}

impl Write for TcpConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await
    }
}

impl Connection for TcpConnection<'_> {
    fn close(&mut self) {
        self.socket.close();
    }
}
