use esp_hal::efuse::Efuse;
use myrtio_ota::ports::DeviceIdentity;

/// Device identity burned into eFuse: the factory base MAC address.
pub(crate) struct EfuseIdentity;

impl DeviceIdentity for EfuseIdentity {
    fn device_id(&self, buf: &mut [u8]) -> usize {
        let mac = Efuse::mac_address();
        let len = mac.len().min(buf.len());
        buf[..len].copy_from_slice(&mac[..len]);
        len
    }
}
