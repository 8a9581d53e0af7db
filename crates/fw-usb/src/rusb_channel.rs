use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};

use crate::channel::UsbChannel;
use crate::error::UsbError;

/// Real hardware implementation of [`UsbChannel`] over `libusb` via `rusb`.
///
/// On open: locates the device by vendor/product id, best-effort detaches
/// any kernel driver holding interface 0 (a missing kernel driver is not an
/// error — only a warning, since many platforms never attach one), claims
/// configuration 1, and locates the IN/OUT endpoints on interface `(0, 0)`.
pub struct RusbChannel {
    handle: DeviceHandle<GlobalContext>,
    ep_in: u8,
    ep_out: u8,
}

impl RusbChannel {
    pub fn open(vendor: u16, product: u16) -> Result<Self, UsbError> {
        let device = rusb::devices()
            .map_err(|e| UsbError::Io(e.to_string()))?
            .iter()
            .find(|d| {
                d.device_descriptor()
                    .map(|desc| desc.vendor_id() == vendor && desc.product_id() == product)
                    .unwrap_or(false)
            })
            .ok_or(UsbError::NotFound { vendor, product })?;

        let mut handle = device.open().map_err(|e| UsbError::Io(e.to_string()))?;

        match handle.kernel_driver_active(0) {
            Ok(true) => {
                if let Err(e) = handle.detach_kernel_driver(0) {
                    log::warn!("failed to detach kernel driver on interface 0: {e}");
                }
            }
            Ok(false) => {}
            Err(e) => log::warn!("could not query kernel driver state: {e}"),
        }

        handle
            .set_active_configuration(1)
            .map_err(|e| UsbError::ClaimInterface(e.to_string()))?;
        handle
            .claim_interface(0)
            .map_err(|e| UsbError::ClaimInterface(e.to_string()))?;

        let config = device
            .active_config_descriptor()
            .map_err(|e| UsbError::Io(e.to_string()))?;
        let interface = config
            .interfaces()
            .find(|i| i.number() == 0)
            .ok_or(UsbError::EndpointsNotFound)?;
        let descriptor = interface
            .descriptors()
            .next()
            .ok_or(UsbError::EndpointsNotFound)?;

        let mut ep_in = None;
        let mut ep_out = None;
        for endpoint in descriptor.endpoint_descriptors() {
            match endpoint.direction() {
                rusb::Direction::In => ep_in = Some(endpoint.address()),
                rusb::Direction::Out => ep_out = Some(endpoint.address()),
            }
        }

        let (ep_in, ep_out) = match (ep_in, ep_out) {
            (Some(i), Some(o)) => (i, o),
            _ => return Err(UsbError::EndpointsNotFound),
        };

        Ok(Self {
            handle,
            ep_in,
            ep_out,
        })
    }
}

impl UsbChannel for RusbChannel {
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<(), UsbError> {
        log::debug!("writing {} bytes: {}", data.len(), hex_dump(data));
        let written = self
            .handle
            .write_interrupt(self.ep_out, data, timeout)
            .map_err(|e| UsbError::Io(e.to_string()))?;
        if written != data.len() {
            return Err(UsbError::ShortWrite {
                expected: data.len(),
                actual: written,
            });
        }
        Ok(())
    }

    fn read(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, UsbError> {
        let mut buf = vec![0u8; len];
        let read = self
            .handle
            .read_interrupt(self.ep_in, &mut buf, timeout)
            .map_err(|e| UsbError::Io(e.to_string()))?;
        buf.truncate(read);
        log::debug!("read {} bytes: {}", buf.len(), hex_dump(&buf));
        Ok(buf)
    }
}

impl Drop for RusbChannel {
    fn drop(&mut self) {
        log::debug!("releasing USB interface");
        let _ = self.handle.release_interface(0);
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
