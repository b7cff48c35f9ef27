//! Headset presence, judged by whether a HID device from its vendor is on the USB bus.

use hidapi::HidApi;
use log::{debug, info, warn};

pub trait PresenceDetector {
    fn is_headset_present(&mut self) -> bool;
}

pub struct UsbHeadset {
    vendor_id: u16,
    bypass: bool,
    // Created on first use so a bypassed detector never touches the HID library.
    api: Option<HidApi>,
}

impl UsbHeadset {
    pub fn new(vendor_id: u16) -> Self {
        Self { vendor_id, bypass: false, api: None }
    }

    /// A detector that reports the headset as present without looking at the bus.
    pub fn bypassed(vendor_id: u16) -> Self {
        Self { vendor_id, bypass: true, api: None }
    }

    fn probe(&mut self) -> Result<bool, hidapi::HidError> {
        // A context whose refresh fails is dropped, the next probe starts over.
        let api = match self.api.take() {
            Some(mut api) => {
                api.refresh_devices()?;
                api
            }
            None => HidApi::new()?,
        };
        let api = &*self.api.insert(api);

        let mut found = false;
        for info in api.device_list().filter(|info| info.vendor_id() == self.vendor_id) {
            found = true;

            // The handle is closed when it goes out of scope.
            match info.open_device(api) {
                Ok(_device) => debug!(
                    "USB FOUND : {:04x}:{:04x} {}",
                    info.vendor_id(),
                    info.product_id(),
                    info.product_string().unwrap_or("<unnamed>")
                ),
                Err(err) => warn!(
                    "USB device {:04x}:{:04x} matched but could not be opened: {err}",
                    info.vendor_id(),
                    info.product_id()
                ),
            }
        }

        Ok(found)
    }
}

impl PresenceDetector for UsbHeadset {
    fn is_headset_present(&mut self) -> bool {
        if self.bypass {
            return true;
        }

        match self.probe() {
            Ok(true) => true,
            Ok(false) => {
                info!("headset not found (vendor {:#06x})", self.vendor_id);
                false
            }
            Err(err) => {
                warn!("USB enumeration failed: {err}");
                false
            }
        }
    }
}
