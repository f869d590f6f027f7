use crate::config::DeviceAddress;

pub fn uplink_topic(device: &DeviceAddress) -> String {
    format!("{}/node/{}/rx", device.application, device.dev_eui)
}

pub fn downlink_topic(device: &DeviceAddress) -> String {
    format!("{}/node/{}/tx", device.application, device.dev_eui)
}
