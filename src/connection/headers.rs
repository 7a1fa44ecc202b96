//! Handshake headers and target URL derived from the device configuration

use crate::config::DeviceConfig;
use reverse_link_shared::protocol;
use std::collections::BTreeMap;

/// Header name -> value sent with the connection handshake
pub type Headers = BTreeMap<&'static str, String>;

/// Build the identity headers for a connect attempt.
///
/// Blank values are left out. Called once per attempt so credential or
/// identity changes take effect on the next reconnect.
pub fn build_headers(config: &DeviceConfig) -> Headers {
    let mut headers = Headers::new();

    if is_present(&config.auth_token) {
        headers.insert("Authorization", format!("Bearer {}", config.auth_token));
    }

    let identity = [
        ("X-User-ID", &config.user_id),
        ("X-Device-ID", &config.device_id),
        ("X-Device-Name", &config.device_name),
        ("X-Device-Country", &config.country_code),
    ];
    for (name, value) in identity {
        if is_present(value) {
            headers.insert(name, value.clone());
        }
    }

    headers.insert(
        "X-Remote-Device-Key",
        protocol::REMOTE_DEVICE_KEY_PLACEHOLDER.into(),
    );

    headers
}

/// Substitute the device id into the host URL template
pub fn target_url(template: &str, device_id: &str) -> String {
    template.replace(protocol::DEVICE_ID_PLACEHOLDER, device_id)
}

fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}
