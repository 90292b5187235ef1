use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the pairing core.
///
/// Defaults suit a single-machine setup; `crlink.toml` and `CRLINK_*`
/// environment variables override them per deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PairConfig {
    /// Base URL of the rendezvous broker.
    pub broker_url: String,
    /// Origin invitation URLs point at (what the phone opens after scanning).
    pub app_origin: String,
    /// Interface the initiator's direct listener binds to.
    pub bind_host: String,
    /// Host peers are told to dial. Override with the machine's LAN address
    /// when the phone reaches the desktop over the local network.
    pub advertise_host: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for one encoded wire message. A whole report travels as a
    /// single message, so this must cover the largest expected document.
    pub max_frame_bytes: usize,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            broker_url: "http://127.0.0.1:9473".to_string(),
            app_origin: "https://cr-chirurgie.local/".to_string(),
            bind_host: "127.0.0.1".to_string(),
            advertise_host: "127.0.0.1".to_string(),
            connect_timeout_secs: 10,
            max_frame_bytes: 32 * 1024 * 1024,
        }
    }
}

impl PairConfig {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("crlink.toml"))
            .merge(Env::prefixed("CRLINK_"))
            .extract()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
