use std::net::SocketAddr;

use crlink::broker;
use crlink::common::config::PairConfig;
use crlink::rendezvous::RendezvousClient;

/// Broker on an ephemeral port; the serve task keeps running after the
/// handle is dropped.
pub async fn spawn_broker() -> SocketAddr {
    let listen: SocketAddr = "127.0.0.1:0".parse().expect("literal address");
    let (addr, _handle) = broker::serve(listen).await.expect("broker failed to start");
    addr
}

pub fn config_for(broker_addr: SocketAddr) -> PairConfig {
    PairConfig {
        broker_url: format!("http://{broker_addr}"),
        connect_timeout_secs: 2,
        ..PairConfig::default()
    }
}

pub fn client_for(broker_addr: SocketAddr) -> RendezvousClient {
    RendezvousClient::new(config_for(broker_addr))
}
