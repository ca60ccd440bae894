use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use reqwest::Url;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::hub::ScanHub;
use super::state::FeedEvent;

const REQUEST_CAPACITY: usize = 10;
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// `wss://`, `ws://`, `mqtt://` or `tcp://` address of the broker
    pub url: String,
    pub topic: String,
    pub keep_alive: Duration,
    /// Pause between a dropped connection and the next attempt
    pub reconnect_period: Duration,
}

pub fn mqtt_options(config: &BrokerConfig, client_id: &str) -> Result<MqttOptions> {
    let url = Url::parse(&config.url)
        .with_context(|| format!("invalid broker url {}", config.url))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("broker url {} has no host", config.url))?
        .to_string();

    let mut options = match url.scheme() {
        "wss" => {
            let port = url.port().unwrap_or(443);
            let mut options = MqttOptions::new(client_id, config.url.as_str(), port);
            options.set_transport(Transport::wss_with_default_config());
            options
        }
        "ws" => {
            let port = url.port().unwrap_or(80);
            let mut options = MqttOptions::new(client_id, config.url.as_str(), port);
            options.set_transport(Transport::Ws);
            options
        }
        "mqtt" | "tcp" => MqttOptions::new(client_id, host, url.port().unwrap_or(1883)),
        other => bail!("unsupported broker scheme {other}"),
    };

    options
        .set_keep_alive(config.keep_alive)
        .set_clean_session(true);
    Ok(options)
}

fn random_client_id() -> String {
    format!("smartchain_{:08x}", rand::random::<u32>())
}

/// Maps a raw MQTT event onto what the scanner cares about. A refused
/// ConnAck surfaces as an `Err` from `EventLoop::poll`, not as an event.
pub fn classify(event: &Event, topic: &str) -> Option<FeedEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
            Some(FeedEvent::Connected)
        }
        Event::Incoming(Packet::Publish(publish)) if publish.topic == topic => {
            Some(FeedEvent::Message {
                payload: publish.payload.to_vec(),
                received_at: Local::now(),
            })
        }
        _ => None,
    }
}

/// One live subscription to the scan topic. Dropping or shutting it down
/// closes the broker connection; nothing is published to the hub afterwards.
pub struct ScanChannel {
    hub: Arc<ScanHub>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScanChannel {
    pub fn start(config: BrokerConfig) -> Result<Self> {
        let options = mqtt_options(&config, &random_client_id())?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let hub = Arc::new(ScanHub::new());
        let cancel_token = CancellationToken::new();

        info!("Connecting to MQTT broker {}...", config.url);
        let handle = tokio::spawn(drive(
            client,
            eventloop,
            config,
            hub.clone(),
            cancel_token.clone(),
        ));

        Ok(Self {
            hub,
            cancel_token,
            handle: Some(handle),
        })
    }

    pub fn hub(&self) -> &Arc<ScanHub> {
        &self.hub
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.context("scan channel task failed to join")?;
        }
        Ok(())
    }
}

impl Drop for ScanChannel {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn drive(
    client: AsyncClient,
    mut eventloop: EventLoop,
    config: BrokerConfig,
    hub: Arc<ScanHub>,
    cancel_token: CancellationToken,
) {
    let mut connected = false;

    loop {
        let polled = tokio::select! {
            _ = cancel_token.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        match polled {
            Ok(event) => {
                let Some(feed) = classify(&event, &config.topic) else {
                    continue;
                };
                match &feed {
                    FeedEvent::Connected => {
                        connected = true;
                        info!("Connected to MQTT broker, subscribing to {}", config.topic);
                        if let Err(err) = client.try_subscribe(config.topic.as_str(), QoS::AtMostOnce) {
                            warn!("subscribe to {} failed: {}", config.topic, err);
                        }
                    }
                    FeedEvent::Message { payload, .. } => {
                        debug!("Received QR data: {}", String::from_utf8_lossy(payload));
                    }
                    FeedEvent::Error(message) => warn!("{}", message),
                    FeedEvent::Reconnecting => {}
                }
                hub.publish(feed);
            }
            Err(err) => {
                connected = false;
                error!("MQTT connection error: {}", err);
                hub.publish(FeedEvent::Error(err.to_string()));

                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = tokio::time::sleep(config.reconnect_period) => {}
                }
                info!("Reconnecting to MQTT broker...");
                hub.publish(FeedEvent::Reconnecting);
            }
        }
    }

    // Polling a dropped connection would dial the broker just to say goodbye.
    if !connected {
        debug!("MQTT client not connected, skipping disconnect");
        return;
    }

    info!("Disconnecting MQTT client...");
    if client.try_disconnect().is_ok() {
        let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
        if flushed.is_err() {
            debug!("broker disconnect not confirmed within {:?}", DISCONNECT_GRACE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::state::ConnectionStatus;
    use rumqttc::{ConnAck, Publish};

    fn config(url: &str) -> BrokerConfig {
        BrokerConfig {
            url: url.to_string(),
            topic: "warehouse/qr".to_string(),
            keep_alive: Duration::from_secs(60),
            reconnect_period: Duration::from_secs(1),
        }
    }

    #[test]
    fn websocket_options_keep_full_url() {
        let options =
            mqtt_options(&config("wss://mqtt.eclipseprojects.io:443/mqtt"), "smartchain_test").unwrap();
        assert_eq!(
            options.broker_address(),
            ("wss://mqtt.eclipseprojects.io:443/mqtt".to_string(), 443)
        );
        assert_eq!(options.client_id(), "smartchain_test");
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
    }

    #[test]
    fn tcp_options_use_host_and_default_port() {
        let options = mqtt_options(&config("mqtt://mqtt.eclipseprojects.io"), "id").unwrap();
        assert_eq!(
            options.broker_address(),
            ("mqtt.eclipseprojects.io".to_string(), 1883)
        );
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(mqtt_options(&config("http://broker"), "id").is_err());
        assert!(mqtt_options(&config("not a url"), "id").is_err());
    }

    #[test]
    fn client_ids_are_prefixed() {
        let id = random_client_id();
        assert!(id.starts_with("smartchain_"));
        assert_eq!(id.len(), "smartchain_".len() + 8);
    }

    #[test]
    fn connack_success_means_connected() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert_eq!(classify(&event, "warehouse/qr"), Some(FeedEvent::Connected));

        let refused = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::NotAuthorized,
            false,
        )));
        assert_eq!(classify(&refused, "warehouse/qr"), None);
    }

    #[test]
    fn publishes_on_our_topic_become_messages() {
        let event = Event::Incoming(Packet::Publish(Publish::new(
            "warehouse/qr",
            QoS::AtMostOnce,
            "name=Bolt|quantity=3\n",
        )));
        match classify(&event, "warehouse/qr") {
            Some(FeedEvent::Message { payload, .. }) => {
                assert_eq!(payload, b"name=Bolt|quantity=3\n".to_vec())
            }
            other => panic!("unexpected {other:?}"),
        }

        let elsewhere = Event::Incoming(Packet::Publish(Publish::new(
            "warehouse/other",
            QoS::AtMostOnce,
            "x",
        )));
        assert_eq!(classify(&elsewhere, "warehouse/qr"), None);
        assert_eq!(classify(&Event::Outgoing(Outgoing::PingReq), "warehouse/qr"), None);
    }

    #[tokio::test]
    async fn refused_connection_cycles_status_and_goes_quiet_after_shutdown() {
        let mut broker = config("mqtt://127.0.0.1:1");
        broker.reconnect_period = Duration::from_millis(50);

        let mut channel = ScanChannel::start(broker).unwrap();
        let mut snapshots = channel.hub().watch();

        let mut seen = Vec::new();
        let cycled = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                snapshots.changed().await.unwrap();
                let status = snapshots.borrow_and_update().status.clone();
                seen.push(status.clone());
                let after_error = seen
                    .iter()
                    .position(|s| matches!(s, ConnectionStatus::Error(_)))
                    .map(|index| seen[index + 1..].contains(&ConnectionStatus::Reconnecting));
                if after_error == Some(true) {
                    break;
                }
            }
        })
        .await;
        assert!(cycled.is_ok(), "statuses seen: {seen:?}");
        let error = seen
            .iter()
            .find(|s| matches!(s, ConnectionStatus::Error(_)))
            .map(ToString::to_string)
            .unwrap_or_default();
        assert!(error.starts_with("Error: "), "{error}");
        assert!(!seen.iter().any(ConnectionStatus::is_connected));

        channel.shutdown().await.unwrap();
        let last = channel.hub().snapshot();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(Arc::ptr_eq(&last, &channel.hub().snapshot()));
    }
}
