use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::model::{parse_topic, Channel, TelemetryEvent, TelemetryPayload};

/// Owns the MQTT session: connects, resubscribes after every reconnect,
/// decodes inbound messages, and forwards them as [`TelemetryEvent`]s.
///
/// Malformed payloads and unrecognized topics are dropped here with a
/// diagnostic; they never reach the store.
pub struct ConnectionManager {
    mqtt: AsyncClient,
    eventloop: EventLoop,
    event_sender: mpsc::Sender<TelemetryEvent>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    topic_prefix: String,
    reconnect_period: Duration,
    connect_timeout: Duration,
}

impl ConnectionManager {
    /// Build the engine plus the broker handle used for publishes and the
    /// final disconnect.
    pub(crate) fn new(
        options: MqttOptions,
        config: &MonitorConfig,
        event_sender: mpsc::Sender<TelemetryEvent>,
        connected: Arc<AtomicBool>,
        shutdown: Arc<AtomicBool>,
    ) -> (Self, AsyncClient) {
        let (mqtt, eventloop) = AsyncClient::new(options, config.channel_capacity);
        let manager = Self {
            mqtt: mqtt.clone(),
            eventloop,
            event_sender,
            connected,
            shutdown,
            topic_prefix: config.topic_prefix.clone(),
            reconnect_period: config.reconnect_period,
            connect_timeout: config.connect_timeout,
        };
        (manager, mqtt)
    }

    /// The main loop. Runs until disconnect is requested or the event
    /// receiver is dropped; transport errors only ever cause a logged retry.
    pub async fn run(mut self) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("transport engine stopped");
                return;
            }

            match self.poll_next().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to MQTT broker");
                    self.connected.store(true, Ordering::SeqCst);
                    self.subscribe_channels().await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if !self.handle_publish(publish).await {
                        info!("event receiver dropped, stopping transport engine");
                        return;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("broker closed the session");
                    self.connected.store(false, Ordering::SeqCst);
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    if self.shutdown.load(Ordering::SeqCst) {
                        info!("transport engine stopped");
                        return;
                    }
                    error!("MQTT connection error: {e}. Retrying...");
                    sleep(self.reconnect_period).await;
                }
            }
        }
    }

    /// Poll the event loop, bounding the wait while no session is up so a
    /// stalled connect attempt turns into a retry.
    async fn poll_next(&mut self) -> Result<Event, MonitorError> {
        if self.connected.load(Ordering::SeqCst) {
            return self
                .eventloop
                .poll()
                .await
                .map_err(|e| MonitorError::Transport(e.to_string()));
        }
        match timeout(self.connect_timeout, self.eventloop.poll()).await {
            Ok(result) => result.map_err(|e| MonitorError::Transport(e.to_string())),
            Err(_) => Err(MonitorError::Transport(format!(
                "connect attempt timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }

    /// Subscribe one filter per channel. A failed filter is logged and
    /// skipped; the session keeps running for the channels that did subscribe.
    async fn subscribe_channels(&mut self) {
        for channel in Channel::ALL {
            let filter = format!("{}/+/{}", self.topic_prefix, channel);
            match self.mqtt.subscribe(filter.clone(), QoS::AtMostOnce).await {
                Ok(()) => info!(%filter, "subscribed"),
                Err(e) => warn!(%filter, "subscribe failed: {e}"),
            }
        }
    }

    /// Decode one inbound message and forward it to the merge task.
    /// Returns false once the receiving side is gone.
    async fn handle_publish(&mut self, publish: Publish) -> bool {
        let (vehicle_id, channel) = match parse_topic(&publish.topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(topic = %publish.topic, %e, "dropping message");
                return true;
            }
        };

        let payload = match TelemetryPayload::decode(channel, &publish.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic = %publish.topic, %e, "dropping malformed payload");
                return true;
            }
        };

        let event = TelemetryEvent {
            vehicle_id,
            payload,
            received_at: Utc::now(),
        };
        self.event_sender.send(event).await.is_ok()
    }
}
