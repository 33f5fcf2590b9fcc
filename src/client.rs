use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use rumqttc::{MqttOptions, QoS};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::fusion::VehicleStore;
use crate::model::VehicleState;
use crate::network::ConnectionManager;
use crate::notify::{Notifier, Subscription};

/// Requests routed from the public client surface to the broker handle.
pub(crate) enum Command {
    Publish { topic: String, payload: String },
    Disconnect,
}

/// Public entry point: owns the transport engine, the vehicle store, and the
/// observer fan-out.
///
/// One engine runs per client; reconnects after transport errors happen
/// inside the engine, so there is never a second concurrent session. State
/// already merged survives disconnects and reconnects.
pub struct MonitorClient {
    command_sender: mpsc::Sender<Command>,
    store: Arc<RwLock<VehicleStore>>,
    notifier: Notifier,
    connected: Arc<AtomicBool>,
    config: MonitorConfig,
}

impl MonitorClient {
    /// Connect to an MQTT broker given as `mqtt://host:port` and start the
    /// fusion pipeline.
    pub async fn connect(broker_url: &str, config: MonitorConfig) -> Result<Self, MonitorError> {
        let url = Url::parse(broker_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| MonitorError::InvalidBroker(broker_url.to_string()))?
            .to_string();
        let port = url.port().unwrap_or(1883);

        // Unique client id so parallel monitors never kick each other off.
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect();
        let client_id = format!("{}_{}", config.client_id_prefix, suffix.to_lowercase());
        info!(client_id, host, port, "starting vehicle monitor");

        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);

        let (command_sender, mut command_receiver) = mpsc::channel(32);
        let (event_sender, mut event_receiver) = mpsc::channel(config.channel_capacity);
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let (manager, mqtt) = ConnectionManager::new(
            options,
            &config,
            event_sender,
            Arc::clone(&connected),
            Arc::clone(&shutdown),
        );
        tokio::spawn(manager.run());

        // Command pump: publishes and the final disconnect go through the
        // broker handle, decoupled from the engine's poll loop.
        {
            let connected = Arc::clone(&connected);
            tokio::spawn(async move {
                while let Some(command) = command_receiver.recv().await {
                    match command {
                        Command::Publish { topic, payload } => {
                            if let Err(e) =
                                mqtt.publish(topic, QoS::AtMostOnce, false, payload).await
                            {
                                warn!("publish failed: {e}");
                            }
                        }
                        Command::Disconnect => {
                            shutdown.store(true, Ordering::SeqCst);
                            connected.store(false, Ordering::SeqCst);
                            if let Err(e) = mqtt.disconnect().await {
                                debug!("disconnect request: {e}");
                            }
                            info!("MQTT session closed");
                            break;
                        }
                    }
                }
            });
        }

        let store = Arc::new(RwLock::new(VehicleStore::new(config.fusion.clone())));
        let notifier = Notifier::new();

        // Merge task: the single writer. Applies decoded events in receipt
        // order and fans each merged record out to observers.
        {
            let store = Arc::clone(&store);
            let notifier = notifier.clone();
            tokio::spawn(async move {
                while let Some(event) = event_receiver.recv().await {
                    let merged = store.write().await.merge(&event);
                    match merged {
                        Ok(state) => notifier.notify(&state),
                        Err(e) => warn!(vehicle = %event.vehicle_id, %e, "merge rejected"),
                    }
                }
            });
        }

        Ok(Self {
            command_sender,
            store,
            notifier,
            connected,
            config,
        })
    }

    /// Current session state; flipped on connect, disconnect, and error.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Best-effort publish for external test/command tooling. Refuses with a
    /// log line when not connected.
    pub async fn publish(&self, topic: &str, payload: &str) -> Result<(), MonitorError> {
        if !self.is_connected() {
            warn!(topic, "MQTT not connected, dropping publish");
            return Ok(());
        }
        self.command_sender
            .send(Command::Publish {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
            .await
            .map_err(|_| MonitorError::ChannelClosed)
    }

    /// Gracefully end the session. New events stop arriving; already-merged
    /// state stays queryable. Safe to call multiple times.
    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        // Ignored once the pump has exited; repeat calls are no-ops.
        let _ = self.command_sender.send(Command::Disconnect).await;
    }

    /// Pre-seed a default record, as the device registry does for known ids.
    pub async fn register(&self, id: &str) -> VehicleState {
        self.store.write().await.register(id)
    }

    /// Read-only snapshot of all records, sorted by id.
    pub async fn snapshot(&self) -> Vec<VehicleState> {
        self.store.read().await.snapshot()
    }

    /// Read one record.
    pub async fn vehicle(&self, id: &str) -> Option<VehicleState> {
        self.store.read().await.get(id).cloned()
    }

    /// Register an observer invoked with each merged record.
    pub fn subscribe(
        &self,
        callback: impl Fn(&VehicleState) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifier.subscribe(callback)
    }

    /// Connectivity flag refreshed on a fixed interval, for host UI and
    /// health checks.
    pub fn watch_connectivity(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(self.is_connected());
        let connected = Arc::clone(&self.connected);
        let period = self.config.connectivity_poll_interval;
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if tx.send(connected.load(Ordering::SeqCst)).is_err() {
                    break;
                }
            }
        });
        rx
    }
}
