use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, log_enabled, trace, Level};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use icn_common::{Clock, ConnectionId, SystemClock};
use icn_core::{Message, Name};
use icn_forwarder::{
    ControlHandler, FibEntryInfo, ForwarderMetrics, MessageProcessor, ProcessorStatus, Route,
    StrategyKind, Tap,
};

use crate::config::Config;
use crate::connections::LocalConnectionTable;

/// Requests served by the forwarder task
#[derive(Debug)]
pub enum ForwarderCommand {
    /// A message arrived on `connection`
    Receive {
        connection: ConnectionId,
        message: Message,
    },
    AddRoute {
        route: Route,
        reply: oneshot::Sender<bool>,
    },
    RemoveRoute {
        route: Route,
        reply: oneshot::Sender<bool>,
    },
    ListRoutes {
        reply: oneshot::Sender<Vec<FibEntryInfo>>,
    },
    SetStrategy {
        prefix: Name,
        strategy: StrategyKind,
    },
    SetCacheStore(bool),
    SetCacheServe(bool),
    SetStoreSize(usize),
    ClearCache,
    /// The connection went away; purge it from the FIB and PIT
    CloseConnection(ConnectionId),
    Status {
        reply: oneshot::Sender<ProcessorStatus>,
    },
    /// Stop the task, replying with the final status
    Shutdown {
        reply: oneshot::Sender<ProcessorStatus>,
    },
}

/// Cloneable front end of a running forwarder
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    commands: mpsc::UnboundedSender<ForwarderCommand>,
    connections: Arc<LocalConnectionTable>,
}

impl DaemonHandle {
    fn submit(&self, command: ForwarderCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("forwarder task is not running"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ForwarderCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.submit(build(reply))?;
        rx.await.context("forwarder task dropped the request")
    }

    /// Attach a new in-memory connection
    pub fn open_connection(
        &self,
        id: ConnectionId,
        local: bool,
        name: Option<String>,
    ) -> mpsc::UnboundedReceiver<Arc<Message>> {
        self.connections.register(id, local, name)
    }

    pub fn close_connection(&self, id: ConnectionId) -> Result<bool> {
        let existed = self.connections.close(id);
        self.submit(ForwarderCommand::CloseConnection(id))?;
        Ok(existed)
    }

    /// Hand a message to the forwarder as if it arrived on `connection`
    pub fn deliver(&self, connection: ConnectionId, message: Message) -> Result<()> {
        self.submit(ForwarderCommand::Receive {
            connection,
            message,
        })
    }

    pub async fn add_route(&self, route: Route) -> Result<bool> {
        self.request(|reply| ForwarderCommand::AddRoute { route, reply })
            .await
    }

    pub async fn remove_route(&self, route: Route) -> Result<bool> {
        self.request(|reply| ForwarderCommand::RemoveRoute { route, reply })
            .await
    }

    pub async fn list_routes(&self) -> Result<Vec<FibEntryInfo>> {
        self.request(|reply| ForwarderCommand::ListRoutes { reply })
            .await
    }

    pub fn set_strategy(&self, prefix: Name, strategy: StrategyKind) -> Result<()> {
        self.submit(ForwarderCommand::SetStrategy { prefix, strategy })
    }

    pub fn set_cache_store(&self, enabled: bool) -> Result<()> {
        self.submit(ForwarderCommand::SetCacheStore(enabled))
    }

    pub fn set_cache_serve(&self, enabled: bool) -> Result<()> {
        self.submit(ForwarderCommand::SetCacheServe(enabled))
    }

    pub fn set_store_size(&self, size: usize) -> Result<()> {
        self.submit(ForwarderCommand::SetStoreSize(size))
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.submit(ForwarderCommand::ClearCache)
    }

    pub async fn status(&self) -> Result<ProcessorStatus> {
        self.request(|reply| ForwarderCommand::Status { reply })
            .await
    }
}

/// Logs control messages; no control protocol runs in-process
struct LogControlHandler;

impl ControlHandler for LogControlHandler {
    fn handle_control(&mut self, message: Arc<Message>) {
        debug!(
            "Control message from connection {} ({} bytes)",
            message.ingress(),
            message.payload().len()
        );
    }
}

/// Trace-level packet log
struct LogTap;

impl Tap for LogTap {
    fn on_receive(&mut self, message: &Message) {
        trace!(target: "tap", "recv {}", message);
    }

    fn on_send(&mut self, message: &Message) {
        trace!(target: "tap", "send {}", message);
    }

    fn on_drop(&mut self, message: &Message) {
        trace!(target: "tap", "drop {}", message);
    }
}

pub struct Daemon {
    config: Config,
    handle: Option<DaemonHandle>,
    forwarder: Option<JoinHandle<()>>,
    sinks: Vec<JoinHandle<()>>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handle: None,
            forwarder: None,
            sinks: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the processor from the configuration and spawn the
    /// forwarder task
    pub async fn start(&mut self) -> Result<DaemonHandle> {
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }
        info!("Starting {} services", self.config.daemon.name);

        let connections = Arc::new(LocalConnectionTable::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let metrics = Arc::new(ForwarderMetrics::default());

        // Step 1: Configured connections
        for connection in &self.config.connections {
            let rx = connections.register(connection.id, connection.local, connection.name.clone());
            self.sinks.push(tokio::spawn(drain_connection(connection.id, rx)));
        }

        // Step 2: Processor with static routes and strategies
        let mut processor = MessageProcessor::new(
            self.config.forwarder.clone(),
            connections.clone(),
            clock.clone(),
            metrics,
        );
        processor.set_control_handler(Box::new(LogControlHandler));
        if log_enabled!(target: "tap", Level::Trace) {
            processor.add_tap(Box::new(LogTap));
        }

        for (prefix, strategy) in self.config.strategies()? {
            processor.set_strategy(prefix, strategy);
        }
        for route in self.config.routes()? {
            processor.add_or_update_route(&route);
        }
        info!(
            "Forwarder ready with {} connections and {} FIB entries",
            connections.len(),
            processor.fib().len()
        );

        // Step 3: Forwarder task
        let (tx, rx) = mpsc::unbounded_channel();
        let sweep = self.config.forwarder.pit_sweep_interval_ms;
        let stats = self.config.daemon.stats_interval_secs;
        self.forwarder = Some(tokio::spawn(run_forwarder(processor, rx, clock, sweep, stats)));

        let handle = DaemonHandle {
            commands: tx,
            connections,
        };
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Stop the forwarder task and return its final status
    pub async fn stop(&mut self) -> Option<ProcessorStatus> {
        info!("Stopping {} services", self.config.daemon.name);

        let status = match self.handle.take() {
            Some(handle) => match handle
                .request(|reply| ForwarderCommand::Shutdown { reply })
                .await
            {
                Ok(status) => Some(status),
                Err(e) => {
                    error!("Failed to stop forwarder: {}", e);
                    None
                }
            },
            None => None,
        };

        if let Some(task) = self.forwarder.take() {
            if let Err(e) = task.await {
                error!("Forwarder task failed: {}", e);
            }
        }
        for sink in self.sinks.drain(..) {
            sink.abort();
        }

        info!("All services stopped");
        status
    }
}

/// Consume traffic sent on a configured connection that has no
/// transport behind it
async fn drain_connection(id: ConnectionId, mut rx: mpsc::UnboundedReceiver<Arc<Message>>) {
    while let Some(message) = rx.recv().await {
        debug!("Connection {} transmits {}", id, message);
    }
}

/// The forwarder task. It exclusively owns the processor, so every
/// table access is serialized through the command channel.
async fn run_forwarder(
    mut processor: MessageProcessor,
    mut commands: mpsc::UnboundedReceiver<ForwarderCommand>,
    clock: Arc<dyn Clock>,
    sweep_interval_ms: u64,
    stats_interval_secs: u64,
) {
    let mut sweep = interval(Duration::from_millis(sweep_interval_ms.max(1)));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = interval(Duration::from_secs(stats_interval_secs.max(1)));
    stats.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ForwarderCommand::Shutdown { reply }) => {
                    let _ = reply.send(processor.status());
                    break;
                }
                Some(command) => handle_command(&mut processor, clock.as_ref(), command),
                None => break,
            },
            _ = sweep.tick(), if sweep_interval_ms > 0 => {
                processor.sweep_expired_interests();
            }
            _ = stats.tick(), if stats_interval_secs > 0 => {
                let status = processor.status();
                info!(
                    "Forwarder: {} received, {} interests forwarded, {} objects forwarded, {} dropped, {} pending, {} cached",
                    status.metrics.received,
                    status.metrics.interests_forwarded,
                    status.metrics.objects_forwarded,
                    status.metrics.dropped,
                    status.pit.entries,
                    status.content_store.object_count
                );
            }
        }
    }

    info!("Forwarder task stopped");
}

fn handle_command(processor: &mut MessageProcessor, clock: &dyn Clock, command: ForwarderCommand) {
    match command {
        ForwarderCommand::Receive {
            connection,
            message,
        } => {
            processor.receive(message.received_on(connection, clock.ticks()));
        }
        ForwarderCommand::AddRoute { route, reply } => {
            let _ = reply.send(processor.add_or_update_route(&route));
        }
        ForwarderCommand::RemoveRoute { route, reply } => {
            let _ = reply.send(processor.remove_route(&route));
        }
        ForwarderCommand::ListRoutes { reply } => {
            let _ = reply.send(processor.fib_entries());
        }
        ForwarderCommand::SetStrategy { prefix, strategy } => {
            processor.set_strategy(prefix, strategy);
        }
        ForwarderCommand::SetCacheStore(enabled) => processor.set_cache_store_flag(enabled),
        ForwarderCommand::SetCacheServe(enabled) => processor.set_cache_serve_flag(enabled),
        ForwarderCommand::SetStoreSize(size) => processor.set_content_object_store_size(size),
        ForwarderCommand::ClearCache => processor.clear_cache(),
        ForwarderCommand::CloseConnection(connection) => processor.remove_connection(connection),
        ForwarderCommand::Status { reply } => {
            let _ = reply.send(processor.status());
        }
        ForwarderCommand::Shutdown { reply } => {
            let _ = reply.send(processor.status());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icn_forwarder::RouteOrigin;
    use tokio::time::timeout;

    fn name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Arc<Message>>) -> Arc<Message> {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
    }

    #[tokio::test]
    async fn test_interest_and_object_round_trip() {
        let mut daemon = Daemon::new(Config::default());
        let handle = daemon.start().await.unwrap();

        let mut consumer = handle.open_connection(5, true, Some("consumer".to_string()));
        let mut producer = handle.open_connection(9, false, Some("upstream".to_string()));
        assert!(handle
            .add_route(Route::new(name("/a"), 9).with_origin(RouteOrigin::Control))
            .await
            .unwrap());

        handle.deliver(5, Message::interest(name("/a/b"))).unwrap();
        let forwarded = next(&mut producer).await;
        assert!(forwarded.is_interest());
        assert_eq!(forwarded.name(), Some(&name("/a/b")));

        handle
            .deliver(9, Message::content_object(name("/a/b"), b"hello".to_vec()))
            .unwrap();
        let object = next(&mut consumer).await;
        assert!(object.is_content_object());
        assert_eq!(object.payload(), b"hello");

        let status = handle.status().await.unwrap();
        assert_eq!(status.metrics.interests_forwarded, 1);
        assert_eq!(status.metrics.objects_forwarded, 1);
        assert_eq!(status.content_store.object_count, 1);
        assert_eq!(status.pit.entries, 0);

        // A second consumer is served from the cache
        let mut other = handle.open_connection(6, true, None);
        handle.deliver(6, Message::interest(name("/a/b"))).unwrap();
        let cached = next(&mut other).await;
        assert_eq!(cached.payload(), b"hello");

        let status = daemon.stop().await.unwrap();
        assert_eq!(status.metrics.interests_satisfied_from_store, 1);
    }

    #[tokio::test]
    async fn test_configured_routes_and_route_commands() {
        let mut config = Config::default();
        config.connections.push(crate::config::ConnectionConfig {
            id: 3,
            local: false,
            name: None,
        });
        config.routes.push(crate::config::RouteConfig {
            prefix: "/x".to_string(),
            connection_id: 3,
            cost: 2,
        });
        config.strategies.push(crate::config::StrategyConfig {
            prefix: "/x".to_string(),
            strategy: StrategyKind::Multicast,
        });

        let mut daemon = Daemon::new(config);
        let handle = daemon.start().await.unwrap();

        let routes = handle.list_routes().await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].prefix, "/x");
        assert_eq!(routes[0].strategy, StrategyKind::Multicast);

        assert!(handle.remove_route(Route::new(name("/x"), 3)).await.unwrap());
        assert!(!handle.remove_route(Route::new(name("/x"), 3)).await.unwrap());
        assert!(handle.list_routes().await.unwrap().is_empty());

        daemon.stop().await;
    }

    #[tokio::test]
    async fn test_closed_connection_is_purged() {
        let mut daemon = Daemon::new(Config::default());
        let handle = daemon.start().await.unwrap();

        let _consumer = handle.open_connection(1, true, None);
        let _producer = handle.open_connection(2, false, None);
        handle.add_route(Route::new(name("/p"), 2)).await.unwrap();
        handle.deliver(1, Message::interest(name("/p/q"))).unwrap();
        assert_eq!(handle.status().await.unwrap().pit.entries, 1);

        assert!(handle.close_connection(1).unwrap());
        let status = handle.status().await.unwrap();
        assert_eq!(status.pit.entries, 0);

        handle.set_cache_serve(false).unwrap();
        handle.set_store_size(16).unwrap();
        let status = handle.status().await.unwrap();
        assert!(!status.cache_serve);
        assert_eq!(status.content_store.capacity, 16);

        daemon.stop().await;
        assert!(handle.status().await.is_err());
    }
}
