//! # gRPC Client Factory
//!
//! Hands out client descriptions that share one set of channel settings. The
//! factory only prepares what a transport would need (target, credentials,
//! channel arguments, service config); it opens no connections.
//!
//! ```toml
//! [grpc-client-factory]
//! credentials = "insecure"
//! channel_count = 2
//! default_service_config = '{"loadBalancingConfig": [{"round_robin": {}}]}'
//!
//! [grpc-client-factory.client_credentials]
//! billing = "ssl"
//!
//! [grpc-client-factory.channel_args]
//! "grpc.keepalive_time_ms" = "10000"
//! ```

use crate::logging::{Logger, Logging};
use crate::statistics::{Counter, StatisticsStorage};
use async_trait::async_trait;
use component_framework::{BoxError, Component, ComponentContext, NamedComponent};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub const CLIENTS_CREATED_METRIC: &str = "grpc.client-factory.clients-created";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Credentials {
    #[default]
    Insecure,
    Ssl,
}

fn default_channel_count() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientFactorySettings {
    /// Used by every client without an entry in `client_credentials`.
    pub credentials: Credentials,
    pub client_credentials: HashMap<String, Credentials>,
    pub channel_args: BTreeMap<String, String>,
    pub default_service_config: Option<String>,
    /// Channels opened for every client.
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,
}

impl Default for ClientFactorySettings {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            client_credentials: HashMap::new(),
            channel_args: BTreeMap::new(),
            default_service_config: None,
            channel_count: default_channel_count(),
        }
    }
}

/// Credentials of `client_name`, falling back to the factory-wide default.
pub fn client_credentials(settings: &ClientFactorySettings, client_name: &str) -> Credentials {
    settings
        .client_credentials
        .get(client_name)
        .copied()
        .unwrap_or(settings.credentials)
}

#[derive(Debug, thiserror::Error)]
pub enum GrpcError {
    #[error("channel_count must be at least 1")]
    NoChannels,

    #[error("cannot create client '{0}': the service is shutting down")]
    Stopping(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub index: usize,
    pub target: String,
}

/// Everything needed to open the channels of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcClient {
    pub name: String,
    pub endpoint: String,
    pub credentials: Credentials,
    pub channel_args: BTreeMap<String, String>,
    pub service_config: Option<String>,
    pub channels: Vec<Channel>,
}

#[derive(Debug)]
pub struct GrpcClientFactory {
    settings: ClientFactorySettings,
    clients_created: Arc<Counter>,
    stopping: AtomicBool,
    logger: Option<Arc<Logger>>,
}

impl GrpcClientFactory {
    pub fn new(
        settings: ClientFactorySettings,
        statistics: &StatisticsStorage,
        logger: Option<Arc<Logger>>,
    ) -> Result<Self, BoxError> {
        if settings.channel_count == 0 {
            return Err(GrpcError::NoChannels.into());
        }
        let clients_created = statistics
            .metrics()
            .register(CLIENTS_CREATED_METRIC, Counter::default())?;
        Ok(Self {
            settings,
            clients_created,
            stopping: AtomicBool::new(false),
            logger,
        })
    }

    /// Factory for a [`ComponentList`](component_framework::ComponentList).
    pub async fn create(ctx: ComponentContext, settings: ClientFactorySettings) -> Result<Self, BoxError> {
        let statistics = ctx.find::<StatisticsStorage>().await?;
        let logger = ctx
            .find_component_optional::<Logging>(Logging::NAME)
            .await?
            .map(|logging| logging.default_logger());
        Self::new(settings, &statistics, logger)
    }

    pub fn settings(&self) -> &ClientFactorySettings {
        &self.settings
    }

    pub fn make_client(&self, name: &str, endpoint: &str) -> Result<GrpcClient, GrpcError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(GrpcError::Stopping(name.to_string()));
        }
        let channels = (0..self.settings.channel_count)
            .map(|index| Channel {
                index,
                target: endpoint.to_string(),
            })
            .collect();
        let client = GrpcClient {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            credentials: client_credentials(&self.settings, name),
            channel_args: self.settings.channel_args.clone(),
            service_config: self.settings.default_service_config.clone(),
            channels,
        };
        self.clients_created.inc();
        debug!(client = name, endpoint = endpoint, channels = client.channels.len(), "Created gRPC client");
        Ok(client)
    }

    pub fn clients_created(&self) -> u64 {
        self.clients_created.get()
    }
}

#[async_trait]
impl Component for GrpcClientFactory {
    async fn on_all_components_are_stopping(&self) -> Result<(), BoxError> {
        self.stopping.store(true, Ordering::Release);
        info!(clients = self.clients_created(), "gRPC client factory is stopping");
        if let Some(logger) = &self.logger {
            logger.log(tracing::Level::DEBUG, "client creation disabled");
        }
        Ok(())
    }
}

impl NamedComponent for GrpcClientFactory {
    const NAME: &'static str = "grpc-client-factory";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::StatisticsConfig;

    fn settings(toml: &str) -> ClientFactorySettings {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn per_client_credentials_fall_back_to_default() {
        let settings = settings(
            r#"
            credentials = "ssl"
            [client_credentials]
            local = "insecure"
            "#,
        );
        assert_eq!(client_credentials(&settings, "local"), Credentials::Insecure);
        assert_eq!(client_credentials(&settings, "billing"), Credentials::Ssl);
        assert_eq!(settings.channel_count, 1);
    }

    #[test]
    fn clients_get_one_channel_per_count_and_are_counted() {
        let statistics = StatisticsStorage::new(StatisticsConfig::default(), None);
        let factory = GrpcClientFactory::new(
            settings("channel_count = 3\n[channel_args]\n\"grpc.lb\" = \"rr\""),
            &statistics,
            None,
        )
        .unwrap();

        let client = factory.make_client("billing", "billing:8080").unwrap();
        assert_eq!(client.channels.len(), 3);
        assert_eq!(client.channel_args.get("grpc.lb").map(String::as_str), Some("rr"));
        assert_eq!(client.credentials, Credentials::Insecure);
        factory.make_client("search", "search:8080").unwrap();

        assert_eq!(factory.clients_created(), 2);
        assert_eq!(
            statistics.metrics().dump_metrics()[CLIENTS_CREATED_METRIC],
            serde_json::json!(2)
        );
    }

    #[test]
    fn zero_channels_is_rejected() {
        let statistics = StatisticsStorage::new(StatisticsConfig::default(), None);
        let err = GrpcClientFactory::new(settings("channel_count = 0"), &statistics, None).unwrap_err();
        assert_eq!(err.to_string(), "channel_count must be at least 1");
    }

    #[tokio::test]
    async fn no_clients_after_stopping() {
        let statistics = StatisticsStorage::new(StatisticsConfig::default(), None);
        let factory = GrpcClientFactory::new(ClientFactorySettings::default(), &statistics, None).unwrap();
        factory.on_all_components_are_stopping().await.unwrap();
        assert!(matches!(
            factory.make_client("billing", "billing:8080"),
            Err(GrpcError::Stopping(_))
        ));
        assert_eq!(factory.clients_created(), 0);
    }
}
