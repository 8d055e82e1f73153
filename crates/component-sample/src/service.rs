//! Assembles the sample service from its configuration.

use crate::config::ServiceConfig;
use crate::grpc::GrpcClientFactory;
use crate::logging::Logging;
use crate::statistics::StatisticsStorage;
use component_framework::{ComponentError, ComponentList, ComponentManager};

/// One entry per component table present in `config`.
///
/// The order is irrelevant to startup: `grpc-client-factory` is listed first
/// and still comes up after the statistics storage it depends on.
pub fn component_list(config: &ServiceConfig) -> ComponentList {
    let mut list = ComponentList::new();
    if let Some(settings) = config.grpc_client_factory.clone() {
        list = list.append_named(move |ctx| GrpcClientFactory::create(ctx, settings));
    }
    if let Some(settings) = config.statistics_storage.clone() {
        list = list.append_named(move |ctx| StatisticsStorage::create(ctx, settings));
    }
    if let Some(settings) = config.logging.clone() {
        list = list.append_named(move |_ctx| async move { Ok(Logging::new(&settings)) });
    }
    list
}

pub fn manager(config: &ServiceConfig) -> Result<ComponentManager, ComponentError> {
    ComponentManager::new(component_list(config), config.manager.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configured_components_are_listed() {
        let config = ServiceConfig::from_toml("[logging]\n[statistics-storage]").unwrap();
        let list = component_list(&config);
        assert_eq!(
            list.names().collect::<Vec<_>>(),
            ["statistics-storage", "logging"]
        );
    }
}
