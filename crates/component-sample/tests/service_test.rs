use component_framework::{ComponentError, ComponentLifetimeStage};
use component_sample::grpc::{GrpcError, CLIENTS_CREATED_METRIC};
use component_sample::{service, GrpcClientFactory, Logging, ServiceConfig, StatisticsStorage};
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

const FULL_CONFIG: &str = r#"
[logging]
level = "debug"

[statistics-storage]

[grpc-client-factory]
channel_count = 2
"#;

/// Full end-to-end test of the sample service.
#[tokio::test]
async fn test_full_service_lifecycle() {
    let config = ServiceConfig::from_toml(FULL_CONFIG).expect("valid config");
    let mut manager = service::manager(&config).expect("valid component list");

    timeout(WAIT, manager.start())
        .await
        .expect("start should not hang")
        .expect("start should succeed");

    // Lookups made by the factories are the recorded graph.
    let graph = manager.dependency_graph();
    assert!(graph.contains(r#""grpc-client-factory" -> "logging"; "grpc-client-factory" -> "statistics-storage""#));
    assert!(graph.contains(r#""statistics-storage" -> "logging""#));
    for name in ["logging", "statistics-storage", "grpc-client-factory"] {
        assert_eq!(manager.stage(name), Some(ComponentLifetimeStage::Running));
    }

    let factory = manager.find::<GrpcClientFactory>().expect("factory is running");
    let client = factory.make_client("billing", "billing:8080").unwrap();
    assert_eq!(client.channels.len(), 2);

    let statistics = manager.find::<StatisticsStorage>().expect("statistics is running");
    assert!(statistics.metrics().is_registration_finished());
    assert_eq!(statistics.metrics().dump_metrics()[CLIENTS_CREATED_METRIC], 1);

    let logging = manager.find::<Logging>().expect("logging is running");
    timeout(WAIT, manager.stop()).await.expect("stop should not hang");

    assert!(matches!(
        factory.make_client("search", "search:8080"),
        Err(GrpcError::Stopping(_))
    ));
    // Once on stopping, once on teardown.
    assert_eq!(logging.flush_count(), 2);
    assert!(!manager.has_component("logging"));
    assert_eq!(manager.stage("logging"), Some(ComponentLifetimeStage::Stopped));
}

#[tokio::test]
async fn test_logging_is_optional() {
    let config = ServiceConfig::from_toml("[statistics-storage]\n[grpc-client-factory]").unwrap();
    let mut manager = service::manager(&config).unwrap();

    timeout(WAIT, manager.start()).await.unwrap().unwrap();
    assert_eq!(
        manager.dependency_graph(),
        "\"grpc-client-factory\" -> \"statistics-storage\" \n"
    );
    manager.stop().await;
}

#[tokio::test]
async fn test_missing_dependency_fails_startup() {
    let config = ServiceConfig::from_toml("[logging]\n[grpc-client-factory]").unwrap();
    let mut manager = service::manager(&config).unwrap();

    let err = timeout(WAIT, manager.start()).await.unwrap().unwrap_err();
    assert!(
        matches!(&err, ComponentError::Construction { component, .. } if component == "grpc-client-factory"),
        "got {err}"
    );
    assert!(err.to_string().contains("unknown component 'statistics-storage'"));

    // The logging component was built and is still torn down properly.
    let logging = manager.find::<Logging>().expect("logging kept its instance");
    manager.stop().await;
    assert_eq!(logging.flush_count(), 2);
}

#[tokio::test]
async fn test_invalid_settings_fail_startup() {
    let config = ServiceConfig::from_toml("[statistics-storage]\n[grpc-client-factory]\nchannel_count = 0").unwrap();
    let mut manager = service::manager(&config).unwrap();

    let err = timeout(WAIT, manager.start()).await.unwrap().unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot start component 'grpc-client-factory': channel_count must be at least 1"
    );
    manager.stop().await;
}
