//! Poster -> directory -> kubesync over a real socket

use std::sync::Arc;
use std::time::Duration;

use cluster_autodiscover::kubeconfig::ConfigStore;
use cluster_autodiscover::{
    create_router, AppState, AutodiscoverError, DiscoveryClient, Kubeconfig, Member,
    MemberDirectory, MemoryConfigStore, Poster, Reconciler, Registry,
};

const TOKEN: &str = "e2e-token";
const OPERATOR: &str = "jane@bink.com";
const CA_PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

async fn spawn_directory() -> (String, Arc<Registry>) {
    let registry = Arc::new(Registry::default());
    let app = create_router(AppState::new(registry.clone(), TOKEN));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), registry)
}

fn poster(base_url: &str, name: &str) -> Poster {
    Poster::new(
        &format!("{}/", base_url),
        TOKEN,
        Member::new(name, format!("https://{}.example:6443", name), CA_PEM),
        Duration::from_secs(300),
    )
    .unwrap()
}

#[tokio::test]
async fn test_heartbeats_flow_into_kubeconfig() {
    let (base_url, registry) = spawn_directory().await;

    for name in ["uksouth-alpha", "uksouth-beta", "ukwest-gamma"] {
        assert_eq!(poster(&base_url, name).post_once().await.unwrap(), 200);
    }
    assert_eq!(registry.len().await, 3);

    let client = DiscoveryClient::new(&base_url, TOKEN, Duration::from_secs(5)).unwrap();
    let members = client.list_members().await.unwrap();
    let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["uksouth-alpha", "uksouth-beta", "ukwest-gamma"]);

    let store = MemoryConfigStore::new(Kubeconfig::empty());
    let reconciler = Reconciler::default();

    let report = reconciler
        .sync(&client, &store, Some(OPERATOR), false)
        .await
        .unwrap();
    assert!(report.changed);
    assert!(report.identity_created);
    assert_eq!(report.added, vec!["uksouth-alpha", "uksouth-beta"]);
    assert_eq!(report.skipped, vec!["ukwest-gamma"]);
    assert_eq!(store.save_count(), 1);

    let config = store.load().unwrap();
    let alpha = config.cluster("uksouth-alpha").unwrap();
    assert_eq!(alpha.server.as_deref(), Some("https://uksouth-alpha.example:6443"));
    assert_eq!(alpha.certificate_authority().unwrap(), CA_PEM.as_bytes());
    assert_eq!(config.context("uksouth-beta").unwrap().user, OPERATOR);
    assert!(config.user(OPERATOR).unwrap().auth_provider.is_some());

    // Second pass over the same listing is a no-op
    let report = reconciler
        .sync(&client, &store, Some(OPERATOR), false)
        .await
        .unwrap();
    assert!(!report.changed);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn test_departed_cluster_is_removed() {
    let (base_url, registry) = spawn_directory().await;
    poster(&base_url, "uksouth-alpha").post_once().await.unwrap();
    registry
        .register_at(
            Member::new("uksouth-old", "https://old:6443", CA_PEM),
            chrono::Utc::now() - chrono::Duration::minutes(6),
        )
        .await;

    let mut config = Kubeconfig::empty();
    Reconciler::default()
        .reconcile(
            &[
                Member::new("uksouth-alpha", "https://uksouth-alpha.example:6443", CA_PEM),
                Member::new("uksouth-old", "https://old:6443", CA_PEM),
            ],
            &mut config,
            Some(OPERATOR),
        )
        .unwrap();
    let store = MemoryConfigStore::new(config);

    let client = DiscoveryClient::new(&base_url, TOKEN, Duration::from_secs(5)).unwrap();
    let report = Reconciler::default()
        .sync(&client, &store, Some(OPERATOR), false)
        .await
        .unwrap();

    assert_eq!(report.removed, vec!["uksouth-old"]);
    assert!(store.load().unwrap().cluster("uksouth-old").is_none());
    assert!(store.load().unwrap().context("uksouth-old").is_none());
}

#[tokio::test]
async fn test_wrong_token_is_rejected() {
    let (base_url, registry) = spawn_directory().await;

    let client = DiscoveryClient::new(&base_url, "not-the-token", Duration::from_secs(5)).unwrap();
    let err = client.list_members().await.unwrap_err();
    assert!(matches!(err, AutodiscoverError::Directory { status: 401, .. }));

    let rogue = Poster::new(
        &format!("{}/", base_url),
        "not-the-token",
        Member::new("uksouth-rogue", "https://rogue:6443", CA_PEM),
        Duration::from_secs(300),
    )
    .unwrap();
    let err = rogue.post_once().await.unwrap_err();
    assert!(matches!(err, AutodiscoverError::Directory { status: 401, .. }));
    assert!(registry.is_empty().await);
}
