//! Login, resume and logout tests across the three transports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloud_wallet::accounts::{AccountSelector, ACCOUNTS_KEY};
use cloud_wallet::blockchain::ChainId;
use cloud_wallet::config::{ConfigError, IframeLoginConfig, RedirectLoginConfig};
use cloud_wallet::session::{FrameContainer, LOGGED_KEY};
use cloud_wallet::storage::{KeyValueStore, MemoryStore};
use cloud_wallet::{CloudConfig, CloudSession, Credentials, LoggedUser, SessionError};

mod common;

use common::{MockChain, MockConnector, MockHost, MockRequest, MockWallet, WALLET_KEY};

struct Harness {
    session: CloudSession,
    chain: Arc<MockChain>,
    wallet: Arc<MockWallet>,
    connector: Arc<MockConnector>,
    host: Arc<MockHost>,
    store: Arc<MemoryStore>,
}

fn build(config: CloudConfig, chain: MockChain, url: &str, store: Arc<MemoryStore>) -> Harness {
    let chain = Arc::new(chain);
    let wallet = Arc::new(MockWallet::new());
    let connector = Arc::new(MockConnector::new(wallet.clone()));
    let host = Arc::new(MockHost::new(url));
    let session = CloudSession::builder(config)
        .chain(chain.clone())
        .wallet_connector(connector.clone())
        .host(host.clone())
        .store(store.clone())
        .build()
        .unwrap();
    Harness {
        session,
        chain,
        wallet,
        connector,
        host,
        store,
    }
}

fn local(chain: MockChain) -> Harness {
    build(
        common::local_config(None, None),
        chain,
        "https://app.example/",
        Arc::new(MemoryStore::new()),
    )
}

fn with_alice() -> MockChain {
    MockChain::new().with_accounts(WALLET_KEY, &["alice"])
}

fn iframe_config(sync: bool) -> CloudConfig {
    let mut config = common::local_config(None, None);
    config.login.local = None;
    config.login.iframe = Some(IframeLoginConfig {
        url: "https://login.example/frame".to_string(),
        container: None,
        modal: true,
        sync_with_wallet: sync,
    });
    config
}

async fn wait_for_frames(host: &MockHost, count: usize) {
    for _ in 0..100 {
        if host.mounted.lock().unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} mounted frames");
}

#[tokio::test]
async fn test_local_login_with_credentials() {
    let h = local(with_alice());
    let logins = Arc::new(AtomicUsize::new(0));
    let counter = logins.clone();
    h.session.events().login.subscribe(move |logged: &LoggedUser| {
        assert_eq!(logged.account, "alice");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let logged = h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();

    assert_eq!(logged.account, "alice");
    assert_eq!(logged.permission, "active");
    assert_eq!(logged.keys, vec![WALLET_KEY]);
    assert_eq!(h.session.user_account().as_deref(), Some("alice"));
    assert_eq!(h.session.pub_keys(), vec![WALLET_KEY]);
    assert_eq!(logins.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.connector.connects.lock().unwrap().as_slice(),
        &[("app-1".to_string(), "a@b.com".to_string())]
    );

    let stored: LoggedUser = serde_json::from_str(&h.store.get(LOGGED_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, logged);
}

#[tokio::test]
async fn test_login_progress_uses_login_budget() {
    let h = local(with_alice());
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();
    h.session.events().progress.subscribe(move |p: &f64| sink.lock().unwrap().push(*p));

    h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();
    assert_eq!(*progress.lock().unwrap(), vec![0.0, 0.5, 1.0]);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(*progress.lock().unwrap(), vec![0.0, 0.5, 1.0, -1.0]);
}

#[tokio::test]
async fn test_account_creation_through_endpoint() {
    let seen = Arc::new(Mutex::new(Vec::<MockRequest>::new()));
    let requests = seen.clone();
    let addr = common::start_programmable_backend(move |request: MockRequest| {
        let requests = requests.clone();
        async move {
            requests.lock().unwrap().push(request);
            (200, r#"{"accountName":"newacct"}"#.to_string())
        }
    })
    .await;

    let endpoint = format!("http://{}/create", addr);
    let h = build(
        common::local_config(None, Some(endpoint.as_str())),
        MockChain::new(),
        "https://app.example/",
        Arc::new(MemoryStore::new()),
    );

    let logged = h.session.login(Some(Credentials::new("a@b.com", ""))).await.unwrap();
    assert_eq!(logged.account, "newacct");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/create");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["ownerKey"], WALLET_KEY);
    assert_eq!(body["activeKey"], WALLET_KEY);
    assert_eq!(body["jwt"], "");

    let cache = h.session.account_cache();
    let chain = ChainId::from(common::CHAIN_ID);
    assert_eq!(cache.accounts("a@b.com", &chain), vec!["newacct"]);
    assert_eq!(cache.selected("a@b.com", &chain).as_deref(), Some("newacct"));
    assert!(h.store.get(ACCOUNTS_KEY).unwrap().unwrap().contains("newacct"));
}

#[tokio::test]
async fn test_no_account_and_no_creation_method() {
    let h = local(MockChain::new());
    let err = h.session.login(Some(Credentials::new("a@b.com", ""))).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Account(cloud_wallet::accounts::AccountError::NoCreationMethod)
    ));
    assert!(h.session.logged().is_none());
}

#[tokio::test]
async fn test_cached_account_skips_history_lookup() {
    let h = local(with_alice());
    h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();
    h.session.logout().unwrap();
    let logged = h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();

    assert_eq!(logged.account, "alice");
    assert_eq!(h.chain.key_account_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.wallet.get_wallet_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_selector_is_consulted_once() {
    let h = local(MockChain::new().with_accounts(WALLET_KEY, &["alice", "bob"]));
    let selector: Arc<dyn AccountSelector> = Arc::new(|accounts: &[String]| accounts[1].clone());
    h.session.set_account_selector(selector);

    let first = h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();
    assert_eq!(first.account, "bob");

    // the cached selection wins once the selector is spent
    h.session.logout().unwrap();
    let second = h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();
    assert_eq!(second.account, "bob");
}

#[tokio::test]
async fn test_empty_email_is_rejected() {
    let h = local(with_alice());
    let err = h.session.login(Some(Credentials::new("", "jwt"))).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidCredentials(_)));
    assert_eq!(h.chain.network_calls(), 0);
}

#[tokio::test]
async fn test_strategy_cardinality_is_checked_before_io() {
    let mut none = common::local_config(None, None);
    none.login.local = None;
    let h = build(none, with_alice(), "https://app.example/", Arc::new(MemoryStore::new()));
    let err = h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap_err();
    assert!(matches!(err, SessionError::Config(ConfigError::MissingLoginStrategy)));

    let mut both = common::local_config(None, None);
    both.login.redirect = Some(RedirectLoginConfig {
        url: "https://login.example/".to_string(),
        callback: None,
    });
    let h2 = build(both, with_alice(), "https://app.example/", Arc::new(MemoryStore::new()));
    let err = h2.session.login(None).await.unwrap_err();
    assert!(matches!(err, SessionError::Config(ConfigError::ConflictingLoginStrategies(_))));

    for harness in [&h, &h2] {
        assert_eq!(harness.chain.network_calls(), 0);
        assert!(harness.connector.connects.lock().unwrap().is_empty());
        assert!(harness.host.navigations.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_widget_login_requires_identity_config() {
    let h = local(with_alice());
    let err = h.session.login(None).await.unwrap_err();
    assert!(matches!(err, SessionError::Config(ConfigError::MissingIdentityWidget)));
}

#[tokio::test]
async fn test_redirect_login_navigates_and_suspends() {
    let mut config = common::local_config(None, None);
    config.login.local = None;
    config.login.redirect = Some(RedirectLoginConfig {
        url: "https://login.example/auth".to_string(),
        callback: None,
    });
    let h = build(config, with_alice(), "https://app.example/", Arc::new(MemoryStore::new()));

    let outcome = tokio::time::timeout(Duration::from_millis(200), h.session.login(None)).await;
    assert!(outcome.is_err(), "redirect login must not complete");

    assert_eq!(
        h.host.navigations.lock().unwrap().as_slice(),
        &["https://login.example/auth?redirect=https%3A%2F%2Fapp.example%2F".to_string()]
    );
    let provisional: LoggedUser = serde_json::from_str(&h.store.get(LOGGED_KEY).unwrap().unwrap()).unwrap();
    assert!(!provisional.is_resumable());
}

#[tokio::test]
async fn test_iframe_login_completes_on_frame_message() {
    let h = build(iframe_config(true), with_alice(), "https://app.example/wallet", Arc::new(MemoryStore::new()));

    let session = h.session.clone();
    let login = tokio::spawn(async move { session.login(None).await });
    wait_for_frames(&h.host, 1).await;

    let (handle, request) = h.host.mounted.lock().unwrap()[0].clone();
    assert_eq!(request.container, FrameContainer::Modal);
    assert!(request.url.starts_with("https://login.example/frame?login=true"));
    assert!(request.url.contains("origin=https%3A%2F%2Fapp.example"));
    assert!(request.url.contains("sync=true"));
    assert!(request.url.contains("trace=false"));

    h.session
        .handle_frame_message(r#"{"account":"alice","email":"a@b.com","keys":["EOS7abc"]}"#)
        .await
        .unwrap();
    let logged = login.await.unwrap().unwrap();

    assert_eq!(logged.account, "alice");
    assert_eq!(logged.keys, vec!["EOS7abc"]);
    assert_eq!(h.host.removed.lock().unwrap().as_slice(), &[handle]);
    assert_eq!(h.session.user_account().as_deref(), Some("alice"));

    let cache = h.session.account_cache();
    assert_eq!(cache.selected("a@b.com", &ChainId::from("X")).as_deref(), Some("alice"));
    assert_eq!(cache.logged().as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn test_abandoned_iframe_logins_release_listeners() {
    let h = build(iframe_config(true), with_alice(), "https://app.example/", Arc::new(MemoryStore::new()));

    for _ in 0..5 {
        let outcome = tokio::time::timeout(Duration::from_millis(10), h.session.login(None)).await;
        assert!(outcome.is_err());
    }

    // only the frame's close listener remains
    assert_eq!(h.host.mounted.lock().unwrap().len(), 1);
    assert_eq!(h.session.events().login.listener_count(), 1);
}

#[tokio::test]
async fn test_synced_remote_logout_remounts_frame() {
    let h = build(iframe_config(true), with_alice(), "https://app.example/", Arc::new(MemoryStore::new()));
    h.session
        .handle_frame_message(r#"{"account":"alice","email":"a@b.com"}"#)
        .await
        .unwrap();
    assert!(h.session.logged().is_some());

    h.session.handle_frame_message(r#"{"logout":true}"#).await.unwrap();
    assert!(h.session.logged().is_none());
    assert_eq!(h.host.mounted.lock().unwrap().len(), 1);

    h.session.handle_frame_message("not json").await.unwrap();
    assert_eq!(h.host.mounted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsynced_remote_logout_is_ignored() {
    let h = build(iframe_config(false), with_alice(), "https://app.example/", Arc::new(MemoryStore::new()));
    h.session
        .handle_frame_message(r#"{"account":"alice","email":"a@b.com"}"#)
        .await
        .unwrap();
    h.session.handle_frame_message(r#"{"type":"logout"}"#).await.unwrap();
    assert_eq!(h.session.user_account().as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_check_auto_login_is_idempotent() {
    let h = build(
        common::local_config(None, None),
        with_alice(),
        "https://app.example/?account=alice&email=a%40b.com",
        Arc::new(MemoryStore::new()),
    );

    let first = h.session.check_auto_login().await.unwrap();
    let chain_calls = h.chain.network_calls();
    let wallet_calls = h.wallet.get_wallet_calls.load(Ordering::SeqCst);
    let connects = h.connector.connects.lock().unwrap().len();

    let second = h.session.check_auto_login().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.unwrap().account, "alice");
    assert_eq!(h.chain.network_calls(), chain_calls);
    assert_eq!(h.wallet.get_wallet_calls.load(Ordering::SeqCst), wallet_calls);
    assert_eq!(h.connector.connects.lock().unwrap().len(), connects);
}

#[tokio::test]
async fn test_persisted_session_resumes_silently() {
    let store = Arc::new(MemoryStore::new());
    let first = build(common::local_config(None, None), with_alice(), "https://app.example/", store.clone());
    first.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();

    let second = build(common::local_config(None, None), with_alice(), "https://app.example/", store);
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();
    second.session.events().progress.subscribe(move |p: &f64| sink.lock().unwrap().push(*p));

    let resumed = second.session.check_auto_login().await.unwrap().unwrap();
    assert_eq!(resumed.account, "alice");
    assert_eq!(resumed.email, "a@b.com");
    assert_eq!(second.chain.key_account_calls.load(Ordering::SeqCst), 0);
    assert!(progress.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_check_auto_login_mounts_synced_frame_without_waiting() {
    let h = build(iframe_config(true), with_alice(), "https://app.example/", Arc::new(MemoryStore::new()));
    assert_eq!(h.session.check_auto_login().await.unwrap(), None);
    assert_eq!(h.host.mounted.lock().unwrap().len(), 1);

    assert_eq!(h.session.check_auto_login().await.unwrap(), None);
    assert_eq!(h.host.mounted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_logout_clears_state_and_is_idempotent() {
    let h = local(with_alice());
    let logouts = Arc::new(AtomicUsize::new(0));
    let counter = logouts.clone();
    h.session.events().logout.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();
    h.session.logout().unwrap();

    assert!(h.session.logged().is_none());
    assert!(h.session.user().is_none());
    assert!(h.store.get(LOGGED_KEY).unwrap().is_none());
    assert!(h.session.account_cache().logged().is_none());

    h.session.logout().unwrap();
    assert_eq!(logouts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transact_requires_login() {
    let h = local(with_alice());
    let err = h
        .session
        .transact(cloud_wallet::blockchain::TransactionRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotAuthenticated));
}

#[tokio::test]
async fn test_reset_drops_memory_state_only() {
    let h = local(with_alice());
    h.session.login(Some(Credentials::new("a@b.com", "jwt"))).await.unwrap();
    h.session.reset();

    assert!(h.session.logged().is_none());
    assert!(h.store.get(LOGGED_KEY).unwrap().is_some());
    assert!(!h.session.version().is_empty());
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let mut config = common::local_config(None, None);
    config.wallet.app_id = String::new();
    let wallet = Arc::new(MockWallet::new());

    let err = CloudSession::builder(config)
        .chain(Arc::new(with_alice()))
        .wallet_connector(Arc::new(MockConnector::new(wallet)))
        .host(Arc::new(MockHost::new("https://app.example/")))
        .build()
        .err()
        .unwrap();
    match err {
        SessionError::Config(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "wallet.app_id");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
