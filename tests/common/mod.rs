//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use cloud_wallet::blockchain::types::{Abi, ChainInfo, Processed, PushResponse, Receipt};
use cloud_wallet::blockchain::{ChainApi, ChainError, ChainResult, PackedTransaction};
use cloud_wallet::config::loader::parse_config;
use cloud_wallet::config::CloudConfig;
use cloud_wallet::session::{FrameHandle, FrameRequest, HostPage};
use cloud_wallet::wallet::{SigningRequest, WalletAddresses, WalletConnector, WalletError, WalletProvider};

pub const CHAIN_ID: &str = "X";
pub const WALLET_KEY: &str = "EOS6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";
pub const WALLET_SIG: &str = "SIG_K1_wallet";
pub const PROVIDER_SIG: &str = "SIG_K1_provider";

/// A request seen by a programmable backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Start a programmable mock backend on an ephemeral port.
///
/// The handler sees every request and returns `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            402 => "402 Payment Required",
                            404 => "404 Not Found",
                            409 => "409 Conflict",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(MockRequest { method, path, body })
}

/// Resource provider answering the probe with 200 and co-sign requests with `code`.
pub async fn start_resource_provider(code: u16, seen: Arc<Mutex<Vec<MockRequest>>>) -> SocketAddr {
    start_programmable_backend(move |request: MockRequest| {
        let seen = seen.clone();
        async move {
            if request.method == "GET" {
                return (200, "{}".to_string());
            }
            let body = cosign_response(code, &request.body);
            seen.lock().unwrap().push(request);
            (code, body)
        }
    })
    .await
}

/// Granting answer: a provider no-op first, then a fee transfer for 402.
fn cosign_response(code: u16, request_body: &str) -> String {
    if code != 200 && code != 402 {
        return serde_json::json!({ "code": code }).to_string();
    }
    let submitted: serde_json::Value = serde_json::from_str(request_body).unwrap();
    let actor = submitted["signer"]["actor"].as_str().unwrap_or_default().to_string();
    let mut actions = vec![serde_json::json!({
        "account": "eosio",
        "name": "noop",
        "authorization": [{ "actor": "fuelprovider", "permission": "cosign" }],
        "data": ""
    })];
    if code == 402 {
        actions.push(serde_json::json!({
            "account": "eosio.token",
            "name": "transfer",
            "authorization": [{ "actor": actor, "permission": "active" }],
            "data": "00"
        }));
    }
    serde_json::json!({
        "code": code,
        "data": {
            "request": ["transaction", {
                "expiration": "2024-01-01T01:00:00",
                "ref_block_num": 100,
                "ref_block_prefix": 67305985,
                "max_net_usage_words": 0,
                "max_cpu_usage_ms": 0,
                "delay_sec": 0,
                "context_free_actions": [],
                "actions": actions,
                "transaction_extensions": [{ "type": 1, "data": "abcd" }],
                "signatures": [],
                "context_free_data": []
            }],
            "signatures": [PROVIDER_SIG]
        }
    })
    .to_string()
}

/// In-memory chain with call counters.
pub struct MockChain {
    pub key_accounts: Mutex<HashMap<String, Vec<String>>>,
    pub abis: HashMap<String, Abi>,
    pub pushed: Mutex<Vec<PackedTransaction>>,
    pub get_info_calls: AtomicUsize,
    pub get_abi_calls: AtomicUsize,
    pub key_account_calls: AtomicUsize,
    pub fail_push: AtomicBool,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            key_accounts: Mutex::new(HashMap::new()),
            abis: HashMap::new(),
            pushed: Mutex::new(Vec::new()),
            get_info_calls: AtomicUsize::new(0),
            get_abi_calls: AtomicUsize::new(0),
            key_account_calls: AtomicUsize::new(0),
            fail_push: AtomicBool::new(false),
        }
    }

    pub fn with_accounts(self, key: &str, accounts: &[&str]) -> Self {
        self.key_accounts
            .lock()
            .unwrap()
            .insert(key.to_string(), accounts.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn network_calls(&self) -> usize {
        self.get_info_calls.load(Ordering::SeqCst)
            + self.get_abi_calls.load(Ordering::SeqCst)
            + self.key_account_calls.load(Ordering::SeqCst)
            + self.pushed.lock().unwrap().len()
    }

    pub fn last_pushed(&self) -> Option<PackedTransaction> {
        self.pushed.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChainApi for MockChain {
    async fn get_info(&self) -> ChainResult<ChainInfo> {
        self.get_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChainInfo {
            chain_id: CHAIN_ID.to_string(),
            head_block_num: 1000,
            head_block_time: "2024-01-01T00:00:00.000".to_string(),
            last_irreversible_block_num: 990,
            last_irreversible_block_id: format!("{}{}", "00000000000003de0102030405060708", "0".repeat(32)),
        })
    }

    async fn get_abi(&self, account: &str) -> ChainResult<Option<Abi>> {
        self.get_abi_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.abis.get(account).cloned())
    }

    async fn push_transaction(&self, trx: &PackedTransaction) -> ChainResult<PushResponse> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(ChainError::Http {
                path: "/v1/chain/push_transaction".to_string(),
                status: 500,
                body: "{}".to_string(),
            });
        }
        let mut pushed = self.pushed.lock().unwrap();
        pushed.push(trx.clone());
        Ok(PushResponse {
            transaction_id: format!("trx{}", pushed.len()),
            processed: Processed {
                receipt: Some(Receipt {
                    status: "executed".to_string(),
                }),
            },
        })
    }

    async fn get_key_accounts(&self, public_key: &str) -> ChainResult<Vec<String>> {
        self.key_account_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.key_accounts.lock().unwrap().get(public_key).cloned().unwrap_or_default())
    }
}

/// Wallet that signs everything with a fixed signature.
pub struct MockWallet {
    pub deny: AtomicBool,
    /// Sign with an empty signature string.
    pub blank: AtomicBool,
    pub get_wallet_calls: AtomicUsize,
    pub reasons: Mutex<Vec<String>>,
    pub signed: Mutex<Vec<SigningRequest>>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            deny: AtomicBool::new(false),
            blank: AtomicBool::new(false),
            get_wallet_calls: AtomicUsize::new(0),
            reasons: Mutex::new(Vec::new()),
            signed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn get_wallet(&self) -> Result<WalletAddresses, WalletError> {
        self.get_wallet_calls.fetch_add(1, Ordering::SeqCst);
        Ok(WalletAddresses {
            eos_address: WALLET_KEY.to_string(),
            sol_address: String::new(),
            eth_address: String::new(),
        })
    }

    async fn sign_transaction(&self, request: &SigningRequest, reason: &str) -> Result<String, WalletError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(WalletError::Denied);
        }
        self.reasons.lock().unwrap().push(reason.to_string());
        self.signed.lock().unwrap().push(request.clone());
        if self.blank.load(Ordering::SeqCst) {
            return Ok(String::new());
        }
        Ok(WALLET_SIG.to_string())
    }
}

/// Hands out the same wallet for every user.
pub struct MockConnector {
    pub wallet: Arc<MockWallet>,
    pub connects: Mutex<Vec<(String, String)>>,
}

impl MockConnector {
    pub fn new(wallet: Arc<MockWallet>) -> Self {
        Self {
            wallet,
            connects: Mutex::new(Vec::new()),
        }
    }
}

impl WalletConnector for MockConnector {
    fn connect(&self, app_id: &str, email: &str) -> Arc<dyn WalletProvider> {
        self.connects
            .lock()
            .unwrap()
            .push((app_id.to_string(), email.to_string()));
        self.wallet.clone()
    }
}

/// Host page recording navigations and frames.
pub struct MockHost {
    pub url: Mutex<String>,
    pub navigations: Mutex<Vec<String>>,
    pub mounted: Mutex<Vec<(FrameHandle, FrameRequest)>>,
    pub removed: Mutex<Vec<FrameHandle>>,
    next: AtomicU64,
}

impl MockHost {
    pub fn new(url: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            navigations: Mutex::new(Vec::new()),
            mounted: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            next: AtomicU64::new(1),
        }
    }
}

impl HostPage for MockHost {
    fn current_url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn navigate(&self, url: &str) {
        self.navigations.lock().unwrap().push(url.to_string());
    }

    fn mount_frame(&self, request: &FrameRequest) -> FrameHandle {
        let handle = FrameHandle(self.next.fetch_add(1, Ordering::SeqCst));
        self.mounted.lock().unwrap().push((handle, request.clone()));
        handle
    }

    fn remove_frame(&self, handle: FrameHandle) {
        self.removed.lock().unwrap().push(handle);
    }
}

/// Parse a TOML config, panicking on errors.
pub fn config(toml: &str) -> CloudConfig {
    parse_config(toml).unwrap()
}

/// Local-login config pointing at the given provider and creation endpoint.
pub fn local_config(fuel: Option<SocketAddr>, creation: Option<&str>) -> CloudConfig {
    let mut text = format!(
        r#"
[chain]
chain_id = "{}"
rpc_endpoint = "https://h:443"

[wallet]
app_id = "app-1"

[login.local]
"#,
        CHAIN_ID
    );
    if let Some(endpoint) = creation {
        text.push_str(&format!("account_creation_endpoint = \"{}\"\n", endpoint));
    }
    if let Some(addr) = fuel {
        text.push_str(&format!(
            "\n[fuel]\nrpc_endpoint = \"http://{}\"\nhyperion_endpoint = \"https://h:443\"\n",
            addr
        ));
    }
    config(&text)
}
