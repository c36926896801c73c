//! Login and transaction lifecycle.
//!
//! # Responsibilities
//! - Dispatch `login` to the configured transport (local, redirect, iframe)
//! - Resolve the account and bind a `User` (wrapped for co-signing when a
//!   resource provider is configured)
//! - Persist the session on every change and restore it on startup
//! - Publish login, logout, progress and transaction events

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;

use crate::accounts::{
    AccountCache, AccountCreation, AccountCreator, AccountNameSuggester, AccountResolver, AccountResult,
    AccountSelector, Credentials, EndpointCreator, NewAccountRequest, ResolvedAccount,
};
use crate::blockchain::{ChainApi, ChainId, RpcChainClient, TransactionRequest};
use crate::config::validation::{validate_config, ValidationError};
use crate::config::{CloudConfig, ConfigError, IframeLoginConfig, LocalLoginConfig, LoginStrategy, RedirectLoginConfig};
use crate::events::ListenerId;
use crate::fuel::FuelUser;
use crate::observability::metrics;
use crate::progress::StepTracker;
use crate::session::host::{
    origin_of, resume_params, with_query, FrameContainer, FrameHandle, FrameMessage, FrameRequest, HostPage,
    LoginMessage,
};
use crate::session::identity::{IdentityController, IdentityWidget};
use crate::session::types::{
    LoggedUser, SessionError, SessionEvents, SessionResult, TransactResponse, LOGGED_KEY, LOGIN_STEPS,
    TRANSACTION_STEPS,
};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::wallet::{ReasonCallback, SignOptions, User, WalletConnector, WalletUser};

#[derive(Default)]
struct SessionState {
    logged: Option<LoggedUser>,
    user: Option<Arc<dyn User>>,
}

#[derive(Default)]
struct FrameState {
    handle: Option<FrameHandle>,
    close_listener: Option<ListenerId>,
}

struct Inner {
    config: CloudConfig,
    chain_id: ChainId,
    chain: Arc<dyn ChainApi>,
    fuel_chain: Option<Arc<dyn ChainApi>>,
    connector: Arc<dyn WalletConnector>,
    host: Arc<dyn HostPage>,
    store: Arc<dyn KeyValueStore>,
    identity: Option<IdentityController>,
    resolver: AccountResolver,
    events: SessionEvents,
    steps: Arc<StepTracker>,
    state: Mutex<SessionState>,
    frame: Mutex<FrameState>,
    reason: Mutex<Option<ReasonCallback>>,
}

/// Builder for [`CloudSession`].
pub struct CloudSessionBuilder {
    config: CloudConfig,
    chain: Option<Arc<dyn ChainApi>>,
    fuel_chain: Option<Arc<dyn ChainApi>>,
    connector: Option<Arc<dyn WalletConnector>>,
    host: Option<Arc<dyn HostPage>>,
    store: Option<Arc<dyn KeyValueStore>>,
    identity: Option<Arc<dyn IdentityWidget>>,
}

impl CloudSessionBuilder {
    /// Chain API; defaults to an RPC client for `chain.rpc_endpoint`.
    pub fn chain(mut self, chain: Arc<dyn ChainApi>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Chain API used by the co-signing wrapper; defaults to `fuel.hyperion_endpoint`.
    pub fn fuel_chain(mut self, chain: Arc<dyn ChainApi>) -> Self {
        self.fuel_chain = Some(chain);
        self
    }

    pub fn wallet_connector(mut self, connector: Arc<dyn WalletConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn host(mut self, host: Arc<dyn HostPage>) -> Self {
        self.host = Some(host);
        self
    }

    /// Persistence backend; defaults to an in-memory store.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn identity_widget(mut self, widget: Arc<dyn IdentityWidget>) -> Self {
        self.identity = Some(widget);
        self
    }

    pub fn build(self) -> SessionResult<CloudSession> {
        let config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;
        let connector = self
            .connector
            .ok_or(SessionError::MissingComponent("wallet connector"))?;
        let host = self
            .host
            .ok_or(SessionError::MissingComponent("host page"))?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);

        let chain: Arc<dyn ChainApi> = match self.chain {
            Some(chain) => chain,
            None => Arc::new(
                RpcChainClient::new(&config.chain.rpc_endpoint, config.chain.rpc_timeout_secs)
                    .map_err(|e| ConfigError::Validation(vec![invalid("chain.rpc_endpoint", e)]))?,
            ),
        };
        let fuel_chain: Option<Arc<dyn ChainApi>> = match (self.fuel_chain, &config.fuel) {
            (Some(chain), _) => Some(chain),
            (None, Some(fuel)) => Some(Arc::new(
                RpcChainClient::new(&fuel.hyperion_endpoint, config.chain.rpc_timeout_secs)
                    .map_err(|e| ConfigError::Validation(vec![invalid("fuel.hyperion_endpoint", e)]))?,
            )),
            (None, None) => None,
        };

        let chain_id = ChainId(config.chain.chain_id.clone());
        let cache = Arc::new(AccountCache::load(store.clone())?);
        let resolver = AccountResolver::new(chain_id.clone(), chain.clone(), cache);

        let events = SessionEvents::new();
        let steps = Arc::new(StepTracker::new(events.progress.clone()));

        let inner = Arc::new(Inner {
            config,
            chain_id,
            chain,
            fuel_chain,
            connector,
            host,
            store,
            identity: self.identity.map(IdentityController::new),
            resolver,
            events,
            steps,
            state: Mutex::new(SessionState::default()),
            frame: Mutex::new(FrameState::default()),
            reason: Mutex::new(None),
        });

        let session = CloudSession { inner };
        session.install_account_creation();
        tracing::info!(
            app_name = %session.inner.config.app_name,
            chain_id = %session.inner.chain_id,
            "Cloud session created"
        );
        Ok(session)
    }
}

fn invalid(field: &str, err: impl std::fmt::Display) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: err.to_string(),
    }
}

/// A wallet session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CloudSession {
    inner: Arc<Inner>,
}

impl CloudSession {
    pub fn builder(config: CloudConfig) -> CloudSessionBuilder {
        CloudSessionBuilder {
            config,
            chain: None,
            fuel_chain: None,
            connector: None,
            host: None,
            store: None,
            identity: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn frame(&self) -> MutexGuard<'_, FrameState> {
        self.inner.frame.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn install_account_creation(&self) {
        let Some(local) = &self.inner.config.login.local else {
            return;
        };
        let creation = if let Some(endpoint) = &local.account_creation_endpoint {
            AccountCreation::Endpoint(EndpointCreator::new(endpoint.clone()))
        } else if let Some(page) = &local.account_creation_redirect {
            AccountCreation::Creator(Arc::new(RedirectAccountCreator {
                host: self.inner.host.clone(),
                store: self.inner.store.clone(),
                page: page.clone(),
            }))
        } else {
            AccountCreation::Disabled
        };
        self.inner.resolver.set_creation(creation);
    }

    // ---- login ----

    /// Log in through the configured transport.
    ///
    /// Redirect logins and widget logins that never receive credentials do
    /// not return.
    pub async fn login(&self, credentials: Option<Credentials>) -> SessionResult<LoggedUser> {
        let strategy = self.inner.config.login_strategy()?;
        tracing::info!(strategy = strategy.name(), "Login requested");

        match strategy {
            LoginStrategy::Local(local) => self.login_local(local, credentials).await,
            LoginStrategy::Redirect(redirect) => self.login_redirect(redirect).await,
            LoginStrategy::Iframe(iframe) => self.login_iframe(iframe).await,
        }
    }

    async fn login_local(&self, local: &LocalLoginConfig, credentials: Option<Credentials>) -> SessionResult<LoggedUser> {
        if let Some(credentials) = credentials {
            if credentials.email.is_empty() {
                return Err(SessionError::InvalidCredentials("email is required".to_string()));
            }
            self.persist_record(&LoggedUser {
                account: credentials.account.clone().unwrap_or_default(),
                email: credentials.email.clone(),
                ..LoggedUser::default()
            })?;
            return self.perform_login(credentials, "local").await;
        }

        let (Some(identity_config), Some(identity)) = (&local.identity, &self.inner.identity) else {
            return Err(ConfigError::MissingIdentityWidget.into());
        };
        identity.init(identity_config).await?;
        let rx = identity.subscribe();
        identity.render_button(identity_config).await?;

        let credentials = identity.next_credentials(rx).await;
        self.perform_login(credentials, "identity").await
    }

    async fn login_redirect(&self, redirect: &RedirectLoginConfig) -> SessionResult<LoggedUser> {
        self.persist_record(&LoggedUser::default())?;
        let callback = redirect
            .callback
            .clone()
            .unwrap_or_else(|| self.inner.host.current_url());
        let target = with_query(&redirect.url, &[("redirect", callback.as_str())]);

        tracing::info!(target_url = %target, "Redirecting to remote login");
        self.inner.host.navigate(&target);
        std::future::pending().await
    }

    async fn login_iframe(&self, iframe: &IframeLoginConfig) -> SessionResult<LoggedUser> {
        let waiter = self.inner.events.login.waiter();
        self.mount_login_frame(iframe);
        match waiter.wait().await {
            Some(logged) => Ok(logged),
            None => std::future::pending().await,
        }
    }

    fn mount_login_frame(&self, iframe: &IframeLoginConfig) {
        let mut frame = self.frame();
        if frame.handle.is_some() {
            tracing::debug!("Login frame already mounted");
            return;
        }

        let origin = origin_of(&self.inner.host.current_url());
        let sync = iframe.sync_with_wallet.to_string();
        let trace = self.inner.config.observability.trace.to_string();
        let url = with_query(
            &iframe.url,
            &[
                ("login", "true"),
                ("origin", origin.as_str()),
                ("sync", sync.as_str()),
                ("trace", trace.as_str()),
            ],
        );
        let container = match (&iframe.container, iframe.modal) {
            (Some(id), false) => FrameContainer::Inline(id.clone()),
            _ => FrameContainer::Modal,
        };

        let handle = self.inner.host.mount_frame(&FrameRequest { url, container });
        frame.handle = Some(handle);
        if frame.close_listener.is_none() {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            frame.close_listener = Some(self.inner.events.login.subscribe(move |_| {
                if let Some(inner) = weak.upgrade() {
                    CloudSession { inner }.close_login_frame();
                }
            }));
        }
        tracing::debug!(frame = handle.0, "Login frame mounted");
    }

    fn close_login_frame(&self) {
        let (handle, listener) = {
            let mut frame = self.frame();
            (frame.handle.take(), frame.close_listener.take())
        };
        if let Some(id) = listener {
            self.inner.events.login.unsubscribe(id);
        }
        if let Some(handle) = handle {
            self.inner.host.remove_frame(handle);
            tracing::debug!(frame = handle.0, "Login frame removed");
        }
    }

    /// Resolve the account for `credentials` and bind a user.
    async fn perform_login(&self, credentials: Credentials, transport: &'static str) -> SessionResult<LoggedUser> {
        if credentials.email.is_empty() {
            return Err(SessionError::InvalidCredentials("email is required".to_string()));
        }
        if let Some(logged) = self.bound_session(&credentials) {
            tracing::debug!(account = %logged.account, "Session already bound");
            return Ok(logged);
        }

        self.inner.steps.reset(LOGIN_STEPS);
        self.inner.steps.advance();

        let result = async {
            let wallet = self.inner.connector.connect(&self.inner.config.wallet.app_id, &credentials.email);
            let resolved = self.inner.resolver.resolve(&credentials, wallet.as_ref()).await?;
            self.inner.steps.advance();

            let logged = self.bind(resolved, &credentials.email, wallet).await?;
            self.inner.steps.advance();
            Ok::<_, SessionError>(logged)
        }
        .await;

        match result {
            Ok(logged) => {
                metrics::record_login(transport);
                self.inner.events.login.emit(&logged);
                Ok(logged)
            }
            Err(e) => {
                tracing::warn!(email = %credentials.email, error = %e, "Login failed");
                self.inner.steps.abort();
                Err(e)
            }
        }
    }

    fn bound_session(&self, credentials: &Credentials) -> Option<LoggedUser> {
        let state = self.state();
        let logged = state.logged.as_ref()?;
        state.user.as_ref()?;
        let same_email = logged.email == credentials.email;
        let same_account = credentials.account.as_ref().map_or(true, |a| *a == logged.account);
        (same_email && same_account).then(|| logged.clone())
    }

    async fn bind(
        &self,
        resolved: ResolvedAccount,
        email: &str,
        wallet: Arc<dyn crate::wallet::WalletProvider>,
    ) -> SessionResult<LoggedUser> {
        let reason = self.inner.reason.lock().unwrap_or_else(|p| p.into_inner()).clone();
        let wallet_user = WalletUser::new(
            resolved.account.clone(),
            resolved.public_key,
            self.inner.chain_id.clone(),
            self.inner.chain.clone(),
            wallet,
        )
        .with_reason_callback(reason);

        let user: Arc<dyn User> = match (&self.inner.config.fuel, &self.inner.fuel_chain) {
            (Some(fuel), Some(fuel_chain)) => Arc::new(
                FuelUser::init(Arc::new(wallet_user), fuel, fuel_chain.clone(), self.inner.steps.clone()).await,
            ),
            _ => Arc::new(wallet_user),
        };

        let logged = LoggedUser {
            account: resolved.account,
            permission: user.permission().to_string(),
            email: email.to_string(),
            keys: user.keys(),
        };
        {
            let mut state = self.state();
            state.logged = Some(logged.clone());
            state.user = Some(user);
        }
        self.persist()?;
        tracing::info!(account = %logged.account, email = %logged.email, "Logged in");
        Ok(logged)
    }

    // ---- frame messages ----

    /// Handle a message posted by a login frame.
    pub async fn handle_frame_message(&self, raw: &str) -> SessionResult<()> {
        match FrameMessage::parse(raw) {
            Some(FrameMessage::Login(message)) => self.frame_login(message).await,
            Some(FrameMessage::Logout) => {
                let Some(iframe) = self.inner.config.synced_iframe() else {
                    tracing::debug!("Ignoring remote logout; wallet sync is off");
                    return Ok(());
                };
                self.logout()?;
                self.mount_login_frame(iframe);
                Ok(())
            }
            None => {
                tracing::warn!(len = raw.len(), "Ignoring unrecognized frame message");
                Ok(())
            }
        }
    }

    async fn frame_login(&self, message: LoginMessage) -> SessionResult<()> {
        if message.email.is_empty() {
            return Err(SessionError::InvalidCredentials("frame login without email".to_string()));
        }
        self.inner.resolver.record_external(&message.email, &message.account)?;

        let wallet = self.inner.connector.connect(&self.inner.config.wallet.app_id, &message.email);
        let resolved = ResolvedAccount {
            account: message.account,
            public_key: message.keys.first().cloned().unwrap_or_default(),
        };
        let mut logged = self.bind(resolved, &message.email, wallet).await?;
        if let Some(permission) = message.permission {
            logged.permission = permission;
        }
        if !message.keys.is_empty() {
            logged.keys = message.keys;
        }
        self.state().logged = Some(logged.clone());
        self.persist()?;

        metrics::record_login("iframe");
        self.inner.events.login.emit(&logged);
        Ok(())
    }

    // ---- resume ----

    /// Restore a persisted or URL-announced session without showing progress.
    ///
    /// With neither and a wallet-synced iframe strategy, mounts the login
    /// frame and returns without waiting.
    pub async fn check_auto_login(&self) -> SessionResult<Option<LoggedUser>> {
        self.restore()?;

        let credentials = match resume_params(&self.inner.host.current_url()) {
            Some((account, email)) => Some(Credentials::new(email, "").with_account(account)),
            None => self
                .state()
                .logged
                .clone()
                .filter(LoggedUser::is_resumable)
                .map(|logged| Credentials::new(logged.email, "").with_account(logged.account)),
        };

        match credentials {
            Some(credentials) => {
                self.inner.steps.set_reporting(false);
                let result = self.perform_login(credentials, "resume").await;
                self.inner.steps.set_reporting(true);
                result.map(Some)
            }
            None => {
                if let Some(iframe) = self.inner.config.synced_iframe() {
                    self.mount_login_frame(iframe);
                }
                Ok(None)
            }
        }
    }

    fn restore(&self) -> SessionResult<()> {
        if self.state().user.is_some() {
            return Ok(());
        }
        let Some(raw) = self.inner.store.get(LOGGED_KEY)? else {
            return Ok(());
        };
        match serde_json::from_str::<LoggedUser>(&raw) {
            Ok(logged) => self.state().logged = Some(logged),
            Err(e) => tracing::warn!(error = %e, "Discarding unreadable session"),
        }
        Ok(())
    }

    // ---- logout ----

    /// Clear the session. Safe to call when logged out.
    pub fn logout(&self) -> SessionResult<()> {
        let previous = {
            let mut state = self.state();
            state.user = None;
            state.logged.take()
        };
        self.persist()?;

        let cache = self.inner.resolver.cache();
        cache.set_logged(None);
        cache.save()?;
        if let Some(identity) = &self.inner.identity {
            identity.logout();
        }

        tracing::info!(account = ?previous.map(|l| l.account), "Logged out");
        self.inner.events.logout.emit(&());
        Ok(())
    }

    // ---- transactions ----

    /// Sign and broadcast `request` as the bound user.
    pub async fn transact(&self, request: TransactionRequest) -> SessionResult<TransactResponse> {
        let user = self.state().user.clone().ok_or(SessionError::NotAuthenticated)?;
        self.inner.steps.reset(TRANSACTION_STEPS);

        let result = user.sign_transaction(request, SignOptions::broadcast()).await;
        metrics::record_transaction(result.is_ok());
        let response = match result {
            Ok(response) => TransactResponse::from(response),
            Err(e) => {
                tracing::warn!(account = %user.account_name(), error = %e, "Transaction failed");
                self.inner.steps.abort();
                return Err(e.into());
            }
        };

        if !self.inner.steps.is_complete() {
            self.inner.steps.abort();
        }
        self.persist()?;
        tracing::info!(
            account = %user.account_name(),
            transaction_id = %response.transaction_id,
            "Transaction sent"
        );
        self.inner.events.transaction.emit(&response);
        Ok(response)
    }

    // ---- persistence ----

    fn persist(&self) -> SessionResult<()> {
        let logged = self.state().logged.clone();
        match logged {
            Some(logged) => self.persist_record(&logged),
            None => Ok(self.inner.store.remove(LOGGED_KEY)?),
        }
    }

    fn persist_record(&self, logged: &LoggedUser) -> SessionResult<()> {
        let raw = serde_json::to_string(logged).map_err(crate::storage::StorageError::from)?;
        self.inner.store.set(LOGGED_KEY, &raw)?;
        Ok(())
    }

    // ---- accessors ----

    pub fn logged(&self) -> Option<LoggedUser> {
        self.state().logged.clone()
    }

    /// The bound signing capability.
    pub fn user(&self) -> Option<Arc<dyn User>> {
        self.state().user.clone()
    }

    pub fn user_account(&self) -> Option<String> {
        self.state().logged.as_ref().map(|l| l.account.clone())
    }

    pub fn pub_keys(&self) -> Vec<String> {
        self.state().logged.as_ref().map(|l| l.keys.clone()).unwrap_or_default()
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn config(&self) -> &CloudConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    pub fn steps(&self) -> &Arc<StepTracker> {
        &self.inner.steps
    }

    pub fn account_cache(&self) -> &Arc<AccountCache> {
        self.inner.resolver.cache()
    }

    /// Selector for the next login that finds several accounts.
    pub fn set_account_selector(&self, selector: Arc<dyn AccountSelector>) {
        self.inner.resolver.set_account_selector(selector);
    }

    /// Name suggester for accounts created on login.
    pub fn set_account_name_selector(&self, suggester: Arc<dyn AccountNameSuggester>) {
        self.inner.resolver.set_name_suggester(suggester);
    }

    /// Reason shown by the wallet; applies to users bound afterwards.
    pub fn set_reason_callback(&self, reason: Option<ReasonCallback>) {
        *self.inner.reason.lock().unwrap_or_else(|p| p.into_inner()) = reason;
    }

    /// Drop in-memory state. Persisted data is untouched.
    pub fn reset(&self) {
        *self.state() = SessionState::default();
        self.close_login_frame();
        if let Some(identity) = &self.inner.identity {
            identity.reset();
        }
        self.inner.steps.reset(0);
        self.inner.steps.set_reporting(true);
        tracing::debug!("Session reset");
    }
}

impl std::fmt::Debug for CloudSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudSession")
            .field("chain_id", &self.inner.chain_id)
            .field("logged", &self.logged())
            .finish()
    }
}

/// Creates accounts by sending the user to an account-creation page that
/// redirects back with `account` and `email` parameters.
pub struct RedirectAccountCreator {
    host: Arc<dyn HostPage>,
    store: Arc<dyn KeyValueStore>,
    page: String,
}

#[async_trait]
impl AccountCreator for RedirectAccountCreator {
    async fn create_account(&self, request: &NewAccountRequest, _suggested_name: Option<&str>) -> AccountResult<String> {
        let empty = serde_json::to_string(&LoggedUser::default()).map_err(crate::storage::StorageError::from)?;
        self.store.set(LOGGED_KEY, &empty)?;

        let back = self.host.current_url();
        let target = with_query(&self.page, &[("redirect", back.as_str())]);
        tracing::info!(email = %request.email, target_url = %target, "Redirecting to account creation");
        self.host.navigate(&target);
        std::future::pending().await
    }
}
