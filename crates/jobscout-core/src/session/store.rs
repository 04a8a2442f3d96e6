use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::auth::validation::{validate_login, validate_registration};
use crate::auth::{AuthGateway, SessionStorage, StorageError};
use crate::cache::CachedData;
use crate::models::{AccessToken, Profile};

/// Derived authentication status. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Token presence not yet checked against the server
    Unknown,
    Anonymous,
    Authenticated(Profile),
}

impl SessionState {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Text to show on the form that triggered the operation.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(ApiError::Network(e)) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            SessionError::Api(ApiError::Network(e)) if e.is_connect() => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SessionError::Api(ApiError::Unauthorized))
    }
}

/// Session state plus the gateway and storage it is derived from.
pub struct SessionStore<G, S> {
    gateway: G,
    storage: S,
    token: Option<AccessToken>,
    /// Restored but not yet verified token
    pending: Option<AccessToken>,
    cached: Option<CachedData<Profile>>,
    state_tx: watch::Sender<SessionState>,
}

impl<G: AuthGateway, S: SessionStorage> SessionStore<G, S> {
    /// Create a store in the `Unknown` state. Nothing is read until `init`.
    pub fn new(gateway: G, storage: S) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unknown);
        Self {
            gateway,
            storage,
            token: None,
            pending: None,
            cached: None,
            state_tx,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// The authoritative profile, if signed in.
    pub fn profile(&self) -> Option<Profile> {
        self.state_tx.borrow().profile().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state_tx.borrow(), SessionState::Authenticated(_))
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    /// Cached profile to paint while the state is still `Unknown`.
    /// Never available once the server has answered.
    pub fn display_profile(&self) -> Option<&Profile> {
        self.cached.as_ref().map(|c| &c.data)
    }

    /// Age of the cached profile, for display next to it.
    pub fn display_profile_age(&self) -> Option<String> {
        self.cached.as_ref().map(CachedData::age_display)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(?state, "Session state changed");
        self.state_tx.send_replace(state);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Read the persisted slots without touching the network.
    ///
    /// Returns true if a token was found; the state then stays `Unknown`
    /// and the cached profile (if fresh) is exposed through
    /// `display_profile` until `verify` settles it. Without a token the
    /// store moves straight to `Anonymous`.
    pub fn restore(&mut self) -> Result<bool, SessionError> {
        let token = match self.storage.load_token() {
            Ok(Some(token)) => token,
            Err(e) => {
                warn!(error = %e, "Unreadable stored token, signing out");
                if let Err(e) = self.storage.clear_all() {
                    warn!(error = %e, "Failed to clear session slots");
                }
                self.set_state(SessionState::Anonymous);
                return Ok(false);
            }
            Ok(None) => {
                debug!("No stored token");
                if let Err(e) = self.storage.clear_profile() {
                    warn!(error = %e, "Failed to clear orphaned profile cache");
                }
                self.set_state(SessionState::Anonymous);
                return Ok(false);
            }
        };

        self.cached = match self.storage.load_profile() {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable profile cache");
                None
            }
        };
        self.pending = Some(token);
        self.set_state(SessionState::Unknown);
        Ok(true)
    }

    /// Check the restored token against the server.
    ///
    /// A rejected token clears both slots and settles on `Anonymous`
    /// without returning an error. Any other failure also leaves the
    /// store `Anonymous` but keeps the persisted slots for the next run.
    pub async fn verify(&mut self) -> Result<SessionState, SessionError> {
        let Some(token) = self.pending.take() else {
            return Ok(self.state());
        };

        let result = self.gateway.fetch_profile(&token).await;
        self.cached = None;

        match result {
            Ok(profile) => {
                self.token = Some(token);
                if let Err(e) = self.storage.save_profile(&profile) {
                    warn!(error = %e, "Failed to refresh profile cache");
                }
                info!(user_id = %profile.id, "Session restored");
                self.set_state(SessionState::Authenticated(profile));
                Ok(self.state())
            }
            Err(ApiError::Unauthorized) => {
                info!("Stored token rejected, signing out");
                self.token = None;
                self.set_state(SessionState::Anonymous);
                self.storage.clear_all()?;
                Ok(self.state())
            }
            Err(e) => {
                warn!(error = %e, "Could not verify stored session");
                self.token = None;
                self.set_state(SessionState::Anonymous);
                Err(e.into())
            }
        }
    }

    /// `restore` followed by `verify`.
    pub async fn init(&mut self) -> Result<SessionState, SessionError> {
        if self.restore()? {
            self.verify().await
        } else {
            Ok(self.state())
        }
    }

    /// Log in and load the profile that goes with the new token.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Profile, SessionError> {
        validate_login(username, password)?;

        let token = self.gateway.login(username, password).await?;
        let profile = match self.gateway.fetch_profile(&token).await {
            Ok(profile) => profile,
            Err(ApiError::Unauthorized) => {
                warn!("Freshly issued token rejected");
                self.token = None;
                self.storage.clear_all()?;
                self.set_state(SessionState::Anonymous);
                return Err(ApiError::Unauthorized.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.storage.save_token(&token)?;
        if let Err(e) = self.storage.save_profile(&profile) {
            warn!(error = %e, "Failed to cache profile");
        }

        self.token = Some(token);
        self.pending = None;
        self.cached = None;
        info!(user_id = %profile.id, "Login successful");
        self.set_state(SessionState::Authenticated(profile.clone()));
        Ok(profile)
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(&mut self, username: &str, password: &str) -> Result<Profile, SessionError> {
        validate_registration(username, password)?;

        let created = self.gateway.register(username, password).await?;
        debug!(user_id = %created.id, "Account created, logging in");
        self.login(username, password).await
    }

    /// Forget the session locally. Never touches the network.
    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.token = None;
        self.pending = None;
        self.cached = None;
        let cleared = self.storage.clear_all();
        self.set_state(SessionState::Anonymous);
        info!("Logged out");
        cleared.map_err(SessionError::from)
    }

    /// React to an `Unauthorized` answer from any authenticated call.
    pub fn handle_unauthorized(&mut self) -> Result<(), SessionError> {
        warn!("Token rejected by server, clearing session");
        self.logout()
    }

    /// Tear the store down. Subscribers observe the channel closing;
    /// persisted slots are left as they are.
    pub fn dispose(self) -> (G, S) {
        debug!("Session store disposed");
        (self.gateway, self.storage)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use super::*;
    use crate::api::Endpoint;
    use crate::auth::{FileStorage, MemoryStorage};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Register(String, String),
        Login(String, String),
        FetchProfile(String),
    }

    /// Gateway double: records every call and answers from canned tables.
    #[derive(Default)]
    struct FakeGateway {
        calls: Mutex<Vec<Call>>,
        users: HashMap<(String, String), (String, Profile)>,
        profiles: HashMap<String, Profile>,
        broken_tokens: Vec<String>,
        taken_usernames: Vec<String>,
    }

    impl FakeGateway {
        fn with_bob() -> Self {
            let mut gateway = Self::default();
            gateway.add_user("bob", "secret1", "tok123", bob());
            gateway
        }

        fn add_user(&mut self, username: &str, password: &str, token: &str, profile: Profile) {
            self.users.insert(
                (username.to_string(), password.to_string()),
                (token.to_string(), profile.clone()),
            );
            self.profiles.insert(token.to_string(), profile);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl AuthGateway for FakeGateway {
        async fn register(&self, username: &str, password: &str) -> Result<Profile, ApiError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(Call::Register(username.to_string(), password.to_string()));
            if self.taken_usernames.iter().any(|u| u == username) {
                return Err(ApiError::validation(Endpoint::Register, "Username already registered"));
            }
            Ok(Profile::new("99", username, "2024-06-01"))
        }

        async fn login(&self, username: &str, password: &str) -> Result<AccessToken, ApiError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(Call::Login(username.to_string(), password.to_string()));
            self.users
                .get(&(username.to_string(), password.to_string()))
                .map(|(token, _)| AccessToken::new(token.clone()))
                .ok_or_else(|| ApiError::Auth("Incorrect username or password".to_string()))
        }

        async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile, ApiError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(Call::FetchProfile(token.as_str().to_string()));
            if self.broken_tokens.iter().any(|t| t == token.as_str()) {
                return Err(ApiError::Server {
                    endpoint: Endpoint::Me,
                    status: 503,
                    detail: "maintenance".to_string(),
                });
            }
            self.profiles
                .get(token.as_str())
                .cloned()
                .ok_or(ApiError::Unauthorized)
        }
    }

    fn bob() -> Profile {
        Profile::new("1", "bob", "2024-01-01")
    }

    fn stored_token<G: AuthGateway, S: SessionStorage>(store: &SessionStore<G, S>) -> Option<String> {
        store
            .storage()
            .load_token()
            .expect("load token")
            .map(|t| t.as_str().to_string())
    }

    #[tokio::test]
    async fn test_login_persists_token_and_profile() {
        let mut store = SessionStore::new(FakeGateway::with_bob(), MemoryStorage::new());

        let profile = store.login("bob", "secret1").await.expect("login");
        assert_eq!(profile, bob());
        assert_eq!(store.state(), SessionState::Authenticated(bob()));
        assert_eq!(stored_token(&store).as_deref(), Some("tok123"));
        assert_eq!(store.token().map(AccessToken::as_str), Some("tok123"));

        let cached = store.storage().load_profile().expect("load").expect("cached");
        assert_eq!(cached.data, bob());
        assert_eq!(
            store.gateway().calls(),
            vec![
                Call::Login("bob".into(), "secret1".into()),
                Call::FetchProfile("tok123".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_login_bad_credentials_leaves_state() {
        let mut store = SessionStore::new(FakeGateway::with_bob(), MemoryStorage::new());
        store.init().await.expect("init");

        let err = store.login("bob", "wrong!").await.unwrap_err();
        assert_eq!(err.user_message(), "Incorrect username or password");
        assert_eq!(store.state(), SessionState::Anonymous);
        assert!(stored_token(&store).is_none());
    }

    #[tokio::test]
    async fn test_login_token_rejected_by_profile_fetch() {
        let mut gateway = FakeGateway::default();
        // Login hands out a token the profile endpoint does not know
        gateway.users.insert(
            ("eve".to_string(), "secret1".to_string()),
            ("ghost".to_string(), bob()),
        );
        let mut store = SessionStore::new(gateway, MemoryStorage::new());

        let err = store.login("eve", "secret1").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(store.state(), SessionState::Anonymous);
        assert!(stored_token(&store).is_none());
    }

    #[tokio::test]
    async fn test_init_without_token_skips_network() {
        let mut store = SessionStore::new(FakeGateway::with_bob(), MemoryStorage::new());
        assert_eq!(store.state(), SessionState::Unknown);

        let state = store.init().await.expect("init");
        assert_eq!(state, SessionState::Anonymous);
        assert!(store.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn test_init_restores_session() {
        let storage = MemoryStorage::with_slots(Some(AccessToken::new("tok123")), None);
        let mut store = SessionStore::new(FakeGateway::with_bob(), storage);

        let state = store.init().await.expect("init");
        assert_eq!(state, SessionState::Authenticated(bob()));
        assert!(store.display_profile().is_none());
        assert!(store.storage().load_profile().expect("load").is_some());
    }

    #[tokio::test]
    async fn test_init_unauthorized_clears_token_and_cache() {
        let storage = MemoryStorage::with_slots(
            Some(AccessToken::new("revoked")),
            Some(CachedData::new(bob())),
        );
        let mut store = SessionStore::new(FakeGateway::with_bob(), storage);

        let state = store.init().await.expect("401 is not an error for init");
        assert_eq!(state, SessionState::Anonymous);
        assert!(stored_token(&store).is_none());
        assert!(store.storage().load_profile().expect("load").is_none());
        assert!(store.display_profile().is_none());
    }

    #[tokio::test]
    async fn test_init_server_error_keeps_token() {
        let mut gateway = FakeGateway::with_bob();
        gateway.broken_tokens.push("tok123".to_string());
        let storage = MemoryStorage::with_slots(Some(AccessToken::new("tok123")), Some(CachedData::new(bob())));
        let mut store = SessionStore::new(gateway, storage);

        let err = store.init().await.unwrap_err();
        assert_eq!(err.user_message(), "maintenance");
        assert_eq!(store.state(), SessionState::Anonymous);
        assert_eq!(stored_token(&store).as_deref(), Some("tok123"));
        assert!(store.storage().load_profile().expect("load").is_some());
    }

    #[test]
    fn test_display_profile_while_unknown() {
        let storage = MemoryStorage::with_slots(Some(AccessToken::new("tok123")), Some(CachedData::new(bob())));
        let mut store = SessionStore::new(FakeGateway::with_bob(), storage);
        let rx = store.subscribe();

        assert!(store.restore().expect("restore"));
        assert_eq!(store.state(), SessionState::Unknown);
        assert_eq!(*rx.borrow(), SessionState::Unknown);
        assert_eq!(store.display_profile(), Some(&bob()));
        assert_eq!(store.display_profile_age().as_deref(), Some("just now"));
        assert!(!store.is_authenticated());
        assert!(store.profile().is_none());
        assert!(store.token().is_none());
        assert!(store.gateway().calls().is_empty());
    }

    #[test]
    fn test_stale_cache_is_not_displayed() {
        let mut stale = CachedData::new(bob());
        stale.cached_at = Utc::now() - Duration::hours(3);
        let storage = MemoryStorage::with_slots(Some(AccessToken::new("tok123")), Some(stale));
        let mut store = SessionStore::new(FakeGateway::with_bob(), storage);

        assert!(store.restore().expect("restore"));
        assert_eq!(store.state(), SessionState::Unknown);
        assert!(store.display_profile().is_none());
    }

    #[tokio::test]
    async fn test_verify_without_restore_is_a_no_op() {
        let mut store = SessionStore::new(FakeGateway::with_bob(), MemoryStorage::new());
        assert_eq!(store.verify().await.expect("verify"), SessionState::Unknown);
        assert!(store.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_dropped_once_server_answers() {
        let storage = MemoryStorage::with_slots(Some(AccessToken::new("tok123")), Some(CachedData::new(bob())));
        let mut store = SessionStore::new(FakeGateway::with_bob(), storage);

        store.init().await.expect("init");
        assert_eq!(store.state(), SessionState::Authenticated(bob()));
        assert!(store.display_profile().is_none());
    }

    #[tokio::test]
    async fn test_init_with_corrupt_token_file_settles_anonymous() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = FileStorage::new(
            dir.path().join("data"),
            dir.path().join("cache"),
            Duration::minutes(30),
        )
        .expect("file storage");
        std::fs::write(dir.path().join("data").join("token.json"), "garbage").expect("write");
        let mut store = SessionStore::new(FakeGateway::with_bob(), storage);

        assert_eq!(store.init().await.expect("first init"), SessionState::Anonymous);
        assert_eq!(store.init().await.expect("second init"), SessionState::Anonymous);
        assert!(!dir.path().join("data").join("token.json").exists());
        assert!(store.gateway().calls().is_empty());

        store.login("bob", "secret1").await.expect("login after recovery");
        assert_eq!(stored_token(&store).as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn test_register_then_login_with_same_credentials() {
        let mut gateway = FakeGateway::default();
        let carol = Profile::new("99", "carol", "2024-06-01");
        gateway.add_user("carol", "hunter22", "tok-carol", carol.clone());
        let mut store = SessionStore::new(gateway, MemoryStorage::new());

        let profile = store.register("carol", "hunter22").await.expect("register");
        assert_eq!(profile, carol);
        assert_eq!(store.state(), SessionState::Authenticated(carol));
        assert_eq!(
            store.gateway().calls(),
            vec![
                Call::Register("carol".into(), "hunter22".into()),
                Call::Login("carol".into(), "hunter22".into()),
                Call::FetchProfile("tok-carol".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_register_rejected_does_not_login() {
        let mut gateway = FakeGateway::with_bob();
        gateway.taken_usernames.push("bob".to_string());
        let mut store = SessionStore::new(gateway, MemoryStorage::new());

        let err = store.register("bob", "secret1").await.unwrap_err();
        assert_eq!(err.user_message(), "Username already registered");
        assert_eq!(store.gateway().calls(), vec![Call::Register("bob".into(), "secret1".into())]);
        assert!(stored_token(&store).is_none());
    }

    #[tokio::test]
    async fn test_client_validation_skips_network() {
        let mut store = SessionStore::new(FakeGateway::with_bob(), MemoryStorage::new());

        let err = store.register("ab", "secret1").await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Validation { .. })));

        let err = store.register("bob", "12345").await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Validation { .. })));

        let err = store.login("", "").await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::Validation { .. })));

        assert!(store.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_everything_offline() {
        let mut store = SessionStore::new(FakeGateway::with_bob(), MemoryStorage::new());
        store.login("bob", "secret1").await.expect("login");
        let calls_before = store.gateway().calls().len();

        store.logout().expect("logout");
        assert_eq!(store.state(), SessionState::Anonymous);
        assert!(store.token().is_none());
        assert!(stored_token(&store).is_none());
        assert!(store.storage().load_profile().expect("load").is_none());
        assert_eq!(store.gateway().calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_and_dispose() {
        let mut store = SessionStore::new(FakeGateway::with_bob(), MemoryStorage::new());
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow(), SessionState::Unknown);

        store.login("bob", "secret1").await.expect("login");
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), SessionState::Authenticated(bob()));

        store.logout().expect("logout");
        assert_eq!(*rx.borrow_and_update(), SessionState::Anonymous);

        let (_gateway, storage) = store.dispose();
        assert!(rx.changed().await.is_err());
        assert!(storage.load_token().expect("load").is_none());
    }
}
