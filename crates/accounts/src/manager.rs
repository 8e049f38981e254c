//! The user account manager.

use std::sync::Arc;

use account_store::{AccountStore, AsciicastFilter, StoreError};
use chrono::{Duration, Utc};
use entities::{
    validate_email, validate_username, ApiToken, Asciicast, ExpiringToken, Identity, NewUser, Page,
    Theme, TokenKind, User, UserId, ValidationError,
};
use tracing::{debug, info, warn};

use crate::{
    AccountError, AccountResult, AccountsConfig, BuiltinThemes, ThemeLookup, TokenGenerator,
    UrlSafeTokenGenerator,
};

/// Profile fields supplied when registering a new user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub email: Option<String>,
    pub username: Option<String>,
    pub temporary_username: Option<String>,
    pub theme_name: Option<String>,
}

impl Registration {
    /// Creates a registration for an email address.
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Sets the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the theme name.
    pub fn theme_name(mut self, theme_name: impl Into<String>) -> Self {
        self.theme_name = Some(theme_name.into());
        self
    }
}

/// Manages users and the records they own on top of an [`AccountStore`].
///
/// The manager holds no per-request state and can be shared behind an `Arc`.
#[derive(Clone)]
pub struct AccountManager {
    store: Arc<dyn AccountStore>,
    tokens: Arc<dyn TokenGenerator>,
    themes: Arc<dyn ThemeLookup>,
    config: AccountsConfig,
}

impl AccountManager {
    /// Creates a manager from its collaborators.
    pub fn new(
        store: Arc<dyn AccountStore>,
        tokens: Arc<dyn TokenGenerator>,
        themes: Arc<dyn ThemeLookup>,
        config: AccountsConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            themes,
            config,
        }
    }

    /// Creates a manager using random URL-safe tokens and the built-in themes.
    pub fn with_defaults(store: Arc<dyn AccountStore>, config: AccountsConfig) -> Self {
        let tokens = Arc::new(UrlSafeTokenGenerator::new(config.token_bytes));
        Self::new(store, tokens, Arc::new(BuiltinThemes), config)
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Returns the token generator.
    pub fn tokens(&self) -> &Arc<dyn TokenGenerator> {
        &self.tokens
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_token_attempts.max(1)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Returns the user owning `email`, creating one if none exists.
    ///
    /// The email is trimmed before use. A missing, blank or malformed email
    /// fails with [`AccountError::InvalidEmail`], as does losing a race to
    /// another writer creating the same email.
    pub async fn lookup_or_create_by_email(&self, email: Option<&str>) -> AccountResult<User> {
        let email = email.map(str::trim).unwrap_or_default();
        validate_email(email).map_err(|e| AccountError::InvalidEmail(e.to_string()))?;

        if let Some(user) = self.store.find_user_by_email(email).await? {
            debug!(user_id = user.id, "Found user by email");
            return Ok(user);
        }

        let new_user = NewUser::new(
            self.issue_unique_token(TokenKind::Auth).await?,
            self.issue_unique_token(TokenKind::Feed).await?,
        )
        .with_email(email);

        match self.insert_user(new_user).await {
            Ok(user) => {
                info!(user_id = user.id, "Created user from email");
                Ok(user)
            }
            Err(err) if err.conflicting_field() == Some("email") => Err(
                AccountError::InvalidEmail(format!("{email} has already been taken")),
            ),
            Err(err) => Err(err),
        }
    }

    /// Returns the user with exactly this username.
    pub async fn lookup_by_username(&self, username: &str) -> AccountResult<User> {
        self.store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AccountError::not_found("User", username))
    }

    /// Returns the owner of an active API token.
    ///
    /// Missing or blank tokens never reach the store.
    pub async fn lookup_by_api_token(&self, token: Option<&str>) -> AccountResult<Option<User>> {
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(self.store.find_user_by_api_token(token).await?)
    }

    /// Returns the user holding an auth token.
    pub async fn lookup_by_auth_token(&self, auth_token: &str) -> AccountResult<Option<User>> {
        if auth_token.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_user_by_auth_token(auth_token).await?)
    }

    /// Resolves the requester behind an optional auth token.
    ///
    /// Unknown or missing tokens resolve to the anonymous identity.
    pub async fn identify(&self, auth_token: Option<&str>) -> AccountResult<Identity> {
        let user = match auth_token {
            Some(token) => self.lookup_by_auth_token(token).await?,
            None => None,
        };
        Ok(Identity::from_lookup(user))
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Generates a token of `kind` that no user currently holds.
    pub async fn issue_unique_token(&self, kind: TokenKind) -> AccountResult<String> {
        let attempts = self.max_attempts();
        for attempt in 1..=attempts {
            let candidate = self.tokens.generate();
            if !self.store.token_in_use(kind, &candidate).await? {
                return Ok(candidate);
            }
            debug!(%kind, attempt, "Generated token already in use, retrying");
        }

        warn!(%kind, attempts, "Token generation exhausted");
        Err(AccountError::TokenExhausted { kind, attempts })
    }

    /// Inserts a user, regenerating any token another writer claimed first.
    async fn insert_user(&self, mut new_user: NewUser) -> AccountResult<User> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.store.create_user(new_user.clone()).await {
                Ok(user) => return Ok(user),
                Err(err) => err,
            };

            let Some(kind) = err.conflicting_field().and_then(TokenKind::from_column) else {
                return Err(err.into());
            };
            if attempts >= self.max_attempts() {
                warn!(%kind, attempts, "Token kept colliding on insert");
                return Err(AccountError::TokenExhausted { kind, attempts });
            }

            debug!(%kind, attempt = attempts, "Token taken at insert, regenerating");
            let token = self.issue_unique_token(kind).await?;
            match kind {
                TokenKind::Auth => new_user.auth_token = token,
                TokenKind::Feed => new_user.feed_token = token,
            }
        }
    }

    /// Gives `user` the API token `token`, taking it over from its previous
    /// owner if it is already registered.
    pub async fn assign_api_token(&self, user: &User, token: &str) -> AccountResult<ApiToken> {
        if token.trim().is_empty() {
            return Err(ValidationError::new("token", "can't be blank").into());
        }

        if let Some(existing) = self.store.find_api_token(token).await? {
            return self.take_over_api_token(user, existing).await;
        }

        match self.store.create_api_token(user.id, token).await {
            Ok(api_token) => {
                info!(user_id = user.id, token_id = api_token.id, "Created API token");
                Ok(api_token)
            }
            // Registered concurrently by someone else
            Err(err) if err.conflicting_field() == Some("token") => {
                let existing = self
                    .store
                    .find_api_token(token)
                    .await?
                    .ok_or(AccountError::Store(err))?;
                self.take_over_api_token(user, existing).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn take_over_api_token(
        &self,
        user: &User,
        existing: ApiToken,
    ) -> AccountResult<ApiToken> {
        if existing.user_id == user.id {
            return Ok(existing);
        }
        let previous_owner = existing.user_id;
        let api_token = self.store.reassign_api_token(existing.id, user.id).await?;
        info!(
            token_id = api_token.id,
            from = previous_owner,
            to = user.id,
            "Reassigned API token"
        );
        Ok(api_token)
    }

    /// Revokes one of the user's API tokens.
    pub async fn revoke_api_token(&self, user: &User, token: &str) -> AccountResult<ApiToken> {
        let api_token = self
            .store
            .find_api_token(token)
            .await?
            .filter(|t| t.user_id == user.id)
            .ok_or_else(|| AccountError::not_found("ApiToken", token))?;

        let revoked = self.store.revoke_api_token(api_token.id).await?;
        info!(user_id = user.id, token_id = revoked.id, "Revoked API token");
        Ok(revoked)
    }

    /// Issues a single-use login token valid for `ttl`.
    pub async fn issue_login_token(
        &self,
        user: &User,
        ttl: Duration,
    ) -> AccountResult<ExpiringToken> {
        let expires_at = Utc::now() + ttl;
        let attempts = self.max_attempts();
        for attempt in 1..=attempts {
            let token = self.tokens.generate();
            match self
                .store
                .create_expiring_token(user.id, &token, expires_at)
                .await
            {
                Ok(login_token) => {
                    debug!(user_id = user.id, %expires_at, "Issued login token");
                    return Ok(login_token);
                }
                Err(err) if err.conflicting_field() == Some("token") => {
                    debug!(attempt, "Login token already in use, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(attempts, "Login token generation exhausted");
        Err(AccountError::TokenExhausted {
            kind: TokenKind::Auth,
            attempts,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Registers a new user with a validated profile and fresh tokens.
    pub async fn register(&self, registration: Registration) -> AccountResult<User> {
        let email = registration.email.as_deref().map(str::trim);
        let username = registration.username.as_deref().map(str::trim);
        self.validate_profile(None, username, email, registration.theme_name.as_deref())
            .await?;

        let mut new_user = NewUser::new(
            self.issue_unique_token(TokenKind::Auth).await?,
            self.issue_unique_token(TokenKind::Feed).await?,
        );
        new_user.email = email.map(str::to_string);
        new_user.username = username.map(str::to_string);
        new_user.temporary_username = registration.temporary_username;
        new_user.theme_name = registration.theme_name;

        let user = self.insert_user(new_user).await.map_err(profile_conflict)?;
        info!(user_id = user.id, "Registered user");
        Ok(user)
    }

    /// Validates and persists the user's profile fields.
    pub async fn save_user(&self, user: &User) -> AccountResult<User> {
        self.validate_profile(
            Some(user.id),
            user.username.as_deref(),
            user.email.as_deref(),
            user.theme_name.as_deref(),
        )
        .await?;

        let saved = self
            .store
            .update_user(user)
            .await
            .map_err(|e| profile_conflict(e.into()))?;
        debug!(user_id = saved.id, "Saved user");
        Ok(saved)
    }

    async fn validate_profile(
        &self,
        id: Option<UserId>,
        username: Option<&str>,
        email: Option<&str>,
        theme_name: Option<&str>,
    ) -> AccountResult<()> {
        let is_other = |other: &User| Some(other.id) != id;

        if let Some(username) = username {
            validate_username(username)?;
            if let Some(other) = self.store.find_user_by_username_ignore_case(username).await? {
                if is_other(&other) {
                    return Err(ValidationError::new("username", "has already been taken").into());
                }
            }
        }

        if let Some(email) = email {
            validate_email(email)?;
            if let Some(other) = self.store.find_user_by_email(email).await? {
                if is_other(&other) {
                    return Err(AccountError::InvalidEmail(format!(
                        "{email} has already been taken"
                    )));
                }
            }
        }

        if let Some(theme_name) = theme_name {
            if self.themes.find(theme_name).is_none() {
                return Err(ValidationError::new("theme_name", "is not a known theme").into());
            }
        }

        Ok(())
    }

    /// Moves `source`'s asciicasts and API tokens to `target`, then deletes
    /// `source`. Either everything happens or nothing does.
    pub async fn merge_into(&self, source: &User, target: &User) -> AccountResult<()> {
        if source.id == target.id {
            return Err(AccountError::SelfMerge);
        }
        self.store.merge_users(source.id, target.id).await?;
        info!(source = source.id, target = target.id, "Merged user into target");
        Ok(())
    }

    /// Deletes a user together with everything it owns.
    pub async fn delete_user(&self, user: &User) -> AccountResult<()> {
        self.store.delete_user(user.id).await?;
        info!(user_id = user.id, "Deleted user");
        Ok(())
    }

    // =========================================================================
    // Profile queries
    // =========================================================================

    /// Resolves the user's selected theme.
    pub fn theme(&self, user: &User) -> Option<Theme> {
        user.theme_name
            .as_deref()
            .and_then(|name| self.themes.find(name))
    }

    /// Whether the user is a configured administrator.
    pub fn is_admin(&self, user: &User) -> bool {
        self.config.admin_ids.contains(&user.id)
    }

    /// Whether exactly one login token has ever been issued to the user.
    pub async fn is_first_login(&self, user: &User) -> AccountResult<bool> {
        Ok(self.store.count_expiring_tokens(user.id).await? == 1)
    }

    // =========================================================================
    // Asciicast queries
    // =========================================================================

    /// Counts the user's public asciicasts.
    pub async fn public_asciicast_count(&self, user: &User) -> AccountResult<u64> {
        Ok(self.store.count_asciicasts(user.id, false).await?)
    }

    /// Counts every asciicast the user owns.
    pub async fn asciicast_count(&self, user: &User) -> AccountResult<u64> {
        Ok(self.store.count_asciicasts(user.id, true).await?)
    }

    /// Returns up to `limit` random public asciicasts of the user, other
    /// than `current`.
    pub async fn other_asciicasts(
        &self,
        user: &User,
        current: &Asciicast,
        limit: u32,
    ) -> AccountResult<Vec<Asciicast>> {
        Ok(self
            .store
            .sample_public_asciicasts(user.id, current.id, limit)
            .await?)
    }

    /// Returns one page of the user's asciicasts, newest first.
    ///
    /// Pages are 1-based. Zero for `page` or `per_page` is treated as 1.
    pub async fn paged_asciicasts(
        &self,
        user: &User,
        page: u32,
        per_page: u32,
        include_private: bool,
    ) -> AccountResult<Page<Asciicast>> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let total = self.store.count_asciicasts(user.id, include_private).await?;
        let filter = AsciicastFilter::new()
            .with_private(include_private)
            .with_page((page - 1).saturating_mul(per_page), per_page);
        let items = self.store.list_asciicasts(user.id, filter).await?;

        Ok(Page {
            items,
            page,
            per_page,
            total,
        })
    }
}

/// Maps store conflicts on profile columns to the errors callers expect.
fn profile_conflict(err: AccountError) -> AccountError {
    match &err {
        AccountError::Store(StoreError::UniqueViolation { field: "email", .. }) => {
            AccountError::InvalidEmail("email has already been taken".to_string())
        }
        AccountError::Store(StoreError::UniqueViolation {
            field: "username", ..
        }) => ValidationError::new("username", "has already been taken").into(),
        _ => err,
    }
}
