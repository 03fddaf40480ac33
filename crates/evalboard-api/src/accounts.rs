//! In-memory user registry and token grants.

use std::collections::HashMap;
use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use evalboard_types::{PasswordChange, PasswordReset, ProfileUpdate, RegisterRequest, TokenPair, User};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
pub const MAX_NAME_LEN: usize = 100;

struct Account {
    user: User,
    password_hash: String,
}

struct AccessGrant {
    user_id: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

struct RefreshGrant {
    user_id: String,
    access_token: String,
}

#[derive(Default)]
struct Registry {
    accounts: HashMap<String, Account>,
    access: HashMap<String, AccessGrant>,
    refresh: HashMap<String, RefreshGrant>,
    reset_tokens: HashMap<String, String>,
    verification_tokens: HashMap<String, String>,
}

impl Registry {
    fn find_by_email(&self, email: &str) -> Option<&Account> {
        let email = email.trim().to_lowercase();
        self.accounts.values().find(|a| a.user.email == email)
    }

    fn username_taken(&self, username: &str, except: Option<&str>) -> bool {
        self.accounts
            .values()
            .any(|a| a.user.username == username && Some(a.user.id.as_str()) != except)
    }

    fn account_mut(&mut self, userId: &str) -> ApiResult<&mut Account> {
        self.accounts
            .get_mut(userId)
            .ok_or_else(|| ApiError::NotFound("User not found".into()))
    }

    fn drop_user_grants(&mut self, userId: &str) {
        self.access.retain(|_, g| g.user_id != userId);
        self.refresh.retain(|_, g| g.user_id != userId);
    }
}

pub struct Accounts {
    registry: RwLock<Registry>,
    access_ttl: Duration,
}

impl Accounts {
    pub fn new(accessTtl: Duration) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            access_ttl: accessTtl,
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl.as_secs()
    }

    pub fn register(&self, form: &RegisterRequest) -> ApiResult<User> {
        if form.password != form.confirm_password {
            return Err(ApiError::Unprocessable("Passwords do not match".into()));
        }
        if form.full_name.as_ref().is_some_and(|n| n.len() > MAX_NAME_LEN)
            || form.organization.as_ref().is_some_and(|n| n.len() > MAX_NAME_LEN)
        {
            return Err(ApiError::Unprocessable(format!(
                "Names must be at most {MAX_NAME_LEN} characters"
            )));
        }
        let user = self.create_user(&form.username, &form.email, &form.password, false)?;
        self.update_profile(
            &user.id,
            &ProfileUpdate {
                username: None,
                full_name: form.full_name.clone(),
                organization: form.organization.clone(),
            },
        )
    }

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        verified: bool,
    ) -> ApiResult<User> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        validate_username(username)?;
        validate_email(&email)?;
        validate_password(password)?;

        let passwordHash = hash_password(password)?;

        let mut registry = self.registry.write();
        if registry.find_by_email(&email).is_some() {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        if registry.username_taken(username, None) {
            return Err(ApiError::Conflict("Username already taken".into()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email,
            full_name: None,
            organization: None,
            is_active: true,
            is_verified: verified,
            created_at: Utc::now(),
            updated_at: None,
            last_login: None,
        };
        registry.accounts.insert(
            user.id.clone(),
            Account {
                user: user.clone(),
                password_hash: passwordHash,
            },
        );
        info!("created user {} <{}>", user.username, user.email);
        Ok(user)
    }

    pub fn authenticate(&self, email: &str, password: &str) -> ApiResult<User> {
        let mut registry = self.registry.write();
        let userId = match registry.find_by_email(email) {
            Some(account) if verify_password(password, &account.password_hash) => {
                account.user.id.clone()
            }
            _ => return Err(ApiError::invalid_credentials()),
        };
        let account = registry.account_mut(&userId)?;
        if !account.user.is_active {
            return Err(ApiError::BadRequest("Inactive user".into()));
        }
        account.user.last_login = Some(Utc::now());
        Ok(account.user.clone())
    }

    pub fn issue_tokens(&self, userId: &str) -> TokenPair {
        let tokens = TokenPair {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
        };
        let expiresAt = Utc::now()
            + chrono::Duration::from_std(self.access_ttl).unwrap_or(chrono::Duration::zero());

        let mut registry = self.registry.write();
        registry.access.insert(
            tokens.access_token.clone(),
            AccessGrant {
                user_id: userId.to_string(),
                refresh_token: tokens.refresh_token.clone(),
                expires_at: expiresAt,
            },
        );
        registry.refresh.insert(
            tokens.refresh_token.clone(),
            RefreshGrant {
                user_id: userId.to_string(),
                access_token: tokens.access_token.clone(),
            },
        );
        tokens
    }

    pub fn user_for_token(&self, accessToken: &str) -> ApiResult<User> {
        let registry = self.registry.read();
        let grant = registry
            .access
            .get(accessToken)
            .ok_or_else(ApiError::invalid_token)?;
        if grant.expires_at <= Utc::now() {
            debug!("rejected expired access token");
            return Err(ApiError::invalid_token());
        }
        registry
            .accounts
            .get(&grant.user_id)
            .filter(|a| a.user.is_active)
            .map(|a| a.user.clone())
            .ok_or_else(ApiError::invalid_token)
    }

    /// Swaps a refresh token for a new pair. The old pair stops working.
    pub fn rotate(&self, refreshToken: &str) -> ApiResult<TokenPair> {
        let grant = {
            let mut registry = self.registry.write();
            let grant = registry
                .refresh
                .remove(refreshToken)
                .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;
            registry.access.remove(&grant.access_token);
            grant
        };
        Ok(self.issue_tokens(&grant.user_id))
    }

    /// Revokes the pair an access token belongs to. Unknown tokens are ignored.
    pub fn revoke(&self, accessToken: &str) {
        let mut registry = self.registry.write();
        if let Some(grant) = registry.access.remove(accessToken) {
            registry.refresh.remove(&grant.refresh_token);
        }
    }

    pub fn expire_access_token(&self, accessToken: &str) {
        if let Some(grant) = self.registry.write().access.get_mut(accessToken) {
            grant.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }

    pub fn update_profile(&self, userId: &str, profile: &ProfileUpdate) -> ApiResult<User> {
        let mut registry = self.registry.write();
        if let Some(username) = &profile.username {
            validate_username(username)?;
            if registry.username_taken(username, Some(userId)) {
                return Err(ApiError::Conflict("Username already taken".into()));
            }
        }

        let account = registry.account_mut(userId)?;
        if let Some(username) = &profile.username {
            account.user.username = username.clone();
        }
        if let Some(fullName) = &profile.full_name {
            account.user.full_name = Some(fullName.clone());
        }
        if let Some(organization) = &profile.organization {
            account.user.organization = Some(organization.clone());
        }
        account.user.updated_at = Some(Utc::now());
        Ok(account.user.clone())
    }

    pub fn change_password(&self, userId: &str, change: &PasswordChange) -> ApiResult<()> {
        validate_password(&change.new_password)?;
        let passwordHash = hash_password(&change.new_password)?;

        let mut registry = self.registry.write();
        let account = registry.account_mut(userId)?;
        if !verify_password(&change.current_password, &account.password_hash) {
            return Err(ApiError::BadRequest("Current password is incorrect".into()));
        }
        account.password_hash = passwordHash;
        Ok(())
    }

    /// Issues a reset token for a known email. Unknown emails get `None` so
    /// callers can answer identically either way.
    pub fn request_password_reset(&self, email: &str) -> Option<String> {
        let mut registry = self.registry.write();
        let userId = registry.find_by_email(email)?.user.id.clone();
        let token = Uuid::new_v4().to_string();
        registry.reset_tokens.insert(token.clone(), userId);
        Some(token)
    }

    /// Sets a new password and signs the user out everywhere.
    pub fn reset_password(&self, reset: &PasswordReset) -> ApiResult<()> {
        validate_password(&reset.new_password)?;
        let passwordHash = hash_password(&reset.new_password)?;

        let mut registry = self.registry.write();
        let userId = registry
            .reset_tokens
            .remove(&reset.token)
            .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token".into()))?;
        registry.account_mut(&userId)?.password_hash = passwordHash;
        registry.drop_user_grants(&userId);
        Ok(())
    }

    pub fn issue_verification(&self, userId: &str) -> ApiResult<String> {
        let mut registry = self.registry.write();
        if registry.account_mut(userId)?.user.is_verified {
            return Err(ApiError::BadRequest("Email already verified".into()));
        }
        let token = Uuid::new_v4().to_string();
        registry
            .verification_tokens
            .insert(token.clone(), userId.to_string());
        Ok(token)
    }

    pub fn verify_email(&self, token: &str) -> ApiResult<User> {
        let mut registry = self.registry.write();
        let userId = registry
            .verification_tokens
            .remove(token)
            .ok_or_else(|| ApiError::BadRequest("Invalid verification token".into()))?;
        let account = registry.account_mut(&userId)?;
        account.user.is_verified = true;
        account.user.updated_at = Some(Utc::now());
        Ok(account.user.clone())
    }
}

fn validate_username(username: &str) -> ApiResult<()> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(ApiError::Unprocessable(format!(
            "Username must be between {} and {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> ApiResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::Unprocessable(
            "value is not a valid email address".into(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Unprocessable(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
