//! Bearer-token authentication.
//!
//! [`TokenAuthority`] signs and verifies HS256 tokens whose claims carry the
//! caller's subject, roles and pre-granted policies, and turns an optional
//! `Authorization` header into an [`Identity`] the transport binding folds into
//! the invocation arguments.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use waymark_core::{InputMap, InvocationArgs, Principal};

/// Claim names owned by [`Claims`]; never copied from principal extras.
const RESERVED_CLAIMS: [&str; 6] = ["sub", "exp", "iat", "iss", "policies", "roles"];

// ---------------------------------------------------------------------------
// Config / errors
// ---------------------------------------------------------------------------

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret shared by signer and verifier.
    pub secret: String,
    /// Issuer written to and required on every token, when set.
    pub issuer: Option<String>,
    /// Lifetime of signed tokens.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: None,
            token_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("authorization header is not a bearer token")]
    NotBearer,
}

// ---------------------------------------------------------------------------
// Claims / Identity
// ---------------------------------------------------------------------------

/// Token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: InputMap,
}

impl Claims {
    /// The principal these claims describe.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.sub.clone(),
            roles: self.roles.clone(),
            claims: self.extra.clone(),
        }
    }
}

/// Who is calling, as established from the request credentials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub is_authenticated: bool,
    pub user: Option<Principal>,
    pub policies: Vec<String>,
}

impl Identity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Copies this identity into `args`.
    #[must_use]
    pub fn apply(self, mut args: InvocationArgs) -> InvocationArgs {
        args.is_authenticated = self.is_authenticated;
        args.user = self.user;
        args.policies.extend(self.policies);
        args
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            is_authenticated: true,
            user: Some(claims.principal()),
            policies: claims.policies,
        }
    }
}

// ---------------------------------------------------------------------------
// TokenAuthority
// ---------------------------------------------------------------------------

/// Signs, verifies and decodes bearer tokens.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    config: AuthConfig,
}

impl TokenAuthority {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Issues a token for `user` carrying `policies`, valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] if encoding fails.
    pub fn sign(&self, user: &Principal, policies: &[String]) -> Result<String, AuthError> {
        let now = jsonwebtoken::get_current_timestamp();
        let extra = user
            .claims
            .iter()
            .filter(|(key, _)| !RESERVED_CLAIMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.sign_claims(&Claims {
            sub: user.id.clone(),
            exp: now + self.config.token_ttl_secs,
            iat: now,
            iss: self.config.issuer.clone(),
            policies: policies.to_vec(),
            roles: user.roles.clone(),
            extra,
        })
    }

    /// Issues a token for explicit claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] if encoding fails.
    pub fn sign_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    /// Verifies signature, expiry and (when configured) issuer.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] for any invalid token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Reads the claims without checking signature or expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] when the token is not structurally valid.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Establishes the caller from an `Authorization` header value.
    ///
    /// A missing header is anonymous. A malformed or invalid token is anonymous
    /// too; the rule stage then decides whether that caller gets through.
    #[must_use]
    pub fn authenticate(&self, authorization: Option<&str>) -> Identity {
        let Some(header) = authorization else {
            return Identity::anonymous();
        };
        match bearer_token(header).and_then(|token| self.verify(token)) {
            Ok(claims) => claims.into(),
            Err(err) => {
                debug!(error = %err, "rejected credentials");
                Identity::anonymous()
            }
        }
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("issuer", &self.config.issuer)
            .field("token_ttl_secs", &self.config.token_ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Extracts the token from a `Bearer <token>` header value.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header.trim().split_once(' ').ok_or(AuthError::NotBearer)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::NotBearer);
    }
    Ok(token.trim())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
