use super::model::{AuthenticatedUser, CustomClaims};
use crate::core::error::AppError;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::jwks::JwksClient;

/// Namespace of the custom claims object carrying user roles
const CLAIMS_NAMESPACE: &str = "https://salamadocs.app/claims";

pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,
    issuer: String,
    audience: String,
    leeway: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(rename = "accountId", default)]
    account_id: Option<String>,
    #[serde(rename = "https://salamadocs.app/claims", default)]
    custom_claims: Option<CustomClaims>,
}

impl JwtValidator {
    pub fn new(
        jwks_client: Arc<JwksClient>,
        issuer: String,
        audience: String,
        leeway: Duration,
    ) -> Self {
        Self {
            jwks_client,
            issuer,
            audience,
            leeway: leeway.as_secs(),
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let header = decode_header(token).map_err(|e| AppError::Auth(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::Auth(format!(
                "Unsupported algorithm: {:?}. Only RS256 is allowed",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AppError::Auth("Missing kid in token header".to_string()))?;

        let decoding_key = self
            .jwks_client
            .get_key(&kid)
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| AppError::Auth(e.to_string()))?;

        user_from_claims(token_data.claims)
    }
}

fn user_from_claims(claims: Claims) -> Result<AuthenticatedUser, AppError> {
    // Token exchange tokens carry no `kind`
    if claims.kind.as_deref().is_some_and(|kind| kind != "AccessToken") {
        return Err(AppError::Auth("Token is not an access token".to_string()));
    }

    let roles = claims.custom_claims.unwrap_or_default().roles;
    tracing::debug!(
        "Resolved {} roles from {} for {}",
        roles.len(),
        CLAIMS_NAMESPACE,
        claims.sub
    );

    Ok(AuthenticatedUser {
        user_id: claims.account_id.unwrap_or_else(|| claims.sub.clone()),
        sub: claims.sub,
        roles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(value: serde_json::Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_user_id_prefers_account_id() {
        let user = user_from_claims(claims(serde_json::json!({
            "sub": "sub-1",
            "accountId": "acct-1",
            "https://salamadocs.app/claims": { "roles": ["admin"] }
        })))
        .unwrap();

        assert_eq!(user.user_id, "acct-1");
        assert!(user.is_admin());
    }

    #[test]
    fn test_missing_custom_claims_means_no_roles() {
        let user = user_from_claims(claims(serde_json::json!({ "sub": "sub-1" }))).unwrap();
        assert_eq!(user.user_id, "sub-1");
        assert!(user.roles.is_empty());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_rejects_non_access_tokens() {
        let result = user_from_claims(claims(serde_json::json!({
            "sub": "sub-1",
            "kind": "IdToken"
        })));
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
