use std::sync::Arc;

use axum::{extract::Request, middleware::Next, Router};
use fake::{faker::name::en::Name, Fake};

use crate::core::config::CacheConfig;
use crate::features::auth::model::AuthenticatedUser;
use crate::shared::cache::TtlCache;
use crate::shared::constants::ROLE_ADMIN;

pub fn test_cache() -> Arc<TtlCache> {
    Arc::new(TtlCache::new(&CacheConfig::default()))
}

pub fn test_user(user_id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user_id.to_string(),
        sub: user_id.to_string(),
        roles: Vec::new(),
    }
}

pub fn test_admin() -> AuthenticatedUser {
    AuthenticatedUser {
        roles: vec![ROLE_ADMIN.to_string()],
        ..test_user("test-admin")
    }
}

/// A user with a generated id, for tests that need several distinct people
pub fn random_user() -> AuthenticatedUser {
    let name: String = Name().fake();
    test_user(&format!("{}-{}", name.replace(' ', "-").to_lowercase(), uuid::Uuid::now_v7()))
}

/// Inject `user` into every request, standing in for the JWT middleware
pub fn with_user(router: Router, user: AuthenticatedUser) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
        },
    ))
}
