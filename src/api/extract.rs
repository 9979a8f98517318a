//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity as two headers. Any handler taking an [`Actor`] argument
//! rejects requests without them with `401`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::domain::{Actor, Role, UserId};
use crate::error::LedgerError;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, LedgerError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| LedgerError::Unauthorized(format!("missing {name} header")))
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|_| LedgerError::Unauthorized(format!("{USER_ID_HEADER} is not a UUID")))?;
        let role = header(parts, USER_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(LedgerError::Unauthorized)?;
        Ok(Self::new(UserId::from(user_id), role))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Actor, LedgerError> {
        let (mut parts, ()) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_both_headers() {
        let id = Uuid::new_v4();
        let Ok(request) = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .header(USER_ROLE_HEADER, "super_admin")
            .body(())
        else {
            panic!("request build failed");
        };
        let Ok(actor) = extract(request).await else {
            panic!("extraction failed");
        };
        assert_eq!(actor.user_id, UserId::from(id));
        assert_eq!(actor.role, Role::SuperAdmin);
    }

    #[tokio::test]
    async fn missing_role_is_unauthorized() {
        let Ok(request) = Request::builder()
            .header(USER_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
        else {
            panic!("request build failed");
        };
        assert!(matches!(
            extract(request).await,
            Err(LedgerError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn malformed_user_id_is_unauthorized() {
        let Ok(request) = Request::builder()
            .header(USER_ID_HEADER, "42")
            .header(USER_ROLE_HEADER, "CLIENT")
            .body(())
        else {
            panic!("request build failed");
        };
        assert!(matches!(
            extract(request).await,
            Err(LedgerError::Unauthorized(_))
        ));
    }
}
