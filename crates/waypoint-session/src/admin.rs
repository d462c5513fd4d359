// ABOUTME: Admin-only user management calls routed through the candidate resolver.
// ABOUTME: Lists users and changes a user's type, decoding the backend's varied response shapes.

use serde_json::{Value, json};
use thiserror::Error;

use waypoint_client::{CandidateResolver, ResolveError};
use waypoint_core::{CandidateRequest, Endpoint, UserId, UserRecord, UserType};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("unexpected response from {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl SessionError {
    /// Server-provided message, when the failure carried one.
    pub fn server_message(&self) -> Option<String> {
        match self {
            SessionError::Resolve(e) => e.server_message(),
            SessionError::Decode { .. } => None,
        }
    }
}

/// User management for administrators. The backend enforces permissions;
/// this client only shapes the calls.
#[derive(Clone)]
pub struct AdminApi {
    resolver: CandidateResolver,
}

impl AdminApi {
    pub fn new(resolver: CandidateResolver) -> Self {
        Self { resolver }
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, SessionError> {
        let request = CandidateRequest::for_endpoint(Endpoint::ListUsers);
        let response = self.resolver.execute(&request).await?;

        let list = user_list(&response.body).ok_or_else(|| SessionError::Decode {
            path: response.path.clone(),
            reason: "expected an array of users".to_string(),
        })?;

        serde_json::from_value(list.clone()).map_err(|e| SessionError::Decode {
            path: response.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Change a user's type. Returns the updated user when the backend
    /// echoes one back.
    pub async fn change_user_type(
        &self,
        id: &UserId,
        user_type: &UserType,
    ) -> Result<Option<UserRecord>, SessionError> {
        let request = CandidateRequest::for_endpoint(Endpoint::ChangeUserType)
            .with_param("id", id.to_string())
            .with_payload(json!({ "userType": user_type.as_str() }));
        let response = self.resolver.execute(&request).await?;

        tracing::info!(user_id = %id, user_type = %user_type, path = %response.path, "user type changed");

        let updated = response
            .body
            .get("user")
            .or_else(|| response.body.pointer("/data/user"))
            .or_else(|| response.body.get("data"))
            .unwrap_or(&response.body);
        if !updated.is_object() || updated.get("userType").is_none() {
            return Ok(None);
        }
        serde_json::from_value(updated.clone())
            .map(Some)
            .map_err(|e| SessionError::Decode {
                path: response.path.clone(),
                reason: e.to_string(),
            })
    }
}

/// Find the user array in a list response: a bare array, or `users`/`data`.
fn user_list(body: &Value) -> Option<&Value> {
    if body.is_array() {
        return Some(body);
    }
    ["users", "data"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find(|v| v.is_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use waypoint_client::testing::ScriptedTransport;
    use waypoint_core::Method;

    fn admin(transport: &Arc<ScriptedTransport>) -> AdminApi {
        AdminApi::new(CandidateResolver::new(transport.clone(), "/api"))
    }

    #[tokio::test]
    async fn list_users_accepts_bare_array() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Get,
            "/api/users/all",
            200,
            json!([{"id": 1, "userType": "admin"}, {"id": 2}]),
        ));

        let users = admin(&transport).list_users().await.unwrap();

        assert_eq!(users.len(), 2);
        assert!(users[0].is_admin());
        assert_eq!(users[1].user_type, UserType::User);
    }

    #[tokio::test]
    async fn list_users_falls_back_to_plain_users_route() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Get,
            "/users",
            200,
            json!({"success": true, "users": [{"_id": "a1", "email": "a@b.com"}]}),
        ));

        let users = admin(&transport).list_users().await.unwrap();

        assert_eq!(users[0].id, Some(UserId::Text("a1".to_string())));
        assert_eq!(
            transport.paths(),
            vec!["/api/users/all", "/users/all", "/api/users", "/users"]
        );
    }

    #[tokio::test]
    async fn list_users_reports_unexpected_shape() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Get,
            "/api/users/all",
            200,
            json!({"count": 3}),
        ));

        let err = admin(&transport).list_users().await.unwrap_err();
        assert!(matches!(err, SessionError::Decode { ref path, .. } if path == "/api/users/all"));
    }

    #[tokio::test]
    async fn list_users_forbidden_surfaces_message() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Get,
            "/api/users/all",
            403,
            json!({"message": "admin only"}),
        ));

        let err = admin(&transport).list_users().await.unwrap_err();
        assert_eq!(err.server_message().as_deref(), Some("admin only"));
        assert_eq!(transport.paths().len(), 1);
    }

    #[tokio::test]
    async fn change_user_type_fills_id_and_sends_type() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Put,
            "/api/users/42/type",
            200,
            json!({"message": "updated", "user": {"id": 42, "userType": "admin"}}),
        ));

        let updated = admin(&transport)
            .change_user_type(&UserId::Number(42), &UserType::Admin)
            .await
            .unwrap()
            .unwrap();

        assert!(updated.is_admin());
        let calls = transport.calls();
        assert_eq!(calls[0].payload, Some(json!({"userType": "admin"})));
    }

    #[tokio::test]
    async fn change_user_type_without_echo_returns_none() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Put,
            "/users/abc",
            204,
            Value::Null,
        ));

        let updated = admin(&transport)
            .change_user_type(&UserId::Text("abc".to_string()), &UserType::User)
            .await
            .unwrap();

        assert!(updated.is_none());
        assert_eq!(
            transport.paths(),
            vec!["/api/users/abc/type", "/users/abc/type", "/api/users/abc", "/users/abc"]
        );
    }

    #[tokio::test]
    async fn change_user_type_keeps_opaque_id_in_one_segment() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            Method::Put,
            "/api/users/7%3Frole%3Dx%23/type",
            200,
            json!({"user": {"_id": "7?role=x#", "userType": "admin"}}),
        ));

        let updated = admin(&transport)
            .change_user_type(&UserId::Text("7?role=x#".to_string()), &UserType::Admin)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, Some(UserId::Text("7?role=x#".to_string())));
        let paths = transport.paths();
        assert_eq!(paths, vec!["/api/users/7%3Frole%3Dx%23/type"]);
        assert!(paths.iter().all(|p| !p.contains(['?', '#'])));
    }
}
