//! Request extractors for the acting user and client metadata.
//!
//! Authentication happens upstream. The identity provider forwards the
//! authenticated user in trusted headers, which are read here and passed
//! explicitly into every store call.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, header::USER_AGENT, request::Parts},
};
use bookshare_core::{
  activity::ClientContext,
  history::{Actor, ChangeContext},
};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID: &str = "x-user-id";
pub const USER_NAME: &str = "x-user-name";
pub const USER_STAFF: &str = "x-user-staff";
pub const CHANGE_REASON: &str = "x-change-reason";
pub const FORWARDED_FOR: &str = "x-forwarded-for";

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
  headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

// ─── Caller ──────────────────────────────────────────────────────────────────

/// The authenticated user. Rejects with 401 when `x-user-id` is absent.
#[derive(Debug, Clone)]
pub struct Caller {
  pub actor: Actor,
  /// Staff may read any user's history and activity.
  pub staff: bool,
}

impl Caller {
  pub fn id(&self) -> Uuid { self.actor.user_id }

  /// Whether the caller may see data belonging to `owner`.
  pub fn can_view(&self, owner: Uuid) -> bool { self.staff || self.id() == owner }
}

impl<St> FromRequestParts<St> for Caller
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, ApiError> {
    let raw = header(&parts.headers, USER_ID).ok_or(ApiError::Unauthorized)?;
    let user_id = Uuid::parse_str(raw)
      .map_err(|_| ApiError::BadRequest(format!("{USER_ID} is not a UUID: {raw:?}")))?;

    let actor = Actor {
      user_id,
      display_name: header(&parts.headers, USER_NAME).map(str::to_owned),
    };
    let staff = header(&parts.headers, USER_STAFF).is_some_and(|v| v.eq_ignore_ascii_case("true"));
    Ok(Self { actor, staff })
  }
}

// ─── Request metadata ────────────────────────────────────────────────────────

/// Client metadata for the activity log plus the optional change reason
/// header. Never rejects.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
  pub client: ClientContext,
  pub reason: Option<String>,
}

impl RequestMeta {
  /// The change context for a mutation by `caller`. A `reason` field in the
  /// request body wins over the header.
  pub fn change(&self, caller: &Caller, body_reason: Option<String>) -> ChangeContext {
    ChangeContext {
      actor:  Some(caller.actor.clone()),
      reason: body_reason.or_else(|| self.reason.clone()),
    }
  }
}

impl<St> FromRequestParts<St> for RequestMeta
where
  St: Send + Sync,
{
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Infallible> {
    let headers = &parts.headers;
    let remote_addr = parts
      .extensions
      .get::<ConnectInfo<SocketAddr>>()
      .map(|ConnectInfo(addr)| addr.ip().to_string());

    Ok(Self {
      client: ClientContext {
        forwarded_for: header(headers, FORWARDED_FOR).map(str::to_owned),
        remote_addr,
        user_agent: header(headers, USER_AGENT.as_str()).map(str::to_owned),
      },
      reason: header(headers, CHANGE_REASON).map(str::to_owned),
    })
  }
}
