//! HTTP request handlers.

pub mod artifacts;
pub mod audit;
pub mod auth;
pub mod health;
pub mod matrix;
pub mod taxonomy;

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::api::SharedState;
use crate::error::Result;
use crate::services::audit_service::RequestOrigin;
use crate::services::matrix_service::resolve_country;
use crate::services::taxonomy_service::TaxonomyService;

/// Client address and user agent of the current request, for audit rows.
#[derive(Debug, Clone, Default)]
pub struct ClientOrigin(pub RequestOrigin);

/// Socket peer address, or the first `X-Forwarded-For` hop when proxy headers
/// are trusted. A hop that is not an IP address is ignored.
pub fn origin_from(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> RequestOrigin {
    let forwarded = trust_forwarded
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
        })
        .flatten();

    RequestOrigin {
        ip_address: forwarded
            .or_else(|| peer.map(|p| p.ip()))
            .map(|ip| ip.to_string()),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    }
}

#[async_trait]
impl FromRequestParts<SharedState> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(origin_from(
            &parts.headers,
            peer,
            state.config.trust_proxy_headers,
        )))
    }
}

/// Resolve a requested country code the same way the dashboard does.
pub(crate) async fn resolve_country_id(
    state: &SharedState,
    country_code: Option<&str>,
) -> Result<Option<Uuid>> {
    let countries = TaxonomyService::new(state.db.clone())
        .list_countries()
        .await?;
    Ok(
        resolve_country(&countries, country_code, &state.config.default_country_code)
            .map(|c| c.id),
    )
}
