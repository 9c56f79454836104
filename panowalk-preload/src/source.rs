//! Upstream source abstractions
//!
//! Two seams: a tiles source that serves 512x512 panorama tiles behind a
//! short-lived session token, and a metadata source that serves
//! coordinates, capture date, center heading, and adjacency links. The
//! HTTP implementations talk to a street-imagery tile provider; tests and
//! mirrors plug in their own implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use panowalk_core::{normalize_heading, Link, PanoId, PanoMetadata};

use crate::error::{PreloadError, PreloadResult};

/// Provider of raw panorama tiles at (zoom, x, y).
#[async_trait]
pub trait TilesSource: Send + Sync {
    async fn fetch_tile(&self, pano_id: &PanoId, zoom: u8, x: u32, y: u32)
        -> PreloadResult<Vec<u8>>;
}

/// Provider of panorama metadata (location, capture date, center heading,
/// links).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, pano_id: &PanoId) -> PreloadResult<PanoMetadata>;
}

// ============================================================================
// HTTP TILES SOURCE
// ============================================================================

/// Refresh the upstream session this long before its stated expiry.
const SESSION_REFRESH_BUFFER_SECS: i64 = 60;

struct SessionToken {
    token: String,
    expiry: DateTime<Utc>,
}

impl SessionToken {
    fn needs_refresh(&self) -> bool {
        Utc::now() >= self.expiry - Duration::seconds(SESSION_REFRESH_BUFFER_SECS)
    }
}

#[derive(Deserialize)]
struct SessionTokenResponse {
    session: String,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
}

/// Tiles source backed by an HTTP tile API with session-token lifecycle.
pub struct HttpTilesSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    session: Mutex<Option<SessionToken>>,
}

impl HttpTilesSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            session: Mutex::new(None),
        }
    }

    /// Create or refresh the upstream session token.
    async fn ensure_session(&self) -> PreloadResult<String> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if !session.needs_refresh() {
                return Ok(session.token.clone());
            }
        }

        let url = format!("{}/createSession", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "mapType": "streetview",
                "language": "en-US",
                "region": "US",
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 || status == 503 {
            return Err(PreloadError::RateLimited);
        }
        if status != 200 {
            return Err(PreloadError::Status(status));
        }

        let body: SessionTokenResponse = response
            .json()
            .await
            .map_err(|e| PreloadError::Malformed(format!("createSession response: {}", e)))?;

        let expiry = body.expiry.unwrap_or_else(|| Utc::now() + Duration::hours(1));
        let token = body.session.clone();
        tracing::debug!(%expiry, "tiles session refreshed");
        *guard = Some(SessionToken {
            token: body.session,
            expiry,
        });
        Ok(token)
    }
}

#[async_trait]
impl TilesSource for HttpTilesSource {
    async fn fetch_tile(
        &self,
        pano_id: &PanoId,
        zoom: u8,
        x: u32,
        y: u32,
    ) -> PreloadResult<Vec<u8>> {
        let session = self.ensure_session().await?;
        let url = format!("{}/streetview/tiles/{}/{}/{}", self.base_url, zoom, x, y);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("session", session.as_str()),
                ("key", self.api_key.as_str()),
                ("panoId", pano_id.as_str()),
            ])
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(response.bytes().await?.to_vec()),
            429 | 503 => Err(PreloadError::RateLimited),
            status => Err(PreloadError::Status(status)),
        }
    }
}

// ============================================================================
// HTTP METADATA SOURCE
// ============================================================================

#[derive(Deserialize)]
struct WireLocation {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct WireLink {
    #[serde(alias = "panoId")]
    pano_id: String,
    heading: f64,
    #[serde(default)]
    distance_meters: Option<f64>,
    #[serde(rename = "virtual", default)]
    is_virtual: bool,
}

#[derive(Deserialize)]
struct WireMetadata {
    #[serde(alias = "panoId")]
    pano_id: String,
    location: WireLocation,
    #[serde(default)]
    date: Option<String>,
    #[serde(alias = "centerHeading", default)]
    center_heading: f64,
    #[serde(default)]
    links: Vec<WireLink>,
}

/// Metadata source backed by an HTTP metadata API.
pub struct HttpMetadataSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    source_name: String,
}

impl HttpMetadataSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            source_name: "metadata_api".to_string(),
        }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch_metadata(&self, pano_id: &PanoId) -> PreloadResult<PanoMetadata> {
        let url = format!("{}/metadata", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("pano", pano_id.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?;

        match response.status().as_u16() {
            200 => {}
            429 | 503 => return Err(PreloadError::RateLimited),
            status => return Err(PreloadError::Status(status)),
        }

        let wire: WireMetadata = response
            .json()
            .await
            .map_err(|e| PreloadError::Malformed(format!("metadata response: {}", e)))?;

        Ok(ingest_metadata(wire, &self.source_name))
    }
}

/// Normalize a wire metadata record into true-north space.
///
/// All headings are folded into [0, 360) here, once, at ingestion; nothing
/// downstream ever re-normalizes. Viewer-space offsets from the upstream
/// (the panorama viewer reports headings rotated 180 degrees from image
/// longitude) are resolved by the same fold.
fn ingest_metadata(wire: WireMetadata, source: &str) -> PanoMetadata {
    PanoMetadata {
        pano_id: PanoId::new(wire.pano_id),
        lat: wire.location.lat,
        lng: wire.location.lng,
        capture_date: wire.date,
        center_heading: normalize_heading(wire.center_heading),
        links: wire
            .links
            .into_iter()
            .map(|l| Link {
                pano_id: PanoId::new(l.pano_id),
                heading: normalize_heading(l.heading),
                distance_meters: l.distance_meters,
                is_virtual: l.is_virtual,
            })
            .collect(),
        fetched_at: Utc::now(),
        source: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_normalizes_headings() {
        let wire: WireMetadata = serde_json::from_str(
            r#"{
                "panoId": "p0",
                "location": {"lat": 35.0, "lng": 139.0},
                "date": "2022-11",
                "centerHeading": 372.5,
                "links": [
                    {"panoId": "p1", "heading": -90.0},
                    {"panoId": "p2", "heading": 180.0, "virtual": true}
                ]
            }"#,
        )
        .unwrap();

        let meta = ingest_metadata(wire, "metadata_api");
        assert_eq!(meta.pano_id, PanoId::new("p0"));
        assert_eq!(meta.center_heading, 12.5);
        assert_eq!(meta.links[0].heading, 270.0);
        assert!(!meta.links[0].is_virtual);
        assert!(meta.links[1].is_virtual);
        assert_eq!(meta.source, "metadata_api");
        assert!(meta.is_valid());
    }

    #[test]
    fn test_session_refresh_window() {
        let fresh = SessionToken {
            token: "t".to_string(),
            expiry: Utc::now() + Duration::hours(1),
        };
        assert!(!fresh.needs_refresh());

        let stale = SessionToken {
            token: "t".to_string(),
            expiry: Utc::now() + Duration::seconds(30),
        };
        assert!(stale.needs_refresh());
    }
}
