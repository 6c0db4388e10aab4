// Data model for the bus fare table and the JSON envelopes served over HTTP.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    pub to: String,
    /// Kilometres.
    pub distance: f64,
    pub fare: f64,
}

/// The single persisted aggregate. `stops` is always recomputed from `routes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareDataset {
    pub routes: Vec<Route>,
    pub stops: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub total_routes: usize,
    #[serde(default)]
    pub total_stops: usize,
}

impl FareDataset {
    pub fn from_routes(routes: Vec<Route>, updated_at: DateTime<Utc>) -> Self {
        let stops: Vec<String> = routes
            .iter()
            .flat_map(|r| [r.from.clone(), r.to.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        FareDataset {
            total_routes: routes.len(),
            total_stops: stops.len(),
            routes,
            stops,
            last_updated: Some(format_timestamp(updated_at)),
        }
    }

    /// Brings the totals in line with the lists; older files may lack them.
    pub fn recount(&mut self) {
        self.total_routes = self.routes.len();
        self.total_stops = self.stops.len();
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn summary(&self) -> UploadSummary {
        UploadSummary {
            total_routes: self.total_routes,
            total_stops: self.total_stops,
            last_updated: self.last_updated.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total_routes: usize,
    pub total_stops: usize,
    pub last_updated: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Direct,
    Reverse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FareMatch {
    pub route: Route,
    pub kind: MatchKind,
}

// ============================================================================
// HTTP envelopes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.to_string()),
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            message: None,
            data: None,
            error: Some(message),
            details: None,
        }
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: &str) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.to_string()),
            data: None,
            error: None,
            details: None,
        }
    }
}

/// Body of `GET /api/search-fare`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MatchKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Option<FareMatch>> for SearchResponse {
    fn from(found: Option<FareMatch>) -> Self {
        match found {
            Some(FareMatch { route, kind }) => SearchResponse {
                success: true,
                route: Some(route),
                kind: Some(kind),
                error: None,
            },
            None => SearchResponse {
                success: false,
                route: None,
                kind: None,
                error: Some("No route found between the selected stops".to_string()),
            },
        }
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// ISO-8601, UTC, millisecond precision, `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}
