// crates/server/src/routes/search.rs
//! Cross-session search endpoint.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use agentdeck_types::{SearchResponse, SearchScope};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    /// Comma-separated scope names; absent or unrecognized falls back to all.
    pub scope: Option<String>,
}

pub async fn search_sessions(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest(
            "query parameter 'q' must not be empty".into(),
        ));
    }

    let scopes = parse_scopes(params.scope.as_deref());
    let results = state.registry.search(query, &scopes).await;

    Ok(Json(SearchResponse {
        query: query.to_string(),
        total_sessions: results.len() as u32,
        results,
    }))
}

fn parse_scopes(raw: Option<&str>) -> Vec<SearchScope> {
    let Some(raw) = raw else {
        return SearchScope::ALL.to_vec();
    };
    let scopes: Vec<SearchScope> = raw
        .split(',')
        .filter_map(|s| match s.trim() {
            "project_name" => Some(SearchScope::ProjectName),
            "current_task" => Some(SearchScope::CurrentTask),
            "working_directory" => Some(SearchScope::WorkingDirectory),
            "content" => Some(SearchScope::Content),
            _ => None,
        })
        .collect();
    if scopes.is_empty() {
        SearchScope::ALL.to_vec()
    } else {
        scopes
    }
}
