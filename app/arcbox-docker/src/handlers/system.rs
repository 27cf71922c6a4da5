use crate::api::AppState;
use crate::error::Result;
use crate::types::{DiskUsage, VersionResponse};
use arcbox_core::UsageRequest;
use axum::Json;
use axum::extract::{Query, State};

/// Query parameter selecting object types for `/system/df`.
const TYPE_PARAM: &str = "type";

/// Get version.
pub async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: crate::API_VERSION.to_string(),
        min_api_version: crate::MIN_API_VERSION.to_string(),
        git_commit: option_env!("GIT_COMMIT").unwrap_or("unknown").to_string(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    })
}

/// Ping handler.
pub async fn ping() -> &'static str {
    "OK"
}

/// Get data usage information.
///
/// Accepts zero or more `type` parameters (`container`, `image`, `volume`,
/// `build-cache`); none selects every type. The request stops waiting when
/// the client goes away, without affecting other requests that share the
/// same collections.
///
/// # Errors
///
/// Returns 400 for an unknown object type and 500 if a collector fails.
pub async fn disk_usage(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DiskUsage>> {
    let request = UsageRequest::from_types(object_types(params));

    let cancel = state.runtime.request_token();
    // Dropping the handler future (client disconnect) cancels the token.
    let _abandon = cancel.clone().drop_guard();

    let report = state.runtime.disk_usage(&cancel, request).await?;
    Ok(Json(report.into()))
}

/// Keeps every `type` value, in the order the client sent them.
fn object_types(params: Vec<(String, String)>) -> Vec<String> {
    params
        .into_iter()
        .filter(|(key, _)| key == TYPE_PARAM)
        .map(|(_, value)| value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn types_of(uri: &str) -> Vec<String> {
        let uri: Uri = uri.parse().unwrap();
        let Query(params) = Query::<Vec<(String, String)>>::try_from_uri(&uri).unwrap();
        object_types(params)
    }

    #[test]
    fn no_query_selects_nothing() {
        assert!(types_of("/system/df").is_empty());
        assert!(types_of("/system/df?").is_empty());
    }

    #[test]
    fn repeated_type_parameters_are_collected_in_order() {
        assert_eq!(
            types_of("/system/df?type=volume&verbose=1&type=image"),
            vec!["volume".to_string(), "image".to_string()]
        );
    }

    #[test]
    fn values_are_percent_decoded() {
        assert_eq!(
            types_of("/system/df?type=build%2Dcache&%74ype=container"),
            vec!["build-cache".to_string(), "container".to_string()]
        );
    }

    #[test]
    fn bare_key_yields_empty_selector() {
        assert_eq!(types_of("/system/df?type"), vec![String::new()]);
    }
}
