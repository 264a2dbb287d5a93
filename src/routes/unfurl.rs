//! `/unfurl?url=` — the REST front door onto the Unfurl Resolver.

use crate::errors::json_error;
use crate::unfurl::UnfurlResolver;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, State};
use serde_json::Value;
use std::sync::Arc;

#[get("/unfurl?<url>")]
pub async fn unfurl(
    resolver: &State<Arc<UnfurlResolver>>,
    url: Option<&str>,
) -> Result<Json<crate::unfurl::UnfurlResult>, (Status, Json<Value>)> {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return Err(json_error(Status::BadRequest, "missing required query parameter: url"));
    };
    Ok(Json(resolver.resolve(url).await))
}
