//! Asset surface of the Asset & Metadata API (§4.4): `PUT`/`GET
//! /uploads/<id>`. The id is used verbatim as the Snapshot Store key once
//! path-traversal forms are rejected.

use crate::config::Config;
use crate::errors::json_error;
use crate::store::SnapshotStore;
use rocket::data::{Capped, Data, ToByteUnit};
use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::{get, put, State};
use serde_json::Value;
use std::sync::Arc;

#[put("/uploads/<id>", data = "<body>")]
pub async fn upload_asset(
    store: &State<Arc<SnapshotStore>>,
    config: &State<Arc<Config>>,
    id: &str,
    body: Data<'_>,
) -> Result<Json<Value>, (Status, Json<Value>)> {
    let cap = config.max_upload_bytes as u64;
    let capped: Capped<Vec<u8>> = body
        .open((cap + 1).bytes())
        .into_bytes()
        .await
        .map_err(|e| json_error(Status::InternalServerError, e.to_string()))?;

    if !capped.is_complete() {
        return Err(json_error(
            Status::PayloadTooLarge,
            format!("upload exceeds the configured maximum of {cap} bytes"),
        ));
    }

    store
        .write_asset(id, &capped.into_inner())
        .map_err(|e| json_error(e.status(), e.to_string()))?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[get("/uploads/<id>")]
pub fn download_asset(
    store: &State<Arc<SnapshotStore>>,
    id: &str,
) -> Result<(ContentType, Vec<u8>), (Status, Json<Value>)> {
    let bytes = store
        .read_asset(id)
        .map_err(|e| json_error(e.status(), e.to_string()))?;
    Ok((ContentType::Binary, bytes))
}
