use crate::common::test_client;
use rocket::http::Status;

#[test]
fn health_is_plain_ok() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.into_string().unwrap(), "OK");
}

#[test]
fn api_health_reports_structured_checks() {
    let client = test_client();
    let res = client.get("/api/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["status"].is_string());
    assert!(body["checks"]["memory"].is_object());
    assert!(body["checks"]["connections"]["details"]["active"].is_number());
    assert!(body["checks"]["storage"].is_object());
}

#[test]
fn rooms_listing_reflects_snapshot_store() {
    let client = test_client();
    client.put("/uploads/not-a-room").body(b"x".to_vec()).dispatch();

    let res = client.get("/api/rooms").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["totalRooms"], 0);
    assert!(body["rooms"].as_array().unwrap().is_empty());
}

#[test]
fn assets_listing_reflects_uploads() {
    let client = test_client();
    client.put("/uploads/a1").body(b"abc".to_vec()).dispatch();
    client.put("/uploads/a2").body(b"abcdef".to_vec()).dispatch();

    let res = client.get("/api/assets").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["totalAssets"], 2);
    // sorted by size descending
    assert_eq!(body["assets"][0]["name"], "a2");
}

#[test]
fn stats_reports_process_fields() {
    let client = test_client();
    let res = client.get("/api/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["pid"].is_number());
    assert!(body["activeConnections"].is_number());
}

#[test]
fn admin_sweep_trigger_returns_counts() {
    let client = test_client();
    let res = client.post("/api/admin/sweep").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["roomsChecked"].is_number());
    assert!(body["assetsChecked"].is_number());
}

#[test]
fn unknown_route_is_404() {
    let client = test_client();
    let res = client.get("/no/such/route").dispatch();
    assert_eq!(res.status(), Status::NotFound);
}
