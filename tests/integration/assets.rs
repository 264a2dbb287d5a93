use crate::common::test_client;
use rocket::http::Status;

#[test]
fn upload_then_download_round_trips_bytes() {
    let client = test_client();

    let res = client.put("/uploads/asset-1").body(b"hello world".to_vec()).dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/uploads/asset-1").dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.into_bytes().unwrap(), b"hello world");
}

#[test]
fn download_missing_asset_is_404() {
    let client = test_client();
    let res = client.get("/uploads/never-uploaded").dispatch();
    assert_eq!(res.status(), Status::NotFound);
}

#[test]
fn upload_rejects_traversal_id() {
    let client = test_client();
    let res = client.put("/uploads/..%2Fescape").body(b"x".to_vec()).dispatch();
    // Rocket decodes the path segment before it reaches the handler.
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn second_upload_overwrites_the_first() {
    let client = test_client();
    client.put("/uploads/asset-2").body(b"v1".to_vec()).dispatch();
    client.put("/uploads/asset-2").body(b"v2-longer".to_vec()).dispatch();

    let res = client.get("/uploads/asset-2").dispatch();
    assert_eq!(res.into_bytes().unwrap(), b"v2-longer");
}
