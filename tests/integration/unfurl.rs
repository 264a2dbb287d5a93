use crate::common::test_client;
use rocket::http::Status;

#[test]
fn missing_url_param_is_400() {
    let client = test_client();
    let res = client.get("/unfurl").dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn empty_url_param_is_400() {
    let client = test_client();
    let res = client.get("/unfurl?url=").dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn unreachable_host_degrades_to_empty_fields_not_an_error() {
    let client = test_client();
    let res = client
        .get("/unfurl?url=http://127.0.0.1.invalid.test/nothing-here")
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["title"], "");
    assert_eq!(body["description"], "");
    assert_eq!(body["image"], "");
    assert_eq!(body["favicon"], "");
}

#[test]
fn unparsable_url_also_degrades_rather_than_erroring() {
    let client = test_client();
    let res = client.get("/unfurl?url=not-a-url-at-all").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["title"], "");
}
