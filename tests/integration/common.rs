use drawsync_collab_backend::config::Config;
use rocket::local::blocking::Client;

/// Wrapper around Client that owns a scratch data directory and removes it
/// on drop, so repeated test runs don't accumulate snapshot/asset files.
pub struct TestClient {
    client: Client,
    _dir: tempfile::TempDir,
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        &self.client
    }
}

pub fn test_client() -> TestClient {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config {
        rooms_dir: dir.path().join("rooms"),
        assets_dir: dir.path().join("assets"),
        cleanup_enabled: false,
        ..Config::default()
    };
    let rocket = drawsync_collab_backend::rocket_with_config(config);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client, _dir: dir }
}
