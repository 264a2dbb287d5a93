// Integration test suite.
//
// Organized into focused modules by feature area. Each module shares the
// common::TestClient for scratch-directory lifecycle management.

mod common;

mod assets;
mod system;
mod unfurl;
