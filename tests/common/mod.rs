#![allow(dead_code)]

pub mod synthetic;

/// Logger init shared by the integration tests; safe to call repeatedly.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
