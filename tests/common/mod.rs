#![allow(dead_code)]

pub mod fixtures;

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        bead_store::logging::init_test_logging();
    });
}
