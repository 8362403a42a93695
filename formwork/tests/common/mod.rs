use std::sync::Once;

use simplelog::{Config, LevelFilter, SimpleLogger};

/// Initialize test logging once; safe to call from every test.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = SimpleLogger::init(LevelFilter::Debug, Config::default());
    });
}
