#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // TOML parsing and validation of Config must never panic; parse and
    // validation errors are both acceptable outcomes.
    if let Ok(cfg) = toml::from_str::<scanner_config::Config>(data) {
        let _ = cfg.validate();
    }
});
