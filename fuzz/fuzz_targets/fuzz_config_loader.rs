#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must either fail to parse, fail validation, or convert into
// controller parameters; none of those paths may panic.
fuzz_target!(|data: &str| {
    let Ok(cfg) = toml::from_str::<linetrack_config::Config>(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        // A validated config always yields a buildable calibration table.
        let params = linetrack_core::TrackerParams::try_from(&cfg);
        assert!(params.is_ok(), "validated config rejected: {params:?}");
    }
});
