mod correlator;
mod global;
mod prelink;
mod validation;

pub use correlator::{CorrelatorConfig, ReplayConfig};
pub use global::GlobalConfig;
pub use prelink::PrelinkConfig;
pub use validation::{validate, ConfigReport};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::PrelinkConfig;

    #[test]
    fn default_timings() {
        let cfg = PrelinkConfig::default();
        assert_eq!(cfg.correlator().request_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.correlator().max_cache_age(), Duration::from_secs(10));
        assert_eq!(cfg.correlator().sweep_interval(), Duration::from_secs(2));
        assert_eq!(cfg.global().log_level(), "info");
        assert!(cfg.replay().input().is_none());
    }

    #[test]
    fn toml_sections_override_defaults() {
        let cfg = PrelinkConfig::from_toml_str(
            r#"
            [global]
            log_level = "debug"

            [correlator]
            request_timeout_ms = 250
            sweep_interval_ms = 1000

            [replay]
            input = "trace.ndjson"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.global().log_level(), "debug");
        assert_eq!(cfg.correlator().request_timeout_ms, 250);
        assert_eq!(cfg.correlator().max_cache_age_ms, 10_000);
        assert_eq!(cfg.correlator().sweep_interval_ms, 1_000);
        assert_eq!(cfg.replay().input(), Some("trace.ndjson"));
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let cfg = PrelinkConfig::from_toml_str(
            r#"
            [global]
            log_level = ""

            [correlator]
            request_timeout_ms = 0
            max_cache_age_ms = 0
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.global().log_level(), "info");
        assert_eq!(cfg.correlator().request_timeout_ms, 500);
        assert_eq!(cfg.correlator().max_cache_age_ms, 10_000);
    }

    #[test]
    fn stdin_marker_is_not_a_path() {
        let cfg = PrelinkConfig::from_toml_str("[replay]\ninput = \"-\"\n").expect("valid toml");
        assert!(cfg.replay().input().is_none());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = PrelinkConfig::from_file_or_default("does-not-exist.conf");
        assert_eq!(cfg.correlator().request_timeout_ms, 500);
    }
}
