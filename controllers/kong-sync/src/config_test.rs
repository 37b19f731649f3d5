//! Unit tests for command line configuration

#[cfg(test)]
mod tests {
    use crate::config::Args;
    use crate::error::ControllerError;
    use clap::Parser;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["kong-sync"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_kong_url_from_parts() {
        let config = parse(&[
            "--kong-scheme",
            "https",
            "--kong-host",
            "kong-admin.gateway",
            "--kong-port",
            "8444",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.kong_url, "https://kong-admin.gateway:8444");
    }

    #[test]
    fn test_label_defaults() {
        let config = parse(&[]).into_config().unwrap();

        assert_eq!(config.api_label, "kong.api");
        assert_eq!(config.service_selector_label, "service");
        assert_eq!(config.plugin_service_selector_label, "service");
    }

    #[test]
    fn test_timeout_is_opt_in() {
        let config = parse(&["--kong-timeout-secs", "5"]).into_config().unwrap();
        assert_eq!(config.kong_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_custom_labels() {
        let config = parse(&[
            "--namespace",
            "apps",
            "--api-label",
            "example.com/kong-api",
            "--plugin-service-selector-label",
            "app",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.namespace, "apps");
        assert_eq!(config.api_label, "example.com/kong-api");
        assert_eq!(config.plugin_service_selector_label, "app");
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = parse(&["--kong-scheme", "ftp"]).into_config().unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(msg) if msg.contains("ftp")));
    }

    #[test]
    fn test_rejects_empty_namespace() {
        let err = parse(&["--namespace", " "]).into_config().unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_empty_host() {
        let err = parse(&["--kong-host", ""]).into_config().unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_label() {
        let err = parse(&["--api-label", "kong api"]).into_config().unwrap_err();
        assert!(matches!(err, ControllerError::InvalidSelector(_)));
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Args::try_parse_from(["kong-sync", "--kong-port", "70000"]).is_err());
    }
}
