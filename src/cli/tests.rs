#[cfg(test)]
mod tests {
    use crate::cli::{Args, Command};
    use crate::i18n::Locale;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_serve_default_values() {
        let args = Args::try_parse_from(["deepresearch-rs", "serve"]).unwrap();

        assert_eq!(args.command, Command::Serve { bind: None });
        assert!(args.config.is_none());
        assert!(!args.verbose);
        assert!(!args.no_images);
    }

    #[test]
    fn test_run_requires_query() {
        assert!(Args::try_parse_from(["deepresearch-rs", "run"]).is_err());

        let args =
            Args::try_parse_from(["deepresearch-rs", "run", "Ada Lovelace", "-l", "ja"]).unwrap();
        assert_eq!(
            args.command,
            Command::Run {
                query: "Ada Lovelace".to_string(),
                locale: Some("ja".to_string()),
            }
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "deepresearch-rs",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--model",
            "gemini-2.5-pro",
            "--llm-api-key",
            "test-key",
            "--max-retries",
            "4",
            "--no-images",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(args.llm_api_key.as_deref(), Some("test-key"));
        assert_eq!(args.max_retries, Some(4));
        assert!(args.no_images);
        assert!(args.verbose);
    }

    #[test]
    fn test_into_config_applies_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[llm]\napi_key = \"from-file\"\nmodel = \"file-model\"\n\n[server]\nbind_addr = \"127.0.0.1:4000\""
        )
        .unwrap();

        let args = Args::try_parse_from([
            "deepresearch-rs",
            "serve",
            "--config",
            file.path().to_str().unwrap(),
            "--bind",
            "0.0.0.0:9000",
            "--model",
            "cli-model",
            "--no-images",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.llm.api_key, "from-file");
        assert_eq!(config.llm.model, "cli-model");
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert!(!config.images.enabled);
        assert!(!config.verbose);
    }

    #[test]
    fn test_verbose_from_file_or_flag() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "verbose = true").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from(["deepresearch-rs", "serve", "-c", &path]).unwrap();
        assert!(args.into_config().unwrap().verbose);

        let empty = NamedTempFile::new().unwrap();
        let empty_path = empty.path().to_str().unwrap().to_string();
        let args =
            Args::try_parse_from(["deepresearch-rs", "serve", "-c", &empty_path, "-v"]).unwrap();
        assert!(args.into_config().unwrap().verbose);
    }

    #[test]
    fn test_into_config_sets_run_locale() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args =
            Args::try_parse_from(["deepresearch-rs", "run", "q", "--locale", "ja", "-c", &path])
                .unwrap();
        assert_eq!(args.into_config().unwrap().research.default_locale, Locale::Japanese);

        let args =
            Args::try_parse_from(["deepresearch-rs", "run", "q", "--locale", "fr", "-c", &path])
                .unwrap();
        let err = args.into_config().unwrap_err();
        assert!(err.to_string().contains("Unknown locale: fr"));
    }

    #[test]
    fn test_into_config_missing_file_is_error() {
        let args = Args::try_parse_from([
            "deepresearch-rs",
            "serve",
            "--config",
            "/nonexistent/deepresearch.toml",
        ])
        .unwrap();

        assert!(args.into_config().is_err());
    }
}
