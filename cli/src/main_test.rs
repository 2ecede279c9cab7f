mod tests {
    use crate::*;

    #[test]
    fn test_sanitize_path_allows_simple_relative() {
        let p = sanitize_path("progs/sum.json").expect("relative path should be allowed");
        assert_eq!(p, PathBuf::from("progs/sum.json"));
    }

    #[test]
    fn test_sanitize_path_rejects_parent_dir() {
        let err = sanitize_path("progs/../secret.json").unwrap_err();
        assert!(err.to_string().contains("Parent directory components"));
    }

    #[cfg(unix)]
    #[test]
    fn test_sanitize_path_allows_absolute_unix() {
        let p = sanitize_path("/tmp/prog.json").expect("absolute path should be allowed");
        assert_eq!(p, PathBuf::from("/tmp/prog.json"));
    }

    #[test]
    fn test_cli_args_accepts_bare_file() {
        let args = CliArgs::try_parse_from(["kestrel", "a.json"]).expect("should parse");
        assert!(args.command.is_none());
        assert_eq!(args.file.as_deref(), Some(Path::new("a.json")));
    }

    #[test]
    fn test_cli_args_run_collects_entry_args() {
        let args = CliArgs::try_parse_from(["kestrel", "run", "a.json", "--entry-arg", "3", "--entry-arg", "x", "--json"])
            .expect("should parse");
        assert!(args.json);
        match args.command {
            Some(Commands::Run { file, entry_args }) => {
                assert_eq!(file, PathBuf::from("a.json"));
                assert_eq!(entry_args, vec!["3".to_string(), "x".to_string()]);
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_args_rejects_parent_dir_in_check() {
        let err = CliArgs::try_parse_from(["kestrel", "check", "../a.json"]).expect_err("should reject");
        assert!(err.to_string().contains("Parent directory components"));
    }

    #[test]
    fn test_trace_toggle_values() {
        assert!(env_toggle_enabled("1"));
        assert!(env_toggle_enabled("kestrel::dispatch=trace"));
        assert!(!env_toggle_enabled("off"));
        assert!(!env_toggle_enabled("  "));
        assert_eq!(filter_expr_from("true"), None);
        assert_eq!(filter_expr_from(" kestrel=debug "), Some("kestrel=debug".to_string()));
    }

    #[test]
    fn test_entry_args_decode_json_or_fall_back_to_strings() -> anyhow::Result<()> {
        let rt = new_runtime()?;
        assert!(matches!(parse_entry_arg(&rt, "42")?, Value::Integer(42)));
        assert_eq!(parse_entry_arg(&rt, r#"["l", 1, 2]"#)?.to_string(), "[1, 2]");
        assert_eq!(parse_entry_arg(&rt, "plain words")?.to_string(), "plain words");
        assert!(parse_entry_arg(&rt, r#"["^", "nope"]"#).is_err());
        Ok(())
    }
}
