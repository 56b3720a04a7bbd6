use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use dbmd_core::config::{self, DbmdOptions};
use dbmd_core::fetch::{compile_exclude, FetchOptions, MetadataFetcher};
use dbmd_core::introspect::{connect_source, sanitize_url};
use dbmd_core::output::write_document;

use crate::args::FetchArgs;

pub async fn run(args: &FetchArgs) -> Result<()> {
    // Options file problems surface here, before any connection is opened
    let options = load_options(args.options.as_deref())?;
    if let Some(path) = options.as_ref().and_then(|o| o.source_path.as_ref()) {
        tracing::debug!("Using options from {}", path.display());
    }
    let db_url = resolve_db_url(args.db.as_deref(), options.as_ref())?;
    let fetch_options = resolve_fetch_options(args, options.as_ref())?;
    let schema = resolve_schema(args.schema.as_deref(), options.as_ref());

    let pb = spinner("1/2");
    pb.set_message(format!("Fetching metadata from {}...", sanitize_url(&db_url)));

    let source = connect_source(&db_url).await?;
    let fetcher = MetadataFetcher::with_date_mapping(&source, fetch_options.date_mapping);
    let model = fetcher
        .fetch_metadata(config::schema_filter(schema.as_deref()), &fetch_options)
        .await
        .with_context(|| format!("Failed to fetch metadata from {}", source.database_type()))?;

    pb.finish_with_message(format!(
        "Fetching metadata... ✓ {} relations, {} fields, {} foreign keys",
        model.relation_count(),
        model.field_count(),
        model.foreign_key_count()
    ));

    let pb = spinner("2/2");
    pb.set_message(format!("Writing {}...", args.output.display()));

    let format = write_document(&args.output, &model, args.format.map(Into::into))
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    pb.finish_with_message(format!(
        "Writing {}... ✓ ({})",
        args.output.display(),
        format
    ));

    Ok(())
}

fn spinner(prefix: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{prefix}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Read the options file named on the command line, or `./dbmd.toml` if it
/// exists.
fn load_options(explicit: Option<&Path>) -> Result<Option<DbmdOptions>> {
    match explicit {
        Some(path) => {
            let options = config::read_options(path)?;
            Ok(Some(options))
        }
        None => Ok(config::find_options(Path::new("."))?),
    }
}

fn resolve_db_url(explicit: Option<&str>, options: Option<&DbmdOptions>) -> Result<String> {
    // --db, then DATABASE_URL (clap reads the environment after .env is loaded)
    if let Some(url) = explicit {
        return Ok(url.to_string());
    }

    if let Some(url) = options.and_then(|o| o.database.url.as_ref()) {
        return Ok(url.clone());
    }

    Err(dbmd_core::error::DbmdError::NoDatabaseUrl.into())
}

fn resolve_schema(explicit: Option<&str>, options: Option<&DbmdOptions>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| options.and_then(|o| o.database.schema.clone()))
}

/// Start from the options file (or the defaults) and apply the command-line
/// flags on top.
fn resolve_fetch_options(args: &FetchArgs, options: Option<&DbmdOptions>) -> Result<FetchOptions> {
    let mut fetch = match options {
        Some(o) => o.fetch_options()?,
        None => FetchOptions::default(),
    };

    if let Some(mapping) = args.date_mapping {
        fetch.date_mapping = mapping.into();
    }
    if let Some(pattern) = &args.exclude {
        fetch.exclude = Some(compile_exclude(pattern)?);
    }
    if args.no_tables {
        fetch.include_tables = false;
    }
    if args.no_views {
        fetch.include_views = false;
    }
    if args.no_fields {
        fetch.include_fields = false;
    }
    if args.no_foreign_keys {
        fetch.include_foreign_keys = false;
    }

    Ok(fetch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dbmd_core::error::DbmdError;
    use dbmd_core::fetch::DateMapping;

    use crate::args::{Cli, Command};

    fn fetch_args(argv: &[&str]) -> FetchArgs {
        let mut full = vec!["dbmd", "fetch"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Fetch(args) => args,
            Command::Inspect(_) => panic!("expected fetch"),
        }
    }

    fn options(toml: &str) -> DbmdOptions {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(config::OPTIONS_FILE_NAME);
        std::fs::write(&path, toml).unwrap();
        config::read_options(&path).unwrap()
    }

    #[test]
    fn test_flags_override_options_file() {
        let file = options(
            r#"
[database]
url = "postgres://localhost/app"
schema = "public"

[fetch]
date_mapping = "dates-as-dates"
exclude = "^public\\.flyway_"
views = false
"#,
        );
        let args = fetch_args(&[
            "--db",
            "sqlite::memory:",
            "--schema",
            "sales",
            "--date-mapping",
            "dates-as-timestamps",
            "--no-foreign-keys",
            "md.xml",
        ]);

        let fetch = resolve_fetch_options(&args, Some(&file)).unwrap();
        assert_eq!(fetch.date_mapping, DateMapping::DatesAsTimestamps);
        assert!(!fetch.include_views, "file setting kept when no flag given");
        assert!(!fetch.include_foreign_keys);
        assert!(fetch.include_tables && fetch.include_fields);
        assert!(fetch.exclude.unwrap().is_match("public.flyway_schema_history"));

        assert_eq!(resolve_db_url(args.db.as_deref(), Some(&file)).unwrap(), "sqlite::memory:");
        assert_eq!(resolve_schema(args.schema.as_deref(), Some(&file)).as_deref(), Some("sales"));
    }

    #[test]
    fn test_options_file_fills_gaps() {
        let file = options("[database]\nurl = \"postgres://localhost/app\"\nschema = \"public\"\n");
        assert_eq!(resolve_db_url(None, Some(&file)).unwrap(), "postgres://localhost/app");
        assert_eq!(resolve_schema(None, Some(&file)).as_deref(), Some("public"));
        assert_eq!(resolve_schema(None, None), None);
    }

    #[test]
    fn test_missing_url_is_reported() {
        let err = resolve_db_url(None, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbmdError>(),
            Some(DbmdError::NoDatabaseUrl)
        ));
    }

    #[test]
    fn test_bad_exclude_flag_rejected() {
        let args = fetch_args(&["--db", "sqlite::memory:", "--exclude", "(unclosed", "md.xml"]);
        let err = resolve_fetch_options(&args, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbmdError>(),
            Some(DbmdError::Config { .. })
        ));
    }

    #[test]
    fn test_explicit_options_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_options(Some(dir.path().join("missing.toml").as_path())).is_err());

        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[fetch]\nfields = false\n").unwrap();
        let loaded = load_options(Some(path.as_path())).unwrap().unwrap();
        assert_eq!(loaded.fetch.fields, Some(false));
    }
}
