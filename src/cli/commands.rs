use crate::cert::{ExpiryChecker, IdentityColumn, IdentitySummary};
use crate::cli::args::*;
use crate::cli::completions::handle_completion_command;
use crate::config::Config;
use crate::keychain::{
    CertificateExtractor, ExportRequest, Exporter, IdentityLocator, IdentityRecord, PassphraseMode,
};
use crate::native::NativeStore;
use crate::utils::errors::{KeychainError, Result};
use crate::utils::files::{sanitize_filename, FsWriter};
use crate::utils::output::{build_table_data, OutputFormat};
use crate::utils::paths::KeychainP12Paths;
use std::io;
use std::path::PathBuf;

const DEFAULT_COLUMNS: &[&str] = &["label", "not_after", "expired", "fingerprint"];

pub fn handle_command(cli: Cli) -> Result<()> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "keychain_p12=warn",  // Default: warnings only
            1 => "keychain_p12=info",  // -v: info level
            2 => "keychain_p12=debug", // -vv: debug level
            _ => "keychain_p12=trace", // -vvv+: trace level
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    let output = OutputFormat::new(cli.raw);
    let config_path = cli
        .config
        .as_deref()
        .map(KeychainP12Paths::expand_home)
        .transpose()?;

    match cli.command {
        Commands::Completion { shell } => handle_completion_command(shell),
        Commands::List {
            label,
            full_match,
            valid_only,
            columns,
            json,
        } => {
            let config = Config::load(config_path.as_deref())?;
            let store = open_store()?;
            let request = ListRequest {
                label: label.or(config.label.clone()).unwrap_or_default(),
                full_match: full_match || config.full_match,
                valid_only,
                columns: parse_columns(columns.as_deref())?,
                json,
            };
            handle_list(store.as_ref(), &request, &config, &output)
        }
        Commands::Export {
            label,
            full_match,
            output: destination,
            no_validate,
            passphrase,
        } => {
            let config = Config::load(config_path.as_deref())?;
            let label = label.or(config.label.clone()).ok_or_else(|| {
                KeychainError::InvalidArgument(
                    "a label is required (--label or `label` in config)".to_string(),
                )
            })?;
            let destination = resolve_destination(destination.as_deref(), &config, &label)?;
            let request = ExportCommand {
                label,
                full_match: full_match || config.full_match,
                validate: config.validate && !no_validate,
                destination,
                passphrase: passphrase.unwrap_or(config.passphrase),
            };

            let store = open_store()?;
            handle_export(store.as_ref(), &request, &config)
        }
    }
}

/// Options of the `list` command after merging with the config file
pub struct ListRequest {
    pub label: String,
    pub full_match: bool,
    pub valid_only: bool,
    pub columns: Vec<IdentityColumn>,
    pub json: bool,
}

/// Options of the `export` command after merging with the config file
pub struct ExportCommand {
    pub label: String,
    pub full_match: bool,
    pub validate: bool,
    pub destination: PathBuf,
    pub passphrase: PassphraseMode,
}

#[cfg(target_os = "macos")]
fn open_store() -> Result<Box<dyn NativeStore>> {
    Ok(Box::new(crate::native::MacKeychain::new()))
}

#[cfg(not(target_os = "macos"))]
fn open_store() -> Result<Box<dyn NativeStore>> {
    Err(KeychainError::UnsupportedPlatform(
        "keychain access requires macOS".to_string(),
    ))
}

pub fn handle_list(
    store: &dyn NativeStore,
    request: &ListRequest,
    config: &Config,
    output: &OutputFormat,
) -> Result<()> {
    let summaries = collect_summaries(store, request, config)?;

    if request.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    let data = build_table_data(&summaries, &request.columns, !output.raw);
    output.print_table(&data);
    Ok(())
}

/// Matching identities with their parsed certificates, in keychain order
pub fn collect_summaries(
    store: &dyn NativeStore,
    request: &ListRequest,
    config: &Config,
) -> Result<Vec<IdentitySummary>> {
    let locator = IdentityLocator::new(store);
    let records = if request.valid_only {
        let checker = ExpiryChecker::new(config.leeway_seconds);
        locator
            .find_and_validate_identities(&request.label, request.full_match, &checker)
            .map_err(|partial| partial.error)?
    } else {
        locator.find_identities(&request.label, request.full_match)?
    };

    let extractor = CertificateExtractor::new(store);
    records
        .iter()
        .map(|record| {
            // Validated records already carry their certificate
            let certificate = match record.certificate() {
                Some(cert) => cert.clone(),
                None => extractor.certificate_from_identity(record.handle().borrow())?,
            };
            Ok(IdentitySummary {
                label: record.label().to_string(),
                certificate,
            })
        })
        .collect()
}

pub fn handle_export(
    store: &dyn NativeStore,
    request: &ExportCommand,
    config: &Config,
) -> Result<()> {
    let locator = IdentityLocator::new(store);
    let records = select_for_export(&locator, request, config)?;

    if records.is_empty() {
        return Err(KeychainError::InvalidArgument(format!(
            "no usable identity matches label '{}'",
            request.label
        )));
    }

    for record in &records {
        tracing::info!("Exporting identity: {}", record.label());
    }

    let export_request =
        ExportRequest::from_records(&records, request.destination.clone(), request.passphrase);
    Exporter::new(store).export(&export_request, &FsWriter)?;

    eprintln!(
        "Exported {} identities to: {}",
        records.len(),
        request.destination.display()
    );
    Ok(())
}

/// Identities to export. A validation pass cut short by an unreadable
/// certificate still exports what it accepted before the failure.
fn select_for_export<'s>(
    locator: &IdentityLocator<'s>,
    request: &ExportCommand,
    config: &Config,
) -> Result<Vec<IdentityRecord<'s>>> {
    if !request.validate {
        return locator.find_identities(&request.label, request.full_match);
    }

    let checker = ExpiryChecker::new(config.leeway_seconds);
    match locator.find_and_validate_identities(&request.label, request.full_match, &checker) {
        Ok(records) => Ok(records),
        Err(partial) if !partial.accepted.is_empty() => {
            tracing::warn!(
                "{}; continuing with {} identities",
                partial.error,
                partial.accepted.len()
            );
            Ok(partial.accepted)
        }
        Err(partial) => Err(partial.error),
    }
}

fn resolve_destination(output: Option<&str>, config: &Config, label: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return KeychainP12Paths::expand_home(path);
    }
    match &config.output_dir {
        Some(dir) => Ok(dir.join(format!("{}.p12", sanitize_filename(label)))),
        None => Err(KeychainError::InvalidArgument(
            "an output path is required (--output or `output_dir` in config)".to_string(),
        )),
    }
}

/// Parse a column list; a leading `+` appends to the default columns
pub fn parse_columns(columns: Option<&str>) -> Result<Vec<IdentityColumn>> {
    let names: Vec<&str> = match columns {
        Some(spec) => match spec.strip_prefix('+') {
            Some(extra) => DEFAULT_COLUMNS
                .iter()
                .copied()
                .chain(extra.split(','))
                .collect(),
            None => spec.split(',').collect(),
        },
        None => DEFAULT_COLUMNS.to_vec(),
    };

    names
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|col| {
            col.parse::<IdentityColumn>()
                .map_err(KeychainError::InvalidArgument)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::FakeKeychain;

    const TEST_CERT: &[u8] = include_bytes!("../../tests/fixtures/test_cert.der");
    const EXPIRED_CERT: &[u8] = include_bytes!("../../tests/fixtures/expired_cert.der");

    #[test]
    fn test_parse_columns() {
        assert_eq!(
            parse_columns(None).unwrap(),
            vec![
                IdentityColumn::Label,
                IdentityColumn::NotAfter,
                IdentityColumn::Expired,
                IdentityColumn::Fingerprint
            ]
        );
        assert_eq!(
            parse_columns(Some("subject, serial")).unwrap(),
            vec![IdentityColumn::Subject, IdentityColumn::Serial]
        );
        assert_eq!(parse_columns(Some("+issuer")).unwrap().len(), 5);
        assert!(parse_columns(Some("nope")).is_err());
    }

    #[test]
    fn test_resolve_destination() {
        let mut config = Config::default();
        assert!(resolve_destination(None, &config, "A").is_err());

        config.output_dir = Some(PathBuf::from("/tmp/exports"));
        assert_eq!(
            resolve_destination(None, &config, "iPhone Developer: A").unwrap(),
            PathBuf::from("/tmp/exports/iPhone Developer_ A.p12")
        );
        assert_eq!(
            resolve_destination(Some("/x/y.p12"), &config, "A").unwrap(),
            PathBuf::from("/x/y.p12")
        );
    }

    #[test]
    fn test_collect_summaries_valid_only() {
        let store = FakeKeychain::new()
            .with_identity("Dev: current", TEST_CERT)
            .with_identity("Dev: old", EXPIRED_CERT);
        let request = ListRequest {
            label: "Dev".to_string(),
            full_match: false,
            valid_only: true,
            columns: parse_columns(None).unwrap(),
            json: false,
        };

        let summaries = collect_summaries(&store, &request, &Config::default()).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].label, "Dev: current");
        assert!(store.is_balanced());
    }

    #[test]
    fn test_valid_only_reads_each_certificate_once() {
        let store = FakeKeychain::new().with_identity("Dev: current", TEST_CERT);
        let checker = ExpiryChecker::default();
        {
            let _records = IdentityLocator::new(&store)
                .find_and_validate_identities("Dev", false, &checker)
                .unwrap();
        }
        let validation_calls = store.stats().native_calls;

        let request = ListRequest {
            label: "Dev".to_string(),
            full_match: false,
            valid_only: true,
            columns: parse_columns(None).unwrap(),
            json: false,
        };
        let summaries = collect_summaries(&store, &request, &Config::default()).unwrap();

        assert_eq!(summaries[0].certificate.subject, "CN=Test");
        assert_eq!(store.stats().native_calls, 2 * validation_calls);
        assert!(store.is_balanced());
    }

    #[test]
    fn test_handle_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.p12");
        let store = FakeKeychain::new()
            .with_identity("Dev: current", TEST_CERT)
            .with_identity("Dev: old", EXPIRED_CERT);
        let request = ExportCommand {
            label: "Dev".to_string(),
            full_match: false,
            validate: true,
            destination: destination.clone(),
            passphrase: PassphraseMode::FixedEmpty,
        };

        handle_export(&store, &request, &Config::default()).unwrap();

        let written = std::fs::read(&destination).unwrap();
        assert!(written.starts_with(crate::native::fake::FAKE_EXPORT_MAGIC));
        assert_eq!(store.exports()[0].item_count, 1);
        assert!(store.is_balanced());
    }

    #[test]
    fn test_export_partial_validation_keeps_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FakeKeychain::new()
            .with_identity("Dev: current", TEST_CERT)
            .with_broken_identity("Dev: broken");
        let request = ExportCommand {
            label: "Dev".to_string(),
            full_match: false,
            validate: true,
            destination: dir.path().join("partial.p12"),
            passphrase: PassphraseMode::FixedEmpty,
        };

        handle_export(&store, &request, &Config::default()).unwrap();
        assert_eq!(store.exports()[0].item_count, 1);
        assert!(store.is_balanced());
    }

    #[test]
    fn test_export_nothing_valid_is_error() {
        let store = FakeKeychain::new().with_identity("Dev: old", EXPIRED_CERT);
        let request = ExportCommand {
            label: "Dev".to_string(),
            full_match: false,
            validate: true,
            destination: PathBuf::from("/nonexistent/never.p12"),
            passphrase: PassphraseMode::FixedEmpty,
        };

        let err = handle_export(&store, &request, &Config::default()).unwrap_err();
        assert!(matches!(err, KeychainError::InvalidArgument(_)));
        assert!(store.exports().is_empty());
        assert!(store.is_balanced());
    }
}
