use std::fs;

use rulesctl_config::{ConfigError, ConnectionOptions, Credentials, RcSettings, load_rc_file};

#[test]
fn rc_file_layers_under_explicit_flags() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(".rulesctlrc");
    fs::write(&path, "verbose = true\ndebug = true\n")?;

    let rc = load_rc_file(&path)?;
    assert!(rc.found);

    let flags = RcSettings {
        verbose: None,
        debug: Some(false),
    };
    let settings = RcSettings::default()
        .overlay(rc.settings)
        .overlay(flags)
        .resolve();
    assert!(settings.verbose);
    assert!(!settings.debug);
    Ok(())
}

#[test]
fn rc_file_with_unsupported_keys_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(".rulesctlrc");
    fs::write(&path, "debug = true\npretty_print = false\ninsecure = true\n")?;

    match load_rc_file(&path) {
        Err(ConfigError::UnsupportedSettings { keys, path: reported }) => {
            assert_eq!(keys, vec!["insecure", "pretty_print"]);
            assert_eq!(reported, path);
        }
        other => anyhow::bail!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[test]
fn client_certificate_paths_must_exist() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cert = dir.path().join("client.pem");
    fs::write(&cert, "-----BEGIN CERTIFICATE-----\n")?;

    let config = ConnectionOptions {
        server_url: "https://entitlements.example.com/api".into(),
        client_cert: Some(cert.clone()),
        ..ConnectionOptions::default()
    }
    .resolve()?;
    assert_eq!(
        config.credentials,
        Credentials::ClientCert {
            cert,
            key: None
        }
    );
    assert!(!config.insecure);

    let missing = ConnectionOptions {
        client_cert: Some(dir.path().join("absent.pem")),
        ..ConnectionOptions::default()
    }
    .resolve();
    assert!(matches!(missing, Err(ConfigError::ReadFile { .. })));
    Ok(())
}

#[test]
fn explicit_ca_bundle_is_kept() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let ca = dir.path().join("ca.pem");
    fs::write(&ca, "-----BEGIN CERTIFICATE-----\n")?;

    let config = ConnectionOptions {
        server_ca: Some(ca.clone()),
        ..ConnectionOptions::default()
    }
    .resolve()?;
    assert_eq!(config.server_ca, Some(ca));
    assert!(config.insecure, "default URL targets localhost");
    Ok(())
}
