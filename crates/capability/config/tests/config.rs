use bookgate_config::{ConfigError, ReaderMode, ServiceConfig};
use std::io::Write;

const SAMPLE: &str = r#"
tagPasswords:
  DE290Tag.access: "12345678"
  DE290Tag.kill: "87654321"
  BRTag.secret: "topsecret"
defaultTagFormat: DE386
readers:
  - name: foyer
    address: 192.168.1.10
    port: 10001
    mode: host
    antennas: [1, 2]
  - name: backoffice
    address: 192.168.1.11
    port: 10001
    mode: notification
    antennas: [1]
"#;

fn write_temp(contents: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "bookgate-config-test-{}-{}.yaml",
        std::process::id(),
        contents.len()
    ));
    let mut file = std::fs::File::create(&path).expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    path
}

#[test]
fn loads_full_config_from_path() {
    let path = write_temp(SAMPLE);
    let config = ServiceConfig::load_from_path(&path).expect("config");

    assert_eq!(config.default_tag_format, "DE386");
    assert_eq!(config.readers.len(), 2);
    assert_eq!(config.readers[0].name, "foyer");
    assert_eq!(config.readers[0].mode, ReaderMode::Host);
    assert_eq!(config.readers[0].antenna_mask(), 0x03);
    assert_eq!(config.readers[1].mode, ReaderMode::Notification);
    assert_eq!(
        config.tag_passwords.get("DE290Tag.access").map(String::as_str),
        Some("12345678")
    );
    let _ = std::fs::remove_file(path);
}

#[test]
fn default_tag_format_falls_back_to_de290() {
    let path = write_temp(
        r#"
readers:
  - name: solo
    address: 10.0.0.5
    port: 10001
    mode: host
    antennas: [1]
"#,
    );
    let config = ServiceConfig::load_from_path(&path).expect("config");
    assert_eq!(config.default_tag_format, "DE290");
    assert!(config.tag_passwords.is_empty());
    let _ = std::fs::remove_file(path);
}

#[test]
fn empty_readers_is_fatal() {
    let path = write_temp("tagPasswords: {}\nreaders: []\n");
    let err = ServiceConfig::load_from_path(&path).expect_err("must fail");
    assert!(matches!(err, ConfigError::NoReaders));
    let _ = std::fs::remove_file(path);
}

#[test]
fn duplicate_reader_names_are_rejected() {
    let path = write_temp(
        r#"
readers:
  - name: twin
    address: 10.0.0.5
    port: 10001
    mode: host
    antennas: [1]
  - name: twin
    address: 10.0.0.6
    port: 10001
    mode: host
    antennas: [1]
"#,
    );
    let err = ServiceConfig::load_from_path(&path).expect_err("must fail");
    assert!(matches!(err, ConfigError::DuplicateReader(name) if name == "twin"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn antenna_out_of_range_is_rejected() {
    let path = write_temp(
        r#"
readers:
  - name: odd
    address: 10.0.0.5
    port: 10001
    mode: host
    antennas: [9]
"#,
    );
    let err = ServiceConfig::load_from_path(&path).expect_err("must fail");
    assert!(matches!(err, ConfigError::AntennaOutOfRange { antenna: 9, .. }));
    let _ = std::fs::remove_file(path);
}

#[test]
fn load_from_env_requires_config_file_path() {
    // Rust 2024 中 set_var/remove_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::remove_var("CONFIG_FILE_PATH");
    }
    let err = ServiceConfig::load_from_env().expect_err("must fail");
    assert!(matches!(err, ConfigError::Missing(var) if var == "CONFIG_FILE_PATH"));
}
