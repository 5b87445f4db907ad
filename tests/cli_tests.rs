mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper to create an mmdb command
fn mmdb_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("mmdb"))
}

/// Write a small IPv6 database with one IPv4 and one IPv6 network
fn write_test_database(dir: &TempDir) -> PathBuf {
    let db = common::build_database(
        6,
        28,
        &[
            (
                "1.0.0.0/8",
                common::map(&[
                    ("city", common::string("One")),
                    ("population", common::uint64(u64::MAX)),
                    ("id", common::uint128(u128::MAX)),
                ]),
            ),
            ("2001:db8::/32", common::map(&[("city", common::string("Docs"))])),
        ],
    );
    let path = dir.path().join("test.mmdb");
    fs::write(&path, db).unwrap();
    path
}

#[test]
fn test_help() {
    mmdb_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MaxMind DB"));
}

#[test]
fn test_version() {
    mmdb_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mmdb"));
}

#[test]
fn test_query_help() {
    mmdb_cmd()
        .args(["query", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Look up an IP address"));
}

#[test]
fn test_query_ipv4_hit() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    mmdb_cmd()
        .arg("query")
        .arg(&db_path)
        .arg("1.2.3.4")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"city\": \"One\""))
        .stdout(predicate::str::contains("\"network\": \"1.0.0.0/8\""))
        .stdout(predicate::str::contains("\"prefix_len\": 8"))
        .stdout(predicate::str::contains("\"population\": 18446744073709551615"))
        .stdout(predicate::str::contains(
            "\"id\": \"340282366920938463463374607431768211455\"",
        ));
}

#[test]
fn test_query_ipv6_hit() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    mmdb_cmd()
        .arg("query")
        .arg(&db_path)
        .arg("2001:db8::1")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"city\": \"Docs\""))
        .stdout(predicate::str::contains("\"network\": \"2001:db8::/32\""));
}

#[test]
fn test_query_miss() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    mmdb_cmd()
        .arg("query")
        .arg(&db_path)
        .arg("9.9.9.9")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_query_quiet_mode() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    mmdb_cmd()
        .args(["query", "--quiet"])
        .arg(&db_path)
        .arg("1.1.1.1")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    mmdb_cmd()
        .args(["query", "--quiet"])
        .arg(&db_path)
        .arg("2.2.2.2")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_query_with_cache() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    mmdb_cmd()
        .args(["query", "--cache-size", "100"])
        .arg(&db_path)
        .arg("1.1.1.1")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"city\": \"One\""));
}

#[test]
fn test_query_invalid_ip() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    mmdb_cmd()
        .arg("query")
        .arg(&db_path)
        .arg("not-an-ip")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not an IP address"));
}

#[test]
fn test_query_missing_database() {
    mmdb_cmd()
        .args(["query", "/nonexistent/test.mmdb", "1.1.1.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load database"));
}

#[test]
fn test_inspect_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    mmdb_cmd()
        .arg("inspect")
        .arg(&db_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Type:     Test-DB"))
        .stdout(predicate::str::contains("IP version:   6"))
        .stdout(predicate::str::contains("Record size:  28 bits"))
        .stdout(predicate::str::contains("2023-11-14T22:13:20Z"))
        .stdout(predicate::str::contains("[en] Test database"));
}

#[test]
fn test_inspect_json() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = write_test_database(&temp_dir);

    let output = mmdb_cmd()
        .args(["inspect", "--json"])
        .arg(&db_path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let metadata = &json["metadata"];
    assert_eq!(metadata["database_type"], "Test-DB");
    assert_eq!(metadata["ip_version"], 6);
    assert_eq!(metadata["record_size"], 28);
    assert_eq!(metadata["build_epoch"], 1_700_000_000u64);
    assert_eq!(metadata["languages"][0], "en");

    let node_count = metadata["node_count"].as_u64().unwrap();
    assert_eq!(json["search_tree_size"].as_u64().unwrap(), node_count * 7);
    assert_eq!(json["data_section_start"].as_u64().unwrap(), node_count * 7 + 16);
}

#[test]
fn test_decode_raw_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("values.bin");
    // "Foo" at 0, then a pointer back to it at 4
    let mut bytes = common::string("Foo");
    bytes.extend(common::pointer(0));
    fs::write(&path, &bytes).unwrap();

    let output = mmdb_cmd()
        .arg("decode")
        .arg(&path)
        .arg("4")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["value"], "Foo");
    assert_eq!(json["offset"], 4);
    assert_eq!(json["next_offset"], 6);
}

#[test]
fn test_decode_with_base() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("values.bin");
    let mut bytes = vec![0xAA; 10];
    bytes.extend(common::array(&[common::string("a"), common::boolean(true)]));
    let pointer_at = bytes.len();
    bytes.extend(common::pointer(0));
    fs::write(&path, &bytes).unwrap();

    mmdb_cmd()
        .arg("decode")
        .arg(&path)
        .arg(pointer_at.to_string())
        .args(["--base", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"a\""))
        .stdout(predicate::str::contains("true"));
}

#[test]
fn test_decode_invalid_extended_type() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.bin");
    fs::write(&path, [0x00u8, 0x00]).unwrap();

    mmdb_cmd()
        .arg("decode")
        .arg(&path)
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Invalid Extended Type at offset 1 val 7",
        ));
}
