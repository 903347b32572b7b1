mod common;

use std::fs;
use std::process::Command;

use tempfile::tempdir;

#[test]
fn cli_writes_a_sparse_network() {
    let tmp = tempdir().expect("temporary directory");
    let input = tmp.path().join("genes.bv");
    let out = tmp.path().join("network.tsv");
    common::write_bit_vectors(&input);

    let exe = env!("CARGO_BIN_EXE_boolnet");
    let output = Command::new(exe)
        .args([
            input.to_str().expect("path str"),
            "--out",
            out.to_str().expect("path str"),
            "--block-size",
            "3",
            "--threads",
            "2",
        ])
        .output()
        .expect("run boolnet cli");

    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = fs::read_to_string(&out).expect("read network");
    let mut triples: Vec<_> = common::sparse_relations(&text)
        .into_iter()
        .map(|(a, b, c, _, _)| (a, b, c))
        .collect();
    triples.sort();
    assert_eq!(triples, common::EXPECTED_ROW_RELATIONS);
}

#[test]
fn cli_flags_override_the_config_file() {
    let tmp = tempdir().expect("temporary directory");
    let input = tmp.path().join("genes.bv");
    let out = tmp.path().join("network.dense");
    let config = tmp.path().join("boolnet.toml");
    common::write_bit_vectors(&input);
    fs::write(&config, "prob_threshold = 0.2\nstat_threshold = 4.0\n").expect("write config");

    let status = Command::new(env!("CARGO_BIN_EXE_boolnet"))
        .args([
            input.to_str().expect("path str"),
            "--out",
            out.to_str().expect("path str"),
            "--mode",
            "dense",
            "--config",
            config.to_str().expect("path str"),
            "--stat-threshold",
            "2.5",
        ])
        .status()
        .expect("run boolnet cli");

    assert!(status.success(), "CLI exited with status {status:?}");
    let bytes = fs::read(&out).expect("read network");
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.starts_with("#boolnet dense 1\n"));
    assert!(text.contains("header\tthreshold\t0.2\n"));
    assert!(text.contains("header\tstat_threshold\t2.5\n"));
    assert!(text.contains("matrix\t4\t4\n"));
}

#[test]
fn cli_reports_a_missing_phenotype_and_exits_with_failure() {
    let tmp = tempdir().expect("temporary directory");
    let input = tmp.path().join("genes.bv");
    let phenotypes = tmp.path().join("phenotypes.tsv");
    let out = tmp.path().join("network.tsv");
    common::write_bit_vectors(&input);
    let flags = vec!["1"; common::SAMPLES].join("\t");
    fs::write(&phenotypes, format!("tumor\tTumor\tcases\t{flags}\n")).expect("write phenotypes");

    let output = Command::new(env!("CARGO_BIN_EXE_boolnet"))
        .args([
            input.to_str().expect("path str"),
            "--out",
            out.to_str().expect("path str"),
            "--phenotype-file",
            phenotypes.to_str().expect("path str"),
            "--phenotype",
            "stroma",
        ])
        .output()
        .expect("run boolnet cli");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("phenotype 'stroma' was not found"), "stderr: {stderr}");
}

#[test]
fn cli_failure_before_the_scan_leaves_an_existing_network_untouched() {
    let tmp = tempdir().expect("temporary directory");
    let input = tmp.path().join("genes.bv");
    let phenotypes = tmp.path().join("phenotypes.tsv");
    let out = tmp.path().join("network.tsv");
    common::write_bit_vectors(&input);
    let flags = vec!["1"; common::SAMPLES].join("\t");
    fs::write(&phenotypes, format!("tumor\tTumor\tcases\t{flags}\n")).expect("write phenotypes");
    fs::write(&out, "PREVIOUS RESULTS\n").expect("write previous network");

    for mode in ["sparse", "dense"] {
        let output = Command::new(env!("CARGO_BIN_EXE_boolnet"))
            .args([
                input.to_str().expect("path str"),
                "--out",
                out.to_str().expect("path str"),
                "--mode",
                mode,
                "--phenotype-file",
                phenotypes.to_str().expect("path str"),
                "--phenotype",
                "stroma",
            ])
            .output()
            .expect("run boolnet cli");

        assert_eq!(output.status.code(), Some(1), "mode {mode}");
        let kept = fs::read_to_string(&out).expect("read previous network");
        assert_eq!(kept, "PREVIOUS RESULTS\n", "mode {mode}");
    }
}

#[test]
fn cli_rejects_an_invalid_threshold() {
    let tmp = tempdir().expect("temporary directory");
    let input = tmp.path().join("genes.bv");
    common::write_bit_vectors(&input);

    let output = Command::new(env!("CARGO_BIN_EXE_boolnet"))
        .args([
            input.to_str().expect("path str"),
            "--out",
            tmp.path().join("network.tsv").to_str().expect("path str"),
            "--threshold",
            "1.5",
        ])
        .output()
        .expect("run boolnet cli");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Configuration error"));
}
