//! End-to-end runs of the front end against temporary files.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use test_support::{flip_byte, insert_at, random_bytes};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: tempdir().unwrap() }
    }

    fn file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn run(args: &[&str]) -> (i32, Vec<u8>, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut full = vec!["dbsync"];
    full.extend_from_slice(args);
    let status = cli::run(full, &mut stdout, &mut stderr);
    (status, stdout, String::from_utf8(stderr).unwrap())
}

#[test]
fn signature_delta_patch_reconstructs_target() {
    let ws = Workspace::new();
    let baseline = random_bytes(1, 50_000);
    let target = insert_at(&flip_byte(&baseline, 20_000), 7_000, b"inserted bytes");
    let base = ws.file("base.db", &baseline);
    let new = ws.file("new.db", &target);
    let sig = ws.path("base.sig");
    let delta = ws.path("new.delta");
    let out = ws.path("out.db");

    let (status, _, stderr) = run(&["signature", arg(&base), "-o", arg(&sig), "-b", "1024"]);
    assert_eq!(status, 0, "{stderr}");
    let (status, _, stderr) = run(&["delta", arg(&sig), arg(&new), "-o", arg(&delta)]);
    assert_eq!(status, 0, "{stderr}");
    assert!(fs::metadata(&delta).unwrap().len() < target.len() as u64 / 4);
    let (status, _, stderr) = run(&["patch", arg(&base), arg(&delta), "-o", arg(&out)]);
    assert_eq!(status, 0, "{stderr}");

    assert_eq!(fs::read(&out).unwrap(), target);
}

#[test]
fn delta_adopts_the_hash_and_block_size_of_the_checksums() {
    let ws = Workspace::new();
    let baseline = random_bytes(8, 40_000);
    let target = insert_at(&flip_byte(&baseline, 31_000), 3_000, b"grown");
    let base = ws.file("base.db", &baseline);
    let new = ws.file("new.db", &target);
    let sig = ws.path("base.sig");
    let delta = ws.path("new.delta");
    let out = ws.path("out.db");

    let (status, _, stderr) = run(&["signature", arg(&base), "-o", arg(&sig), "--hash", "md5", "-b", "1024"]);
    assert_eq!(status, 0, "{stderr}");
    let (status, _, stderr) = run(&["delta", arg(&sig), arg(&new), "-o", arg(&delta)]);
    assert_eq!(status, 0, "{stderr}");

    let reader = protocol::InstructionReader::new(fs::File::open(&delta).unwrap()).unwrap();
    assert_eq!(reader.block_len().get(), 1024);
    assert_eq!(reader.digest_algorithm(), Some(checksums::StrongHashAlgorithm::Md5));

    let (status, _, stderr) = run(&["patch", arg(&base), arg(&delta), "-o", arg(&out)]);
    assert_eq!(status, 0, "{stderr}");
    assert_eq!(fs::read(&out).unwrap(), target);
}

#[test]
fn delta_with_conflicting_explicit_settings_is_a_configuration_error() {
    let ws = Workspace::new();
    let baseline = random_bytes(9, 10_000);
    let base = ws.file("base.db", &baseline);
    let sig = ws.path("base.sig");
    let delta = ws.path("new.delta");

    assert_eq!(run(&["signature", arg(&base), "-o", arg(&sig), "-b", "1024"]).0, 0);

    let (status, _, stderr) = run(&["delta", arg(&sig), arg(&base), "-o", arg(&delta), "-b", "2048"]);
    assert_eq!(status, 1, "{stderr}");
    assert!(!delta.exists());

    let (status, _, stderr) = run(&["delta", arg(&sig), arg(&base), "-o", arg(&delta), "--hash", "sha1"]);
    assert_eq!(status, 1, "{stderr}");
    assert!(!delta.exists());

    let (status, _, stderr) = run(&["delta", arg(&sig), arg(&base), "-o", arg(&delta), "-b", "1024", "--hash", "sha256"]);
    assert_eq!(status, 0, "{stderr}");
}

#[test]
fn patch_may_replace_the_baseline_in_place() {
    let ws = Workspace::new();
    let baseline = random_bytes(2, 20_000);
    let target = flip_byte(&baseline, 9_999);
    let base = ws.file("base.db", &baseline);
    let new = ws.file("new.db", &target);
    let sig = ws.path("base.sig");
    let delta = ws.path("new.delta");

    assert_eq!(run(&["signature", arg(&base), "-o", arg(&sig)]).0, 0);
    assert_eq!(run(&["delta", arg(&sig), arg(&new), "-o", arg(&delta)]).0, 0);
    let (status, _, stderr) = run(&["patch", arg(&base), arg(&delta), "-o", arg(&base)]);
    assert_eq!(status, 0, "{stderr}");

    assert_eq!(fs::read(&base).unwrap(), target);
}

#[test]
fn sync_reports_statistics() {
    let ws = Workspace::new();
    let baseline = random_bytes(3, 16_384);
    let target = flip_byte(&baseline, 0);
    let base = ws.file("base.db", &baseline);
    let new = ws.file("new.db", &target);
    let out = ws.path("out.db");

    let (status, stdout, stderr) = run(&["sync", arg(&base), arg(&new), "-o", arg(&out), "--stats"]);
    assert_eq!(status, 0, "{stderr}");
    assert!(stdout.is_empty());
    assert!(stderr.contains("baseline: 16384 bytes in 4 blocks"), "{stderr}");
    assert!(stderr.contains("copied: 12288 bytes in 3 copies (1 reads)"), "{stderr}");
    assert!(stderr.contains("literal: 4096 bytes in 1 literals"), "{stderr}");
    assert_eq!(fs::read(&out).unwrap(), target);
}

#[test]
fn every_hash_algorithm_round_trips() {
    for hash in ["sha256", "sha1", "md5", "xxh3-128"] {
        let ws = Workspace::new();
        let baseline = random_bytes(4, 9_000);
        let target = insert_at(&baseline, 4_500, b"xyz");
        let base = ws.file("base.db", &baseline);
        let new = ws.file("new.db", &target);
        let out = ws.path("out.db");

        let (status, _, stderr) = run(&["sync", arg(&base), arg(&new), "-o", arg(&out), "--hash", hash, "-b", "512"]);
        assert_eq!(status, 0, "{hash}: {stderr}");
        assert_eq!(fs::read(&out).unwrap(), target, "{hash}");
    }
}

#[test]
fn delta_against_a_shorter_baseline_is_an_integrity_failure() {
    let ws = Workspace::new();
    let baseline = random_bytes(5, 16_384);
    let base = ws.file("base.db", &baseline);
    let sig = ws.path("base.sig");
    let delta = ws.path("new.delta");
    let out = ws.path("out.db");

    assert_eq!(run(&["signature", arg(&base), "-o", arg(&sig)]).0, 0);
    assert_eq!(run(&["delta", arg(&sig), arg(&base), "-o", arg(&delta)]).0, 0);
    let short = ws.file("short.db", &baseline[..4096]);

    let (status, _, stderr) = run(&["patch", arg(&short), arg(&delta), "-o", arg(&out)]);
    assert_eq!(status, 2, "{stderr}");
    assert!(!out.exists());
}

#[test]
fn patch_against_altered_baseline_fails_verification() {
    let ws = Workspace::new();
    let baseline = random_bytes(6, 12_288);
    let target = flip_byte(&baseline, 100);
    let base = ws.file("base.db", &baseline);
    let new = ws.file("new.db", &target);
    let sig = ws.path("base.sig");
    let delta = ws.path("new.delta");
    let out = ws.path("out.db");

    assert_eq!(run(&["signature", arg(&base), "-o", arg(&sig)]).0, 0);
    assert_eq!(run(&["delta", arg(&sig), arg(&new), "-o", arg(&delta)]).0, 0);
    let drifted = ws.file("drifted.db", &flip_byte(&baseline, 10_000));

    let (status, _, stderr) = run(&["patch", arg(&drifted), arg(&delta), "-o", arg(&out)]);
    assert_eq!(status, 2, "{stderr}");
    assert!(stderr.contains("dbsync: error:"));
    assert!(!out.exists());

    let (status, _, stderr) = run(&["patch", arg(&drifted), arg(&delta), "-o", arg(&out), "--no-verify"]);
    assert_eq!(status, 0, "{stderr}");
    assert_ne!(fs::read(&out).unwrap(), target);
}

#[test]
fn truncated_delta_is_rejected() {
    let ws = Workspace::new();
    let baseline = random_bytes(7, 8_192);
    let base = ws.file("base.db", &baseline);
    let sig = ws.path("base.sig");
    let delta = ws.path("new.delta");
    let out = ws.path("out.db");

    assert_eq!(run(&["signature", arg(&base), "-o", arg(&sig)]).0, 0);
    assert_eq!(run(&["delta", arg(&sig), arg(&base), "-o", arg(&delta)]).0, 0);
    let encoded = fs::read(&delta).unwrap();
    let cut = ws.file("cut.delta", &encoded[..encoded.len() - 1]);

    let (status, _, stderr) = run(&["patch", arg(&base), arg(&cut), "-o", arg(&out)]);
    assert_ne!(status, 0, "{stderr}");
    assert!(!out.exists());
}

#[test]
fn bad_block_size_is_a_usage_error() {
    let ws = Workspace::new();
    let base = ws.file("base.db", b"abc");
    let (status, _, stderr) = run(&["signature", arg(&base), "-o", "-", "--block-size", "0"]);
    assert_eq!(status, 1);
    assert!(stderr.contains("--block-size"), "{stderr}");
}

#[test]
fn oversized_block_size_is_a_configuration_error() {
    let ws = Workspace::new();
    let base = ws.file("base.db", b"abc");
    let (status, _, stderr) = run(&["signature", arg(&base), "-o", "-", "--block-size", "4294967295"]);
    assert_eq!(status, 1, "{stderr}");
}

#[test]
fn checksums_and_target_cannot_both_come_from_stdin() {
    let (status, _, stderr) = run(&["delta", "-", "-", "-o", "-"]);
    assert_eq!(status, 1);
    assert!(stderr.contains("target cannot be"), "{stderr}");
}
