use crate::common::{NEW_TEXT, OLD_TEXT};
use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::{FileWriteBin, FileWriteStr, PathChild};
use rstest::fixture;
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(dir.path().join(".git").join("objects"))
        .expect("Failed to create object directory");
    dir
}

/// `old.txt` and `new.txt` differing in their middle line
#[fixture]
pub fn text_pair_dir(repository_dir: TempDir) -> TempDir {
    repository_dir
        .child("old.txt")
        .write_str(OLD_TEXT)
        .expect("Failed to write old.txt");
    repository_dir
        .child("new.txt")
        .write_str(NEW_TEXT)
        .expect("Failed to write new.txt");
    repository_dir
}

/// `data.bin` holds a NUL byte, `notes.txt` is plain text
#[fixture]
pub fn binary_pair_dir(repository_dir: TempDir) -> TempDir {
    repository_dir
        .child("data.bin")
        .write_binary(b"head\0tail\n")
        .expect("Failed to write data.bin");
    repository_dir
        .child("notes.txt")
        .write_str("head\ntail\n")
        .expect("Failed to write notes.txt");
    repository_dir
}

pub fn run_bitpatch_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("bitpatch").expect("Failed to find bitpatch binary");
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("RUST_LOG");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn stdout_of(dir: &Path, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
    let output = run_bitpatch_command(dir, args).assert().success();
    let stdout = output.get_output().stdout.clone();
    Ok(String::from_utf8(stdout)?)
}
