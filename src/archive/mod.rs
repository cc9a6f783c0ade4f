//! Safe zip extraction onto a live game directory
//!
//! Entries that would land outside the destination ("zip slip") are skipped
//! one by one. Config files the user may have edited are merged instead of
//! overwritten.

pub mod checksum;
pub mod ini;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{QuickFixError, Result};
use crate::logging::Logger;

pub use ini::merge_config_files;

/// Extract `archive_path` into `destination`.
///
/// Returns the archive-relative paths (forward slashes) of every file entry
/// that was written or merged, in archive order. This list is what the
/// ledger stores for uninstall.
pub fn extract_archive(
    archive_path: &Path,
    destination: &Path,
    config_files: &[String],
    log: &Logger,
) -> Result<Vec<String>> {
    let file = File::open(archive_path).map_err(|e| {
        QuickFixError::Integrity(format!("cannot open {}: {}", archive_path.display(), e))
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        QuickFixError::Integrity(format!("{} is not a valid zip: {}", archive_path.display(), e))
    })?;

    fs::create_dir_all(destination)?;
    let root = destination.canonicalize()?;
    log.install(&format!("Extracting {} entries to {}", archive.len(), root.display()));

    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        let Some(target) = resolve_within(&root, &name) else {
            log.warning(&format!("Skipping potentially unsafe zip entry: {}", name));
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if target == root {
            log.warning(&format!("Skipping zip entry that names the install root: {}", name));
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let relative = name.replace('\\', "/");
        let is_config = target
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| config_files.iter().any(|c| c.eq_ignore_ascii_case(n)));

        if is_config && target.is_file() {
            merge_entry(&mut entry, &target, log)?;
        } else {
            let mut outfile = File::create(&target)?;
            io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    if let Err(e) = fs::set_permissions(&target, fs::Permissions::from_mode(mode)) {
                        log.debug(&format!("Could not set mode {:o} on {}: {}", mode, relative, e));
                    }
                }
            }
            log.debug(&format!("Extracted: {}", relative));
        }

        extracted.push(relative);
    }

    Ok(extracted)
}

/// Stage the incoming config next to the user's copy and merge it in. The
/// staged file is removed when it goes out of scope.
fn merge_entry(entry: &mut impl io::Read, target: &Path, log: &Logger) -> Result<()> {
    let parent = target.parent().unwrap_or(target);
    let mut staged = tempfile::Builder::new()
        .prefix(".quickfix-")
        .suffix(".new")
        .tempfile_in(parent)?;
    io::copy(entry, staged.as_file_mut())?;

    match merge_config_files(target, staged.path(), log) {
        Ok(()) => log.install(&format!("Merged existing config: {}", target.display())),
        Err(e) => log.warning(&format!("Keeping existing {} unchanged: {}", target.display(), e)),
    }
    Ok(())
}

/// Resolve an archive entry name against `root` the way `realpath` would:
/// `..` is applied lexically and symlinks in already-existing ancestors are
/// followed. Returns `None` when the result is not `root` or inside it, or
/// when the name is absolute.
pub fn resolve_within(root: &Path, entry_name: &str) -> Option<PathBuf> {
    if entry_name.starts_with('/') || entry_name.starts_with('\\') {
        return None;
    }

    let mut resolved = root.to_path_buf();
    for part in entry_name.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if !resolved.pop() {
                    return None;
                }
            }
            other => {
                let mut components = Path::new(other).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => resolved.push(other),
                    _ => return None,
                }
            }
        }
    }

    let canonical = canonicalize_lenient(&resolved);
    canonical.starts_with(root).then_some(canonical)
}

/// Canonicalize the deepest existing ancestor and re-attach the rest
fn canonicalize_lenient(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest: Vec<OsString> = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_zip_slip_blocked() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("evil.zip");
        let out = tmp.path().join("a").join("b").join("output");
        fs::create_dir_all(&out).unwrap();
        build_zip(&zip_path, &[("safe.txt", "hello"), ("../../etc/evil.txt", "pwned")]);

        let log = Logger::capture(false);
        let files = extract_archive(&zip_path, &out, &[], &log).unwrap();

        assert_eq!(files, vec!["safe.txt".to_string()]);
        assert!(out.join("safe.txt").is_file());
        assert!(!tmp.path().join("a").join("etc").exists());
        assert!(log
            .captured()
            .iter()
            .any(|l| l.contains("unsafe zip entry: ../../etc/evil.txt")));
    }

    #[test]
    fn test_normal_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("good.zip");
        let out = tmp.path().join("game");
        fs::create_dir_all(&out).unwrap();
        build_zip(
            &zip_path,
            &[("mod.dll", "binary"), ("subdir/", ""), ("subdir/config.ini", "[settings]\nkey=value")],
        );

        let files = extract_archive(&zip_path, &out, &[], &Logger::capture(false)).unwrap();
        assert_eq!(files, vec!["mod.dll".to_string(), "subdir/config.ini".to_string()]);
        assert!(out.join("mod.dll").is_file());
        assert_eq!(
            fs::read_to_string(out.join("subdir").join("config.ini")).unwrap(),
            "[settings]\nkey=value"
        );
    }

    #[test]
    fn test_existing_config_is_merged() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("fix.zip");
        let out = tmp.path().join("game");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("FooFix.ini"), "[A]\nk1 = user\n").unwrap();
        fs::write(out.join("other.dll"), "old").unwrap();
        build_zip(
            &zip_path,
            &[("FooFix.ini", "[A]\nk1 = default\nk2 = new\n"), ("other.dll", "new")],
        );

        let config = vec!["foofix.ini".to_string()];
        let files = extract_archive(&zip_path, &out, &config, &Logger::capture(false)).unwrap();

        assert_eq!(files, vec!["FooFix.ini".to_string(), "other.dll".to_string()]);
        assert_eq!(
            fs::read_to_string(out.join("FooFix.ini")).unwrap(),
            "[A]\nk1 = user\nk2 = new\n"
        );
        assert_eq!(fs::read_to_string(out.join("other.dll")).unwrap(), "new");

        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".quickfix-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_fresh_config_is_written_directly() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("fix.zip");
        let out = tmp.path().join("game");
        build_zip(&zip_path, &[("FooFix.ini", "[A]\nk1 = default\n")]);

        let config = vec!["FooFix.ini".to_string()];
        let files = extract_archive(&zip_path, &out, &config, &Logger::capture(false)).unwrap();
        assert_eq!(files, vec!["FooFix.ini".to_string()]);
        assert_eq!(fs::read_to_string(out.join("FooFix.ini")).unwrap(), "[A]\nk1 = default\n");
    }

    #[test]
    fn test_unreadable_archive_is_integrity_error() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("broken.zip");
        fs::write(&zip_path, "definitely not a zip").unwrap();

        let err = extract_archive(&zip_path, tmp.path(), &[], &Logger::capture(false)).unwrap_err();
        assert!(matches!(err, QuickFixError::Integrity(_)));
    }

    #[test]
    fn test_resolve_within() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();

        assert_eq!(resolve_within(&root, "a/b.txt"), Some(root.join("a").join("b.txt")));
        assert_eq!(resolve_within(&root, "a/../b.txt"), Some(root.join("b.txt")));
        assert_eq!(resolve_within(&root, "./"), Some(root.clone()));
        assert_eq!(resolve_within(&root, "../x.txt"), None);
        assert_eq!(resolve_within(&root, "..\\..\\x.txt"), None);
        assert_eq!(resolve_within(&root, "/etc/passwd"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_cannot_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("game");
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let root = root.canonicalize().unwrap();
        assert_eq!(resolve_within(&root, "link/evil.txt"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_mode_is_kept() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("fix.zip");
        let mut writer = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        writer
            .start_file("launch.sh", SimpleFileOptions::default().unix_permissions(0o755))
            .unwrap();
        writer.write_all(b"#!/bin/sh\n").unwrap();
        writer.finish().unwrap();

        let out = tmp.path().join("game");
        let log = Logger::capture(true);
        extract_archive(&zip_path, &out, &[], &log).unwrap();

        let mode = fs::metadata(out.join("launch.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(!log.captured().iter().any(|l| l.contains("Could not set mode")));
    }
}
