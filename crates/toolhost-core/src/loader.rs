use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use toolhost_plugin_sdk::PluginManifest;

use crate::error::LoadError;

/// Fixed name of the descriptor entry at the root of every plugin archive.
pub const DESCRIPTOR_NAME: &str = "plugin.json";

/// Lists loadable archives directly under `dir`: sub-directories and `.zip` files, sorted by name.
pub fn discover(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() || is_zip(&path) {
            archives.push(path);
        }
    }
    archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(archives)
}

/// Reads and decodes the descriptor of a directory or zip archive.
pub fn load(archive: &Path) -> Result<PluginManifest, LoadError> {
    let raw = if archive.is_dir() {
        read_from_dir(archive)?
    } else if is_zip(archive) {
        read_from_zip(archive)?
    } else if !archive.exists() {
        return Err(not_found(archive));
    } else {
        return Err(LoadError::invalid(
            archive,
            "unsupported archive format (expected a directory or .zip)",
        ));
    };
    decode(archive, &raw)
}

fn read_from_dir(dir: &Path) -> Result<String, LoadError> {
    fs::read_to_string(dir.join(DESCRIPTOR_NAME)).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => not_found(dir),
        _ => LoadError::invalid(dir, format!("unreadable descriptor: {err}")),
    })
}

fn read_from_zip(path: &Path) -> Result<String, LoadError> {
    let file = fs::File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => not_found(path),
        _ => LoadError::invalid(path, format!("cannot open archive: {err}")),
    })?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|err| LoadError::invalid(path, format!("unreadable archive: {err}")))?;
    let mut entry = match archive.by_name(DESCRIPTOR_NAME) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Err(not_found(path)),
        Err(err) => {
            return Err(LoadError::invalid(
                path,
                format!("unreadable descriptor entry: {err}"),
            ))
        }
    };
    let mut raw = String::new();
    entry
        .read_to_string(&mut raw)
        .map_err(|err| LoadError::invalid(path, format!("unreadable descriptor: {err}")))?;
    Ok(raw)
}

fn decode(path: &Path, raw: &str) -> Result<PluginManifest, LoadError> {
    let manifest: PluginManifest =
        serde_json::from_str(raw).map_err(|err| LoadError::invalid(path, err.to_string()))?;
    if manifest.id.trim().is_empty() {
        return Err(LoadError::invalid(path, "manifest id must not be empty"));
    }
    if manifest.implementation.trim().is_empty() {
        return Err(LoadError::invalid(
            path,
            format!("plugin '{}' must name an implementation", manifest.id),
        ));
    }
    Ok(manifest)
}

fn not_found(path: &Path) -> LoadError {
    LoadError::ManifestNotFound {
        path: path.to_path_buf(),
        descriptor: DESCRIPTOR_NAME,
    }
}

fn is_zip(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{fixtures::*, *};

    fn descriptor(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "apiVersion": "1.0.0",
            "capabilities": ["network.http"],
            "implementation": "builtin.echo"
        })
    }

    #[test]
    fn loads_directory_archive() {
        let tmp = tempfile::tempdir().unwrap();
        write_dir(tmp.path(), "echo", &descriptor("echo"));
        let manifest = load(&tmp.path().join("echo")).unwrap();
        assert_eq!(manifest.id, "echo");
        assert!(manifest.requires_capability("network.http"));
    }

    #[test]
    fn loads_zip_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = descriptor("zipped").to_string();
        write_zip(
            tmp.path(),
            "zipped.zip",
            &[(DESCRIPTOR_NAME, &raw), ("README", "hello")],
        );
        let manifest = load(&tmp.path().join("zipped.zip")).unwrap();
        assert_eq!(manifest.id, "zipped");
    }

    #[test]
    fn missing_descriptor_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        write_zip(tmp.path(), "bare.zip", &[("other.txt", "x")]);
        for name in ["empty", "bare.zip", "does-not-exist"] {
            assert!(matches!(
                load(&tmp.path().join(name)),
                Err(LoadError::ManifestNotFound { .. })
            ));
        }
    }

    #[test]
    fn malformed_descriptor_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("broken");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(DESCRIPTOR_NAME), "{ not json").unwrap();
        assert!(matches!(
            load(&dir),
            Err(LoadError::ManifestInvalid { .. })
        ));

        write_dir(tmp.path(), "blank", &descriptor("  "));
        assert!(matches!(
            load(&tmp.path().join("blank")),
            Err(LoadError::ManifestInvalid { .. })
        ));
    }

    #[test]
    fn discover_keeps_dirs_and_zips_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_dir(tmp.path(), "b-plugin", &descriptor("b"));
        write_zip(tmp.path(), "a-plugin.zip", &[(DESCRIPTOR_NAME, "{}")]);
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        let found = discover(tmp.path()).unwrap();
        let names = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a-plugin.zip", "b-plugin"]);
    }
}
