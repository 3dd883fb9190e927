use crate::config::ServerConfig;
use log::debug;
use std::{
	ffi::OsStr,
	path::{Path, PathBuf}
};

const DEFAULT_DOCUMENT: &str = "index.html";

#[derive(Debug, PartialEq)]
pub enum Resolved {
	File { path: PathBuf, content_type: String },
	NotFound,
	Forbidden
}

fn extension(path: &Path) -> Option<&str> {
	path.extension().and_then(OsStr::to_str)
}

// Maps a decoded request path onto the document tree. Existence is
// checked here; the file itself is opened later by the handler.
pub fn resolve(config: &ServerConfig, path: &str) -> Resolved {
	let mut candidate = format!("{}{}", config.root.display(), path);
	if path.rsplit('/').next().map_or(true, str::is_empty) {
		candidate.push_str(DEFAULT_DOCUMENT);
	}
	let candidate = PathBuf::from(candidate);
	debug!("resolved {:?} to {:?}", path, candidate);

	if !candidate.exists() {
		return Resolved::NotFound;
	}

	// Unknown extensions are refused even when the file exists.
	match extension(&candidate).and_then(|ext| config.content_type(ext)) {
		Some(content_type) => Resolved::File {
			content_type: content_type.to_owned(),
			path: candidate
		},
		None => Resolved::Forbidden
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::{create_dir_all, write};

	fn test_root() -> PathBuf {
		let mut dir = std::env::temp_dir();
		dir.push(format!("httpd-resolve-{}-{}", std::process::id(), fastrand::u32(..)));
		create_dir_all(dir.join("sub")).expect("create test root");
		write(dir.join("index.html"), b"0123456789").expect("index.html");
		write(dir.join("style.css"), b"12345").expect("style.css");
		write(dir.join("secret.exe"), b"MZ").expect("secret.exe");
		write(dir.join("noext"), b"x").expect("noext");
		write(dir.join("sub").join("index.html"), b"sub index").expect("sub/index.html");
		dir
	}

	fn config_with_root(root: PathBuf) -> ServerConfig {
		ServerConfig {
			root,
			..ServerConfig::default()
		}
	}

	#[test]
	fn test_existing_file() {
		let root = test_root();
		let config = config_with_root(root.clone());
		match resolve(&config, "/style.css") {
			Resolved::File { path, content_type } => {
				assert_eq!(path, root.join("style.css"));
				assert_eq!(content_type, "text/css");
			}
			other => panic!("expected File, got {:?}", other)
		}
	}

	#[test]
	fn test_default_document() {
		let root = test_root();
		let config = config_with_root(root.clone());
		match resolve(&config, "/") {
			Resolved::File { path, content_type } => {
				assert_eq!(path, root.join("index.html"));
				assert_eq!(content_type, "text/html");
			}
			other => panic!("expected File, got {:?}", other)
		}
	}

	#[test]
	fn test_default_document_in_subdir() {
		let root = test_root();
		let config = config_with_root(root.clone());
		match resolve(&config, "/sub/") {
			Resolved::File { path, .. } => assert_eq!(path, root.join("sub").join("index.html")),
			other => panic!("expected File, got {:?}", other)
		}
	}

	#[test]
	fn test_missing_file() {
		let config = config_with_root(test_root());
		assert_eq!(resolve(&config, "/missing.html"), Resolved::NotFound);
		assert_eq!(resolve(&config, "/nodir/"), Resolved::NotFound);
	}

	#[test]
	fn test_unmapped_extension_is_forbidden() {
		let config = config_with_root(test_root());
		assert_eq!(resolve(&config, "/secret.exe"), Resolved::Forbidden);
		assert_eq!(resolve(&config, "/noext"), Resolved::Forbidden);
	}
}
