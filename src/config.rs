use serde::Deserialize;
use std::{
	collections::HashMap,
	env,
	fs::File,
	io::{BufReader, Error, ErrorKind, Result},
	path::PathBuf,
	str::FromStr
};

fn default_host() -> String { String::from("127.0.0.1") }

fn default_port() -> u16 { 8080 }

fn default_workers() -> usize { 4 }

fn default_backlog() -> usize { 1024 }

fn default_root() -> PathBuf { PathBuf::from(".") }

fn default_server_name() -> String { String::from("httpd/0.1") }

fn default_allowed_methods() -> Vec<String> {
	vec![String::from("GET"), String::from("HEAD")]
}

// Keys are extensions without the leading dot, the way Path::extension
// reports them. Anything absent is refused with 403.
fn default_content_types() -> HashMap<String, String> {
	[
		("html", "text/html"),
		("css", "text/css"),
		("js", "application/javascript"),
		("txt", "text/plain"),
		("jpg", "image/jpeg"),
		("jpeg", "image/jpeg"),
		("png", "image/png"),
		("gif", "image/gif"),
		("swf", "application/x-shockwave-flash")
	]
	.iter()
	.map(|(ext, mime)| (ext.to_string(), mime.to_string()))
	.collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	#[serde(default = "default_host")]
	pub host:            String,
	#[serde(default = "default_port")]
	pub port:            u16,
	#[serde(default = "default_workers")]
	pub workers:         usize,
	#[serde(default = "default_backlog")]
	pub backlog:         usize,
	#[serde(default = "default_root")]
	pub root:            PathBuf,
	#[serde(default = "default_server_name")]
	pub server_name:     String,
	#[serde(default = "default_allowed_methods")]
	pub allowed_methods: Vec<String>,
	#[serde(default = "default_content_types")]
	pub content_types:   HashMap<String, String>
}

impl Default for ServerConfig {
	fn default() -> Self {
		ServerConfig {
			host:            default_host(),
			port:            default_port(),
			workers:         default_workers(),
			backlog:         default_backlog(),
			root:            default_root(),
			server_name:     default_server_name(),
			allowed_methods: default_allowed_methods(),
			content_types:   default_content_types()
		}
	}
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
	value.parse().map_err(|_| {
		let msg = format!("{} must be a number, got {:?}", name, value);
		Error::new(ErrorKind::InvalidInput, msg)
	})
}

impl ServerConfig {
	// Environment wins over the config file, the file over the defaults.
	pub fn load() -> Result<ServerConfig> {
		let mut config = match env::var("HTTPD_CONFIG") {
			Ok(path) => ServerConfig::from_file(&path)?,
			Err(_) => ServerConfig::default()
		};
		if let Ok(v) = env::var("HTTPD_HOST") {
			config.host = v;
		}
		if let Ok(v) = env::var("HTTPD_PORT") {
			config.port = parse_var("HTTPD_PORT", &v)?;
		}
		if let Ok(v) = env::var("HTTPD_WORKERS") {
			config.workers = parse_var("HTTPD_WORKERS", &v)?;
		}
		if let Ok(v) = env::var("HTTPD_BACKLOG") {
			config.backlog = parse_var("HTTPD_BACKLOG", &v)?;
		}
		if let Ok(v) = env::var("HTTPD_ROOT") {
			config.root = PathBuf::from(v);
		}
		Ok(config)
	}

	pub fn from_file(path: &str) -> Result<ServerConfig> {
		let f = File::open(path).map_err(|e| {
			let msg = format!("could not open config file {}: {}", path, e);
			Error::new(e.kind(), msg)
		})?;
		let reader = BufReader::new(f);
		let config = serde_json::from_reader(reader)?;
		Ok(config)
	}

	pub fn allows_method(&self, method: &str) -> bool {
		self
			.allowed_methods
			.iter()
			.any(|m| m.eq_ignore_ascii_case(method))
	}

	pub fn content_type(&self, extension: &str) -> Option<&str> {
		self.content_types.get(extension).map(|s| s.as_str())
	}
}
