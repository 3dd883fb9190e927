use httpd::{config::ServerConfig, server};
use log::{error, info, LevelFilter};
use std::{env, process::exit};

fn log_level() -> LevelFilter {
	env::var("HTTPD_LOG")
		.ok()
		.and_then(|v| v.parse().ok())
		.unwrap_or(LevelFilter::Info)
}

fn main() {
	simple_logger::SimpleLogger::new()
		.with_level(log_level())
		.init()
		.expect("logger init");

	let config = match ServerConfig::load() {
		Ok(c) => c,
		Err(e) => {
			error!("invalid configuration: {}", e);
			exit(2);
		}
	};
	info!("root dir is {:?}", config.root);

	if let Err(e) = server::run(&config) {
		error!("failed to start: {}", e);
		exit(1);
	}
}
