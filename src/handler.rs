use crate::{
	config::ServerConfig,
	http::{
		parser::parse_request,
		response::{base_headers, encode, error_response}
	},
	resolve::{resolve, Resolved}
};
use http::StatusCode;
use log::debug;
use std::fs;

// Raw request bytes in, response bytes out. Never fails: every error
// class maps to a status code. Filesystem stat/read errors surface as
// 404, matching the resolver's not-found path.
pub fn handle(config: &ServerConfig, raw: &[u8]) -> Vec<u8> {
	let request = match parse_request(raw) {
		Ok(r) => r,
		Err(e) => {
			debug!("rejecting malformed request: {}", e);
			return error_response(config, StatusCode::METHOD_NOT_ALLOWED);
		}
	};

	if !config.allows_method(&request.method) {
		debug!("method {} not allowed", request.method);
		return error_response(config, StatusCode::METHOD_NOT_ALLOWED);
	}

	let (path, content_type) = match resolve(config, &request.path) {
		Resolved::NotFound => return error_response(config, StatusCode::NOT_FOUND),
		Resolved::Forbidden => return error_response(config, StatusCode::FORBIDDEN),
		Resolved::File { path, content_type } => (path, content_type)
	};

	// Content-Length reports the on-disk size for GET and HEAD alike;
	// only GET attaches the body.
	let length = match fs::metadata(&path) {
		Ok(meta) => meta.len(),
		Err(_) => return error_response(config, StatusCode::NOT_FOUND)
	};
	let body = if request.method.eq_ignore_ascii_case("GET") {
		match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(_) => return error_response(config, StatusCode::NOT_FOUND)
		}
	} else {
		Vec::new()
	};

	let mut headers = base_headers(config);
	headers.push(("Content-Type", content_type));
	headers.push(("Content-Length", length.to_string()));
	encode(StatusCode::OK, &headers, &body)
}
