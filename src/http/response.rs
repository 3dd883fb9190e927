use crate::config::ServerConfig;
use chrono::Utc;
use http::{StatusCode, Version};

pub const SEPARATOR: &str = "\r\n";

// RFC 1123 format, always GMT.
pub fn http_date() -> String {
	Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// Headers every response carries, in emission order.
pub fn base_headers(config: &ServerConfig) -> Vec<(&'static str, String)> {
	vec![
		("Date", http_date()),
		("Server", config.server_name.clone()),
		("Connection", String::from("closed"))
	]
}

// Status line, headers in slice order, blank line, raw body. No I/O.
pub fn encode(status: StatusCode, headers: &[(&'static str, String)], body: &[u8]) -> Vec<u8> {
	let mut head = format!(
		"{:?} {} {}{}",
		Version::HTTP_10,
		status.as_str(),
		status.canonical_reason().unwrap_or(""),
		SEPARATOR
	);
	for (name, value) in headers {
		head.push_str(&format!("{}: {}{}", name, value, SEPARATOR));
	}
	head.push_str(SEPARATOR);

	let mut bytes = head.into_bytes();
	bytes.extend_from_slice(body);
	bytes
}

// 403/404/405 carry headers only.
pub fn error_response(config: &ServerConfig, status: StatusCode) -> Vec<u8> {
	encode(status, &base_headers(config), b"")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lines(bytes: &[u8]) -> Vec<String> {
		String::from_utf8(bytes.to_vec())
			.unwrap()
			.split(SEPARATOR)
			.map(str::to_owned)
			.collect()
	}

	#[test]
	fn test_encode_ok_with_body() {
		let headers = vec![
			("Date", String::from("Thu, 01 Jan 1970 00:00:00 GMT")),
			("Server", String::from("httpd/0.1")),
			("Connection", String::from("closed")),
			("Content-Type", String::from("text/html")),
			("Content-Length", String::from("5"))
		];
		let bytes = encode(StatusCode::OK, &headers, b"hello");
		let text = lines(&bytes);
		assert_eq!(text[0], "HTTP/1.0 200 OK");
		assert_eq!(text[1], "Date: Thu, 01 Jan 1970 00:00:00 GMT");
		assert_eq!(text[2], "Server: httpd/0.1");
		assert_eq!(text[3], "Connection: closed");
		assert_eq!(text[4], "Content-Type: text/html");
		assert_eq!(text[5], "Content-Length: 5");
		assert_eq!(text[6], "");
		assert_eq!(text[7], "hello");
	}

	#[test]
	fn test_encode_binary_body() {
		let body = [0u8, 159, 146, 150, 255];
		let bytes = encode(StatusCode::OK, &[], &body);
		assert!(bytes.ends_with(&body));
	}

	#[test]
	fn test_error_response_has_no_body() {
		let config = ServerConfig::default();
		let bytes = error_response(&config, StatusCode::NOT_FOUND);
		assert!(bytes.starts_with(b"HTTP/1.0 404 Not Found\r\n"));
		assert!(bytes.ends_with(b"\r\n\r\n"));
		let text = String::from_utf8(bytes).unwrap();
		assert!(text.contains("Server: httpd/0.1"));
		assert!(text.contains("Connection: closed"));
		assert!(!text.contains("Content-Length"));
	}

	#[test]
	fn test_reason_phrases() {
		for (status, line) in [
			(StatusCode::OK, "HTTP/1.0 200 OK"),
			(StatusCode::FORBIDDEN, "HTTP/1.0 403 Forbidden"),
			(StatusCode::NOT_FOUND, "HTTP/1.0 404 Not Found"),
			(StatusCode::METHOD_NOT_ALLOWED, "HTTP/1.0 405 Method Not Allowed")
		] {
			let bytes = encode(status, &[], b"");
			assert_eq!(lines(&bytes)[0], line);
		}
	}

	#[test]
	fn test_http_date_shape() {
		let date = http_date();
		assert!(date.ends_with(" GMT"));
		// "Thu, 01 Jan 1970 00:00:00 GMT"
		assert_eq!(date.len(), 29);
	}
}
