use std::{
	io::{Error, ErrorKind, Result},
	str::from_utf8
};

#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
	pub method: String,
	pub path:   String
}

// Splits the request line into method and target, drops the protocol
// version token and the query string, and percent-decodes the path.
// Anything shorter than "METHOD TARGET VERSION" is malformed; callers
// treat that the same as an unknown method.
pub fn parse_request(raw: &[u8]) -> Result<ParsedRequest> {
	let text = from_utf8(raw).map_err(|e| Error::new(ErrorKind::InvalidData, e.to_string()))?;
	let request_line = match text.lines().next() {
		Some(line) => line,
		None => return Err(Error::new(ErrorKind::InvalidData, "empty request"))
	};

	let tokens = request_line.split(' ').collect::<Vec<_>>();
	if tokens.len() < 3 {
		let msg = format!("malformed request line {:?}", request_line);
		return Err(Error::new(ErrorKind::InvalidData, msg));
	}

	let target = tokens[1].split('?').next().unwrap_or("");

	Ok(ParsedRequest {
		method: tokens[0].to_owned(),
		path:   percent_decode(target)
	})
}

fn hex_val(b: u8) -> Option<u8> {
	match b {
		b'0'..=b'9' => Some(b - b'0'),
		b'a'..=b'f' => Some(b - b'a' + 10),
		b'A'..=b'F' => Some(b - b'A' + 10),
		_ => None
	}
}

// Invalid escapes are kept literally rather than rejected.
fn percent_decode(target: &str) -> String {
	let bytes = target.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' && i + 2 < bytes.len() {
			if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
				out.push(hi << 4 | lo);
				i += 3;
				continue;
			}
		}
		out.push(bytes[i]);
		i += 1;
	}
	String::from_utf8_lossy(&out).into_owned()
}
