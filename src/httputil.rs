//! HTTP utilities shared by the server and the request lifecycle.

use crate::error::ParseError;

/// A collection of HTTP headers.
///
/// Names compare case-insensitively, insertion order is preserved, and
/// a name may carry several values.
#[derive(Debug, Clone, Default)]
pub struct HttpHeaders {
    entries: Vec<(String, String)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value under `name`, in insertion order.
    pub fn get_list(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a value, keeping existing ones.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace all values under `name` with a single one.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.entries.push((name.to_owned(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a header block, one `Name: value` per line.
    ///
    /// A line starting with space or tab continues the previous value.
    pub fn parse(block: &str) -> Result<Self, ParseError> {
        let mut headers = Self::new();
        for line in block.split("\r\n") {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                match headers.entries.last_mut() {
                    Some((_, v)) => {
                        v.push(' ');
                        v.push_str(line.trim());
                    }
                    None => return Err(ParseError::MalformedHeaderLine),
                }
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(ParseError::MalformedHeaderLine)?;
            headers.add(name.trim(), value.trim());
        }
        Ok(headers)
    }
}

/// An uploaded file, as extracted from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFile {
    pub filename: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

fn header_param<'a>(header: &'a str, param: &str) -> Option<&'a str> {
    for part in header.split(';').skip(1) {
        let (k, v) = match part.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        if k.trim().eq_ignore_ascii_case(param) {
            return Some(v.trim().trim_matches('"'));
        }
    }
    None
}

/// Extract the `boundary` parameter from a `multipart/form-data`
/// content type. Quotes around the boundary are tolerated.
pub fn multipart_boundary(content_type: &str) -> Option<&str> {
    header_param(content_type, "boundary")
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}

/// Parse a `multipart/form-data` body.
///
/// Field values are appended to `arguments`; uploads carrying a
/// `filename` go to `files` instead. Parts without a `form-data`
/// content disposition or without a `name` are skipped with a warning,
/// matching what browsers get away with elsewhere.
pub fn parse_multipart_form_data(
    boundary: &str,
    data: &[u8],
    arguments: &mut Vec<(String, Vec<u8>)>,
    files: &mut Vec<(String, HttpFile)>,
) {
    let boundary = boundary.trim_matches('"');
    let closing = [b"--", boundary.as_bytes(), b"--"].concat();
    let footer = match find(data, &closing) {
        Some(i) => i,
        None => {
            log::warn!("multipart message missing closing boundary");
            return;
        }
    };
    let data = &data[..footer];
    let separator = [b"--", boundary.as_bytes(), b"\r\n"].concat();

    for part in split_parts(data, &separator) {
        if part.is_empty() {
            continue;
        }
        let eoh = match find(part, b"\r\n\r\n") {
            Some(i) => i,
            None => {
                log::warn!("multipart message missing headers");
                continue;
            }
        };
        let headers = match std::str::from_utf8(&part[..eoh])
            .ok()
            .and_then(|h| HttpHeaders::parse(h).ok())
        {
            Some(h) => h,
            None => {
                log::warn!("malformed multipart part headers");
                continue;
            }
        };
        let disposition = headers.get("Content-Disposition").unwrap_or("");
        if !disposition
            .split(';')
            .next()
            .map(|d| d.trim().eq_ignore_ascii_case("form-data"))
            .unwrap_or(false)
        {
            log::warn!("invalid multipart/form-data");
            continue;
        }
        let mut value = &part[eoh + 4..];
        if value.ends_with(b"\r\n") {
            value = &value[..value.len() - 2];
        }
        let name = match header_param(disposition, "name") {
            Some(n) => n.to_owned(),
            None => {
                log::warn!("multipart/form-data value missing name");
                continue;
            }
        };
        match header_param(disposition, "filename") {
            Some(filename) => {
                let content_type = headers
                    .get("Content-Type")
                    .unwrap_or("application/unknown")
                    .to_owned();
                files.push((
                    name,
                    HttpFile {
                        filename: filename.to_owned(),
                        content_type,
                        body: value.to_vec(),
                    },
                ));
            }
            None => arguments.push((name, value.to_vec())),
        }
    }
}

fn split_parts<'a>(data: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = data;
    while let Some(i) = find(rest, separator) {
        parts.push(&rest[..i]);
        rest = &rest[i + separator.len()..];
    }
    parts.push(rest);
    parts
}

/// Format a timestamp as an IMF-fixdate, e.g.
/// `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(time: std::time::SystemTime) -> String {
    let secs = match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(_) => 0,
    };
    let days = secs.div_euclid(86400);
    let sod = secs.rem_euclid(86400);
    let (h, m, s) = (sod / 3600, (sod / 60) % 60, sod % 60);

    // civil-from-days, see Hinnant's calendrical algorithms
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    const WEEKDAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let weekday = WEEKDAYS[days.rem_euclid(7) as usize];

    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        weekday,
        d,
        MONTHS[(month - 1) as usize],
        year,
        h,
        m,
        s
    )
}

/// Reason phrase for a status code, `"Unknown"` when unassigned.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        415 => "Unsupported Media Type",
        416 => "Requested Range Not Satisfiable",
        417 => "Expectation Failed",
        426 => "Upgrade Required",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}
