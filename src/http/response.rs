//! Status line inspection for upstream responses.

/// Status code the upstream uses to reject proxy credentials.
pub const PROXY_AUTH_REQUIRED: &str = "407";

/// Whether `status_line` looks like `HTTP/<d>.<d> 407 ...`. A space must
/// follow the code; a bare `HTTP/1.1 407` does not match.
pub fn is_proxy_auth_error(status_line: &str) -> bool {
    status_code(status_line) == Some(PROXY_AUTH_REQUIRED)
        && status_line.as_bytes().get(STATUS_CODE_END) == Some(&b' ')
}

/// Offset just past the code in `HTTP/<d>.<d> <code>`.
const STATUS_CODE_END: usize = "HTTP/1.1 407".len();

/// The three-digit status code of an `HTTP/<d>.<d> <code> ...` line.
pub fn status_code(status_line: &str) -> Option<&str> {
    let rest = status_line.strip_prefix("HTTP/")?;
    let version = rest.as_bytes().get(..3)?;
    if !version[0].is_ascii_digit() || !version[2].is_ascii_digit() {
        return None;
    }
    let rest = rest.get(3..)?.strip_prefix(' ')?;
    let code = rest.get(..3)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match rest.as_bytes().get(3) {
        None | Some(b' ') => Some(code),
        Some(_) => None,
    }
}
