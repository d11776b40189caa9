//! Helpers for working with raw Cookie request headers.

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Extract one cookie's value from a `Cookie` header line.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.to_string())
}

/// Rewrite a `Cookie` header with `name` set to `value`, replacing any
/// previous occurrence.
pub fn replace_cookie(header: &str, name: &str, value: &str) -> String {
    let mut pairs: Vec<String> = header
        .split(';')
        .map(|pair| pair.trim())
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            pair.split_once('=')
                .map(|(n, _)| n != name)
                .unwrap_or(true)
        })
        .map(|pair| pair.to_string())
        .collect();
    pairs.push(format!("{}={}", name, value));
    pairs.join("; ")
}
