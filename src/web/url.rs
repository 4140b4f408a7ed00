use std::collections::HashMap;

/// Parse query string, return a hashmap
/// all value will be decoded to string, the last one wins for repeated names
/// also used for `application/x-www-form-urlencoded` bodies
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}
