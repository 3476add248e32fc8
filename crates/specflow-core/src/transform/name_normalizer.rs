use heck::{ToLowerCamelCase, ToPascalCase};

use crate::model::Method;

/// Derive a camelCase operation id from a method and route.
///
/// Examples:
/// - `GET /users` → `listUsers`
/// - `POST /users` → `createUsers`
/// - `GET /users/{userId}` → `getUser`
/// - `DELETE /users/{userId}` → `deleteUser`
/// - `SUBSCRIBE user/{userId}/signedup` → `subscribeUserSignedup`
/// - `QUERY /graphql/user` → `queryGraphqlUser`
pub fn route_to_name(method: Method, route: &str) -> String {
    let mut resource_parts: Vec<&str> = Vec::new();
    let mut ends_with_param = false;

    for seg in route.split(['/', '.']).filter(|s| !s.is_empty()) {
        if is_path_variable(seg) {
            ends_with_param = true;
        } else {
            resource_parts.push(seg);
            ends_with_param = false;
        }
    }

    let prefix = match method {
        Method::Get if ends_with_param => "get",
        Method::Get => "list",
        Method::Post => "create",
        Method::Put => "update",
        other => other.key(),
    };

    let mut name = prefix.to_string();
    for (i, part) in resource_parts.iter().enumerate() {
        let is_last = i == resource_parts.len() - 1;
        // A trailing parameter addresses one member of the collection
        let word = if is_last && ends_with_param && method.is_http() {
            singularize(part)
        } else {
            part.to_string()
        };
        name.push_str(&sanitize_identifier(&word).to_pascal_case());
    }
    name.to_lower_camel_case()
}

fn is_path_variable(segment: &str) -> bool {
    (segment.starts_with('{') && segment.ends_with('}')) || segment.starts_with(':')
}

/// Naive singularization: strips a trailing plural suffix.
pub fn singularize(word: &str) -> String {
    if word.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if word.ends_with("ses") || word.ends_with("xes") || word.ends_with("zes") {
        word[..word.len() - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") && word.len() > 1 {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Reduce arbitrary text to alphanumeric runs joined by `_`.
pub fn sanitize_identifier(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_was_separator = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if prev_was_separator && !result.is_empty() {
                result.push('_');
            }
            result.push(ch);
            prev_was_separator = false;
        } else {
            prev_was_separator = true;
        }
    }

    if result.is_empty() {
        return "unnamed".to_string();
    }
    result
}
