//! REST routes
//!
//! A route is an HTTP method plus a path template such as
//! `/channels/{channel_id}/messages/{message_id}`. Rate-limit accounting is
//! keyed by the template with only the major parameters filled in, so
//! `/channels/1/messages/2` and `/channels/1/messages/3` share a bucket while
//! `/channels/2/messages/2` does not.

use chord_common::{ClientError, ClientResult};
use reqwest::Method;
use std::fmt;

/// Parameters that partition rate limits
pub const MAJOR_PARAMETERS: [&str; 4] = ["channel_id", "guild_id", "webhook_id", "interaction_id"];

/// Method, path template and parameter values of one REST call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    template: String,
    params: Vec<(String, String)>,
}

impl Route {
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: template.into(),
            params: Vec::new(),
        }
    }

    pub fn get(template: impl Into<String>) -> Self {
        Self::new(Method::GET, template)
    }

    pub fn post(template: impl Into<String>) -> Self {
        Self::new(Method::POST, template)
    }

    pub fn put(template: impl Into<String>) -> Self {
        Self::new(Method::PUT, template)
    }

    pub fn patch(template: impl Into<String>) -> Self {
        Self::new(Method::PATCH, template)
    }

    pub fn delete(template: impl Into<String>) -> Self {
        Self::new(Method::DELETE, template)
    }

    /// Bind a path parameter
    pub fn param(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Concrete path with every parameter substituted
    pub fn path(&self) -> ClientResult<String> {
        let path = substitute(&self.template, self.params.iter());
        if let Some(start) = path.find('{') {
            let end = path[start..].find('}').map_or(path.len(), |i| start + i + 1);
            return Err(ClientError::invalid_configuration(format!(
                "route {} is missing parameter {}",
                self.template,
                &path[start..end]
            )));
        }
        Ok(path)
    }

    /// Method plus template, identical for every call of this endpoint
    pub fn template_key(&self) -> String {
        format!("{} {}", self.method, self.template)
    }

    /// Values of the major parameters, in template order
    pub fn major_key(&self) -> String {
        self.params
            .iter()
            .filter(|(name, _)| MAJOR_PARAMETERS.contains(&name.as_str()))
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Rate-limit key: method plus template with major parameters filled in
    pub fn bucket_key(&self) -> String {
        let majors = self
            .params
            .iter()
            .filter(|(name, _)| MAJOR_PARAMETERS.contains(&name.as_str()));
        format!("{} {}", self.method, substitute(&self.template, majors))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}

fn substitute<'a>(template: &str, params: impl Iterator<Item = &'a (String, String)>) -> String {
    let mut path = template.to_string();
    for (name, value) in params {
        path = path.replace(&format!("{{{name}}}"), value);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_substitution() {
        let route = Route::get("/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", 1)
            .param("message_id", 2);
        assert_eq!(route.path().unwrap(), "/channels/1/messages/2");
    }

    #[test]
    fn test_missing_parameter() {
        let route = Route::get("/channels/{channel_id}/messages/{message_id}").param("channel_id", 1);
        let err = route.path().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("{message_id}"));
    }

    #[test]
    fn test_bucket_key_keeps_minor_placeholders() {
        let a = Route::delete("/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", 1)
            .param("message_id", 2);
        let b = Route::delete("/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", 1)
            .param("message_id", 3);
        let c = Route::delete("/channels/{channel_id}/messages/{message_id}")
            .param("channel_id", 2)
            .param("message_id", 2);

        assert_eq!(a.bucket_key(), "DELETE /channels/1/messages/{message_id}");
        assert_eq!(a.bucket_key(), b.bucket_key());
        assert_ne!(a.bucket_key(), c.bucket_key());
        assert_eq!(a.major_key(), "1");
    }

    #[test]
    fn test_method_separates_buckets() {
        let get = Route::get("/guilds/{guild_id}").param("guild_id", 7);
        let patch = Route::patch("/guilds/{guild_id}").param("guild_id", 7);
        assert_ne!(get.bucket_key(), patch.bucket_key());
        assert_eq!(get.template_key(), "GET /guilds/{guild_id}");
        assert_eq!(get.to_string(), "GET /guilds/{guild_id}");
    }
}
