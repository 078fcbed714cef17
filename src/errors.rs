use reqwest::{Method, StatusCode};
use std::fmt::{self, Formatter};
use thiserror::Error;
use url::Url;

/// Non-success HTTP exchange with the service.
#[derive(Debug, Error)]
pub struct RequestFailure {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    pub msg: String,
}

impl RequestFailure {
    pub fn new(method: Method, url: Url, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            method,
            url,
            status,
            msg: msg.into(),
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "{} {} returned {}",
            self.method, self.url, self.status
        )?;

        if !self.msg.is_empty() {
            write!(formatter, ", server response: {}", self.msg)?;
        }

        Ok(())
    }
}
