//! Origin (CORS) policy for browser clients.

use std::fmt;

/// Decides which `Origin` headers may open a connection.
///
/// Browsers always send `Origin` on a WebSocket upgrade; other clients
/// usually don't. A missing header is therefore always accepted, and the
/// policy only constrains requests that declare where they come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Accept every origin (`*`).
    #[default]
    Any,

    /// Accept only the listed origins, compared exactly
    /// (scheme, host and port, e.g. `https://app.example.com`).
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Parses `*` or a comma-separated list of origins.
    ///
    /// Blank entries and trailing slashes are ignored. A list that ends up
    /// empty, or that contains `*`, means [`OriginPolicy::Any`].
    pub fn parse(spec: &str) -> Self {
        let origins: Vec<String> = spec
            .split(',')
            .map(|o| o.trim().trim_end_matches('/'))
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            Self::Any
        } else {
            Self::AllowList(origins)
        }
    }

    /// Returns `true` if a request carrying this `Origin` may connect.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::Any, _) | (_, None) => true,
            (Self::AllowList(list), Some(origin)) => {
                let origin = origin.trim_end_matches('/');
                list.iter().any(|allowed| allowed.eq_ignore_ascii_case(origin))
            }
        }
    }
}

impl fmt::Display for OriginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::AllowList(list) => f.write_str(&list.join(",")),
        }
    }
}
