//! Open external links in a new tab.

use markup5ever_rcdom::Handle;
use url::Url;

use super::html::{get_attribute, set_attribute, tag_name, Visitor};

/// Tokens added to the `rel` attribute of external links.
const REL_TOKENS: [&str; 2] = ["noopener", "noreferrer"];

/// Add `target="_blank"` and `rel="noopener noreferrer"` to external links.
///
/// A link is external when its `href` is an absolute `http` or `https` URL
/// whose host is not one of the internal hosts. Other `rel` tokens are kept.
#[derive(Debug, Default)]
pub struct ExternalLinks {
    internal_hosts: Vec<String>,
}

impl ExternalLinks {
    /// Create a visitor treating the given hosts as internal.
    pub fn new<I, S>(internal_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            internal_hosts: internal_hosts
                .into_iter()
                .map(|host| host.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Check if a `href` value points outside the site.
    pub fn is_external(&self, href: &str) -> bool {
        let Ok(url) = Url::parse(href) else {
            // Relative URLs fail to parse without a base
            return false;
        };

        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        url.host_str().is_some_and(|host| {
            !self
                .internal_hosts
                .iter()
                .any(|internal| internal.as_str() == host)
        })
    }
}

impl Visitor for ExternalLinks {
    fn visit(&mut self, element: &Handle) {
        if tag_name(element) != Some("a") {
            return;
        }

        let Some(href) = get_attribute(element, "href") else {
            return;
        };

        if !self.is_external(href.trim()) {
            return;
        }

        let mut rel: Vec<String> = get_attribute(element, "rel")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_owned)
            .collect();

        for token in REL_TOKENS {
            if !rel.iter().any(|existing| existing.eq_ignore_ascii_case(token)) {
                rel.push(token.to_owned());
            }
        }

        set_attribute(element, "target", "_blank");
        set_attribute(element, "rel", &rel.join(" "));
    }
}
