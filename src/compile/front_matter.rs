//! Extract and parse front matters.
//!
//! A front matter is a block of YAML metadata located at the top of a file,
//! enclosed in `---` delimiters. The content following the front matter is the
//! markdown body.

use serde_json::{Map, Value};
use thiserror::Error;

/// Delimiter used for YAML front matters.
pub const YAML_DELIMITER: &str = "---";

/// Default separator marking the end of an excerpt.
pub const DEFAULT_EXCERPT_SEPARATOR: &str = "---";

/// Front matter data.
///
/// Keys keep the order in which they appear in the source.
pub type FrontMatter = Map<String, Value>;

/// List of errors for this module.
#[derive(Debug, Error)]
pub enum FrontMatterError {
    /// YAML parse error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    /// The front matter is valid YAML but not a mapping.
    #[error("front matter must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// A source file split into front matter, body and excerpt.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Split<'a> {
    /// Parsed front matter, empty when the source has none.
    pub front_matter: FrontMatter,

    /// Markdown body, without the front matter.
    pub body: &'a str,

    /// Body text preceding the excerpt separator, if any.
    pub excerpt: Option<&'a str>,
}

/// Split a source file into front matter, body and excerpt.
///
/// A source without front matter yields an empty mapping and the whole source
/// as body. Malformed YAML is an error: no default is substituted.
pub fn split<'a>(source: &'a str, excerpt_separator: &str) -> Result<Split<'a>, FrontMatterError> {
    let (front_matter, body) = match extract(source) {
        Some((data, body)) => (parse(data)?, body),
        None => (FrontMatter::new(), source),
    };

    let excerpt = excerpt(body, excerpt_separator);

    Ok(Split {
        front_matter,
        body,
        excerpt,
    })
}

/// Parse a YAML front matter block into a mapping.
fn parse(data: &str) -> Result<FrontMatter, FrontMatterError> {
    if data.trim().is_empty() {
        return Ok(FrontMatter::new());
    }

    match serde_yaml::from_str(data)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(FrontMatter::new()),
        Value::Bool(_) => Err(FrontMatterError::NotAMapping("a boolean")),
        Value::Number(_) => Err(FrontMatterError::NotAMapping("a number")),
        Value::String(_) => Err(FrontMatterError::NotAMapping("a string")),
        Value::Array(_) => Err(FrontMatterError::NotAMapping("a sequence")),
    }
}

/// Extract front matter and body from a string.
///
/// When a front matter is detected, this function returns a tuple `(data,
/// body)`, where `data` is the front matter string, and `body` is the content
/// without front matter. Otherwise, it returns [`None`].
pub fn extract(source: &str) -> Option<(&str, &str)> {
    // Source must start with the delimiter, alone on its line
    let rest = source.strip_prefix(YAML_DELIMITER)?;
    let rest = rest
        .strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))?;

    // Empty front matter
    if let Some(body) = rest.strip_prefix(YAML_DELIMITER).and_then(end_of_delimiter) {
        return Some(("", body));
    }

    // Find the second delimiter
    let mut offset = 0;
    while let Some(index) = rest[offset..].find(&format!("\n{YAML_DELIMITER}")) {
        let data_end = offset + index;
        let after = &rest[data_end + 1 + YAML_DELIMITER.len()..];

        if let Some(body) = end_of_delimiter(after) {
            return Some((&rest[..data_end + 1], body));
        }

        offset = data_end + 1;
    }

    None
}

/// The closing delimiter must end with eof or new line.
fn end_of_delimiter(content: &str) -> Option<&str> {
    content
        .is_empty()
        .then_some(content)
        .or_else(|| content.strip_prefix('\n'))
        .or_else(|| content.strip_prefix("\r\n"))
}

/// Return the body text preceding the first line equal to `separator`.
fn excerpt<'a>(body: &'a str, separator: &str) -> Option<&'a str> {
    if separator.is_empty() {
        return None;
    }

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == separator {
            return Some(&body[..offset]);
        }
        offset += line.len();
    }

    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract, split, FrontMatterError, DEFAULT_EXCERPT_SEPARATOR};

    #[test]
    fn extract_no_front_matter() {
        const INPUT: &str = concat!(
            "foo\n", //
            "---\n", //
            "bar\n", //
            "---\n", //
            "baz\n"
        );

        assert!(extract(INPUT).is_none());
    }

    #[test]
    fn extract_no_second_delimiter() {
        const INPUT: &str = concat!(
            "---\n", //
            "title: \"post\"\n"
        );

        assert!(extract(INPUT).is_none());
    }

    #[test]
    fn extract_skips_longer_delimiter() {
        const INPUT: &str = concat!(
            "---\n",             //
            "title: \"post\"\n", //
            "----\n",            //
            "foo: bar\n",        //
            "---\n",             //
            "body\n"
        );

        let (data, body) = extract(INPUT).unwrap();

        assert_eq!(data, "title: \"post\"\n----\nfoo: bar\n");
        assert_eq!(body, "body\n");
    }

    #[test]
    fn extract_eof() {
        const INPUT: &str = concat!(
            "---\n",             //
            "title: \"post\"\n", //
            "---"
        );

        let (data, body) = extract(INPUT).unwrap();

        assert_eq!(data, "title: \"post\"\n");
        assert_eq!(body, "");
    }

    #[test]
    fn extract_crlf() {
        const INPUT: &str = concat!(
            "---\r\n",             //
            "title: \"post\"\r\n", //
            "---\r\n",             //
            "foo\r\n"
        );

        let (data, body) = extract(INPUT).unwrap();

        assert_eq!(data, "title: \"post\"\r\n");
        assert_eq!(body, "foo\r\n");
    }

    #[test]
    fn split_keeps_key_order() {
        const INPUT: &str = concat!(
            "---\n",                  //
            "type: test\n",           //
            "title: Test Content\n",  //
            "tags: [a, b]\n",         //
            "---\n",                  //
            "# Hello\n"
        );

        let split = split(INPUT, DEFAULT_EXCERPT_SEPARATOR).unwrap();

        assert_eq!(
            serde_json::to_string(&split.front_matter).unwrap(),
            r#"{"type":"test","title":"Test Content","tags":["a","b"]}"#
        );
        assert_eq!(split.body, "# Hello\n");
        assert_eq!(split.excerpt, None);
    }

    #[test]
    fn split_without_front_matter() {
        let split = split("just text\n", DEFAULT_EXCERPT_SEPARATOR).unwrap();

        assert!(split.front_matter.is_empty());
        assert_eq!(split.body, "just text\n");
    }

    #[test]
    fn split_empty_front_matter() {
        let split = split("---\n---\nbody", DEFAULT_EXCERPT_SEPARATOR).unwrap();

        assert!(split.front_matter.is_empty());
        assert_eq!(split.body, "body");
    }

    #[test]
    fn split_nested_values() {
        const INPUT: &str = concat!(
            "---\n",             //
            "author:\n",         //
            "  name: Ada\n",     //
            "  links: [x, y]\n", //
            "---\n"
        );

        let split = split(INPUT, DEFAULT_EXCERPT_SEPARATOR).unwrap();

        assert_eq!(
            split.front_matter.get("author"),
            Some(&json!({ "name": "Ada", "links": ["x", "y"] }))
        );
    }

    #[test]
    fn split_malformed_yaml() {
        const INPUT: &str = concat!(
            "---\n",             //
            "title: [unclosed\n", //
            "---\n",             //
            "body\n"
        );

        let result = split(INPUT, DEFAULT_EXCERPT_SEPARATOR);

        assert!(matches!(result, Err(FrontMatterError::Yaml(_))));
    }

    #[test]
    fn split_scalar_front_matter() {
        let result = split("---\njust a string\n---\n", DEFAULT_EXCERPT_SEPARATOR);

        assert!(matches!(result, Err(FrontMatterError::NotAMapping(_))));
    }

    #[test]
    fn split_excerpt() {
        const INPUT: &str = concat!(
            "---\n",          //
            "title: post\n",  //
            "---\n",          //
            "Intro text.\n",  //
            "---\n",          //
            "The rest.\n"
        );

        let split = split(INPUT, DEFAULT_EXCERPT_SEPARATOR).unwrap();

        assert_eq!(split.excerpt, Some("Intro text.\n"));
        assert_eq!(split.body, "Intro text.\n---\nThe rest.\n");
    }

    #[test]
    fn split_custom_excerpt_separator() {
        let split = split("Lead.\n<!-- more -->\nTail.\n", "<!-- more -->").unwrap();

        assert_eq!(split.excerpt, Some("Lead.\n"));
    }
}
