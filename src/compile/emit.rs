//! Emit compiled content as an ES module or as JSON.

use super::CompiledContent;

/// Emit the source of an ES module whose default export is the record.
///
/// Every field is present: a missing excerpt is emitted as `undefined`, and
/// `lastModified` is a `Date` object.
pub fn emit_module(content: &CompiledContent) -> Result<String, serde_json::Error> {
    let frontmatter = serde_json::to_string(&content.frontmatter)?;
    let content_html = serde_json::to_string(&content.content_html)?;
    let excerpt = match &content.excerpt {
        Some(excerpt) => serde_json::to_string(excerpt)?,
        None => "undefined".to_owned(),
    };
    let slug = serde_json::to_string(&content.slug)?;
    let meta = serde_json::to_string(&content.meta)?;

    let last_modified = time::serde::rfc3339::serialize(
        &content.last_modified,
        serde_json::value::Serializer,
    )?;

    Ok(format!(
        concat!(
            "const compiled = {{\n",
            "  frontmatter: {},\n",
            "  contentHtml: {},\n",
            "  excerpt: {},\n",
            "  slug: {},\n",
            "  lastModified: new Date({}),\n",
            "  meta: {},\n",
            "}};\n",
            "export default compiled;\n",
        ),
        frontmatter, content_html, excerpt, slug, last_modified, meta,
    ))
}

/// Emit the record as pretty-printed JSON.
pub fn emit_json(content: &CompiledContent) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(content)
}
