//! Markdown documents with YAML front matter

use serde_yaml::{Mapping, Value as Yaml};

use crate::error::Result;

/// Ordered front matter builder.
#[derive(Debug, Default)]
pub struct FrontMatter {
    fields: Mapping,
}

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<Yaml>) -> Self {
        self.fields.insert(Yaml::from(key), value.into());
        self
    }

    pub fn optional(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    /// Copy a JSON value from a component's extra bag, if present.
    pub fn passthrough(mut self, key: &str, value: Option<&serde_json::Value>) -> Result<Self> {
        if let Some(value) = value {
            self.fields
                .insert(Yaml::from(key), serde_yaml::to_value(value)?);
        }
        Ok(self)
    }

    /// Render `body` preceded by the front matter block. An empty builder
    /// renders the body alone.
    pub fn render(&self, body: &str) -> Result<String> {
        let body = body.trim_end();
        if self.fields.is_empty() {
            return Ok(format!("{body}\n"));
        }
        let yaml = serde_yaml::to_string(&self.fields)?;
        Ok(format!("---\n{}---\n\n{body}\n", yaml))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_fields_in_insertion_order() {
        let doc = FrontMatter::new()
            .field("name", "reviewer")
            .optional("description", Some("Reviews code"))
            .optional("model", None)
            .field("alwaysApply", true)
            .render("Body text\n\n")
            .unwrap();
        assert_eq!(
            doc,
            "---\nname: reviewer\ndescription: Reviews code\nalwaysApply: true\n---\n\nBody text\n"
        );
    }

    #[test]
    fn empty_front_matter_is_omitted() {
        assert_eq!(FrontMatter::new().render("Hello").unwrap(), "Hello\n");
    }
}
