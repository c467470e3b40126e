//! Publish generated reports as documentation of the objects which hold the data.

use crate::http;
use anyhow::{Context, Error};
use async_std::fs;
use async_trait::async_trait;
use clap::Args;
use serde_json::json;
use std::io::ErrorKind;
use std::path::PathBuf;
use surf::Url;

/// Somewhere documentation about data objects is kept.
#[async_trait]
pub trait DocTarget {
    /// Replace the generated usage documentation of `object` with `markdown`.
    async fn update_object_docs(&self, object: &str, markdown: &str) -> Result<(), Error>;
}

/// A Markdown document holding generated documentation for any number of objects.
///
/// The documentation of each object lives in a block delimited by HTML comments, so it can be
/// regenerated in place without disturbing anything written by hand around it.
pub struct MarkdownFile {
    path: PathBuf,
}

impl MarkdownFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocTarget for MarkdownFile {
    async fn update_object_docs(&self, object: &str, markdown: &str) -> Result<(), Error> {
        let doc = match fs::read_to_string(&self.path).await {
            Ok(doc) => doc,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("unable to read {}", self.path.display()))
            }
        };
        let doc = splice(&doc, object, markdown)
            .with_context(|| format!("unable to update {}", self.path.display()))?;
        fs::write(&self.path, doc)
            .await
            .with_context(|| format!("unable to write {}", self.path.display()))?;
        tracing::info!("updated documentation of {object} in {}", self.path.display());
        Ok(())
    }
}

/// Replace the block for `object` in `doc` with `markdown`, or append a new block.
fn splice(doc: &str, object: &str, markdown: &str) -> Result<String, Error> {
    let begin = format!("<!-- citation-sleuth:begin {object} -->");
    let end = format!("<!-- citation-sleuth:end {object} -->");
    let block = format!("{begin}\n{}\n{end}", markdown.trim_end());

    match doc.find(&begin) {
        Some(start) => {
            let stop = doc[start..]
                .find(&end)
                .ok_or_else(|| Error::msg(format!("block for {object} is never closed")))?
                + start
                + end.len();
            Ok(format!("{}{block}{}", &doc[..start], &doc[stop..]))
        }
        None => {
            let mut doc = doc.to_string();
            if !doc.is_empty() {
                if !doc.ends_with('\n') {
                    doc.push('\n');
                }
                doc.push('\n');
            }
            doc.push_str(&block);
            doc.push('\n');
            Ok(doc)
        }
    }
}

/// Databricks connection options.
#[derive(Clone, Debug, Args)]
pub struct Options {
    /// URL of the Databricks workspace holding the Unity Catalog.
    #[clap(long, env = "DATABRICKS_HOST")]
    pub databricks_host: Option<Url>,

    /// Databricks personal access token.
    #[clap(long, env = "DATABRICKS_TOKEN")]
    pub databricks_token: Option<String>,
}

/// A Databricks Unity Catalog, where generated documentation becomes a table's comment.
pub struct UnityCatalog {
    client: surf::Client,
    token: String,
}

impl UnityCatalog {
    /// Connect to the Unity Catalog of a Databricks workspace.
    pub fn new(opt: &Options) -> Result<Self, Error> {
        let host = opt
            .databricks_host
            .as_ref()
            .ok_or_else(|| Error::msg("no Databricks host configured"))?;
        let token = opt
            .databricks_token
            .clone()
            .ok_or_else(|| Error::msg("no Databricks token configured"))?;
        Ok(Self {
            client: http::client(host)?,
            token,
        })
    }
}

#[async_trait]
impl DocTarget for UnityCatalog {
    async fn update_object_docs(&self, object: &str, markdown: &str) -> Result<(), Error> {
        let parts = object.split('.').collect::<Vec<_>>();
        if parts.len() != 3 || parts.iter().any(|part| part.trim().is_empty()) {
            return Err(Error::msg(format!(
                "{object} is not a table name of the form catalog.schema.table"
            )));
        }

        tracing::info!("updating Unity Catalog comment of {object}");
        let req = self
            .client
            .patch(format!("api/2.1/unity-catalog/tables/{object}"))
            .header("Authorization", format!("Bearer {}", self.token))
            .body_json(&json!({ "comment": markdown }))
            .map_err(Error::msg)?;
        http::send(req)
            .await
            .with_context(|| format!("unable to update Unity Catalog table {object}"))?;
        Ok(())
    }
}
