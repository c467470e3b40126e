//! Record raw search results to the local file system, and replay them later.
//!
//! An archive is a directory with the structure
//!
//! ```text
//! DIR/
//!     index.json
//!     0001.json
//!     0002.json
//!     ...
//! ```
//!
//! where `index.json` maps a key describing each request to the file holding its response.
//! Replaying an archive answers exactly the requests that were recorded, so a survey can be
//! re-rendered, or re-run with different ranking options, without touching the network.

use crate::{
    literature::{Hits, Literature, LiteratureQuery},
    web::{WebPage, WebQuery, WebSearch},
};
use anyhow::{Context, Error};
use async_std::sync::{Arc, Mutex};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const INDEX: &str = "index.json";

/// Search results saved in the local file system.
#[derive(Debug)]
pub struct Archive {
    root: PathBuf,
    index: Mutex<BTreeMap<String, String>>,
}

impl Archive {
    /// Open an archive for recording, creating it if necessary.
    ///
    /// If `root` already holds an archive, new responses are added to it.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("unable to create archive {}", root.display()))?;
        let index = if root.join(INDEX).exists() {
            read_index(&root)?
        } else {
            Default::default()
        };
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    /// Open an existing archive.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        let index = read_index(&root)?;
        tracing::info!("opened archive {} with {} responses", root.display(), index.len());
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    /// The directory holding this archive.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        let index = self.index.lock().await;
        let file = index
            .get(key)
            .ok_or_else(|| Error::msg(format!("no archived response for {key}")))?;
        let path = self.root.join(file);
        tracing::debug!("replaying {key} from {}", path.display());
        let file =
            File::open(&path).with_context(|| format!("unable to open {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("archived response {} is malformed", path.display()))
    }

    async fn store<T: Serialize>(&self, key: String, value: &T) -> Result<(), Error> {
        let mut index = self.index.lock().await;
        let file = match index.get(&key) {
            Some(file) => file.clone(),
            None => format!("{:04}.json", index.len() + 1),
        };
        let path = self.root.join(&file);
        tracing::debug!("recording {key} to {}", path.display());
        serde_json::to_writer_pretty(
            File::create(&path).with_context(|| format!("unable to create {}", path.display()))?,
            value,
        )?;

        index.insert(key, file);
        let path = self.root.join(INDEX);
        serde_json::to_writer_pretty(
            File::create(&path).with_context(|| format!("unable to create {}", path.display()))?,
            &*index,
        )?;
        Ok(())
    }
}

#[async_trait]
impl Literature for Archive {
    async fn search(&self, query: &LiteratureQuery) -> Result<Hits, Error> {
        self.load(&literature_key(query)).await
    }
}

#[async_trait]
impl WebSearch for Archive {
    async fn search(&self, query: &WebQuery) -> Result<Vec<WebPage>, Error> {
        self.load(&web_key(query)).await
    }
}

/// A backend which saves every response it returns to an [`Archive`].
pub struct Recorder<T> {
    inner: T,
    archive: Arc<Archive>,
}

impl<T> Recorder<T> {
    pub fn new(inner: T, archive: Arc<Archive>) -> Self {
        Self { inner, archive }
    }
}

#[async_trait]
impl<T: Literature + Send + Sync> Literature for Recorder<T> {
    async fn search(&self, query: &LiteratureQuery) -> Result<Hits, Error> {
        let hits = self.inner.search(query).await?;
        self.archive.store(literature_key(query), &hits).await?;
        Ok(hits)
    }
}

#[async_trait]
impl<T: WebSearch + Send + Sync> WebSearch for Recorder<T> {
    async fn search(&self, query: &WebQuery) -> Result<Vec<WebPage>, Error> {
        let pages = self.inner.search(query).await?;
        self.archive.store(web_key(query), &pages).await?;
        Ok(pages)
    }
}

fn literature_key(query: &LiteratureQuery) -> String {
    format!("literature {} {} {}", query.sort, query.max, query.term)
}

fn web_key(query: &WebQuery) -> String {
    format!("web {} {}", query.count, query.query)
}

fn read_index(root: &Path) -> Result<BTreeMap<String, String>, Error> {
    let path = root.join(INDEX);
    let file = File::open(&path)
        .with_context(|| format!("{} is not an archive", root.display()))?;
    serde_json::from_reader(file).with_context(|| format!("{} is malformed", path.display()))
}
