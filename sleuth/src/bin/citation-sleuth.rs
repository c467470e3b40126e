use anyhow::{Context, Error};
use async_std::sync::Arc;
use citation_sleuth::{
    archive::{Archive, Recorder},
    collect::{self, Category, Survey},
    docs::{self, DocTarget, MarkdownFile, UnityCatalog},
    init_logging,
    literature::{pubmed, Literature, PubMed},
    report::{self, Format},
    source::DataSource,
    web::{brave, Brave, WebSearch},
};
use clap::{Args, Parser};
use std::fs;
use std::path::PathBuf;
use strum::IntoEnumIterator;

/// Compile documentation on how a data source is used, for refinement by humans.
#[derive(Parser)]
enum Command {
    /// Survey usages of a data source using live academic and web search APIs.
    Survey {
        #[clap(flatten)]
        target: Target,

        #[clap(flatten)]
        pubmed: pubmed::Options,

        #[clap(flatten)]
        brave: brave::Options,

        /// Save raw search results to DIR, so the survey can be replayed later.
        #[clap(long, env = "SLEUTH_RECORD", value_name = "DIR")]
        record: Option<PathBuf>,

        #[clap(flatten)]
        output: Output,
    },
    /// Survey usages of a data source using search results saved by `survey --record`.
    ///
    /// Replaying answers exactly the searches which were recorded, so the name, aliases and
    /// collector options should match those of the recorded survey.
    Replay {
        /// The directory the search results were recorded to.
        #[clap(short, long, env = "SLEUTH_ARCHIVE", value_name = "DIR")]
        dir: PathBuf,

        #[clap(flatten)]
        target: Target,

        #[clap(flatten)]
        output: Output,
    },
}

/// What to survey.
#[derive(Args)]
struct Target {
    /// The name of the data source.
    name: String,

    /// Another name under which the data source is cited, like an acronym.
    #[clap(short = 'a', long = "alias", value_name = "ALIAS")]
    aliases: Vec<String>,

    /// Only collect evidence in CATEGORY (default: all categories).
    #[clap(short = 'c', long = "category", value_name = "CATEGORY", value_delimiter = ',')]
    categories: Vec<Category>,

    #[clap(flatten)]
    collect: collect::Options,
}

impl Target {
    async fn survey<L: Literature, W: WebSearch>(
        &self,
        literature: &L,
        web: &W,
    ) -> Result<Survey, Error> {
        let source = DataSource::parse(&self.name, self.aliases.iter().cloned())?;
        let categories = if self.categories.is_empty() {
            Category::iter().collect()
        } else {
            self.categories.clone()
        };
        let survey = collect::survey(literature, web, &source, &categories, &self.collect).await;

        let failed = survey
            .sections
            .iter()
            .filter(|section| matches!(section.outcome, collect::Outcome::Unavailable(_)))
            .count();
        if failed > 0 {
            tracing::warn!("{failed} of {} sections are unavailable", survey.sections.len());
        }
        Ok(survey)
    }
}

/// Where the report goes.
#[derive(Args)]
struct Output {
    /// Report format (markdown or json).
    #[clap(short, long, env = "SLEUTH_FORMAT", default_value = "markdown")]
    format: Format,

    /// Write the report to PATH instead of stdout.
    #[clap(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Update the generated documentation of the data source in the Markdown document FILE.
    #[clap(long, env = "SLEUTH_DOC_FILE", value_name = "FILE")]
    doc_file: Option<PathBuf>,

    /// Update the comment of the Unity Catalog table TABLE (catalog.schema.table).
    #[clap(long, value_name = "TABLE")]
    unity_object: Option<String>,

    #[clap(flatten)]
    databricks: docs::Options,
}

impl Output {
    async fn publish(&self, survey: &Survey) -> Result<(), Error> {
        let report = report::render(survey, self.format)?;
        match &self.out {
            Some(path) => {
                fs::write(path, &report)
                    .with_context(|| format!("unable to write {}", path.display()))?;
                tracing::info!("wrote report to {}", path.display());
            }
            None => println!("{}", report.trim_end()),
        }

        // Published documentation is always Markdown, whatever the report format.
        let markdown = report::markdown(survey);
        if let Some(path) = &self.doc_file {
            MarkdownFile::new(path)
                .update_object_docs(&survey.source.name, &markdown)
                .await?;
        }
        if let Some(table) = &self.unity_object {
            UnityCatalog::new(&self.databricks)?
                .update_object_docs(table, &markdown)
                .await?;
        }
        Ok(())
    }
}

#[async_std::main]
async fn main() -> Result<(), Error> {
    init_logging();

    match Command::parse() {
        Command::Survey {
            target,
            pubmed,
            brave,
            record,
            output,
        } => {
            let literature = PubMed::new(&pubmed)?;
            let web = Brave::new(&brave)?;
            let survey = match record {
                Some(dir) => {
                    let archive = Arc::new(Archive::create(dir)?);
                    tracing::info!("recording search results to {}", archive.root().display());
                    let literature = Recorder::new(literature, archive.clone());
                    let web = Recorder::new(web, archive);
                    target.survey(&literature, &web).await?
                }
                None => target.survey(&literature, &web).await?,
            };
            output.publish(&survey).await?;
        }
        Command::Replay {
            dir,
            target,
            output,
        } => {
            let archive = Archive::open(dir)?;
            let survey = target.survey(&archive, &archive).await?;
            output.publish(&survey).await?;
        }
    }

    Ok(())
}
