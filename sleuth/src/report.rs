//! Assemble a survey into a human-editable report.

use crate::{
    collect::{Category, Commentary, Findings, Organization, Outcome, Section, Survey},
    literature::{Article, Hits},
};
use anyhow::Error;
use std::fmt::Write;
use strum::{Display, EnumString};

/// A report format.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum Format {
    /// Markdown with one table per category, meant to be refined by hand.
    #[default]
    Markdown,
    /// The raw survey, for further processing.
    Json,
}

/// Render `survey` in the requested format.
pub fn render(survey: &Survey, format: Format) -> Result<String, Error> {
    match format {
        Format::Markdown => Ok(markdown(survey)),
        Format::Json => Ok(serde_json::to_string_pretty(survey)?),
    }
}

/// Render `survey` as a Markdown document.
pub fn markdown(survey: &Survey) -> String {
    let mut doc = String::new();
    writeln!(doc, "# Usages of {}", cell(&survey.source.name)).unwrap();
    writeln!(doc).unwrap();

    let aliases = survey.source.names().into_iter().skip(1).collect::<Vec<_>>();
    if !aliases.is_empty() {
        writeln!(doc, "_Also known as: {}_", aliases.join(", ")).unwrap();
        writeln!(doc).unwrap();
    }
    writeln!(
        doc,
        "> This document was compiled automatically from academic literature and web searches. \
        Review and refine it before relying on it."
    )
    .unwrap();

    for section in &survey.sections {
        writeln!(doc).unwrap();
        write_section(&mut doc, section);
    }
    doc
}

fn write_section(doc: &mut String, section: &Section) {
    writeln!(doc, "## {}", section.category.title()).unwrap();
    writeln!(doc).unwrap();

    let findings = match &section.outcome {
        Outcome::Unavailable(reason) => {
            writeln!(doc, "_Unavailable: {}_", cell(reason)).unwrap();
            return;
        }
        Outcome::Found(findings) => findings,
    };
    if let (Category::Comprehensive, Findings::Articles(hits)) = (section.category, findings) {
        write_match_count(doc, hits);
    }
    if findings.is_empty() {
        writeln!(doc, "_No results found._").unwrap();
        return;
    }

    match findings {
        Findings::Articles(hits) => write_articles(doc, &hits.articles),
        Findings::Commentary(items) => write_commentary(doc, items),
        Findings::Organizations(orgs) => write_organizations(doc, orgs),
    }
}

fn write_match_count(doc: &mut String, hits: &Hits) {
    let Some(total) = hits.total else {
        return;
    };
    let shown = hits.articles.len();
    if total > shown as u64 && shown == 1 {
        writeln!(doc, "{total} articles matched; the most recent is listed.").unwrap();
    } else if total > shown as u64 {
        writeln!(
            doc,
            "{total} articles matched; the {shown} most recent are listed."
        )
        .unwrap();
    } else {
        writeln!(doc, "{total} articles matched.").unwrap();
    }
    writeln!(doc).unwrap();
}

fn write_articles(doc: &mut String, articles: &[Article]) {
    writeln!(
        doc,
        "| Title | Journal | Publication Date | DOI | Citations | Link |"
    )
    .unwrap();
    writeln!(doc, "|-------|---------|------------------|-----|-----------|------|").unwrap();
    for article in articles {
        writeln!(
            doc,
            "| {} | {} | {} | {} | {} | [PubMed]({}) |",
            cell(&article.title),
            or_na(&article.journal),
            or_na(&article.publication_date),
            article.doi.as_deref().map(cell).unwrap_or_else(na),
            article
                .citations
                .map(|n| n.to_string())
                .unwrap_or_else(na),
            link(&article.link),
        )
        .unwrap();
    }
}

fn write_commentary(doc: &mut String, items: &[Commentary]) {
    writeln!(doc, "| Title | Outlet | Published | Link |").unwrap();
    writeln!(doc, "|-------|--------|-----------|------|").unwrap();
    for item in items {
        writeln!(
            doc,
            "| {} | {} | {} | [Link]({}) |",
            or_na(&item.title),
            cell(&item.outlet),
            item.age.as_deref().map(cell).unwrap_or_else(na),
            link(&item.url),
        )
        .unwrap();
    }
}

fn write_organizations(doc: &mut String, orgs: &[Organization]) {
    writeln!(doc, "| Organization | Signals | Evidence |").unwrap();
    writeln!(doc, "|--------------|---------|----------|").unwrap();
    for org in orgs {
        let signals = org
            .signals
            .iter()
            .map(|signal| signal.to_string().to_lowercase())
            .collect::<Vec<_>>()
            .join(", ");
        let evidence = org
            .evidence
            .iter()
            .enumerate()
            .map(|(i, evidence)| format!("[{}]({})", i + 1, link(&evidence.url)))
            .collect::<Vec<_>>()
            .join(" ");
        let more = match org.hits.saturating_sub(org.evidence.len()) {
            0 => String::new(),
            n => format!(" (+{n} more)"),
        };
        writeln!(
            doc,
            "| {} ({}) | {signals} | {evidence}{more} |",
            cell(&org.name),
            cell(&org.domain),
        )
        .unwrap();
    }
}

/// Escape `text` for use inside a Markdown table cell.
fn cell(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

/// Escape `url` for use as a link target inside a Markdown table cell.
fn link(url: &str) -> String {
    let mut target = String::with_capacity(url.len());
    for c in url.trim().chars() {
        match c {
            '|' => target.push_str("%7C"),
            '(' => target.push_str("%28"),
            ')' => target.push_str("%29"),
            '<' => target.push_str("%3C"),
            '>' => target.push_str("%3E"),
            c if c.is_whitespace() => target.push_str("%20"),
            c => target.push(c),
        }
    }
    target
}

fn or_na(text: &str) -> String {
    if text.trim().is_empty() {
        na()
    } else {
        cell(text)
    }
}

fn na() -> String {
    "N/A".into()
}
