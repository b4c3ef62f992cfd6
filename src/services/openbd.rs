//! Bibliographic lookup against the OpenBD API. Strictly a convenience for
//! the add-book form: whatever fields come back prefill the form, whatever
//! is missing stays manual entry, and no failure ever blocks book creation.

use anyhow::{anyhow, Result};
use log::warn;
use serde::Deserialize;

use crate::core::catalog::{GENRE_MAGAZINE, GENRE_NOVEL, GENRE_PHILOSOPHY, GENRE_STUDY};

/// Subset of bibliographic data usable as add-book prefill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInfo {
    pub title: String,
    pub genre: String,
    pub total_page: Option<u32>,
    pub cover_image: Option<String>,
    pub isbn: String,
}

/// Strips hyphens and whitespace, then checks the 10- or 13-digit shape
/// (a 10-digit ISBN may end in `X`). Returns `None` for anything else.
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let valid = match cleaned.chars().count() {
        13 => cleaned.chars().all(|c| c.is_ascii_digit()),
        10 => cleaned
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || (i == 9 && c == 'X')),
        _ => false,
    };
    valid.then_some(cleaned)
}

/// Looks a raw identifier up on openbd.jp. Any failure (bad identifier,
/// network, malformed body, missing title) yields `None`.
pub async fn fetch_book(raw_isbn: &str) -> Option<BookInfo> {
    let isbn = normalize_isbn(raw_isbn)?;
    match try_fetch(&isbn).await {
        Ok(info) => info,
        Err(e) => {
            warn!("OpenBD lookup for {isbn} failed: {e:#}");
            None
        }
    }
}

async fn try_fetch(isbn: &str) -> Result<Option<BookInfo>> {
    let url = format!("https://api.openbd.jp/v1/get?isbn={isbn}");
    let resp = reqwest::get(&url).await?;
    if !resp.status().is_success() {
        return Err(anyhow!("OpenBD API error: {}", resp.status()));
    }

    // The body is an array with one entry per requested ISBN; unknown ISBNs
    // come back as null.
    let entries: Vec<Option<Entry>> = resp.json().await?;
    Ok(entries
        .into_iter()
        .flatten()
        .next()
        .and_then(|entry| parse_entry(&entry, isbn)))
}

fn parse_entry(entry: &Entry, isbn: &str) -> Option<BookInfo> {
    let descriptive = entry
        .onix
        .as_ref()
        .and_then(|onix| onix.descriptive_detail.as_ref());

    let title = descriptive
        .and_then(|detail| detail.title_detail.as_ref())
        .and_then(|detail| detail.title_element.as_ref())
        .and_then(|element| element.title_text.as_ref())
        .and_then(|text| text.content.clone())
        .or_else(|| entry.summary.as_ref().and_then(|s| s.title.clone()))
        .filter(|title| !title.is_empty())?;

    let genre = guess_genre(descriptive.map(|d| d.subjects.as_slice()).unwrap_or(&[]));

    let total_page = descriptive
        .map(|d| d.extents.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter(|extent| extent.extent_type.as_deref() == Some(PAGE_COUNT_EXTENT))
        .find_map(|extent| extent.extent_value.as_deref()?.parse::<u32>().ok())
        .filter(|pages| *pages > 0);

    let cover_image = entry
        .summary
        .as_ref()
        .and_then(|summary| summary.cover.clone())
        .filter(|cover| !cover.is_empty())
        .or_else(|| first_resource_link(entry));

    Some(BookInfo {
        title,
        genre: genre.to_string(),
        total_page,
        cover_image,
        isbn: isbn.to_string(),
    })
}

/// ONIX Extent type for a page count.
const PAGE_COUNT_EXTENT: &str = "11";

/// Guesses a genre key from the first coded subject, by NDC main class.
fn guess_genre(subjects: &[Subject]) -> &'static str {
    for subject in subjects {
        let Some(code) = subject.subject_code.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        return match code.chars().next() {
            Some('0') | Some('1') => GENRE_PHILOSOPHY,
            Some('4') => GENRE_NOVEL,
            Some('5') | Some('6') => GENRE_STUDY,
            _ => GENRE_MAGAZINE,
        };
    }
    GENRE_MAGAZINE
}

fn first_resource_link(entry: &Entry) -> Option<String> {
    entry
        .onix
        .as_ref()?
        .collateral_detail
        .as_ref()?
        .supporting_resources
        .first()?
        .resource_contents
        .first()?
        .resource_versions
        .first()?
        .resource_link
        .clone()
}

#[derive(Debug, Deserialize)]
struct Entry {
    onix: Option<Onix>,
    summary: Option<Summary>,
}

#[derive(Debug, Deserialize)]
struct Onix {
    #[serde(rename = "DescriptiveDetail")]
    descriptive_detail: Option<DescriptiveDetail>,
    #[serde(rename = "CollateralDetail")]
    collateral_detail: Option<CollateralDetail>,
}

#[derive(Debug, Deserialize)]
struct DescriptiveDetail {
    #[serde(rename = "TitleDetail")]
    title_detail: Option<TitleDetail>,
    #[serde(rename = "Subject", default)]
    subjects: Vec<Subject>,
    #[serde(rename = "Extent", default)]
    extents: Vec<Extent>,
}

#[derive(Debug, Deserialize)]
struct TitleDetail {
    #[serde(rename = "TitleElement")]
    title_element: Option<TitleElement>,
}

#[derive(Debug, Deserialize)]
struct TitleElement {
    #[serde(rename = "TitleText")]
    title_text: Option<TitleText>,
}

#[derive(Debug, Deserialize)]
struct TitleText {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Subject {
    #[serde(rename = "SubjectCode")]
    subject_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Extent {
    #[serde(rename = "ExtentType")]
    extent_type: Option<String>,
    #[serde(rename = "ExtentValue")]
    extent_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CollateralDetail {
    #[serde(rename = "SupportingResource", default)]
    supporting_resources: Vec<SupportingResource>,
}

#[derive(Debug, Deserialize)]
struct SupportingResource {
    #[serde(rename = "ResourceContent", default)]
    resource_contents: Vec<ResourceContent>,
}

#[derive(Debug, Deserialize)]
struct ResourceContent {
    #[serde(rename = "ResourceVersion", default)]
    resource_versions: Vec<ResourceVersion>,
}

#[derive(Debug, Deserialize)]
struct ResourceVersion {
    #[serde(rename = "ResourceLink")]
    resource_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    title: Option<String>,
    cover: Option<String>,
}
