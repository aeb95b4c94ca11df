//! Research tools: arXiv, Wikipedia and Tavily search, plus a check of how
//! many cited sources come from preferred domains.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{required_str, Tool};

const ARXIV_URL: &str = "http://export.arxiv.org/api/query";
const WIKIPEDIA_URL: &str = "https://en.wikipedia.org/w/api.php";
const TAVILY_URL: &str = "https://api.tavily.com/search";

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("refinement-agent/0.1 (research tools)")
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

fn max_results(args: &Value) -> u64 {
    args["max_results"].as_u64().unwrap_or(5).clamp(1, 20)
}

/// Search arXiv for papers.
pub struct ArxivSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl ArxivSearch {
    pub fn new() -> Self {
        Self::with_endpoint(ARXIV_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for ArxivSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ArxivSearch {
    fn name(&self) -> &str {
        "arxiv_search"
    }

    fn description(&self) -> &str {
        "Search arXiv for academic papers. Returns titles, authors, publication dates, links and abstracts."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search keywords"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of papers to return (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let query = required_str(&args, "query")?;
        let limit = max_results(&args).to_string();
        let search = format!("all:{}", query);

        let feed = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", search.as_str()),
                ("start", "0"),
                ("max_results", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let papers = parse_arxiv_feed(&feed);
        if papers.is_empty() {
            return Ok(format!("No papers found for: {}", query));
        }
        Ok(serde_json::to_string_pretty(&papers)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
struct Paper {
    title: String,
    authors: Vec<String>,
    published: String,
    url: String,
    summary: String,
}

/// Pull entries out of an arXiv Atom feed. A malformed document yields the
/// entries read before the error.
fn parse_arxiv_feed(xml: &str) -> Vec<Paper> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut papers = Vec::new();
    let mut current: Option<Paper> = None;
    let mut field: Option<Vec<u8>> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => current = Some(Paper::default()),
                name @ (b"id" | b"published" | b"title" | b"summary" | b"name")
                    if current.is_some() =>
                {
                    field = Some(name.to_vec());
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) if field.is_some() => match e.unescape() {
                Ok(chunk) => {
                    text.push(' ');
                    text.push_str(&chunk);
                }
                Err(err) => tracing::warn!(error = %err, "Skipping undecodable arXiv text"),
            },
            Ok(Event::CData(e)) if field.is_some() => {
                text.push(' ');
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"entry" {
                    papers.extend(current.take());
                } else if field.as_deref() == Some(name.as_ref()) {
                    if let Some(paper) = current.as_mut() {
                        let value = collapse(&text);
                        match name.as_ref() {
                            b"id" => paper.url = value,
                            b"published" => paper.published = value,
                            b"title" => paper.title = value,
                            b"summary" => paper.summary = value,
                            _ => paper.authors.push(value),
                        }
                    }
                    field = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(position = reader.buffer_position(), error = %e, "Malformed arXiv feed");
                break;
            }
            _ => {}
        }
    }

    papers
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn xml_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Search Wikipedia articles.
pub struct WikipediaSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl WikipediaSearch {
    pub fn new() -> Self {
        Self::with_endpoint(WIKIPEDIA_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WikipediaSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct WikiResponse {
    query: WikiQuery,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    search: Vec<WikiHit>,
}

#[derive(Debug, Deserialize)]
struct WikiHit {
    title: String,
    snippet: String,
}

#[async_trait]
impl Tool for WikipediaSearch {
    fn name(&self) -> &str {
        "wikipedia_search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for encyclopedic summaries. Returns article titles, snippets and links."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Topic to look up"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of articles to return (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let query = required_str(&args, "query")?;
        let limit = max_results(&args).to_string();

        let response: WikiResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.query.search.is_empty() {
            return Ok(format!("No articles found for: {}", query));
        }

        let results: Vec<String> = response
            .query
            .search
            .iter()
            .map(|hit| {
                format!(
                    "**{}**\n{}\nURL: https://en.wikipedia.org/wiki/{}",
                    hit.title,
                    strip_tags(&hit.snippet),
                    urlencoding::encode(&hit.title.replace(' ', "_"))
                )
            })
            .collect();
        Ok(results.join("\n\n"))
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    xml_decode(&out)
}

/// General web search through the Tavily API.
pub struct TavilySearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, TAVILY_URL)
    }

    pub fn with_endpoint(api_key: String, endpoint: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TavilyHit {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "General web search. Returns a JSON list of results with title, url and content."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let query = required_str(&args, "query")?;

        let response: TavilyResponse = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "query": query,
                "max_results": max_results(&args),
                "include_images": false,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(serde_json::to_string_pretty(&response.results)?)
    }
}

/// Domains treated as trustworthy sources by default.
pub const DEFAULT_PREFERRED_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "nature.com",
    "science.org",
    "sciencemag.org",
    "cell.com",
    "mit.edu",
    "stanford.edu",
    "harvard.edu",
    "nasa.gov",
    "noaa.gov",
    "europa.eu",
    "arxiv.org",
    "acm.org",
    "ieee.org",
    "neurips.cc",
    "icml.cc",
    "openreview.net",
    "elifesciences.org",
    "pnas.org",
    "jmlr.org",
    "springer.com",
    "sciencedirect.com",
    "pbs.org",
    "nova.edu",
    "nvcc.edu",
    "cccco.edu",
    "codecademy.com",
    "datacamp.com",
];

/// Outcome of [`evaluate_preferred_domains`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainReport {
    pub passed: bool,
    pub total: usize,
    pub preferred: usize,
    pub ratio: f64,
    pub min_ratio: f64,
    /// One `(url, preferred)` pair per URL found
    pub urls: Vec<(String, bool)>,
}

impl DomainReport {
    pub fn to_markdown(&self) -> String {
        if self.total == 0 {
            return "### Evaluation - Preferred Domains\n\
                    No URLs detected in the provided text.\n\
                    Please include links in your research results."
                .to_string();
        }

        let details: Vec<String> = self
            .urls
            .iter()
            .map(|(url, preferred)| {
                format!(
                    "- {} -> {}",
                    url,
                    if *preferred { "PREFERRED" } else { "NOT PREFERRED" }
                )
            })
            .collect();

        format!(
            "### Evaluation - Preferred Domains\n\
             - Total results: {}\n\
             - Preferred results: {}\n\
             - Ratio: {:.2}%\n\
             - Threshold: {:.0}%\n\
             - Status: {}\n\n\
             **Details:**\n{}",
            self.total,
            self.preferred,
            self.ratio * 100.0,
            self.min_ratio * 100.0,
            if self.passed { "PASS" } else { "FAIL" },
            details.join("\n")
        )
    }
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)https?://[^\s\]\)>\}"']+"#).expect("valid regex"))
}

/// Score how many URLs in `text` point at a preferred domain (the domain
/// itself or any subdomain). Passes when the ratio reaches `min_ratio`;
/// text without URLs never passes.
pub fn evaluate_preferred_domains(text: &str, domains: &[&str], min_ratio: f64) -> DomainReport {
    let urls: Vec<(String, bool)> = url_pattern()
        .find_iter(text)
        .map(|m| {
            let raw = m.as_str().trim_end_matches(&['.', ',', ';'][..]).to_string();
            let preferred = host_of(&raw).is_some_and(|host| {
                domains
                    .iter()
                    .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
            });
            (raw, preferred)
        })
        .collect();

    let total = urls.len();
    let preferred = urls.iter().filter(|(_, p)| *p).count();
    let ratio = if total > 0 {
        preferred as f64 / total as f64
    } else {
        0.0
    };

    DomainReport {
        passed: total > 0 && ratio >= min_ratio,
        total,
        preferred,
        ratio,
        min_ratio,
        urls,
    }
}

fn host_of(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()?
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <published>2024-01-02T00:00:00Z</published>
    <title>Black Hole
      Thermodynamics &amp; Information</title>
    <summary>  We study the
      information paradox.  </summary>
    <author><name>A. Researcher</name></author>
    <author><name>B. Scientist</name></author>
  </entry>
</feed>"#;

    #[test]
    fn arxiv_feed_entries_are_parsed() {
        let papers = parse_arxiv_feed(FEED);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Black Hole Thermodynamics & Information");
        assert_eq!(papers[0].authors, vec!["A. Researcher", "B. Scientist"]);
        assert_eq!(papers[0].url, "http://arxiv.org/abs/2401.00001v1");
        assert_eq!(papers[0].summary, "We study the information paradox.");
    }

    #[test]
    fn arxiv_cdata_and_entities_are_decoded_once() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2402.00002v2</id>
    <title><![CDATA[Graphs <and> Trees]]></title>
    <summary>Bounds for a &amp;lt; b.</summary>
    <author><name>C. Author</name><arxiv:affiliation xmlns:arxiv="http://arxiv.org/schemas/atom">Lab</arxiv:affiliation></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2402.00003v1</id>
    <title>Second</title>
  </entry>
</feed>"#;

        let papers = parse_arxiv_feed(feed);
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Graphs <and> Trees");
        assert_eq!(papers[0].summary, "Bounds for a &lt; b.");
        assert_eq!(papers[0].authors, vec!["C. Author"]);
        assert_eq!(papers[1].title, "Second");
        assert!(papers[1].authors.is_empty());
    }

    #[test]
    fn truncated_arxiv_feed_keeps_complete_entries() {
        let cut = FEED.replace("</feed>", "<entry><title>Unfinished</title></wrong></entry>");
        let papers = parse_arxiv_feed(&cut);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].authors, vec!["A. Researcher", "B. Scientist"]);
    }

    #[tokio::test]
    async fn arxiv_search_queries_endpoint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "search_query".into(),
                "all:black holes".into(),
            ))
            .with_status(200)
            .with_body(FEED)
            .create_async()
            .await;

        let tool = ArxivSearch::with_endpoint(format!("{}/api/query", server.url()));
        let out = tool
            .execute(json!({"query": "black holes"}), Path::new("."))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["published"], "2024-01-02T00:00:00Z");
    }

    #[tokio::test]
    async fn wikipedia_results_link_articles() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/w/api.php")
            .match_query(mockito::Matcher::UrlEncoded("srsearch".into(), "tokamak".into()))
            .with_status(200)
            .with_body(
                r#"{"query": {"search": [{"title": "Tokamak",
                    "snippet": "A <span class=\"searchmatch\">tokamak</span> confines plasma"}]}}"#,
            )
            .create_async()
            .await;

        let tool = WikipediaSearch::with_endpoint(format!("{}/w/api.php", server.url()));
        let out = tool
            .execute(json!({"query": "tokamak"}), Path::new("."))
            .await
            .unwrap();
        assert_eq!(
            out,
            "**Tokamak**\nA tokamak confines plasma\nURL: https://en.wikipedia.org/wiki/Tokamak"
        );
    }

    #[tokio::test]
    async fn tavily_sends_bearer_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_header("authorization", "Bearer tvly-key")
            .with_status(200)
            .with_body(
                r#"{"results": [{"title": "Fusion", "url": "https://nature.com/x", "content": "c", "score": 0.9}]}"#,
            )
            .create_async()
            .await;

        let tool = TavilySearch::with_endpoint("tvly-key".into(), format!("{}/search", server.url()));
        let out = tool
            .execute(json!({"query": "fusion"}), Path::new("."))
            .await
            .unwrap();
        mock.assert_async().await;
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["url"], "https://nature.com/x");
    }

    #[test]
    fn preferred_domain_ratio() {
        let text = "See https://www.nature.com/articles/1, https://arxiv.org/abs/2 \
                    and (https://someblog.example.com/post).";
        let report = evaluate_preferred_domains(text, DEFAULT_PREFERRED_DOMAINS, 0.4);
        assert_eq!(report.total, 3);
        assert_eq!(report.preferred, 2);
        assert!(report.passed);
        assert_eq!(report.urls[0].0, "https://www.nature.com/articles/1");
        assert_eq!(report.urls[2], ("https://someblog.example.com/post".to_string(), false));
        assert!(report.to_markdown().contains("- Status: PASS"));
    }

    #[test]
    fn lookalike_hosts_are_not_preferred() {
        let report = evaluate_preferred_domains(
            "https://nasa.gov.example.net/x https://fakenature.com/y https://en.wikipedia.org/z",
            DEFAULT_PREFERRED_DOMAINS,
            0.5,
        );
        assert_eq!(report.preferred, 1);
        assert!(!report.passed);
    }

    #[test]
    fn text_without_urls_fails() {
        let report = evaluate_preferred_domains("no links here", DEFAULT_PREFERRED_DOMAINS, 0.0);
        assert!(!report.passed);
        assert!(report.to_markdown().contains("No URLs detected"));
    }
}
