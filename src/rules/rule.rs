//! A single platform's rewrite rule.
//!
//! A [`Rule`] pairs a URL-matching regex with a rewrite behavior and the
//! ordered list of replacement domains to try. Rules are compiled once at
//! startup and shared read-only across all message processing.

use regex::{NoExpand, Regex};
use std::sync::OnceLock;
use url::Url;

use crate::error::RuleError;

/// Trailing tracking-query suffix (`?key=...` through end of URL).
fn query_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\?\w+=.*$").expect("query suffix regex is valid"))
}

/// How a matched URL is turned into its replacement.
#[derive(Debug)]
pub enum RewriteKind {
    /// Excise the `//host/` segment and splice in `//{domain}/`, keeping the
    /// rest of the URL intact. Optionally drop a trailing `?key=value...`
    /// tracking suffix afterwards.
    SpliceDomain { host: Regex, strip_query: bool },

    /// The matched URL carries its real target percent-encoded in a query
    /// parameter; the replacement is that decoded target. Domain-independent,
    /// so rules of this kind always have exactly one candidate.
    UnwrapTarget { param: &'static str },
}

/// One platform's link pattern, rewrite behavior, and candidate domains.
#[derive(Debug)]
pub struct Rule {
    matcher: Regex,
    rewrite: RewriteKind,
    domains: Vec<String>,
    no_trailing_slash: bool,
}

impl Rule {
    /// Build a host-splicing rule. `domains` is the ordered candidate list
    /// and must be non-empty; trial order is list order.
    pub fn splice(
        platform: &str,
        matcher: &str,
        host: &str,
        strip_query: bool,
        domains: Vec<String>,
    ) -> Result<Self, RuleError> {
        if domains.is_empty() {
            return Err(RuleError::NoCandidates {
                platform: platform.to_owned(),
            });
        }
        let matcher = compile(platform, matcher)?;
        let host = compile(platform, host)?;
        Ok(Self {
            matcher,
            rewrite: RewriteKind::SpliceDomain { host, strip_query },
            domains,
            no_trailing_slash: false,
        })
    }

    /// Build a query-target-unwrapping rule. The replacement is the decoded
    /// value of `param`, so there is exactly one candidate rendering.
    pub fn unwrap_target(
        platform: &str,
        matcher: &str,
        param: &'static str,
    ) -> Result<Self, RuleError> {
        let matcher = compile(platform, matcher)?;
        Ok(Self {
            matcher,
            rewrite: RewriteKind::UnwrapTarget { param },
            domains: Vec::new(),
            no_trailing_slash: false,
        })
    }

    /// Discard matches that are immediately followed by a `/`. Used where the
    /// pattern ends on a fixed-length identifier and a deeper path means the
    /// link points somewhere the mirror cannot render.
    pub fn reject_trailing_slash(mut self) -> Self {
        self.no_trailing_slash = true;
        self
    }

    /// Extract every matching URL from `text`, left to right, non-overlapping.
    ///
    /// `host_filter` keeps only matches containing the given substring; it is
    /// used where one rule backs several host suffixes that are registered as
    /// separate entries. No match is an empty vec, never an error.
    pub fn extract<'t>(&self, text: &'t str, host_filter: Option<&str>) -> Vec<&'t str> {
        let mut urls = Vec::new();
        for m in self.matcher.find_iter(text) {
            if self.no_trailing_slash && text[m.end()..].starts_with('/') {
                continue;
            }
            if let Some(filter) = host_filter
                && !m.as_str().contains(filter)
            {
                continue;
            }
            urls.push(m.as_str());
        }
        urls
    }

    /// Number of candidate renderings this rule can produce.
    pub fn candidate_count(&self) -> usize {
        match self.rewrite {
            RewriteKind::SpliceDomain { .. } => self.domains.len(),
            RewriteKind::UnwrapTarget { .. } => 1,
        }
    }

    /// Candidate domain at `index`, where applicable.
    pub fn candidate(&self, index: usize) -> Option<&str> {
        self.domains.get(index).map(String::as_str)
    }

    /// Rewrite one matched URL using the candidate at `index`. Pure and
    /// deterministic; an out-of-range index falls back to the first
    /// candidate.
    pub fn rewrite_url(&self, url: &str, index: usize) -> String {
        match &self.rewrite {
            RewriteKind::SpliceDomain { host, strip_query } => {
                let Some(domain) = self.domains.get(index).or_else(|| self.domains.first())
                else {
                    return url.to_owned();
                };
                let spliced = host
                    .replace(url, NoExpand(&format!("//{domain}/")))
                    .into_owned();
                if *strip_query {
                    query_suffix_regex().replace(&spliced, "").into_owned()
                } else {
                    spliced
                }
            }
            RewriteKind::UnwrapTarget { param } => match Url::parse(url) {
                Ok(parsed) => parsed
                    .query_pairs()
                    .find(|(key, _)| key == param)
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_else(|| url.to_owned()),
                Err(_) => url.to_owned(),
            },
        }
    }

    /// Replacement text for all `urls` under the candidate at `index`, one
    /// rewritten URL per line.
    pub fn render(&self, urls: &[&str], index: usize) -> String {
        urls.iter()
            .map(|url| self.rewrite_url(url, index))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replacement text for all `urls` under every candidate, in candidate
    /// order.
    pub fn render_all(&self, urls: &[&str]) -> Vec<String> {
        (0..self.candidate_count())
            .map(|index| self.render(urls, index))
            .collect()
    }
}

fn compile(platform: &str, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|err| RuleError::Pattern {
        platform: platform.to_owned(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twitter_rule(domains: &[&str]) -> Rule {
        Rule::splice(
            "twitter",
            r"https?://(x|twitter)\.com/\w{1,15}/status/[^\s]+",
            r"//(x|twitter)\.com/",
            true,
            domains.iter().map(|d| (*d).to_owned()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn splice_requires_candidates() {
        let err = Rule::splice("twitter", r"x", r"y", true, Vec::new()).unwrap_err();
        assert!(matches!(err, RuleError::NoCandidates { .. }));
    }

    #[test]
    fn bad_pattern_reports_platform() {
        let err = Rule::splice("tiktok", r"(unclosed", r"y", true, vec!["a".into()]).unwrap_err();
        match err {
            RuleError::Pattern { platform, .. } => assert_eq!(platform, "tiktok"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extract_finds_urls_in_free_text() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        let urls = rule.extract(
            "check this https://x.com/someone/status/123 wow",
            None,
        );
        assert_eq!(urls, vec!["https://x.com/someone/status/123"]);
    }

    #[test]
    fn extract_returns_empty_on_no_match() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        assert!(rule.extract("no links here", None).is_empty());
    }

    #[test]
    fn extract_is_left_to_right() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        let urls = rule.extract(
            "https://x.com/a/status/1 and https://twitter.com/b/status/2",
            None,
        );
        assert_eq!(
            urls,
            vec!["https://x.com/a/status/1", "https://twitter.com/b/status/2"]
        );
    }

    #[test]
    fn host_filter_keeps_only_matching_urls() {
        let rule = Rule::splice(
            "reddit",
            r"https?://((\w+\.)?reddit\.com/(r|u|user)/\w+/(s|comments)/\w+|redd\.it/\w+)[^\s]*",
            r"//((\w+\.)?reddit\.com|redd\.it)/",
            true,
            vec!["rxddit.com".into()],
        )
        .unwrap();
        let text = "https://redd.it/abc and https://www.reddit.com/r/rust/comments/xyz/title/";
        assert_eq!(
            rule.extract(text, Some("redd.it/")),
            vec!["https://redd.it/abc"]
        );
        assert_eq!(
            rule.extract(text, Some("reddit.com/")),
            vec!["https://www.reddit.com/r/rust/comments/xyz/title/"]
        );
    }

    #[test]
    fn trailing_slash_boundary_discards_deeper_paths() {
        let rule = Rule::splice(
            "bsky",
            r"https?://bsky\.app/profile/([\w.-]+|did:plc:[234567a-z]{24})/post/[234567a-z]{13}",
            r"//bsky\.app/",
            true,
            vec!["fxbsky.app".into()],
        )
        .unwrap()
        .reject_trailing_slash();
        assert!(
            rule.extract("https://bsky.app/profile/user.bsky.social/post/3kabcdefghijk/liked-by", None)
                .is_empty()
        );
        assert_eq!(
            rule.extract("https://bsky.app/profile/user.bsky.social/post/3kabcdefghijk", None),
            vec!["https://bsky.app/profile/user.bsky.social/post/3kabcdefghijk"]
        );
    }

    #[test]
    fn rewrite_splices_host_and_keeps_path() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        assert_eq!(
            rule.rewrite_url("https://twitter.com/someone/status/123", 0),
            "https://fxtwitter.com/someone/status/123"
        );
    }

    #[test]
    fn rewrite_strips_tracking_query() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        assert_eq!(
            rule.rewrite_url("https://x.com/someone/status/123?s=20&t=tracking", 0),
            "https://fxtwitter.com/someone/status/123"
        );
    }

    #[test]
    fn rewrite_keeps_query_when_not_stripping() {
        let rule = Rule::splice(
            "pixiv",
            r"https?://(\w+\.)?pixiv\.net/(\w+/)?(artworks|member_illust\.php)(/|\?illust_id=)\d+(/?\d+)?",
            r"//(\w+\.)?pixiv\.net/",
            false,
            vec!["phixiv.net".into()],
        )
        .unwrap();
        assert_eq!(
            rule.rewrite_url("https://www.pixiv.net/member_illust.php?illust_id=123", 0),
            "https://phixiv.net/member_illust.php?illust_id=123"
        );
    }

    #[test]
    fn rewrite_selects_candidate_by_index() {
        let rule = twitter_rule(&["fxtwitter.com", "vxtwitter.com"]);
        assert_eq!(
            rule.rewrite_url("https://x.com/a/status/1", 1),
            "https://vxtwitter.com/a/status/1"
        );
    }

    #[test]
    fn rewrite_out_of_range_falls_back_to_first() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        assert_eq!(
            rule.rewrite_url("https://x.com/a/status/1", 7),
            "https://fxtwitter.com/a/status/1"
        );
    }

    #[test]
    fn unwrap_target_decodes_query_param() {
        let rule = Rule::unwrap_target(
            "reddit-media",
            r"https?://(\w+\.)?reddit\.com/media\?url=[^\s]+",
            "url",
        )
        .unwrap();
        assert_eq!(
            rule.rewrite_url(
                "https://www.reddit.com/media?url=https%3A%2F%2Fi.redd.it%2Fabc123.jpeg",
                0
            ),
            "https://i.redd.it/abc123.jpeg"
        );
    }

    #[test]
    fn unwrap_target_has_one_candidate() {
        let rule = Rule::unwrap_target("reddit-media", r"x", "url").unwrap();
        assert_eq!(rule.candidate_count(), 1);
    }

    #[test]
    fn render_joins_matches_with_newlines() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        let urls = vec!["https://x.com/a/status/1", "https://x.com/b/status/2"];
        assert_eq!(
            rule.render(&urls, 0),
            "https://fxtwitter.com/a/status/1\nhttps://fxtwitter.com/b/status/2"
        );
    }

    #[test]
    fn render_all_produces_one_rendering_per_candidate() {
        let rule = twitter_rule(&["fxtwitter.com", "vxtwitter.com"]);
        let urls = vec!["https://x.com/a/status/1"];
        assert_eq!(
            rule.render_all(&urls),
            vec![
                "https://fxtwitter.com/a/status/1".to_owned(),
                "https://vxtwitter.com/a/status/1".to_owned(),
            ]
        );
    }

    #[test]
    fn rewritten_output_does_not_rematch() {
        let rule = twitter_rule(&["fxtwitter.com"]);
        let rewritten = rule.rewrite_url("https://x.com/a/status/1", 0);
        assert!(rule.extract(&rewritten, None).is_empty());
    }
}
