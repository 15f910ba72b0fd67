//! The ordered set of active rewrite rules.
//!
//! Built once at startup from configuration. Registration order is fixed and
//! determines the order in which one message's contributions are concatenated
//! into the reply. A platform with no configured replacement domains
//! contributes no entry at all.

use std::sync::Arc;

use crate::config::PlatformsConfig;
use crate::error::RuleError;

use super::rule::Rule;

/// `x.com` / `twitter.com` status links.
const TWITTER_MATCH: &str = r"https?://(x|twitter)\.com/\w{1,15}/status/[^\s]+";
const TWITTER_HOST: &str = r"//(x|twitter)\.com/";

/// YouTube Shorts links (`m.` and `www.` hosts). The whole `/shorts/` prefix
/// is spliced away so the short-link host receives the bare video id.
const YOUTUBE_MATCH: &str = r"https?://(m|www)\.youtube\.com/shorts/[^\s]+";
const YOUTUBE_HOST: &str = r"//(m|www)\.youtube\.com/shorts/";

/// Instagram posts, reels, and stories.
const INSTAGRAM_MATCH: &str = r"https?://(\w+\.)?instagram\.com/(p|reel|stories)/[^\s]+";
const INSTAGRAM_HOST: &str = r"//(\w+\.)?instagram\.com/";

/// TikTok video links only: short links (`/t/abc`, `vm.tiktok.com/abc`) and
/// full `@user/video/:id` paths. Bare profile links are not matched.
const TIKTOK_MATCH: &str = r"https?://(\w+\.)?tiktok\.com/((t/)?\w+|@[^\s]+/video)[^\s]*";
const TIKTOK_HOST: &str = r"//(\w+\.)?tiktok\.com/";

/// `reddit.com/(r|u|user)/:sub/(s|comments)/:id` posts plus bare `redd.it`
/// short links. Subdomains of `redd.it` (like `i.redd.it`) are direct media
/// hosts and must not be matched.
const REDDIT_MATCH: &str =
    r"https?://((\w+\.)?reddit\.com/(r|u|user)/\w+/(s|comments)/\w+|redd\.it/\w+)[^\s]*";
const REDDIT_HOST: &str = r"//((\w+\.)?reddit\.com|redd\.it)/";

/// The reddit media proxy wraps the real target percent-encoded in `?url=`.
const REDDIT_MEDIA_MATCH: &str = r"https?://(\w+\.)?reddit\.com/media\?url=[^\s]+";

/// Pixiv artwork links, both path formats:
/// <https://github.com/thelaao/phixiv#path-formats>
const PIXIV_MATCH: &str =
    r"https?://(\w+\.)?pixiv\.net/(\w+/)?(artworks|member_illust\.php)(/|\?illust_id=)\d+(/?\d+)?";
const PIXIV_HOST: &str = r"//(\w+\.)?pixiv\.net/";

/// Bluesky post links. The record key (TID) is always 13 ASCII characters:
/// <https://atproto.com/specs/record-key#record-key-type-tid>
/// DID identifiers are 24 characters:
/// <https://github.com/did-method-plc/did-method-plc#identifier-syntax>
const BSKY_MATCH: &str =
    r"https?://bsky\.app/profile/([\w.-]+|did:plc:[234567a-z]{24})/post/[234567a-z]{13}";
const BSKY_HOST: &str = r"//bsky\.app/";

/// Platform a registry entry belongs to; the unit of per-guild gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Twitter,
    Youtube,
    Instagram,
    Tiktok,
    Reddit,
    Pixiv,
    Bsky,
}

/// One active rule with its registry metadata.
#[derive(Debug)]
pub struct RegistryEntry {
    /// Stable identifier used in logs.
    pub id: &'static str,
    pub platform: Platform,
    pub rule: Arc<Rule>,
    /// Substring a match must contain for this entry to claim it. Entries
    /// sharing one rule use this to split hosts apart.
    pub host_filter: Option<&'static str>,
}

/// All URLs one entry extracted from a message.
#[derive(Debug)]
pub struct RuleMatch<'r, 't> {
    pub entry: &'r RegistryEntry,
    pub urls: Vec<&'t str>,
}

/// Ordered collection of active rules.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    entries: Vec<RegistryEntry>,
}

impl RuleRegistry {
    /// Build the registry from platform configuration. Platforms without
    /// configured domains are skipped.
    pub fn from_config(platforms: &PlatformsConfig) -> Result<Self, RuleError> {
        let mut entries = Vec::new();

        let twitter = parse_domains(platforms.twitter.as_deref());
        if !twitter.is_empty() {
            entries.push(RegistryEntry {
                id: "twitter",
                platform: Platform::Twitter,
                rule: Arc::new(Rule::splice(
                    "twitter",
                    TWITTER_MATCH,
                    TWITTER_HOST,
                    true,
                    twitter,
                )?),
                host_filter: None,
            });
        }

        let youtube = parse_domains(platforms.youtube.as_deref());
        if !youtube.is_empty() {
            entries.push(RegistryEntry {
                id: "youtube",
                platform: Platform::Youtube,
                rule: Arc::new(Rule::splice(
                    "youtube",
                    YOUTUBE_MATCH,
                    YOUTUBE_HOST,
                    true,
                    youtube,
                )?),
                host_filter: None,
            });
        }

        let instagram = parse_domains(platforms.instagram.as_deref());
        if !instagram.is_empty() {
            entries.push(RegistryEntry {
                id: "instagram",
                platform: Platform::Instagram,
                rule: Arc::new(Rule::splice(
                    "instagram",
                    INSTAGRAM_MATCH,
                    INSTAGRAM_HOST,
                    true,
                    instagram,
                )?),
                host_filter: None,
            });
        }

        let tiktok = parse_domains(platforms.tiktok.as_deref());
        if !tiktok.is_empty() {
            entries.push(RegistryEntry {
                id: "tiktok",
                platform: Platform::Tiktok,
                rule: Arc::new(Rule::splice(
                    "tiktok",
                    TIKTOK_MATCH,
                    TIKTOK_HOST,
                    true,
                    tiktok,
                )?),
                host_filter: None,
            });
        }

        let reddit = parse_domains(platforms.reddit.as_deref());
        if !reddit.is_empty() {
            // One rule, two entries: the host filter splits reddit.com posts
            // from redd.it short links so each logs under its own id.
            let rule = Arc::new(Rule::splice(
                "reddit",
                REDDIT_MATCH,
                REDDIT_HOST,
                true,
                reddit,
            )?);
            entries.push(RegistryEntry {
                id: "reddit",
                platform: Platform::Reddit,
                rule: Arc::clone(&rule),
                host_filter: Some("reddit.com/"),
            });
            entries.push(RegistryEntry {
                id: "redd.it",
                platform: Platform::Reddit,
                rule,
                host_filter: Some("redd.it/"),
            });
            entries.push(RegistryEntry {
                id: "reddit-media",
                platform: Platform::Reddit,
                rule: Arc::new(Rule::unwrap_target(
                    "reddit-media",
                    REDDIT_MEDIA_MATCH,
                    "url",
                )?),
                host_filter: None,
            });
        }

        let pixiv = parse_domains(platforms.pixiv.as_deref());
        if !pixiv.is_empty() {
            // Keep the query: member_illust.php carries the id in ?illust_id=.
            entries.push(RegistryEntry {
                id: "pixiv",
                platform: Platform::Pixiv,
                rule: Arc::new(Rule::splice(
                    "pixiv",
                    PIXIV_MATCH,
                    PIXIV_HOST,
                    false,
                    pixiv,
                )?),
                host_filter: None,
            });
        }

        let bsky = parse_domains(platforms.bsky.as_deref());
        if !bsky.is_empty() {
            entries.push(RegistryEntry {
                id: "bsky",
                platform: Platform::Bsky,
                rule: Arc::new(
                    Rule::splice("bsky", BSKY_MATCH, BSKY_HOST, true, bsky)?
                        .reject_trailing_slash(),
                ),
                host_filter: None,
            });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every entry against `text`, in registration order. Entries that
    /// extract nothing are omitted; several entries may match one message.
    pub fn match_message<'r, 't>(&'r self, text: &'t str) -> Vec<RuleMatch<'r, 't>> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let urls = entry.rule.extract(text, entry.host_filter);
                if urls.is_empty() {
                    None
                } else {
                    Some(RuleMatch { entry, urls })
                }
            })
            .collect()
    }
}

/// Split a comma-separated domain list, trimming whitespace and dropping
/// empty items.
fn parse_domains(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}
