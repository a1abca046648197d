//! Turns fetched posts and topic research into writing advice for a draft.
//!
//! Everything here is a pure function of its inputs; fetch failures arrive as strings and only
//! change what the report says.

use crate::guidelines::GENERIC_WRITING_GUIDELINES;
use crate::x_client::api::{Post, PostView, TopicResearch};
use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;
use std::cmp::Ordering;

const MAX_HOOK_WORDS: usize = 14;
const FALLBACK_HOOK: &str = "Most founders are one edit away from a viral post";
const CLOSING_CTA: &str = "If this helped, reply and I will share the exact checklist.";
const MAX_BODY_LINES: usize = 4;
const SNIPPET_CHARS: usize = 80;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "always", "been", "before", "being", "could", "does",
    "doing", "each", "every", "from", "have", "here", "into", "just", "like", "make", "more",
    "most", "much", "need", "never", "only", "other", "over", "really", "should", "some", "than",
    "that", "their", "them", "then", "there", "these", "they", "this", "those", "very", "want",
    "what", "when", "which", "with", "your",
];

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredPost {
    pub text: String,
    pub impressions: i64,
    pub likes: i64,
    pub reposts: i64,
    pub replies: i64,
    pub score: f64,
}

impl ScoredPost {
    fn from_view(view: &PostView, score: impl Fn(i64, i64, i64, i64) -> f64) -> Self {
        let public = view.public();
        let impressions = view.impressions();
        Self {
            text: view.text().to_string(),
            impressions,
            likes: public.like_count,
            reposts: public.retweet_count,
            replies: public.reply_count,
            score: score(impressions, public.like_count, public.retweet_count, public.reply_count),
        }
    }

    fn snippet(&self) -> String {
        let flat = self.text.split_whitespace().join(" ");
        if flat.chars().count() <= SNIPPET_CHARS {
            flat
        } else {
            format!("{}...", flat.chars().take(SNIPPET_CHARS).collect::<String>())
        }
    }
}

fn by_score_desc(a: &ScoredPost, b: &ScoredPost) -> Ordering {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
}

/// Account posts: impressions + 20 per like + 30 per repost.  Ties keep input order.
pub fn rank_posts(posts: &[Post], top_n: usize) -> Vec<ScoredPost> {
    let mut scored: Vec<ScoredPost> = posts
        .iter()
        .map(|post| {
            ScoredPost::from_view(&PostView::of(post), |impressions, likes, reposts, _| {
                impressions as f64 + likes as f64 * 20.0 + reposts as f64 * 30.0
            })
        })
        .collect();
    scored.sort_by(by_score_desc);
    scored.truncate(top_n);
    scored
}

/// Search results never carry private metrics, so only public engagement counts.
pub fn rank_by_public_engagement(posts: &[Post], top_n: usize) -> Vec<ScoredPost> {
    let mut scored: Vec<ScoredPost> = posts
        .iter()
        .map(|post| {
            ScoredPost::from_view(&PostView::of(post), |_, likes, reposts, replies| {
                likes as f64 * 20.0 + reposts as f64 * 30.0 + replies as f64 * 10.0
            })
        })
        .collect();
    scored.sort_by(by_score_desc);
    scored.truncate(top_n);
    scored
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patterns {
    pub hook: &'static str,
    pub specificity: &'static str,
    pub structure: &'static str,
    pub cta: &'static str,
}

pub fn infer_patterns(top_posts: &[ScoredPost]) -> Patterns {
    if top_posts.is_empty() {
        return Patterns {
            hook: "Lead with a direct, high-contrast opening line.",
            specificity: "Use concrete details and examples.",
            structure: "Use short lines and clear spacing.",
            cta: "End with a clear ask (reply/bookmark/follow).",
        };
    }

    let half = top_posts.len() / 2;
    let avg_len = top_posts.iter().map(|p| p.text.chars().count()).sum::<usize>() as f64
        / top_posts.len() as f64;
    let with_number = top_posts
        .iter()
        .filter(|p| p.text.chars().any(|c| c.is_ascii_digit()))
        .count();
    let question_open = top_posts
        .iter()
        .filter(|p| {
            let text = p.text.trim();
            ["How", "Why", "What", "When"]
                .iter()
                .any(|word| text.starts_with(word))
        })
        .count();

    Patterns {
        hook: if question_open >= half {
            "Open with a pointed question hook."
        } else {
            "Use a punchy statement hook."
        },
        specificity: if with_number >= half {
            "Use numbered specifics (steps, counts, or outcomes)."
        } else {
            "Add specific examples and tactical details."
        },
        structure: if avg_len > 220.0 {
            "Use mini-sections and line breaks to improve readability."
        } else {
            "Keep spacing clean with short, skimmable lines."
        },
        cta: "Close with a strong, direct CTA.",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DraftScores {
    pub hook_strength: u8,
    pub specificity: u8,
    pub shareability: u8,
    pub clarity: u8,
}

pub fn score_draft(draft: &str) -> DraftScores {
    let draft = draft.trim();
    let first_line_words = draft.lines().next().unwrap_or("").split_whitespace().count();
    let pick = |good: bool| -> u8 {
        let score: u8 = if good { 8 } else { 6 };
        score.clamp(1, 10)
    };

    DraftScores {
        hook_strength: pick(first_line_words <= MAX_HOOK_WORDS),
        specificity: pick(draft.chars().any(|c| c.is_ascii_digit())),
        shareability: pick(draft.chars().count() < 260),
        clarity: pick(draft.contains('\n') || draft.contains('.')),
    }
}

/// Keeps the hook unless it runs long, keeps up to four body lines, and closes with a CTA.
pub fn rewrite_draft(draft: &str) -> String {
    let lines: Vec<&str> = draft
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let Some((first, body)) = lines.split_first() else {
        return draft.to_string();
    };

    let hook = if first.split_whitespace().count() > MAX_HOOK_WORDS {
        FALLBACK_HOOK
    } else {
        *first
    };

    let mut rewritten = vec![hook, ""];
    rewritten.extend(body.iter().take(MAX_BODY_LINES));
    if !body.is_empty() {
        rewritten.push("");
    }
    rewritten.push(CLOSING_CTA);
    rewritten.join("\n").trim().to_string()
}

/// Hashtags first, then the most frequent meaningful words, case-insensitively de-duplicated.
pub fn extract_topics(draft: &str, max_topics: usize) -> Vec<String> {
    let re_hashtag = Regex::new(r"#(\w+)").unwrap();
    let re_word = Regex::new(r"[A-Za-z][A-Za-z0-9]+").unwrap();

    let mut topics: IndexMap<String, String> = IndexMap::new();
    for cap in re_hashtag.captures_iter(draft) {
        let tag = &cap[1];
        topics.entry(tag.to_lowercase()).or_insert_with(|| tag.to_string());
    }

    let without_hashtags = re_hashtag.replace_all(draft, " ");
    let mut counts: IndexMap<String, (usize, String)> = IndexMap::new();
    for word in re_word.find_iter(&without_hashtags).map(|m| m.as_str()) {
        let key = word.to_lowercase();
        if key.len() < 4 || STOPWORDS.contains(&key.as_str()) {
            continue;
        }
        counts.entry(key).or_insert_with(|| (0, word.to_string())).0 += 1;
    }

    // NB: sort_by is stable, so ties stay in order of first appearance
    let frequent = counts
        .into_iter()
        .sorted_by(|(_, (a, _)), (_, (b, _))| b.cmp(a));
    for (key, (_, word)) in frequent {
        topics.entry(key).or_insert(word);
    }

    topics.into_values().take(max_topics).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct TopicHighlight {
    pub topic: String,
    pub post_count: usize,
    pub top: Option<ScoredPost>,
}

pub fn topic_highlights(research: &TopicResearch) -> Vec<TopicHighlight> {
    research
        .topics
        .iter()
        .map(|(topic, posts)| TopicHighlight {
            topic: topic.clone(),
            post_count: posts.len(),
            top: rank_by_public_engagement(posts, 1).into_iter().next(),
        })
        .collect()
}

fn topic_research_lines(
    topics: &[String],
    topic_research: Option<&TopicResearch>,
) -> Vec<String> {
    let Some(research) = topic_research else {
        return if topics.is_empty() {
            vec!["- No topics to research.".to_string()]
        } else {
            vec![format!("- Topic research skipped for: {}.", topics.join(", "))]
        };
    };

    let mut lines = Vec::new();
    if let Some(error) = &research.meta.error {
        lines.push(format!("- Topic research unavailable: {error}"));
    }
    for highlight in topic_highlights(research) {
        lines.push(match highlight.top {
            Some(top) => format!(
                "- {}: {} recent posts; top one has {} likes, {} reposts: \"{}\"",
                highlight.topic.trim(),
                highlight.post_count,
                top.likes,
                top.reposts,
                top.snippet()
            ),
            None => format!("- {}: no recent posts found.", highlight.topic.trim()),
        });
    }
    for (topic, error) in &research.meta.errors {
        lines.push(format!("- {}: search failed ({error})", topic.trim()));
    }
    if lines.is_empty() {
        lines.push("- No topic results.".to_string());
    }
    lines
}

/// Renders the Markdown advice report.  Always produces a report, even with no data at all.
pub fn generate_advice(
    draft: &str,
    posts: &[Post],
    topic_research: Option<&TopicResearch>,
    topics: &[String],
    account_fetch_error: Option<&str>,
) -> String {
    let top = rank_posts(posts, 10);
    let patterns = infer_patterns(&top);
    let scores = score_draft(draft);
    let rewritten = rewrite_draft(draft);

    let top_note = match top.first() {
        Some(t) => format!(
            "Top post pattern from your data: {} impressions, {} likes, {} reposts.",
            t.impressions, t.likes, t.reposts
        ),
        None => "No top posts available.".to_string(),
    };

    let mut out: Vec<String> = vec![
        "## Score Snapshot".to_string(),
        format!("- Hook Strength: {}/10", scores.hook_strength),
        format!("- Specificity: {}/10", scores.specificity),
        format!("- Shareability: {}/10", scores.shareability),
        format!("- Clarity: {}/10", scores.clarity),
        "".to_string(),
        "## What Works".to_string(),
        "- The draft has a clear core message.".to_string(),
        "".to_string(),
        "## Improve Next".to_string(),
        format!("- Hook: {}", patterns.hook),
        format!("- Specificity: {}", patterns.specificity),
        format!("- Structure: {}", patterns.structure),
        format!("- CTA: {}", patterns.cta),
        "".to_string(),
        "## Topic Research".to_string(),
    ];
    out.extend(topic_research_lines(topics, topic_research));
    out.extend([
        "".to_string(),
        "## Rewritten Draft".to_string(),
        rewritten,
        "".to_string(),
        "## Why These Changes".to_string(),
        format!("- {top_note}"),
        "- Applied winning patterns to hook, specificity, structure, and CTA.".to_string(),
    ]);

    if let Some(error) = account_fetch_error {
        out.extend([
            "".to_string(),
            "## Data Notes".to_string(),
            format!("- Could not fetch your recent posts: {error}"),
            "- Advice falls back to generic patterns.".to_string(),
        ]);
    }

    out.push("".to_string());
    out.push("## Writing Checklist".to_string());
    out.extend(GENERIC_WRITING_GUIDELINES.iter().map(|g| format!("- {g}")));

    out.join("\n")
}
