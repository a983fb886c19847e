//! Full-text message search
//!
//! Queries run against the FTS shadow and support phrase matching,
//! exclusion, prefix, and boolean operators (FTS5 syntax passes through).
//! Results are ranked by BM25 (lower score is better) with recency as the
//! tie-break. Snippets are HTML-escaped before the highlight markers are
//! rewritten to `<mark>` tags, so message content can never inject markup.

use sqlx::SqlitePool;

use crate::core::constants::{SEARCH_DEFAULT_LIMIT, SEARCH_MAX_LIMIT, SEARCH_SNIPPET_TOKENS};
use crate::data::sqlite::StoreError;
use crate::data::types::{Role, SearchHit, SessionType};

// Sentinel bytes the snippet function emits around matches; rewritten to
// mark tags after HTML escaping
const MARK_OPEN: &str = "\u{1}";
const MARK_CLOSE: &str = "\u{2}";

/// Search filters. `limit` is clamped to the hard cap, not rejected.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub session_type: Option<SessionType>,
    pub session_id: Option<String>,
    pub model_id: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub limit: Option<u32>,
    pub offset: u32,
}

type HitTuple = (
    String,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    String,
    f64,
);

pub async fn search_messages(
    pool: &SqlitePool,
    query: &str,
    filter: &SearchFilter,
) -> Result<Vec<SearchHit>, StoreError> {
    let limit = filter
        .limit
        .unwrap_or(SEARCH_DEFAULT_LIMIT)
        .min(SEARCH_MAX_LIMIT);

    let mut builder = sqlx::QueryBuilder::new(
        "SELECT m.id, m.session_id, m.role, m.content, m.created_at, \
                s.session_type, s.title, \
                snippet(messages_fts, 0, ",
    );
    builder.push_bind(MARK_OPEN);
    builder.push(", ");
    builder.push_bind(MARK_CLOSE);
    builder.push(", '…', ");
    builder.push_bind(SEARCH_SNIPPET_TOKENS);
    builder.push(
        "), bm25(messages_fts) AS score \
         FROM messages_fts \
         JOIN messages m ON m.rowid = messages_fts.rowid \
         JOIN sessions s ON s.id = m.session_id \
         WHERE messages_fts MATCH ",
    );
    builder.push_bind(translate_query(query));

    if let Some(session_type) = filter.session_type {
        builder.push(" AND s.session_type = ");
        builder.push_bind(session_type.as_str());
    }
    if let Some(ref session_id) = filter.session_id {
        builder.push(" AND m.session_id = ");
        builder.push_bind(session_id);
    }
    if let Some(ref model_id) = filter.model_id {
        builder.push(
            " AND EXISTS (SELECT 1 FROM usage_logs u \
             WHERE u.session_id = m.session_id AND u.model_id = ",
        );
        builder.push_bind(model_id);
        builder.push(")");
    }
    if let Some(start) = filter.start {
        builder.push(" AND m.created_at >= ");
        builder.push_bind(start);
    }
    if let Some(end) = filter.end {
        builder.push(" AND m.created_at <= ");
        builder.push_bind(end);
    }

    builder.push(" ORDER BY score ASC, m.created_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(filter.offset);

    let rows = builder
        .build_query_as::<HitTuple>()
        .fetch_all(pool)
        .await
        .map_err(map_match_error)?;

    rows.into_iter().map(hit_from_tuple).collect()
}

fn hit_from_tuple(t: HitTuple) -> Result<SearchHit, StoreError> {
    let (
        message_id,
        session_id,
        role,
        content,
        created_at,
        session_type,
        session_title,
        raw_snippet,
        rank,
    ) = t;

    let role = Role::parse(&role)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown role {role:?}").into()))?;
    let session_type = SessionType::parse(&session_type).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown session type {session_type:?}").into())
    })?;

    Ok(SearchHit {
        message_id,
        session_id,
        role,
        content,
        created_at,
        session_type,
        session_title,
        snippet: render_snippet(&raw_snippet),
        rank,
    })
}

/// HTML-escape the snippet, then rewrite the sentinel markers to mark tags
fn render_snippet(raw: &str) -> String {
    let escaped = raw
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    escaped
        .replace(MARK_OPEN, "<mark>")
        .replace(MARK_CLOSE, "</mark>")
}

/// Rewrite web-style exclusion (`world -peace`) into FTS5 `NOT` syntax.
/// Quoted phrases pass through untouched; a leading exclusion has no left
/// operand and is left for FTS5 to reject.
fn translate_query(raw: &str) -> String {
    let mut in_quotes = false;
    let mut parts: Vec<String> = Vec::new();

    for token in raw.split_whitespace() {
        let quote_count = token.matches('"').count();
        if !in_quotes
            && let Some(term) = token.strip_prefix('-')
            && !term.is_empty()
            && !parts.is_empty()
        {
            parts.push(format!("NOT {term}"));
        } else {
            parts.push(token.to_string());
        }
        if quote_count % 2 == 1 {
            in_quotes = !in_quotes;
        }
    }

    parts.join(" ")
}

/// FTS5 reports malformed user queries as database errors on the MATCH;
/// surface those as a typed bad-query error instead of a 500
fn map_match_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        let message = db.message();
        if message.contains("fts5") || message.contains("MATCH") || message.contains("syntax error")
        {
            return StoreError::BadQuery(message.to_string());
        }
    }
    StoreError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::message::append_message;
    use crate::data::sqlite::repositories::session::{self, NewSession};
    use crate::data::sqlite::repositories::testutil::test_pool;

    async fn make_session(pool: &SqlitePool, session_type: SessionType) -> String {
        session::create_session(
            pool,
            NewSession {
                session_type,
                title: Some("Test".to_string()),
                profile_id: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn seed(pool: &SqlitePool) -> String {
        let sid = make_session(pool, SessionType::Chat).await;
        append_message(pool, &sid, Role::User, "Hello world")
            .await
            .unwrap();
        append_message(pool, &sid, Role::Assistant, "world peace")
            .await
            .unwrap();
        sid
    }

    #[tokio::test]
    async fn test_plain_term_matches_both() {
        let pool = test_pool().await;
        seed(&pool).await;

        let hits = search_messages(&pool, "world", &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_phrase_query() {
        let pool = test_pool().await;
        seed(&pool).await;

        let hits = search_messages(&pool, "\"hello world\"", &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Hello world");
    }

    #[tokio::test]
    async fn test_exclusion_query() {
        let pool = test_pool().await;
        seed(&pool).await;

        for query in ["world NOT peace", "world -peace"] {
            let hits = search_messages(&pool, query, &SearchFilter::default())
                .await
                .unwrap();
            assert_eq!(hits.len(), 1, "query: {query}");
            assert_eq!(hits[0].content, "Hello world");
        }
    }

    #[test]
    fn test_translate_query_rewrites_exclusion() {
        assert_eq!(translate_query("world -peace"), "world NOT peace");
        assert_eq!(translate_query("\"-literal phrase\""), "\"-literal phrase\"");
        assert_eq!(translate_query("-leading"), "-leading");
        assert_eq!(translate_query("a b"), "a b");
    }

    #[tokio::test]
    async fn test_prefix_query() {
        let pool = test_pool().await;
        seed(&pool).await;

        let hits = search_messages(&pool, "hel*", &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Hello world");
    }

    #[tokio::test]
    async fn test_snippet_highlights_match() {
        let pool = test_pool().await;
        seed(&pool).await;

        let hits = search_messages(&pool, "hello", &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("<mark>Hello</mark>"), "snippet: {}", hits[0].snippet);
    }

    #[tokio::test]
    async fn test_snippet_escapes_html_content() {
        let pool = test_pool().await;
        let sid = make_session(&pool, SessionType::Chat).await;
        append_message(&pool, &sid, Role::User, "look at <script> injection")
            .await
            .unwrap();

        let hits = search_messages(&pool, "injection", &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("&lt;script&gt;"));
        assert!(hits[0].snippet.contains("<mark>injection</mark>"));
    }

    #[tokio::test]
    async fn test_session_filters() {
        let pool = test_pool().await;
        let chat = seed(&pool).await;
        let code = make_session(&pool, SessionType::Code).await;
        append_message(&pool, &code, Role::User, "world of code")
            .await
            .unwrap();

        let by_type = search_messages(
            &pool,
            "world",
            &SearchFilter {
                session_type: Some(SessionType::Code),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].session_id, code);

        let by_session = search_messages(
            &pool,
            "world",
            &SearchFilter {
                session_id: Some(chat.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_session.len(), 2);
        assert!(by_session.iter().all(|h| h.session_id == chat));
    }

    #[tokio::test]
    async fn test_limit_clamped_to_cap() {
        let pool = test_pool().await;
        seed(&pool).await;

        // A limit beyond the cap is accepted and clamped rather than rejected
        let hits = search_messages(
            &pool,
            "world",
            &SearchFilter {
                limit: Some(100_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_offset_pages_results() {
        let pool = test_pool().await;
        seed(&pool).await;

        let page2 = search_messages(
            &pool,
            "world",
            &SearchFilter {
                limit: Some(1),
                offset: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_query_is_bad_query() {
        let pool = test_pool().await;
        seed(&pool).await;

        let err = search_messages(&pool, "\"unbalanced", &SearchFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BadQuery(_)), "got {err:?}");
    }
}
