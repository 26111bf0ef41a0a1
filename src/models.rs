//! Entity records and their stores.
//!
//! Three record types share the generic collection machinery: applications,
//! demands, and articles. Each gets a constructor wiring its storage key and
//! validation; applications additionally reset their counters on insert and
//! carry the ranking operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::KvBackend;
use crate::collection::{CollectionStore, Record, RecordMeta};
use crate::config::{keys, DESCRIPTION_MAX, NAME_MAX};
use crate::error::{StoreError, StoreResult};
use crate::validate::{finish, max_len, require};

/// Application category. Unknown stored values decode as [`AppKind::Other`],
/// so old data with retired categories keeps loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    Tool,
    Game,
    Utility,
    #[default]
    #[serde(other)]
    Other,
}

impl AppKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppKind::Tool => "tool",
            AppKind::Game => "game",
            AppKind::Utility => "utility",
            AppKind::Other => "other",
        }
    }
}

/// A published micro-application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: AppKind,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-text source the application runs from.
    #[serde(default)]
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Page-visit counter, reset to zero on insert.
    #[serde(default)]
    pub views: u64,
    /// Legacy counter kept for stored-data compatibility; live like state is
    /// tracked by the interaction store.
    #[serde(default)]
    pub likes: u64,
}

impl App {
    /// New unstamped application; the store assigns identity on add.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: AppKind,
    ) -> Self {
        Self {
            meta: RecordMeta::default(),
            name: name.into(),
            description: description.into(),
            kind,
            tags: Vec::new(),
            code: String::new(),
            author_id: None,
            author_name: None,
            views: 0,
            likes: 0,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_author(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.author_id = Some(id.into());
        self.author_name = Some(name.into());
        self
    }
}

impl Record for App {
    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
    fn keyword_fields(&self) -> Vec<&str> {
        vec![&self.name, &self.description]
    }
    fn kind_label(&self) -> Option<&str> {
        Some(self.kind.as_str())
    }
    fn author_id(&self) -> Option<&str> {
        self.author_id.as_deref()
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// A request for an application someone wants built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demand {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl Demand {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            title: title.into(),
            description: description.into(),
            tags: Vec::new(),
            author_id: None,
            author_name: None,
        }
    }
}

impl Record for Demand {
    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
    fn keyword_fields(&self) -> Vec<&str> {
        vec![&self.title, &self.description]
    }
    fn author_id(&self) -> Option<&str> {
        self.author_id.as_deref()
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// A long-form article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            author_id: None,
            author_name: None,
        }
    }
}

impl Record for Article {
    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
    fn keyword_fields(&self) -> Vec<&str> {
        vec![&self.title, &self.content]
    }
    fn author_id(&self) -> Option<&str> {
        self.author_id.as_deref()
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Application input rules. Aggregates every violation; the kind field is an
/// enum and needs no presence rule.
pub fn validate_app(app: &App) -> Result<(), StoreError> {
    let mut errors = Vec::new();
    require(&mut errors, &app.name, "name is required");
    max_len(
        &mut errors,
        &app.name,
        NAME_MAX,
        &format!("name must be at most {NAME_MAX} characters"),
    );
    require(&mut errors, &app.description, "description is required");
    max_len(
        &mut errors,
        &app.description,
        DESCRIPTION_MAX,
        &format!("description must be at most {DESCRIPTION_MAX} characters"),
    );
    finish(errors)
}

/// Demand input rules.
pub fn validate_demand(demand: &Demand) -> Result<(), StoreError> {
    let mut errors = Vec::new();
    require(&mut errors, &demand.title, "title is required");
    require(&mut errors, &demand.description, "description is required");
    finish(errors)
}

/// Article input rules.
pub fn validate_article(article: &Article) -> Result<(), StoreError> {
    let mut errors = Vec::new();
    require(&mut errors, &article.title, "title is required");
    require(&mut errors, &article.content, "content is required");
    finish(errors)
}

/// Counters always start at zero, whatever the caller supplied.
fn reset_counters(app: &mut App) {
    app.views = 0;
    app.likes = 0;
}

/// Store for published applications.
pub fn app_store(backend: Arc<dyn KvBackend>) -> CollectionStore<App> {
    CollectionStore::new(backend, keys::APPS)
        .with_validator(validate_app)
        .with_prepare(reset_counters)
}

/// Store for demands.
pub fn demand_store(backend: Arc<dyn KvBackend>) -> CollectionStore<Demand> {
    CollectionStore::new(backend, keys::DEMANDS).with_validator(validate_demand)
}

/// Store for articles.
pub fn article_store(backend: Arc<dyn KvBackend>) -> CollectionStore<Article> {
    CollectionStore::new(backend, keys::ARTICLES).with_validator(validate_article)
}

impl CollectionStore<App> {
    /// Adds one page visit to the application's counter. `None` if the
    /// application no longer exists.
    pub fn increment_view(&self, id: &str) -> StoreResult<Option<App>> {
        self.update(id, |app| app.views += 1)
    }

    /// Most viewed applications, at most `limit`. Ties keep stored order.
    pub fn hot_apps(&self, limit: usize) -> Vec<App> {
        let mut apps = self.get_all().data;
        apps.sort_by(|a, b| b.views.cmp(&a.views));
        apps.truncate(limit);
        apps
    }

    /// Most recently created applications, at most `limit`.
    pub fn recent_apps(&self, limit: usize) -> Vec<App> {
        let mut apps = self.get_all().data;
        apps.sort_by(|a, b| b.meta.created_at.cmp(&a.meta.created_at));
        apps.truncate(limit);
        apps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::collection::SearchCriteria;

    fn apps() -> CollectionStore<App> {
        let store = app_store(Arc::new(MemoryBackend::new()));
        store.init().unwrap();
        store
    }

    #[test]
    fn app_wire_format_uses_camel_case_and_type() {
        let app = App::new("Todo", "Track your day", AppKind::Tool)
            .with_tags(vec!["fast".into()])
            .with_code("<ul id=\"items\"></ul>");
        let json = serde_json::to_value(&app).unwrap();

        assert_eq!(json["type"], "tool");
        assert_eq!(json["name"], "Todo");
        assert_eq!(json["code"], "<ul id=\"items\"></ul>");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("authorId").is_none());

        let authored = App::new("Todo", "d", AppKind::Tool).with_author("u1", "ada");
        let json = serde_json::to_value(&authored).unwrap();
        assert_eq!(json["authorId"], "u1");
        assert_eq!(json["authorName"], "ada");
    }

    #[test]
    fn unknown_kind_decodes_as_other() {
        let raw = r#"{
            "id": "x", "createdAt": "c", "updatedAt": "u",
            "name": "N", "description": "D", "type": "widget"
        }"#;
        let app: App = serde_json::from_str(raw).unwrap();
        assert_eq!(app.kind, AppKind::Other);
        assert_eq!(app.views, 0);
        assert!(app.tags.is_empty());
    }

    #[test]
    fn validation_aggregates_all_violations() {
        let invalid = App::new("", "", AppKind::Tool);
        let err = validate_app(&invalid).unwrap_err();
        match err {
            StoreError::Validation(messages) => {
                assert_eq!(
                    messages,
                    vec!["name is required", "description is required"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }

        let long_name = "x".repeat(NAME_MAX + 1);
        let invalid = App::new(long_name, "fine", AppKind::Tool);
        let err = validate_app(&invalid).unwrap_err();
        match err {
            StoreError::Validation(messages) => {
                assert_eq!(messages, vec!["name must be at most 50 characters"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_app_is_never_written() {
        let store = apps();
        let err = store.add(App::new("", "x", AppKind::Tool)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.get_all().data.is_empty());
    }

    #[test]
    fn counters_reset_on_add() {
        let store = apps();
        let mut app = App::new("Clicker", "counts", AppKind::Game);
        app.views = 99;
        app.likes = 42;

        let stored = store.add(app).unwrap();
        assert_eq!(stored.views, 0);
        assert_eq!(stored.likes, 0);
    }

    #[test]
    fn increment_view_counts_up_and_handles_missing() {
        let store = apps();
        let stored = store.add(App::new("Todo", "d", AppKind::Tool)).unwrap();

        let after = store.increment_view(&stored.meta.id).unwrap().unwrap();
        assert_eq!(after.views, 1);
        let after = store.increment_view(&stored.meta.id).unwrap().unwrap();
        assert_eq!(after.views, 2);

        assert!(store.increment_view("nonexistent").unwrap().is_none());
    }

    #[test]
    fn hot_apps_rank_by_views_descending() {
        let store = apps();
        let a = store.add(App::new("five", "d", AppKind::Tool)).unwrap();
        let b = store.add(App::new("twenty", "d", AppKind::Tool)).unwrap();
        let c = store.add(App::new("one", "d", AppKind::Tool)).unwrap();

        for _ in 0..5 {
            store.increment_view(&a.meta.id).unwrap();
        }
        for _ in 0..20 {
            store.increment_view(&b.meta.id).unwrap();
        }
        store.increment_view(&c.meta.id).unwrap();

        let hot = store.hot_apps(2);
        assert_eq!(hot.len(), 2);
        assert_eq!(hot[0].name, "twenty");
        assert_eq!(hot[1].name, "five");
    }

    #[test]
    fn recent_apps_rank_by_creation_descending() {
        let store = apps();
        store.add(App::new("oldest", "d", AppKind::Tool)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.add(App::new("middle", "d", AppKind::Tool)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.add(App::new("newest", "d", AppKind::Tool)).unwrap();

        let recent = store.recent_apps(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].name, "newest");
        assert_eq!(recent[1].name, "middle");
    }

    #[test]
    fn search_filters_by_kind_and_keyword() {
        let store = apps();
        store
            .add(App::new("Todo", "task tracker", AppKind::Tool).with_tags(vec!["fast".into()]))
            .unwrap();
        store
            .add(App::new("Chess", "board game", AppKind::Game).with_tags(vec!["fun".into()]))
            .unwrap();

        let hits = store.search(&SearchCriteria {
            keyword: Some("to".into()),
            kind: Some("all".into()),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Todo");

        let hits = store.search(&SearchCriteria {
            keyword: Some("".into()),
            kind: Some("game".into()),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Chess");
    }

    #[test]
    fn search_filters_by_author() {
        let store = apps();
        store
            .add(App::new("Mine", "d", AppKind::Tool).with_author("u1", "ada"))
            .unwrap();
        store
            .add(App::new("Theirs", "d", AppKind::Tool).with_author("u2", "bob"))
            .unwrap();

        let hits = store.search(&SearchCriteria {
            author_id: Some("u1".into()),
            ..Default::default()
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Mine");
    }

    #[test]
    fn demand_and_article_validation() {
        let err = validate_demand(&Demand::new("", "need it")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(validate_demand(&Demand::new("t", "d")).is_ok());

        let err = validate_article(&Article::new("t", "")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(validate_article(&Article::new("t", "c")).is_ok());
    }
}
