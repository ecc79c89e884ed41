//! Core catalog data model.
//!
//! Upstream providers are loose with types: ids arrive as JSON numbers or
//! strings, and every entry carries provider-specific keys we do not know
//! about. The types here keep a small typed core (ids, category names) and
//! carry everything else through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// The three content kinds served by an Xtream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Live,
    Vod,
    Series,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Live, ContentKind::Vod, ContentKind::Series];

    /// player_api.php action that lists streams of this kind.
    pub fn streams_action(self) -> &'static str {
        match self {
            ContentKind::Live => "get_live_streams",
            ContentKind::Vod => "get_vod_streams",
            ContentKind::Series => "get_series",
        }
    }

    /// player_api.php action that lists categories of this kind.
    pub fn categories_action(self) -> &'static str {
        match self {
            ContentKind::Live => "get_live_categories",
            ContentKind::Vod => "get_vod_categories",
            ContentKind::Series => "get_series_categories",
        }
    }

    /// Path segment used in playback URLs (`/live/u/p/id.ts` etc).
    pub fn path_segment(self) -> &'static str {
        match self {
            ContentKind::Live => "live",
            ContentKind::Vod => "movie",
            ContentKind::Series => "series",
        }
    }

    /// Key under which entries of this kind carry their id.
    pub fn id_key(self) -> &'static str {
        match self {
            ContentKind::Series => "series_id",
            _ => "stream_id",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContentKind::Live => "live",
            ContentKind::Vod => "vod",
            ContentKind::Series => "series",
        };
        f.write_str(label)
    }
}

/// An id that may arrive as a JSON number or a string.
///
/// Unlike a plain `i64`, this remembers which representation the provider
/// used so re-serialization emits the exact same JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlexId {
    Number(i64),
    String(String),
}

impl FlexId {
    /// Normalized key for lookups: `Number(7)`, `String("7")` and
    /// `String("007")` all compare equal. Providers are inconsistent about
    /// zero-padding and quoting ids, so string ids that parse as integers
    /// normalize to the canonical decimal form.
    pub fn key(&self) -> String {
        match self {
            FlexId::Number(n) => n.to_string(),
            FlexId::String(s) => {
                let trimmed = s.trim();
                match trimmed.parse::<i64>() {
                    Ok(n) => n.to_string(),
                    Err(_) => trimmed.to_string(),
                }
            }
        }
    }

    /// Extract an id from a raw JSON value, if it is a number or string.
    pub fn from_value(value: &Value) -> Option<FlexId> {
        match value {
            Value::Number(n) => n.as_i64().map(FlexId::Number),
            Value::String(s) => Some(FlexId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for FlexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlexId::Number(n) => write!(f, "{}", n),
            FlexId::String(s) => f.write_str(s),
        }
    }
}

impl Serialize for FlexId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlexId::Number(n) => serializer.serialize_i64(*n),
            FlexId::String(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for FlexId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::{self, Visitor};

        struct FlexIdVisitor;

        impl<'de> Visitor<'de> for FlexIdVisitor {
            type Value = FlexId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or a string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FlexId, E> {
                Ok(FlexId::Number(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FlexId, E> {
                Ok(FlexId::Number(v as i64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FlexId, E> {
                Ok(FlexId::String(v.to_string()))
            }
        }

        deserializer.deserialize_any(FlexIdVisitor)
    }
}

/// Upstream category. Unknown keys survive in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: FlexId,
    pub category_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single listing entry (live channel, movie, or series).
///
/// Kept fully opaque: the id key differs per kind (`stream_id` vs
/// `series_id`) and providers attach arbitrary additional fields, all of
/// which must be re-emitted byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamEntry(Map<String, Value>);

impl StreamEntry {
    /// Accept a raw row if it is an object carrying this kind's id.
    pub fn from_row(kind: ContentKind, row: Value) -> Option<StreamEntry> {
        match row {
            Value::Object(map) => {
                map.get(kind.id_key()).and_then(FlexId::from_value)?;
                Some(StreamEntry(map))
            }
            _ => None,
        }
    }

    /// Normalized id of this entry.
    pub fn id(&self, kind: ContentKind) -> Option<String> {
        self.0
            .get(kind.id_key())
            .and_then(FlexId::from_value)
            .map(|id| id.key())
    }

    /// Normalized category id, if the entry has one.
    pub fn category_id(&self) -> Option<String> {
        self.0
            .get("category_id")
            .and_then(FlexId::from_value)
            .map(|id| id.key())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Decode raw category rows, skipping anything that does not carry an id
/// and a name. Returns the decoded rows and how many were skipped.
pub fn decode_categories(rows: Vec<Value>) -> (Vec<Category>, usize) {
    let total = rows.len();
    let categories: Vec<Category> = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect();
    let skipped = total - categories.len();
    (categories, skipped)
}

/// Decode raw stream rows, skipping anything without this kind's id key.
pub fn decode_streams(kind: ContentKind, rows: Vec<Value>) -> (Vec<StreamEntry>, usize) {
    let total = rows.len();
    let streams: Vec<StreamEntry> = rows
        .into_iter()
        .filter_map(|row| StreamEntry::from_row(kind, row))
        .collect();
    let skipped = total - streams.len();
    (streams, skipped)
}

/// Filtered categories and streams for one content kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindCatalog {
    pub categories: Vec<Category>,
    pub streams: Vec<StreamEntry>,
}

/// A complete filtered catalog for all three kinds.
///
/// Immutable once published: the store replaces the whole snapshot, it
/// never edits one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub generated_at: DateTime<Utc>,
    pub live: KindCatalog,
    pub vod: KindCatalog,
    pub series: KindCatalog,
}

impl CacheSnapshot {
    /// Snapshot served before the first successful refresh.
    pub fn empty() -> CacheSnapshot {
        CacheSnapshot {
            generated_at: DateTime::<Utc>::UNIX_EPOCH,
            live: KindCatalog::default(),
            vod: KindCatalog::default(),
            series: KindCatalog::default(),
        }
    }

    pub fn kind(&self, kind: ContentKind) -> &KindCatalog {
        match kind {
            ContentKind::Live => &self.live,
            ContentKind::Vod => &self.vod,
            ContentKind::Series => &self.series,
        }
    }

    pub fn is_empty(&self) -> bool {
        ContentKind::ALL
            .iter()
            .all(|&k| self.kind(k).streams.is_empty() && self.kind(k).categories.is_empty())
    }
}

/// Where the refresh state machine currently rests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RefreshState {
    Idle,
    Running,
    Success,
    Error,
}

/// Snapshot of the refresh orchestrator, safe to poll at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub state: RefreshState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

impl Default for RefreshStatus {
    fn default() -> Self {
        RefreshStatus {
            state: RefreshState::Idle,
            message: "Ready".to_string(),
            last_run: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flex_id_keeps_wire_representation() {
        let n: FlexId = serde_json::from_str("42").unwrap();
        assert_eq!(serde_json::to_string(&n).unwrap(), "42");

        // A numeric string must stay a string on re-emit.
        let s: FlexId = serde_json::from_str(r#""42""#).unwrap();
        assert_eq!(serde_json::to_string(&s).unwrap(), r#""42""#);

        assert_eq!(n.key(), s.key());
    }

    #[test]
    fn key_compares_numeric_strings_like_numbers() {
        // Zero-padded string ids match the bare number.
        assert_eq!(
            FlexId::String("007".to_string()).key(),
            FlexId::Number(7).key()
        );
        assert_eq!(FlexId::String(" 42 ".to_string()).key(), "42");
        // Non-numeric ids keep their trimmed text.
        assert_eq!(FlexId::String("abc".to_string()).key(), "abc");
    }

    #[test]
    fn stream_entry_preserves_unknown_fields() {
        let row = json!({
            "stream_id": 10,
            "category_id": "1",
            "name": "Channel One",
            "tv_archive": 1,
            "custom_provider_key": {"nested": true}
        });
        let entry = StreamEntry::from_row(ContentKind::Live, row.clone()).unwrap();
        assert_eq!(entry.id(ContentKind::Live), Some("10".to_string()));
        assert_eq!(entry.category_id(), Some("1".to_string()));

        let round_tripped = serde_json::to_value(&entry).unwrap();
        assert_eq!(round_tripped, row);
    }

    #[test]
    fn series_rows_use_series_id() {
        let row = json!({"series_id": "55", "category_id": 3, "name": "Some Show"});
        let entry = StreamEntry::from_row(ContentKind::Series, row).unwrap();
        assert_eq!(entry.id(ContentKind::Series), Some("55".to_string()));
        assert_eq!(entry.category_id(), Some("3".to_string()));
    }

    #[test]
    fn decode_skips_malformed_rows() {
        let rows = vec![
            json!({"stream_id": 1, "category_id": "1"}),
            json!({"name": "no id here"}),
            json!("not even an object"),
        ];
        let (streams, skipped) = decode_streams(ContentKind::Live, rows);
        assert_eq!(streams.len(), 1);
        assert_eq!(skipped, 2);

        let cat_rows = vec![
            json!({"category_id": "1", "category_name": "UK News"}),
            json!({"category_name": "missing id"}),
        ];
        let (cats, skipped) = decode_categories(cat_rows);
        assert_eq!(cats.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn empty_snapshot_is_empty() {
        let snap = CacheSnapshot::empty();
        assert!(snap.is_empty());
        for kind in ContentKind::ALL {
            assert!(snap.kind(kind).streams.is_empty());
        }
    }

    #[test]
    fn status_state_serializes_uppercase() {
        let status = RefreshStatus::default();
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["state"], "IDLE");
        assert_eq!(v["message"], "Ready");
        assert!(v.get("last_run").is_none());
    }
}
