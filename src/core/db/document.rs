use std::cmp::Ordering;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::db::error::{StoreError, StoreResult};

/// Point in time as stored in documents: `{"seconds": .., "nanoseconds": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(OffsetDateTime::now_utc())
    }

    pub fn from_datetime(datetime: OffsetDateTime) -> Self {
        Self {
            seconds: datetime.unix_timestamp(),
            nanoseconds: datetime.nanosecond(),
        }
    }

    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        let nanos = i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanoseconds);
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }

    /// The smallest timestamp strictly after `self`.
    pub fn successor(self) -> Self {
        if self.nanoseconds >= 999_999_999 {
            Self {
                seconds: self.seconds + 1,
                nanoseconds: 0,
            }
        } else {
            Self {
                seconds: self.seconds,
                nanoseconds: self.nanoseconds + 1,
            }
        }
    }

    /// Next server timestamp given the last one handed out; never goes backwards.
    pub(crate) fn next_server_time(last: Option<Timestamp>) -> Self {
        let now = Self::now();
        match last {
            Some(last) if now <= last => last.successor(),
            _ => now,
        }
    }

    pub fn to_value(self) -> Value {
        json!({ "seconds": self.seconds, "nanoseconds": self.nanoseconds })
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.len() != 2 {
            return None;
        }
        let seconds = object.get("seconds")?.as_i64()?;
        let nanoseconds = object.get("nanoseconds")?.as_u64()?;
        Some(Self {
            seconds,
            nanoseconds: u32::try_from(nanoseconds).ok()?,
        })
    }
}

pub(crate) fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A stored document: backend-assigned id plus its field data.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Map the document into a local record, carrying its id in the `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// Field values for a create or update, with optional server timestamp sentinels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    fields: Map<String, Value>,
    server_timestamps: Vec<String>,
}

impl DocumentWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a record into a write. The `id` key never reaches the stored data.
    pub fn from_record<T: Serialize>(record: &T) -> StoreResult<Self> {
        match serde_json::to_value(record)? {
            Value::Object(mut fields) => {
                fields.remove("id");
                Ok(Self {
                    fields,
                    server_timestamps: Vec::new(),
                })
            }
            other => Err(StoreError::InvalidDocument(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        self.server_timestamps.retain(|f| f != &field);
        self.fields.insert(field, value.into());
        self
    }

    /// Resolve `field` to the store's clock when the write commits.
    pub fn with_server_timestamp(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.remove(&field);
        if !self.server_timestamps.contains(&field) {
            self.server_timestamps.push(field);
        }
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub(crate) fn resolve(self, now: Timestamp) -> Map<String, Value> {
        let mut fields = self.fields;
        for field in self.server_timestamps {
            fields.insert(field, now.to_value());
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Collection,
    Document(String),
}

/// A read over one collection, or one document of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    collection: String,
    target: Target,
    order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            target: Target::Collection,
            order_by: None,
        }
    }

    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            target: Target::Document(id.into()),
            order_by: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Filter and sort candidate documents of this query's collection.
    ///
    /// Ordering by a field drops documents that lack it. Ties, and unordered
    /// queries, fall back to document id.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|doc| match &self.target {
                Target::Collection => true,
                Target::Document(id) => &doc.id == id,
            })
            .filter(|doc| match &self.order_by {
                Some((field, _)) => doc.data.contains_key(field),
                None => true,
            })
            .collect();

        match &self.order_by {
            Some((field, direction)) => matched.sort_by(|a, b| {
                let ordering = compare_values(&a.data[field], &b.data[field]);
                let ordering = match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                ordering.then_with(|| a.id.cmp(&b.id))
            }),
            None => matched.sort_by(|a, b| a.id.cmp(&b.id)),
        }
        matched
    }
}

/// Full result set of a live query at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

impl Snapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::Object(_) if Timestamp::from_value(value).is_some() => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| compare_values(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Value::Object(_), Value::Object(_)) => {
            match (Timestamp::from_value(a), Timestamp::from_value(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            }
        }
        _ => Ordering::Equal,
    }
}
