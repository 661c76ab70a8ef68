//! View definitions: a template plus where its output goes.

use serde_json::Value;
use std::fmt;

use super::{
    key_attribute, sort_key_attribute, sort_key_value, type_name, AttributeMap, KeyType, Record,
    FEED_ID,
};
use crate::errors::ConfigError;

const VIEW_ID: &str = "viewId";
const TEMPLATE: &str = "template";
const FILENAME_TEMPLATE: &str = "filenameTemplate";
const RENDER_EACH: &str = "renderEach";
const BUCKET: &str = "bucket";
const KEY: &str = "key";

/// Identity of a view: `(feedId, viewId)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewKey {
    /// Partition key.
    pub feed_id: String,
    /// Sort key within the feed.
    pub view_id: String,
    /// Stored type of the sort key.
    pub id_type: KeyType,
}

impl ViewKey {
    /// Creates a new view key.
    #[must_use]
    pub fn new(feed_id: impl Into<String>, view_id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            view_id: view_id.into(),
            id_type: KeyType::String,
        }
    }

    /// Sets the stored type of the sort key.
    #[must_use]
    pub fn with_id_type(mut self, id_type: KeyType) -> Self {
        self.id_type = id_type;
        self
    }

    /// Reads the key from stored attributes.
    pub fn from_attributes(attributes: &AttributeMap) -> Result<Self, String> {
        let feed_id = key_attribute(attributes, FEED_ID)?;
        let (view_id, id_type) = sort_key_attribute(attributes, VIEW_ID)?;
        Ok(Self {
            feed_id,
            view_id,
            id_type,
        })
    }

    /// Returns the key in store form.
    #[must_use]
    pub fn to_attributes(&self) -> AttributeMap {
        let mut map = AttributeMap::new();
        map.insert(FEED_ID.to_string(), Value::String(self.feed_id.clone()));
        map.insert(VIEW_ID.to_string(), sort_key_value(&self.view_id, self.id_type));
        map
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.feed_id, self.view_id)
    }
}

/// A pre-rendered view definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRecord {
    /// The view identity.
    pub key: ViewKey,
    /// Content template.
    pub template: String,
    /// Artifact name template; the configured default name applies when unset.
    pub filename_template: Option<String>,
    /// Render one artifact per episode instead of one per view.
    pub render_each: bool,
    /// Destination bucket.
    pub bucket: Option<String>,
    /// Explicit object key, used when removing the view's artifact.
    pub object_key: Option<String>,
    /// Remaining attributes, passed through to templates.
    pub fields: AttributeMap,
}

impl ViewRecord {
    /// Creates a view with only the required attributes set.
    #[must_use]
    pub fn new(key: ViewKey, template: impl Into<String>) -> Self {
        Self {
            key,
            template: template.into(),
            filename_template: None,
            render_each: false,
            bucket: None,
            object_key: None,
            fields: AttributeMap::new(),
        }
    }

    /// Sets the filename template.
    #[must_use]
    pub fn with_filename_template(mut self, template: impl Into<String>) -> Self {
        self.filename_template = Some(template.into());
        self
    }

    /// Switches the view to per-item rendering.
    #[must_use]
    pub fn with_render_each(mut self, render_each: bool) -> Self {
        self.render_each = render_each;
        self
    }

    /// Sets the destination bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the explicit object key.
    #[must_use]
    pub fn with_object_key(mut self, key: impl Into<String>) -> Self {
        self.object_key = Some(key.into());
        self
    }

    /// Adds a pass-through template field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Returns the view in store form, which is also its template context.
    #[must_use]
    pub fn to_attributes(&self) -> AttributeMap {
        let mut map = self.fields.clone();
        map.extend(self.key.to_attributes());
        map.insert(TEMPLATE.to_string(), Value::String(self.template.clone()));
        if let Some(ref v) = self.filename_template {
            map.insert(FILENAME_TEMPLATE.to_string(), Value::String(v.clone()));
        }
        map.insert(RENDER_EACH.to_string(), Value::Bool(self.render_each));
        if let Some(ref v) = self.bucket {
            map.insert(BUCKET.to_string(), Value::String(v.clone()));
        }
        if let Some(ref v) = self.object_key {
            map.insert(KEY.to_string(), Value::String(v.clone()));
        }
        map
    }

    /// Returns the view as a template context value.
    #[must_use]
    pub fn to_context(&self) -> Value {
        Value::Object(self.to_attributes())
    }
}

fn take_string(
    attributes: &mut AttributeMap,
    name: &str,
) -> Result<Option<String>, ConfigError> {
    match attributes.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ConfigError::invalid_record(
            ViewRecord::ENTITY,
            format!("attribute '{name}' must be a string, got {}", type_name(&other)),
        )),
    }
}

impl Record for ViewRecord {
    const ENTITY: &'static str = "view";

    fn from_attributes(mut attributes: AttributeMap) -> Result<Self, ConfigError> {
        let key = ViewKey::from_attributes(&attributes)
            .map_err(|reason| ConfigError::invalid_record(Self::ENTITY, reason))?;
        attributes.remove(FEED_ID);
        attributes.remove(VIEW_ID);

        let template = take_string(&mut attributes, TEMPLATE)?.ok_or_else(|| {
            ConfigError::invalid_record(Self::ENTITY, format!("view {key} has no template"))
        })?;
        let filename_template = take_string(&mut attributes, FILENAME_TEMPLATE)?;
        let bucket = take_string(&mut attributes, BUCKET)?.filter(|b| !b.is_empty());
        let object_key = take_string(&mut attributes, KEY)?.filter(|k| !k.is_empty());
        let render_each = match attributes.remove(RENDER_EACH) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(other) => {
                return Err(ConfigError::invalid_record(
                    Self::ENTITY,
                    format!("attribute '{RENDER_EACH}' must be a bool, got {}", type_name(&other)),
                ))
            }
        };

        Ok(Self {
            key,
            template,
            filename_template,
            render_each,
            bucket,
            object_key,
            fields: attributes,
        })
    }
}
