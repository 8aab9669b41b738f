use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::capabilities::ApiConfig;
use crate::listing::ListingState;
use crate::search::{FilterCriteria, FilterSelection};
use crate::{Alert, FilterError};

pub const NO_CATEGORY: &str = "No Category";
pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/150";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ActivityId(pub i64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    #[serde(default)]
    pub category_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Server-owned activity record. Read-only on the client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub activity_id: ActivityId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// ISO-8601, as sent by the server.
    #[serde(default)]
    pub date_time: String,
    /// `None` means unlimited.
    #[serde(default, deserialize_with = "participant_limit")]
    pub participant_limit: Option<u32>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub image: Option<ImageRef>,

    // Older payloads flatten these next to the nested records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Activity {
    #[must_use]
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            activity_id: ActivityId(id),
            title: title.into(),
            description: String::new(),
            location: String::new(),
            date_time: String::new(),
            participant_limit: None,
            category: None,
            image: None,
            category_name: None,
            image_url: None,
        }
    }

    #[must_use]
    pub fn category_label(&self) -> &str {
        self.category
            .as_ref()
            .and_then(|c| c.category_name.as_deref())
            .or(self.category_name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(NO_CATEGORY)
    }

    #[must_use]
    pub fn image_url_or_placeholder(&self) -> &str {
        self.image
            .as_ref()
            .and_then(|i| i.image_url.as_deref())
            .or(self.image_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(PLACEHOLDER_IMAGE_URL)
    }

    #[must_use]
    pub fn participant_label(&self) -> String {
        match self.participant_limit {
            Some(limit) => format!("{limit} Slots"),
            None => "Unlimited Slots".into(),
        }
    }

    /// Materializes the read-time defaults into the nested records.
    #[must_use]
    pub fn with_display_defaults(mut self) -> Self {
        let category = self.category_label().to_string();
        let image = self.image_url_or_placeholder().to_string();
        self.category = Some(CategoryRef {
            category_name: Some(category),
        });
        self.image = Some(ImageRef {
            image_url: Some(image),
        });
        self
    }

    /// `needle` must already be lowercased.
    #[must_use]
    pub fn title_contains(&self, needle: &str) -> bool {
        needle.is_empty() || self.title.to_lowercase().contains(needle)
    }
}

fn participant_limit<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid participantLimit '{s}'"))),
    }
}

/// `{ "data": ... }` wrapper used by every endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum CategoryEntry {
    Name(String),
    Record {
        #[serde(rename = "categoryName")]
        category_name: String,
    },
}

impl CategoryEntry {
    #[must_use]
    pub fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Record { category_name: name } => name,
        }
    }
}

/// Filter panel visibility. Transitions only happen between neighbours, so
/// a toggle that lands mid-animation is dropped instead of desyncing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterPanel {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

impl FilterPanel {
    #[must_use]
    pub const fn toggle(self) -> Option<Self> {
        match self {
            Self::Closed => Some(Self::Opening),
            Self::Open => Some(Self::Closing),
            Self::Opening | Self::Closing => None,
        }
    }

    #[must_use]
    pub const fn animation_finished(self) -> Self {
        match self {
            Self::Opening => Self::Open,
            Self::Closing => Self::Closed,
            settled => settled,
        }
    }

    #[must_use]
    pub const fn close(self) -> Self {
        match self {
            Self::Open => Self::Closing,
            other => other,
        }
    }

    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(self, Self::Closed)
    }

    #[must_use]
    pub const fn is_animating(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryCatalog {
    #[default]
    NotLoaded,
    Loading,
    Loaded(Vec<String>),
    Failed,
}

impl CategoryCatalog {
    #[must_use]
    pub fn needs_fetch(&self) -> bool {
        matches!(self, Self::NotLoaded | Self::Failed)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Loaded(names) => names,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterForm {
    pub selected_category: Option<String>,
    pub selected_date: Option<NaiveDate>,
    /// Formatted by the platform picker, e.g. "2:30 PM".
    pub selected_time: Option<String>,
    pub is_category_dropdown_open: bool,
    pub is_date_picker_open: bool,
}

impl FilterForm {
    pub fn criteria(&self) -> Result<FilterCriteria, FilterError> {
        FilterSelection {
            category_name: self.selected_category.clone(),
            date: self.selected_date,
            time: self.selected_time.clone(),
        }
        .validate()
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: ApiConfig,
    pub listing: ListingState,
    pub filter_panel: FilterPanel,
    pub filter_form: FilterForm,
    pub categories: CategoryCatalog,
    pub selected_activity: Option<ActivityId>,
    pub alert: Option<Alert>,
}

impl Model {
    /// Drops everything screen-scoped. Config survives and the listing keeps
    /// its generation counters so responses from before the reset are ignored.
    pub fn reset_screen(&mut self) {
        self.listing.discard();
        self.filter_panel = FilterPanel::Closed;
        self.filter_form = FilterForm::default();
        self.categories = CategoryCatalog::NotLoaded;
        self.selected_activity = None;
        self.alert = None;
    }

    pub fn set_alert(&mut self, alert: Alert) {
        self.alert = Some(alert);
    }

    pub fn clear_alert(&mut self) {
        self.alert = None;
    }

    #[must_use]
    pub fn selected_activity(&self) -> Option<&Activity> {
        let id = self.selected_activity?;
        self.listing
            .visible()
            .iter()
            .chain(self.listing.all_fetched())
            .find(|a| a.activity_id == id)
    }
}
