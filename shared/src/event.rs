use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::capabilities::TransportError;
use crate::listing::{FilterTicket, PageTicket};
use crate::model::{Activity, ActivityId};
use crate::search::FilterCriteria;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub enum Event {
    #[default]
    Noop,

    ScreenMounted,
    ScreenUnmounted,
    ApiConfigured {
        base_url: String,
    },

    RefreshRequested,
    LoadMoreRequested,
    ScrollMomentumEnded {
        layout_height: f64,
        offset_y: f64,
        content_height: f64,
    },
    SearchChanged {
        query: String,
    },

    FilterPanelToggled,
    FilterPanelAnimationFinished,
    CategoryDropdownToggled,
    CategorySelected {
        name: String,
    },
    DatePickerOpened,
    DatePickerDismissed,
    DateTimePicked {
        date: NaiveDate,
        time: Option<String>,
    },
    FilterApplyRequested,

    ActivitySelected {
        activity_id: ActivityId,
    },
    DetailDismissed,
    AlertDismissed,

    // Responses. The shell never sends these directly.
    #[serde(skip)]
    PageLoaded {
        ticket: PageTicket,
        result: Result<Vec<Activity>, TransportError>,
    },
    #[serde(skip)]
    CategoriesLoaded {
        result: Result<Vec<String>, TransportError>,
    },
    #[serde(skip)]
    FilterResponse {
        ticket: FilterTicket,
        criteria: FilterCriteria,
        result: Result<Vec<Activity>, TransportError>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::ScreenMounted => "screen_mounted",
            Self::ScreenUnmounted => "screen_unmounted",
            Self::ApiConfigured { .. } => "api_configured",
            Self::RefreshRequested => "refresh_requested",
            Self::LoadMoreRequested => "load_more_requested",
            Self::ScrollMomentumEnded { .. } => "scroll_momentum_ended",
            Self::SearchChanged { .. } => "search_changed",
            Self::FilterPanelToggled => "filter_panel_toggled",
            Self::FilterPanelAnimationFinished => "filter_panel_animation_finished",
            Self::CategoryDropdownToggled => "category_dropdown_toggled",
            Self::CategorySelected { .. } => "category_selected",
            Self::DatePickerOpened => "date_picker_opened",
            Self::DatePickerDismissed => "date_picker_dismissed",
            Self::DateTimePicked { .. } => "date_time_picked",
            Self::FilterApplyRequested => "filter_apply_requested",
            Self::ActivitySelected { .. } => "activity_selected",
            Self::DetailDismissed => "detail_dismissed",
            Self::AlertDismissed => "alert_dismissed",
            Self::PageLoaded { .. } => "page_loaded",
            Self::CategoriesLoaded { .. } => "categories_loaded",
            Self::FilterResponse { .. } => "filter_response",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::RefreshRequested
                | Self::LoadMoreRequested
                | Self::ScrollMomentumEnded { .. }
                | Self::SearchChanged { .. }
                | Self::FilterPanelToggled
                | Self::CategoryDropdownToggled
                | Self::CategorySelected { .. }
                | Self::DatePickerOpened
                | Self::DatePickerDismissed
                | Self::DateTimePicked { .. }
                | Self::FilterApplyRequested
                | Self::ActivitySelected { .. }
                | Self::DetailDismissed
                | Self::AlertDismissed
        )
    }
}
