// lib.rs - Activities & Events screen core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod event;
pub mod listing;
pub mod model;
pub mod search;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app::App;
pub use capabilities::{ApiConfig, Capabilities, Effect, TransportError};
pub use event::Event;
pub use model::{Activity, ActivityId, FilterPanel, Model};

use model::{CategoryCatalog, FilterForm};

/// Distance from the bottom edge, in points, at which a settled scroll
/// triggers the next page.
pub const LOAD_MORE_THRESHOLD_PX: f64 = 20.0;
pub const DISPLAY_DATE_FORMAT: &str = "%a, %d %b %Y, %-I:%M %p";
pub const DISPLAY_DAY_FORMAT: &str = "%a, %d %b %Y";
pub const SELECT_CATEGORY_PLACEHOLDER: &str = "Select Category";
pub const SELECT_DATE_PLACEHOLDER: &str = "Select Date & Time";

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterError {
    #[error("Category and Date must be selected")]
    MissingSelection,

    #[error("Selected time '{0}' could not be read")]
    InvalidTime(String),

    #[error("Failed to apply filter. Please try again.")]
    Backend(TransportError),

    #[error("No activities or events found for the selected filter")]
    NoResults,
}

impl FilterError {
    #[must_use]
    pub const fn alert_kind(&self) -> AlertKind {
        match self {
            Self::NoResults => AlertKind::Warning,
            Self::MissingSelection | Self::InvalidTime(_) | Self::Backend(_) => AlertKind::Error,
        }
    }

    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::NoResults => "No Results",
            _ => "Error",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertKind {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub kind: AlertKind,
}

impl From<&FilterError> for Alert {
    fn from(e: &FilterError) -> Self {
        Self {
            title: e.title().into(),
            message: e.to_string(),
            kind: e.alert_kind(),
        }
    }
}

#[must_use]
pub fn is_near_bottom(layout_height: f64, offset_y: f64, content_height: f64) -> bool {
    layout_height + offset_y >= content_height - LOAD_MORE_THRESHOLD_PX
}

fn parse_activity_instant(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.naive_local());
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").ok())
}

/// "2024-03-15T14:30:00" -> "Fri, 15 Mar 2024, 2:30 PM". Unparseable input is
/// shown as-is.
#[must_use]
pub fn format_activity_date(raw: &str) -> String {
    parse_activity_instant(raw).map_or_else(
        || raw.to_string(),
        |instant| instant.format(DISPLAY_DATE_FORMAT).to_string(),
    )
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityCard {
    pub id: ActivityId,
    pub title: String,
    pub category_label: String,
    pub image_url: String,
    pub date_label: String,
    pub location: String,
    pub participant_label: String,
}

impl From<&Activity> for ActivityCard {
    fn from(a: &Activity) -> Self {
        Self {
            id: a.activity_id,
            title: a.title.clone(),
            category_label: a.category_label().into(),
            image_url: a.image_url_or_placeholder().into(),
            date_label: format_activity_date(&a.date_time),
            location: a.location.clone(),
            participant_label: a.participant_label(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityDetail {
    pub id: ActivityId,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub date_label: String,
    pub participant_label: String,
    pub location: String,
}

impl From<&Activity> for ActivityDetail {
    fn from(a: &Activity) -> Self {
        Self {
            id: a.activity_id,
            title: a.title.clone(),
            description: a.description.clone(),
            image_url: a.image_url_or_placeholder().into(),
            date_label: format_activity_date(&a.date_time),
            participant_label: a.participant_label(),
            location: a.location.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterPanelView {
    pub phase: FilterPanel,
    pub is_visible: bool,
    /// Toggles are ignored while this is set.
    pub is_animating: bool,
    pub category_label: String,
    pub categories: Vec<String>,
    pub is_category_dropdown_open: bool,
    pub is_loading_categories: bool,
    pub date_time_label: String,
    pub is_date_picker_open: bool,
    pub is_server_filter_active: bool,
}

impl FilterPanelView {
    fn new(model: &Model) -> Self {
        let form = &model.filter_form;
        Self {
            phase: model.filter_panel,
            is_visible: model.filter_panel.is_visible(),
            is_animating: model.filter_panel.is_animating(),
            category_label: form
                .selected_category
                .clone()
                .unwrap_or_else(|| SELECT_CATEGORY_PLACEHOLDER.into()),
            categories: model.categories.names().to_vec(),
            is_category_dropdown_open: form.is_category_dropdown_open,
            is_loading_categories: matches!(model.categories, CategoryCatalog::Loading),
            date_time_label: Self::date_time_label(form),
            is_date_picker_open: form.is_date_picker_open,
            is_server_filter_active: model.listing.mode().is_server_filtered(),
        }
    }

    fn date_time_label(form: &FilterForm) -> String {
        let Some(date) = form.selected_date else {
            return SELECT_DATE_PLACEHOLDER.into();
        };
        match search::compose_instant(date, form.selected_time.as_deref()) {
            Ok(instant) => instant.format(DISPLAY_DATE_FORMAT).to_string(),
            Err(_) => date.format(DISPLAY_DAY_FORMAT).to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertView {
    pub title: String,
    pub message: String,
    pub kind: AlertKind,
}

impl From<&Alert> for AlertView {
    fn from(a: &Alert) -> Self {
        Self {
            title: a.title.clone(),
            message: a.message.clone(),
            kind: a.kind,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub is_loading_more: bool,
    pub has_more: bool,
    pub search_query: String,
    pub cards: Vec<ActivityCard>,
    pub detail: Option<ActivityDetail>,
    pub filter: FilterPanelView,
    pub alert: Option<AlertView>,
}

pub mod app {
    use super::*;
    use crate::capabilities::Capabilities;
    use crate::listing::{FilterOutcome, FilterTicket, PageOutcome, PageTicket};
    use crate::search::FilterCriteria;
    use tracing::{debug, info, warn};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn load_initial(model: &mut Model, caps: &Capabilities) {
            let ticket = model.listing.begin_initial();
            Self::request_page(model, caps, ticket);
        }

        fn refresh(model: &mut Model, caps: &Capabilities) {
            let ticket = model.listing.begin_refresh();
            Self::request_page(model, caps, ticket);
        }

        fn load_more(model: &mut Model, caps: &Capabilities) {
            match model.listing.begin_load_more() {
                Some(ticket) => Self::request_page(model, caps, ticket),
                None => debug!(
                    has_more = model.listing.has_more(),
                    loading_more = model.listing.is_loading_more(),
                    "load more skipped"
                ),
            }
        }

        fn request_page(model: &mut Model, caps: &Capabilities, ticket: PageTicket) {
            let size = model.config.page_size;
            let sent = caps.gateway(&model.config).fetch_activities_page(
                ticket.page,
                size,
                move |result| Event::PageLoaded { ticket, result },
            );

            if let Err(e) = sent {
                Self::handle_page(model, ticket, Err(e));
            }
        }

        fn handle_page(
            model: &mut Model,
            ticket: PageTicket,
            result: Result<Vec<Activity>, TransportError>,
        ) {
            match model.listing.complete_page(ticket, result) {
                PageOutcome::Applied { received } => debug!(
                    page = ticket.page,
                    received,
                    total = model.listing.all_fetched().len(),
                    "activities page applied"
                ),
                PageOutcome::Exhausted => debug!(page = ticket.page, "no more activities"),
                PageOutcome::Stale => debug!(
                    page = ticket.page,
                    generation = ticket.generation,
                    current = model.listing.generation(),
                    "discarding stale activities page"
                ),
                PageOutcome::Failed(error) => warn!(
                    page = ticket.page,
                    %error,
                    server_error = error.is_server_error(),
                    client_error = error.is_client_error(),
                    "failed to load activities"
                ),
            }
        }

        fn ensure_categories(model: &mut Model, caps: &Capabilities) {
            if !model.categories.needs_fetch() {
                return;
            }

            model.categories = CategoryCatalog::Loading;
            let sent = caps
                .gateway(&model.config)
                .fetch_all_category_names(|result| Event::CategoriesLoaded { result });

            if let Err(e) = sent {
                Self::handle_categories(model, Err(e));
            }
        }

        fn handle_categories(model: &mut Model, result: Result<Vec<String>, TransportError>) {
            match result {
                Ok(names) => {
                    debug!(count = names.len(), "categories loaded");
                    model.categories = CategoryCatalog::Loaded(names);
                }
                Err(error) => {
                    warn!(%error, "failed to fetch categories");
                    model.categories = CategoryCatalog::Failed;
                }
            }
        }

        fn apply_filter(model: &mut Model, caps: &Capabilities) {
            let criteria = match model.filter_form.criteria() {
                Ok(criteria) => criteria,
                Err(error) => {
                    debug!(%error, "filter rejected");
                    model.set_alert(Alert::from(&error));
                    return;
                }
            };

            let ticket = model.listing.begin_server_filter();
            let iso_instant = criteria.iso_instant();
            let pending = criteria.clone();
            let sent = caps.gateway(&model.config).fetch_filtered_activities(
                &criteria.category_name,
                &iso_instant,
                move |result| Event::FilterResponse {
                    ticket,
                    criteria: pending,
                    result,
                },
            );

            if let Err(e) = sent {
                Self::handle_filter_response(model, ticket, criteria, Err(e));
            }
        }

        fn handle_filter_response(
            model: &mut Model,
            ticket: FilterTicket,
            criteria: FilterCriteria,
            result: Result<Vec<Activity>, TransportError>,
        ) {
            let category = criteria.category_name.clone();
            match model.listing.complete_server_filter(ticket, criteria, result) {
                Ok(FilterOutcome::Applied { count }) => {
                    info!(%category, count, "server filter applied");
                    model.filter_form.is_category_dropdown_open = false;
                    model.filter_panel = model.filter_panel.close();
                }
                Ok(FilterOutcome::Stale) => {
                    debug!(token = ticket.token, "discarding stale filter response");
                }
                Err(error) => {
                    match &error {
                        FilterError::Backend(cause) => warn!(
                            %category,
                            error = %cause,
                            server_error = cause.is_server_error(),
                            client_error = cause.is_client_error(),
                            "failed to apply filter"
                        ),
                        other => info!(%category, outcome = %other, "filter not applied"),
                    }
                    model.set_alert(Alert::from(&error));
                }
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            if matches!(event, Event::Noop) {
                return;
            }
            tracing::trace!(
                event = event.name(),
                user_initiated = event.is_user_initiated(),
                "update"
            );

            match event {
                Event::Noop => {}

                Event::ScreenMounted => Self::load_initial(model, caps),

                Event::ScreenUnmounted => model.reset_screen(),

                Event::ApiConfigured { base_url } => match ApiConfig::with_base_url(base_url) {
                    Ok(config) => {
                        info!(base_url = %config.base_url, "activities api configured");
                        model.config.base_url = config.base_url;
                    }
                    Err(error) => warn!(%error, "ignoring invalid api base url"),
                },

                Event::RefreshRequested => Self::refresh(model, caps),

                Event::LoadMoreRequested => Self::load_more(model, caps),

                Event::ScrollMomentumEnded {
                    layout_height,
                    offset_y,
                    content_height,
                } => {
                    if is_near_bottom(layout_height, offset_y, content_height) {
                        Self::load_more(model, caps);
                    }
                }

                Event::SearchChanged { query } => model.listing.apply_text_search(&query),

                Event::FilterPanelToggled => match model.filter_panel.toggle() {
                    Some(FilterPanel::Opening) => {
                        model.filter_panel = FilterPanel::Opening;
                        Self::ensure_categories(model, caps);
                    }
                    Some(next) => {
                        model.filter_panel = next;
                        model.filter_form.is_category_dropdown_open = false;
                        model.filter_form.is_date_picker_open = false;
                    }
                    None => {
                        debug!(panel = ?model.filter_panel, "ignoring toggle while animating");
                    }
                },

                Event::FilterPanelAnimationFinished => {
                    model.filter_panel = model.filter_panel.animation_finished();
                }

                Event::CategoryDropdownToggled => {
                    let form = &mut model.filter_form;
                    form.is_category_dropdown_open = !form.is_category_dropdown_open;
                    if form.is_category_dropdown_open {
                        Self::ensure_categories(model, caps);
                    }
                }

                Event::CategorySelected { name } => {
                    model.filter_form.selected_category = Some(name);
                    model.filter_form.is_category_dropdown_open = false;
                }

                Event::DatePickerOpened => model.filter_form.is_date_picker_open = true,

                Event::DatePickerDismissed => model.filter_form.is_date_picker_open = false,

                Event::DateTimePicked { date, time } => {
                    let form = &mut model.filter_form;
                    form.selected_date = Some(date);
                    form.selected_time = time;
                    form.is_date_picker_open = false;
                }

                Event::FilterApplyRequested => Self::apply_filter(model, caps),

                Event::ActivitySelected { activity_id } => {
                    if model
                        .listing
                        .visible()
                        .iter()
                        .any(|a| a.activity_id == activity_id)
                    {
                        model.selected_activity = Some(activity_id);
                    } else {
                        debug!(%activity_id, "selected activity is not displayed");
                    }
                }

                Event::DetailDismissed => model.selected_activity = None,

                Event::AlertDismissed => model.clear_alert(),

                Event::PageLoaded { ticket, result } => Self::handle_page(model, ticket, result),

                Event::CategoriesLoaded { result } => Self::handle_categories(model, result),

                Event::FilterResponse {
                    ticket,
                    criteria,
                    result,
                } => Self::handle_filter_response(model, ticket, criteria, result),
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            let listing = &model.listing;

            ViewModel {
                is_loading: listing.is_loading_initial(),
                is_refreshing: listing.is_refreshing(),
                is_loading_more: listing.is_loading_more(),
                has_more: listing.has_more(),
                search_query: listing.search_query().to_string(),
                cards: listing.visible().iter().map(ActivityCard::from).collect(),
                detail: model.selected_activity().map(ActivityDetail::from),
                filter: FilterPanelView::new(model),
                alert: model.alert.as_ref().map(AlertView::from),
            }
        }
    }
}
