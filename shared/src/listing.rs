//! Listing state for one mounted screen: fetched pages, the page cursor and
//! the currently displayed subset.
//!
//! Every page or filter request is issued with a ticket bound to the current
//! generation. `begin_initial`/`begin_refresh` bump the generation, so a
//! response that raced a reset is discarded instead of being appended to a
//! collection it no longer belongs to.

use serde::{Deserialize, Serialize};

use crate::capabilities::TransportError;
use crate::model::Activity;
use crate::search::{filter_by_title, FilterCriteria};
use crate::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageKind {
    Initial,
    Refresh,
    More,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTicket {
    pub generation: u64,
    pub page: u32,
    pub kind: PageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTicket {
    pub generation: u64,
    pub token: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page replaced (initial/refresh) or extended the collection.
    Applied { received: usize },
    /// An empty page; nothing more to fetch.
    Exhausted,
    /// Superseded by a newer generation or out of order; ignored.
    Stale,
    Failed(TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Applied { count: usize },
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    Unfiltered,
    TextFiltered(String),
    ServerFiltered {
        criteria: FilterCriteria,
        results: Vec<Activity>,
    },
}

impl FilterMode {
    fn for_query(query: &str) -> Self {
        if query.is_empty() {
            Self::Unfiltered
        } else {
            Self::TextFiltered(query.to_string())
        }
    }

    #[must_use]
    pub fn is_server_filtered(&self) -> bool {
        matches!(self, Self::ServerFiltered { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ListingState {
    all_fetched: Vec<Activity>,
    visible: Vec<Activity>,
    mode: FilterMode,
    search_query: String,
    page_cursor: u32,
    has_more: bool,
    is_loading_initial: bool,
    is_loading_more: bool,
    is_refreshing: bool,
    generation: u64,
    filter_token: u64,
}

impl Default for ListingState {
    fn default() -> Self {
        Self {
            all_fetched: Vec::new(),
            visible: Vec::new(),
            mode: FilterMode::Unfiltered,
            search_query: String::new(),
            page_cursor: 0,
            has_more: true,
            is_loading_initial: false,
            is_loading_more: false,
            is_refreshing: false,
            generation: 0,
            filter_token: 0,
        }
    }
}

impl ListingState {
    #[must_use]
    pub fn all_fetched(&self) -> &[Activity] {
        &self.all_fetched
    }

    #[must_use]
    pub fn visible(&self) -> &[Activity] {
        &self.visible
    }

    #[must_use]
    pub fn mode(&self) -> &FilterMode {
        &self.mode
    }

    #[must_use]
    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Index of the last page applied.
    #[must_use]
    pub fn page_cursor(&self) -> u32 {
        self.page_cursor
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn is_loading_initial(&self) -> bool {
        self.is_loading_initial
    }

    #[must_use]
    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token of the most recent server-filter request.
    #[must_use]
    pub fn filter_token(&self) -> u64 {
        self.filter_token
    }

    pub fn begin_initial(&mut self) -> PageTicket {
        self.generation += 1;
        self.is_loading_initial = true;
        self.is_refreshing = false;
        self.is_loading_more = false;
        PageTicket {
            generation: self.generation,
            page: 0,
            kind: PageKind::Initial,
        }
    }

    pub fn begin_refresh(&mut self) -> PageTicket {
        self.generation += 1;
        self.page_cursor = 0;
        self.has_more = true;
        self.is_refreshing = true;
        self.is_loading_initial = false;
        self.is_loading_more = false;
        PageTicket {
            generation: self.generation,
            page: 0,
            kind: PageKind::Refresh,
        }
    }

    /// `None` when a request must not be issued: one is already in flight,
    /// the last page came back empty, or a server filter owns the display.
    pub fn begin_load_more(&mut self) -> Option<PageTicket> {
        if self.is_loading_more
            || !self.has_more
            || self.is_loading_initial
            || self.is_refreshing
            || self.mode.is_server_filtered()
        {
            return None;
        }

        self.is_loading_more = true;
        Some(PageTicket {
            generation: self.generation,
            page: self.page_cursor + 1,
            kind: PageKind::More,
        })
    }

    pub fn complete_page(
        &mut self,
        ticket: PageTicket,
        result: Result<Vec<Activity>, TransportError>,
    ) -> PageOutcome {
        if ticket.generation != self.generation {
            return PageOutcome::Stale;
        }
        if ticket.kind == PageKind::More && ticket.page != self.page_cursor + 1 {
            return PageOutcome::Stale;
        }

        match ticket.kind {
            PageKind::Initial => self.is_loading_initial = false,
            PageKind::Refresh => self.is_refreshing = false,
            PageKind::More => self.is_loading_more = false,
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => return PageOutcome::Failed(e),
        };

        match ticket.kind {
            PageKind::Initial | PageKind::Refresh => {
                self.page_cursor = 0;
                self.has_more = !page.is_empty();
                self.all_fetched = page;
                self.mode = FilterMode::for_query(&self.search_query);
                self.recompute_visible();
                if self.has_more {
                    PageOutcome::Applied {
                        received: self.all_fetched.len(),
                    }
                } else {
                    PageOutcome::Exhausted
                }
            }
            PageKind::More => {
                if page.is_empty() {
                    self.has_more = false;
                    return PageOutcome::Exhausted;
                }

                let received = page.len();
                match &self.mode {
                    FilterMode::TextFiltered(query) => {
                        self.visible.extend(filter_by_title(&page, query));
                    }
                    FilterMode::Unfiltered => self.visible.extend(page.iter().cloned()),
                    FilterMode::ServerFiltered { .. } => {}
                }
                self.all_fetched.extend(page);
                self.page_cursor += 1;
                self.has_more = true;
                PageOutcome::Applied { received }
            }
        }
    }

    /// Replaces any active filter, including a server filter, with a title
    /// search over everything fetched so far.
    pub fn apply_text_search(&mut self, query: &str) {
        query.clone_into(&mut self.search_query);
        self.mode = FilterMode::for_query(query);
        self.recompute_visible();
    }

    pub fn begin_server_filter(&mut self) -> FilterTicket {
        self.filter_token += 1;
        FilterTicket {
            generation: self.generation,
            token: self.filter_token,
        }
    }

    /// An empty result leaves the display untouched and reports
    /// `FilterError::NoResults`.
    pub fn complete_server_filter(
        &mut self,
        ticket: FilterTicket,
        criteria: FilterCriteria,
        result: Result<Vec<Activity>, TransportError>,
    ) -> Result<FilterOutcome, FilterError> {
        if ticket.generation != self.generation || ticket.token != self.filter_token {
            return Ok(FilterOutcome::Stale);
        }

        let results: Vec<Activity> = result
            .map_err(FilterError::Backend)?
            .into_iter()
            .map(Activity::with_display_defaults)
            .collect();

        if results.is_empty() {
            return Err(FilterError::NoResults);
        }

        let count = results.len();
        self.visible.clone_from(&results);
        self.mode = FilterMode::ServerFiltered { criteria, results };
        Ok(FilterOutcome::Applied { count })
    }

    /// Back to an empty listing. Generation counters keep increasing so any
    /// response still in flight is recognized as stale.
    pub fn discard(&mut self) {
        let generation = self.generation + 1;
        let filter_token = self.filter_token + 1;
        *self = Self {
            generation,
            filter_token,
            ..Self::default()
        };
    }

    fn recompute_visible(&mut self) {
        self.visible = match &self.mode {
            FilterMode::Unfiltered => self.all_fetched.clone(),
            FilterMode::TextFiltered(query) => filter_by_title(&self.all_fetched, query),
            FilterMode::ServerFiltered { results, .. } => results.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn page(start: i64, len: usize) -> Vec<Activity> {
        (0..len)
            .map(|i| Activity::new(start + i as i64, format!("Activity {}", start + i as i64)))
            .collect()
    }

    fn criteria() -> FilterCriteria {
        FilterCriteria {
            category_name: "Sports".into(),
            instant: NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
        }
    }

    fn loaded(first: Vec<Activity>) -> ListingState {
        let mut state = ListingState::default();
        let ticket = state.begin_initial();
        state.complete_page(ticket, Ok(first));
        state
    }

    fn transport_error() -> TransportError {
        TransportError::Request {
            message: "connection refused".into(),
        }
    }

    #[test]
    fn test_initial_load_populates_both_lists() {
        let mut state = ListingState::default();
        let ticket = state.begin_initial();
        assert!(state.is_loading_initial());
        assert_eq!(ticket.page, 0);

        let outcome = state.complete_page(ticket, Ok(page(0, 10)));
        assert_eq!(outcome, PageOutcome::Applied { received: 10 });
        assert!(!state.is_loading_initial());
        assert_eq!(state.all_fetched().len(), 10);
        assert_eq!(state.visible(), state.all_fetched());
        assert!(state.has_more());
        assert_eq!(state.page_cursor(), 0);
    }

    #[test]
    fn test_initial_failure_keeps_prior_state() {
        let mut state = loaded(page(0, 3));
        let ticket = state.begin_initial();
        let outcome = state.complete_page(ticket, Err(transport_error()));

        assert!(matches!(outcome, PageOutcome::Failed(_)));
        assert!(!state.is_loading_initial());
        assert_eq!(state.all_fetched().len(), 3);
    }

    #[test]
    fn test_pagination_scenario_ten_three_zero() {
        let mut state = loaded(page(0, 10));

        let second = state.begin_load_more().unwrap();
        assert_eq!(second.page, 1);
        assert_eq!(
            state.complete_page(second, Ok(page(10, 3))),
            PageOutcome::Applied { received: 3 }
        );
        assert_eq!(state.page_cursor(), 1);

        let third = state.begin_load_more().unwrap();
        assert_eq!(third.page, 2);
        assert_eq!(state.complete_page(third, Ok(vec![])), PageOutcome::Exhausted);

        assert_eq!(state.all_fetched().len(), 13);
        assert!(!state.has_more());
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn test_load_more_guarded_while_in_flight() {
        let mut state = loaded(page(0, 10));
        assert!(state.begin_load_more().is_some());
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn test_load_more_guarded_during_initial_load() {
        let mut state = ListingState::default();
        state.begin_initial();
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn test_failed_load_more_can_be_retried_for_same_page() {
        let mut state = loaded(page(0, 10));
        let ticket = state.begin_load_more().unwrap();
        assert!(matches!(
            state.complete_page(ticket, Err(transport_error())),
            PageOutcome::Failed(_)
        ));
        assert!(!state.is_loading_more());
        assert_eq!(state.page_cursor(), 0);

        let retry = state.begin_load_more().unwrap();
        assert_eq!(retry.page, 1);
    }

    #[test]
    fn test_refresh_discards_in_flight_load_more() {
        let mut state = loaded(page(0, 10));
        let stale = state.begin_load_more().unwrap();

        let refresh = state.begin_refresh();
        assert!(state.is_refreshing());
        assert!(!state.is_loading_more());

        assert_eq!(state.complete_page(stale, Ok(page(10, 10))), PageOutcome::Stale);
        assert_eq!(state.all_fetched().len(), 10);

        assert_eq!(
            state.complete_page(refresh, Ok(page(100, 4))),
            PageOutcome::Applied { received: 4 }
        );
        assert!(!state.is_refreshing());
        assert_eq!(state.all_fetched()[0].activity_id.0, 100);
        assert_eq!(state.page_cursor(), 0);
    }

    #[test]
    fn test_refresh_during_initial_load_supersedes_it() {
        let mut state = ListingState::default();
        let initial = state.begin_initial();
        let refresh = state.begin_refresh();
        assert!(!state.is_loading_initial());
        assert!(state.is_refreshing());

        state.complete_page(refresh, Ok(page(0, 10)));
        assert_eq!(state.complete_page(initial, Ok(page(50, 10))), PageOutcome::Stale);

        assert!(!state.is_loading_initial());
        assert!(!state.is_refreshing());
        assert_eq!(state.all_fetched()[0].activity_id.0, 0);
        assert!(state.begin_load_more().is_some());
    }

    #[test]
    fn test_initial_load_during_refresh_supersedes_it() {
        let mut state = loaded(page(0, 3));
        let refresh = state.begin_refresh();
        let initial = state.begin_initial();
        assert!(!state.is_refreshing());

        assert_eq!(state.complete_page(refresh, Ok(page(20, 5))), PageOutcome::Stale);
        state.complete_page(initial, Ok(page(0, 4)));

        assert!(!state.is_refreshing());
        assert!(!state.is_loading_initial());
        assert_eq!(state.all_fetched().len(), 4);
    }

    #[test]
    fn test_refresh_resets_has_more() {
        let mut state = loaded(vec![]);
        assert!(!state.has_more());

        let ticket = state.begin_refresh();
        assert!(state.has_more());
        state.complete_page(ticket, Ok(page(0, 2)));
        assert!(state.has_more());
    }

    #[test]
    fn test_superseded_refresh_is_stale() {
        let mut state = loaded(page(0, 2));
        let first = state.begin_refresh();
        let second = state.begin_refresh();

        state.complete_page(second, Ok(page(50, 1)));
        assert_eq!(state.complete_page(first, Ok(page(0, 9))), PageOutcome::Stale);
        assert_eq!(state.all_fetched().len(), 1);
    }

    #[test]
    fn test_out_of_order_page_is_stale() {
        let mut state = loaded(page(0, 10));
        let forged = PageTicket {
            generation: state.generation(),
            page: 5,
            kind: PageKind::More,
        };
        assert_eq!(state.complete_page(forged, Ok(page(50, 10))), PageOutcome::Stale);
        assert_eq!(state.all_fetched().len(), 10);
    }

    #[test]
    fn test_text_search_and_reset() {
        let mut state = loaded(vec![
            Activity::new(1, "Morning Run"),
            Activity::new(2, "Chess Night"),
            Activity::new(3, "Trail running"),
        ]);

        state.apply_text_search("RUN");
        let ids: Vec<i64> = state.visible().iter().map(|a| a.activity_id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(state.mode(), &FilterMode::TextFiltered("RUN".into()));

        state.apply_text_search("");
        assert_eq!(state.visible(), state.all_fetched());
        assert_eq!(state.mode(), &FilterMode::Unfiltered);
    }

    #[test]
    fn test_load_more_respects_active_text_search() {
        let mut state = loaded(vec![Activity::new(1, "Morning Run"), Activity::new(2, "Chess")]);
        state.apply_text_search("run");

        let ticket = state.begin_load_more().unwrap();
        state.complete_page(
            ticket,
            Ok(vec![Activity::new(3, "Fun Run"), Activity::new(4, "Poetry")]),
        );

        let ids: Vec<i64> = state.visible().iter().map(|a| a.activity_id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(state.all_fetched().len(), 4);
    }

    #[test]
    fn test_refresh_reapplies_search_query() {
        let mut state = loaded(page(0, 3));
        state.apply_text_search("Activity 1");

        let ticket = state.begin_refresh();
        state.complete_page(ticket, Ok(vec![Activity::new(1, "Activity 1"), Activity::new(9, "Other")]));

        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.search_query(), "Activity 1");
    }

    #[test]
    fn test_server_filter_replaces_visible() {
        let mut state = loaded(page(0, 5));
        let ticket = state.begin_server_filter();
        let outcome = state
            .complete_server_filter(ticket, criteria(), Ok(vec![Activity::new(77, "Football")]))
            .unwrap();

        assert_eq!(outcome, FilterOutcome::Applied { count: 1 });
        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.visible()[0].category_label(), "No Category");
        assert_eq!(state.all_fetched().len(), 5);
        assert!(state.mode().is_server_filtered());
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn test_server_filter_empty_result_leaves_visible_unchanged() {
        let mut state = loaded(page(0, 5));
        state.apply_text_search("Activity 3");
        let before = state.visible().to_vec();

        let ticket = state.begin_server_filter();
        let result = state.complete_server_filter(ticket, criteria(), Ok(vec![]));

        assert_eq!(result, Err(FilterError::NoResults));
        assert_eq!(state.visible(), before.as_slice());
        assert!(!state.mode().is_server_filtered());
    }

    #[test]
    fn test_server_filter_transport_failure() {
        let mut state = loaded(page(0, 2));
        let ticket = state.begin_server_filter();
        let result = state.complete_server_filter(ticket, criteria(), Err(transport_error()));
        assert!(matches!(result, Err(FilterError::Backend(_))));
        assert_eq!(state.visible().len(), 2);
    }

    #[test]
    fn test_server_filter_superseded_by_newer_request() {
        let mut state = loaded(page(0, 2));
        let older = state.begin_server_filter();
        let newer = state.begin_server_filter();

        assert_eq!(
            state.complete_server_filter(older, criteria(), Ok(page(10, 3))),
            Ok(FilterOutcome::Stale)
        );
        assert_eq!(
            state.complete_server_filter(newer, criteria(), Ok(page(20, 1))),
            Ok(FilterOutcome::Applied { count: 1 })
        );
    }

    #[test]
    fn test_server_filter_dropped_after_refresh() {
        let mut state = loaded(page(0, 2));
        let ticket = state.begin_server_filter();
        state.begin_refresh();

        assert_eq!(
            state.complete_server_filter(ticket, criteria(), Ok(page(10, 3))),
            Ok(FilterOutcome::Stale)
        );
    }

    #[test]
    fn test_text_search_leaves_server_filter_mode() {
        let mut state = loaded(page(0, 4));
        let ticket = state.begin_server_filter();
        state
            .complete_server_filter(ticket, criteria(), Ok(page(40, 1)))
            .unwrap();

        state.apply_text_search("");
        assert_eq!(state.visible(), state.all_fetched());
        assert!(state.begin_load_more().is_some());
    }

    #[test]
    fn test_refresh_clears_server_filter() {
        let mut state = loaded(page(0, 4));
        let filter = state.begin_server_filter();
        state
            .complete_server_filter(filter, criteria(), Ok(page(40, 1)))
            .unwrap();

        let ticket = state.begin_refresh();
        state.complete_page(ticket, Ok(page(0, 6)));
        assert_eq!(state.mode(), &FilterMode::Unfiltered);
        assert_eq!(state.visible().len(), 6);
    }

    #[test]
    fn test_discard_keeps_generation_monotonic() {
        let mut state = loaded(page(0, 4));
        let in_flight = state.begin_load_more().unwrap();
        let generation = state.generation();

        state.discard();
        assert!(state.generation() > generation);
        assert!(state.all_fetched().is_empty());
        assert!(state.has_more());
        assert_eq!(state.complete_page(in_flight, Ok(page(4, 4))), PageOutcome::Stale);

        let ticket = state.begin_initial();
        assert!(ticket.generation > in_flight.generation);
    }

    proptest! {
        #[test]
        fn prop_appended_pages_accumulate_in_request_order(
            sizes in proptest::collection::vec(1usize..12, 0..8),
        ) {
            let mut state = loaded(page(0, 5));
            let mut next_id = 5i64;
            let mut expected: Vec<i64> = (0..5).collect();

            for size in sizes {
                let ticket = state.begin_load_more().unwrap();
                let fetched = page(next_id, size);
                expected.extend(fetched.iter().map(|a| a.activity_id.0));
                next_id += size as i64;
                state.complete_page(ticket, Ok(fetched));
            }

            let actual: Vec<i64> = state.all_fetched().iter().map(|a| a.activity_id.0).collect();
            prop_assert_eq!(actual, expected);
            prop_assert!(state.has_more());
        }

        #[test]
        fn prop_visible_tracks_text_search(
            titles in proptest::collection::vec("[a-cA-C]{1,6}", 0..15),
            query in "[a-cA-C]{0,2}",
        ) {
            let activities: Vec<Activity> = titles
                .iter()
                .enumerate()
                .map(|(i, t)| Activity::new(i as i64, t.clone()))
                .collect();
            let mut state = loaded(activities);

            state.apply_text_search(&query);
            let needle = query.to_lowercase();
            let expected: Vec<Activity> = state
                .all_fetched()
                .iter()
                .filter(|a| a.title.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            prop_assert_eq!(state.visible(), expected.as_slice());

            state.apply_text_search("");
            prop_assert_eq!(state.visible(), state.all_fetched());
        }
    }
}
