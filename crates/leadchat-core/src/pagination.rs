//! Per-tab paging bookkeeping for the conversation list.
//!
//! Every request is stamped with a generation. A tab only accepts the
//! response to its most recent request, and switching tab, search or filter
//! retires every request in flight, so a slow page for a view the user
//! already left cannot overwrite what is on screen.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::LeadStatus;
use crate::partition::TabPartitioner;

/// Server-side list filter shared by all tabs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    /// Conversation status (`open`, `closed`, ...)
    pub status: Option<String>,
    pub include_closed: bool,
}

/// One page request for one tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub tab: usize,
    pub offset: u32,
    pub limit: u32,
    pub lead_statuses: Vec<LeadStatus>,
    pub filter: ListFilter,
    pub generation: u64,
    /// Load-more pages extend the list; everything else replaces it
    pub append: bool,
}

/// Pagination block of a conversations response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub total_count: u32,
    pub next_offset: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
    pub total_count: u32,
    pub loading: bool,
    pub error: Option<String>,
    /// Loaded conversation keys in server order
    pub phones: Vec<String>,
    #[serde(skip)]
    generation: u64,
}

pub struct PaginationController {
    page_size: u32,
    active_tab: usize,
    tabs: Vec<PageState>,
    tab_statuses: Vec<Vec<LeadStatus>>,
    search: String,
    filter: ListFilter,
    next_generation: u64,
}

impl PaginationController {
    pub fn new(partitioner: &TabPartitioner, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        let tab_count = partitioner.len();
        Self {
            page_size,
            active_tab: 0,
            tabs: (0..tab_count)
                .map(|_| PageState {
                    limit: page_size,
                    has_more: true,
                    ..Default::default()
                })
                .collect(),
            tab_statuses: (0..tab_count).map(|i| partitioner.lead_statuses(i)).collect(),
            search: String::new(),
            filter: ListFilter::default(),
            next_generation: 0,
        }
    }

    // ===== Getters =====

    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub fn state(&self, tab: usize) -> Option<&PageState> {
        self.tabs.get(tab)
    }

    pub fn active_state(&self) -> Option<&PageState> {
        self.tabs.get(self.active_tab)
    }

    pub fn loaded_phones(&self, tab: usize) -> &[String] {
        self.tabs.get(tab).map(|s| s.phones.as_slice()).unwrap_or(&[])
    }

    /// True if `request` is still the latest one issued for its tab
    pub fn is_current(&self, request: &FetchRequest) -> bool {
        self.tabs
            .get(request.tab)
            .map(|s| s.generation == request.generation)
            .unwrap_or(false)
    }

    // ===== Request builders =====

    /// Retire every outstanding request on every tab
    fn invalidate_all(&mut self) {
        self.next_generation += 1;
        let generation = self.next_generation;
        for state in &mut self.tabs {
            state.generation = generation;
            state.loading = false;
        }
    }

    fn begin(&mut self, tab: usize, append: bool) -> Option<FetchRequest> {
        let page_size = self.page_size;
        self.next_generation += 1;
        let generation = self.next_generation;

        let state = self.tabs.get_mut(tab)?;
        if !append {
            state.offset = 0;
        }
        state.limit = page_size;
        state.loading = true;
        state.error = None;
        state.generation = generation;

        Some(FetchRequest {
            tab,
            offset: state.offset,
            limit: page_size,
            lead_statuses: self.tab_statuses[tab].clone(),
            filter: self.filter.clone(),
            generation,
            append,
        })
    }

    /// Switch tabs and request the first page. `None` for an unknown tab.
    pub fn select_tab(&mut self, tab: usize) -> Option<FetchRequest> {
        if tab >= self.tabs.len() {
            return None;
        }
        self.active_tab = tab;
        self.invalidate_all();
        self.begin(tab, false)
    }

    /// New search text: back to the first page of the active tab
    pub fn set_search(&mut self, search: &str) -> Option<FetchRequest> {
        self.search = search.to_string();
        self.invalidate_all();
        self.begin(self.active_tab, false)
    }

    /// Switch tabs with new search text in one first-page request
    pub fn select_tab_with_search(&mut self, tab: usize, search: &str) -> Option<FetchRequest> {
        if tab >= self.tabs.len() {
            return None;
        }
        self.search = search.to_string();
        self.select_tab(tab)
    }

    pub fn set_filter(&mut self, filter: ListFilter) -> Option<FetchRequest> {
        self.filter = filter;
        self.invalidate_all();
        self.begin(self.active_tab, false)
    }

    /// Manual refresh of the active tab (also the retry action after errors)
    pub fn refresh(&mut self) -> Option<FetchRequest> {
        self.begin(self.active_tab, false)
    }

    /// Refresh a specific tab without switching to it
    pub fn refresh_tab(&mut self, tab: usize) -> Option<FetchRequest> {
        self.begin(tab, false)
    }

    /// Next page of the active tab, unless everything is loaded or a
    /// request is already in flight
    pub fn load_more(&mut self) -> Option<FetchRequest> {
        let state = self.tabs.get(self.active_tab)?;
        if !state.has_more || state.loading {
            return None;
        }
        self.begin(self.active_tab, true)
    }

    // ===== Responses =====

    /// Record a successful page. Returns false (and changes nothing) when the
    /// response is stale.
    pub fn apply_response(
        &mut self,
        request: &FetchRequest,
        phones: Vec<String>,
        info: &PageInfo,
    ) -> bool {
        if !self.is_current(request) {
            debug!(
                tab = request.tab,
                generation = request.generation,
                "Discarding stale conversation page"
            );
            return false;
        }
        let Some(state) = self.tabs.get_mut(request.tab) else {
            return false;
        };

        let received = u32::try_from(phones.len()).unwrap_or(u32::MAX);
        if request.append {
            for phone in phones {
                if !state.phones.contains(&phone) {
                    state.phones.push(phone);
                }
            }
        } else {
            state.phones = phones;
        }

        state.offset = info
            .next_offset
            .unwrap_or_else(|| request.offset.saturating_add(received));
        state.has_more = info.has_more;
        state.total_count = info.total_count;
        state.loading = false;
        state.error = None;
        true
    }

    /// Record a failed fetch: stop loading and keep the last good data.
    /// No retry is scheduled.
    pub fn apply_failure(&mut self, request: &FetchRequest, message: &str) -> bool {
        if !self.is_current(request) {
            return false;
        }
        let Some(state) = self.tabs.get_mut(request.tab) else {
            return false;
        };
        state.loading = false;
        state.error = Some(message.to_string());
        true
    }

    pub fn dismiss_error(&mut self, tab: usize) {
        if let Some(state) = self.tabs.get_mut(tab) {
            state.error = None;
        }
    }

    /// Forget a deleted conversation in every tab
    pub fn forget_phone(&mut self, phone: &str) {
        for state in &mut self.tabs {
            let before = state.phones.len();
            state.phones.retain(|p| p != phone);
            if state.phones.len() < before {
                state.total_count = state.total_count.saturating_sub(1);
                state.offset = state.offset.saturating_sub(1);
            }
        }
    }
}
