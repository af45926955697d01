//! TUI application state and navigation logic.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::widgets::TableState;
use tokio::sync::mpsc;

use goru_types::Group;

use crate::orchestrator::Refresher;
use crate::store::{Stats, Store, Update};
use crate::tui::format;

/// Sort order for the group table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Count,
    State,
    Function,
    Wait,
}

impl SortColumn {
    /// Cycle to the next sort column.
    pub fn next(self) -> Self {
        match self {
            SortColumn::Count => SortColumn::State,
            SortColumn::State => SortColumn::Function,
            SortColumn::Function => SortColumn::Wait,
            SortColumn::Wait => SortColumn::Count,
        }
    }
}

/// Main application state.
pub struct App {
    store: Arc<Store>,
    refresher: Arc<dyn Refresher>,
    updates: mpsc::Receiver<Update>,
    update_tx: mpsc::Sender<Update>,

    pub running: bool,
    pub interval: Duration,
    pub selected_host: Option<String>,
    pub table_state: TableState,

    /// Groups currently displayed, in table order.
    pub displayed_groups: Vec<Group>,

    pub sort_by: SortColumn,
    pub filter_text: String,
    pub filter_active: bool,

    pub show_details: bool,
    pub selected_group: Option<Group>,

    pub stats: Stats,
    pub last_update: Option<Instant>,
}

impl App {
    /// Create the app and subscribe it to store updates.
    pub fn new(store: Arc<Store>, refresher: Arc<dyn Refresher>, interval: Duration) -> Self {
        let (update_tx, updates) = mpsc::channel(10);
        store.subscribe(update_tx.clone());

        let mut app = Self {
            stats: store.stats(),
            store,
            refresher,
            updates,
            update_tx,
            running: true,
            interval,
            selected_host: None,
            table_state: TableState::default(),
            displayed_groups: Vec::new(),
            sort_by: SortColumn::default(),
            filter_text: String::new(),
            filter_active: false,
            show_details: false,
            selected_group: None,
            last_update: None,
        };
        app.reload();
        app
    }

    /// Hosts in stable display order.
    pub fn sorted_hosts(&self) -> Vec<String> {
        let mut hosts = self.store.all_hosts();
        hosts.sort();
        hosts
    }

    /// Drain pending store updates; on any, re-read displayed state.
    /// The store is the source of truth, the channel only a wakeup.
    pub fn drain_updates(&mut self) {
        let mut woken = false;
        while self.updates.try_recv().is_ok() {
            woken = true;
        }
        if woken && !self.show_details {
            self.last_update = Some(Instant::now());
            self.reload();
        }
    }

    /// Rebuild the displayed rows from current store state.
    pub fn reload(&mut self) {
        self.stats = self.store.stats();

        let hosts = self.sorted_hosts();
        if self.selected_host.is_none() {
            self.selected_host = hosts.first().cloned();
        }

        self.displayed_groups.clear();
        let Some(host) = &self.selected_host else {
            return;
        };
        let Some(snapshot) = self.store.snapshot(host) else {
            self.table_state.select(None);
            return;
        };

        let mut groups: Vec<Group> = snapshot
            .groups
            .values()
            .filter(|g| self.matches_filter(g))
            .cloned()
            .collect();
        sort_groups(&mut groups, self.sort_by);
        self.displayed_groups = groups;

        // Clamp the selection to the new row count.
        let len = self.displayed_groups.len();
        if len == 0 {
            self.table_state.select(None);
        } else {
            let idx = self.table_state.selected().unwrap_or(0).min(len - 1);
            self.table_state.select(Some(idx));
        }
    }

    fn matches_filter(&self, group: &Group) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        let needle = self.filter_text.to_lowercase();
        group.trace.iter().any(|frame| {
            frame.func.to_lowercase().contains(&needle)
                || frame.file.to_lowercase().contains(&needle)
        })
    }

    pub fn select_next_n(&mut self, n: usize) {
        if self.displayed_groups.is_empty() {
            return;
        }
        let max = self.displayed_groups.len() - 1;
        let idx = self.table_state.selected().unwrap_or(0);
        self.table_state.select(Some((idx + n).min(max)));
    }

    pub fn select_prev_n(&mut self, n: usize) {
        if self.displayed_groups.is_empty() {
            return;
        }
        let idx = self.table_state.selected().unwrap_or(0);
        self.table_state.select(Some(idx.saturating_sub(n)));
    }

    pub fn select_first(&mut self) {
        if !self.displayed_groups.is_empty() {
            self.table_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if let Some(last) = self.displayed_groups.len().checked_sub(1) {
            self.table_state.select(Some(last));
        }
    }

    pub fn next_host(&mut self) {
        self.step_host(1);
    }

    pub fn prev_host(&mut self) {
        self.step_host(-1);
    }

    fn step_host(&mut self, direction: isize) {
        let hosts = self.sorted_hosts();
        if hosts.is_empty() {
            return;
        }
        let current = self
            .selected_host
            .as_ref()
            .and_then(|h| hosts.iter().position(|x| x == h))
            .unwrap_or(0);
        let next = (current as isize + direction).rem_euclid(hosts.len() as isize) as usize;
        self.selected_host = Some(hosts[next].clone());
        self.table_state.select(Some(0));
        self.reload();
    }

    /// Open the details overlay for the selected row.
    pub fn enter_details(&mut self) {
        if let Some(idx) = self.table_state.selected() {
            if let Some(group) = self.displayed_groups.get(idx) {
                self.selected_group = Some(group.clone());
                self.show_details = true;
            }
        }
    }

    pub fn close_details(&mut self) {
        self.show_details = false;
        self.selected_group = None;
        self.reload();
    }

    pub fn cycle_sort(&mut self) {
        self.sort_by = self.sort_by.next();
        self.reload();
    }

    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    pub fn apply_filter(&mut self) {
        self.filter_active = false;
        self.reload();
    }

    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.filter_active = false;
        self.reload();
    }

    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
    }

    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
    }

    pub fn trigger_refresh(&self) {
        self.refresher.trigger_refresh();
    }

    pub fn toggle_pause(&mut self) {
        let paused = !self.refresher.is_paused();
        self.refresher.set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.refresher.is_paused()
    }

    /// Error recorded for the selected host, if any.
    pub fn selected_host_error(&self) -> Option<String> {
        let host = self.selected_host.as_ref()?;
        self.store.errors().get(host).cloned()
    }

    /// Whether the selected host is still waiting for its first result.
    pub fn selected_host_fetching(&self) -> bool {
        self.selected_host
            .as_ref()
            .is_some_and(|host| self.store.fetching_hosts().contains(host))
    }

    /// (errored, fetching) host counts for the header summary.
    pub fn issue_counts(&self) -> (usize, usize) {
        (self.store.errors().len(), self.store.fetching_hosts().len())
    }

    pub fn quit(&mut self) {
        self.running = false;
        self.store.unsubscribe(&self.update_tx);
    }
}

/// Sort with the active column first; count and group ID break ties so the
/// order is deterministic across reloads.
fn sort_groups(groups: &mut [Group], sort_by: SortColumn) {
    groups.sort_by(|a, b| {
        let primary = match sort_by {
            SortColumn::Count => b.count.cmp(&a.count),
            SortColumn::State => a.state.cmp(&b.state),
            SortColumn::Function => a.leaf_func().cmp(b.leaf_func()),
            SortColumn::Wait => format::max_wait_minutes(&b.wait_durations)
                .cmp(&format::max_wait_minutes(&a.wait_durations)),
        };
        primary
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.id.cmp(&b.id))
    });
}
