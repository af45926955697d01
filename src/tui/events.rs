//! Terminal event polling and key handling.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::App;

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    // Details overlay: navigation keys still work, anything else closes it.
    if app.show_details {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace | KeyCode::Char('q') => {
                app.close_details();
            }
            _ => {}
        }
        return;
    }

    if app.filter_active {
        handle_filter_input(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        // Row navigation
        KeyCode::Up | KeyCode::Char('k') => app.select_prev_n(1),
        KeyCode::Down | KeyCode::Char('j') => app.select_next_n(1),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        // Host cycling
        KeyCode::Left | KeyCode::Char('h') => app.prev_host(),
        KeyCode::Right | KeyCode::Char('l') => app.next_host(),

        KeyCode::Enter => app.enter_details(),

        KeyCode::Char('f') | KeyCode::Char('/') => app.start_filter(),
        KeyCode::Char('c') => {
            if !app.filter_text.is_empty() {
                app.clear_filter();
            }
        }

        KeyCode::Char('s') => app.cycle_sort(),
        KeyCode::Char('r') => app.trigger_refresh(),
        KeyCode::Char('p') | KeyCode::Char(' ') => app.toggle_pause(),

        _ => {}
    }
}

/// Handle key input while the filter prompt is active
fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.apply_filter(),
        KeyCode::Esc => {
            app.filter_active = false;
        }
        KeyCode::Backspace => {
            app.filter_pop();
            if app.filter_text.is_empty() {
                app.filter_active = false;
            }
        }
        KeyCode::Char(c) => app.filter_push(c),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use goru_types::{GoroutineState, Snapshot, StackFrame, StackTrace};

    use crate::orchestrator::Refresher;
    use crate::store::Store;

    #[derive(Default)]
    struct StubRefresher {
        paused: AtomicBool,
        triggered: AtomicBool,
    }

    impl Refresher for StubRefresher {
        fn trigger_refresh(&self) {
            self.triggered.store(true, Ordering::SeqCst);
        }

        fn set_paused(&self, paused: bool) {
            self.paused.store(paused, Ordering::SeqCst);
        }

        fn is_paused(&self) -> bool {
            self.paused.load(Ordering::SeqCst)
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app() -> (App, Arc<StubRefresher>) {
        let store = Arc::new(Store::new());
        store.register_hosts(&["h1".to_string()]);
        let mut snapshot = Snapshot::with_timestamp("h1", 1000);
        snapshot.add_goroutine(
            GoroutineState::Blocked,
            StackTrace::from(vec![StackFrame::new("main.worker", "/app/main.go", 1)]),
            None,
            None,
        );
        store.update_snapshot(Arc::new(snapshot), None);

        let refresher = Arc::new(StubRefresher::default());
        let app = App::new(
            store,
            Arc::clone(&refresher) as Arc<dyn Refresher>,
            Duration::from_secs(2),
        );
        (app, refresher)
    }

    #[test]
    fn q_quits() {
        let (mut app, _) = test_app();
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.running);
    }

    #[test]
    fn ctrl_c_quits_even_in_overlays() {
        let (mut app, _) = test_app();
        app.enter_details();
        handle_key_event(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(!app.running);
    }

    #[test]
    fn r_triggers_a_manual_refresh() {
        let (mut app, refresher) = test_app();
        handle_key_event(&mut app, key(KeyCode::Char('r')));
        assert!(refresher.triggered.load(Ordering::SeqCst));
    }

    #[test]
    fn p_toggles_pause() {
        let (mut app, refresher) = test_app();
        handle_key_event(&mut app, key(KeyCode::Char('p')));
        assert!(refresher.is_paused());
        handle_key_event(&mut app, key(KeyCode::Char(' ')));
        assert!(!refresher.is_paused());
    }

    #[test]
    fn enter_opens_details_and_esc_closes_them() {
        let (mut app, _) = test_app();
        handle_key_event(&mut app, key(KeyCode::Enter));
        assert!(app.show_details);
        handle_key_event(&mut app, key(KeyCode::Esc));
        assert!(!app.show_details);
    }

    #[test]
    fn filter_mode_captures_typed_characters() {
        let (mut app, _) = test_app();
        handle_key_event(&mut app, key(KeyCode::Char('/')));
        assert!(app.filter_active);

        for c in "net".chars() {
            handle_key_event(&mut app, key(KeyCode::Char(c)));
        }
        handle_key_event(&mut app, key(KeyCode::Enter));

        assert!(!app.filter_active);
        assert_eq!(app.filter_text, "net");
        // "net" matches nothing in the single main.worker group.
        assert!(app.displayed_groups.is_empty());

        handle_key_event(&mut app, key(KeyCode::Char('c')));
        assert!(app.filter_text.is_empty());
        assert_eq!(app.displayed_groups.len(), 1);
    }

    #[test]
    fn backspacing_the_last_character_leaves_filter_mode() {
        let (mut app, _) = test_app();
        handle_key_event(&mut app, key(KeyCode::Char('/')));
        handle_key_event(&mut app, key(KeyCode::Char('x')));
        handle_key_event(&mut app, key(KeyCode::Backspace));
        handle_key_event(&mut app, key(KeyCode::Backspace));
        assert!(!app.filter_active);
    }
}
