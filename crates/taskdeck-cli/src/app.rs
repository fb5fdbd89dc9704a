use std::time::SystemTime;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use taskdeck_core::dashboard::{ProjectPanels, TaskFilter};
use taskdeck_core::orchestration::{RefreshRequest, RefreshTrigger, TasksRefreshed};

use crate::config::DashboardConfig;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    None,
    Quit,
    Refresh(RefreshTrigger),
    Redraw,
}

/// Render-loop state. Refresh work happens elsewhere; this only tracks what to show.
pub struct App {
    pub config: DashboardConfig,
    pub panels: ProjectPanels,
    pub filter: TaskFilter,
    next_generation: u64,
    in_flight: usize,
    pub last_refresh: Option<(RefreshTrigger, SystemTime)>,
}

impl App {
    pub fn new(config: DashboardConfig) -> Self {
        let panels = ProjectPanels::new(&config.projects);
        let filter = TaskFilter {
            hide_done: config.hide_done,
        };
        Self {
            config,
            panels,
            filter,
            next_generation: 0,
            in_flight: 0,
            last_refresh: None,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('r') => Action::Refresh(RefreshTrigger::Manual),
            KeyCode::Char('d') => {
                self.filter.hide_done = !self.filter.hide_done;
                Action::Redraw
            }
            _ => Action::None,
        }
    }

    /// Timer ticks are skipped while an earlier refresh is still running.
    pub fn poll_due(&self) -> bool {
        self.in_flight == 0
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight > 0
    }

    pub fn begin_refresh(&mut self, trigger: RefreshTrigger) -> RefreshRequest {
        self.next_generation += 1;
        self.in_flight += 1;
        RefreshRequest {
            generation: self.next_generation,
            trigger,
            configs: self.config.projects.clone(),
            global: self.config.global.clone(),
            options: self.config.policy.options_for(trigger),
        }
    }

    pub fn finish_refresh(&mut self, message: &TasksRefreshed) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.panels.apply(message) {
            self.last_refresh = Some((message.trigger, message.finished_at));
        }
    }
}
