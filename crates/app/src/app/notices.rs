use std::collections::VecDeque;
use std::time::{Duration, Instant};

use egui::{Color32, Ui};

const MAX_NOTICES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NoticeLevel {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub(crate) struct Notice {
    pub(crate) level: NoticeLevel,
    pub(crate) text: String,
    created: Instant,
}

/// Transient user-facing messages, newest last.
#[derive(Default)]
pub(crate) struct Notices {
    entries: VecDeque<Notice>,
}

impl Notices {
    pub(crate) fn info(&mut self, text: impl Into<String>) {
        self.push(NoticeLevel::Info, text.into(), Instant::now());
    }

    pub(crate) fn error(&mut self, text: impl Into<String>) {
        self.push(NoticeLevel::Error, text.into(), Instant::now());
    }

    fn push(&mut self, level: NoticeLevel, text: String, created: Instant) {
        self.entries.push_back(Notice {
            level,
            text,
            created,
        });
        while self.entries.len() > MAX_NOTICES {
            self.entries.pop_front();
        }
    }

    pub(crate) fn prune(&mut self, now: Instant, lifetime: Duration) {
        self.entries
            .retain(|notice| now.saturating_duration_since(notice.created) < lifetime);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.entries.iter()
    }

    pub(crate) fn show(&self, ui: &mut Ui) {
        if self.entries.is_empty() {
            ui.label("No notices.");
            return;
        }
        for notice in &self.entries {
            let color = match notice.level {
                NoticeLevel::Info => Color32::from_rgb(140, 220, 140),
                NoticeLevel::Error => Color32::from_rgb(220, 60, 60),
            };
            ui.colored_label(color, &notice.text);
        }
    }
}
