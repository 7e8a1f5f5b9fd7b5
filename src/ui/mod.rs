//! Terminal front end state.
//!
//! The whole screen is a pure function of one immutable [`Snapshot`]; every
//! transition builds a new snapshot from the previous one.

use crate::bulk::{BulkReport, ItemOutcome, Progress};
use crate::media::{MediaItem, MediaKind, ResolvedPost};
use crate::utils::format_number;
use std::fmt::Write;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Ready,
    Downloading,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadProgress {
    pub completed: usize,
    pub finished: usize,
    pub total: usize,
    pub bytes: u64,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub url: String,
    pub post_id: Option<String>,
    pub items: Arc<[MediaItem]>,
    pub phase: Phase,
    pub error: Option<String>,
    pub progress: Option<DownloadProgress>,
}

#[derive(Debug, Clone)]
pub enum Event {
    Submitted(String),
    Resolved(ResolvedPost),
    Failed(String),
    DownloadStarted,
    ItemFinished(Progress),
    DownloadFinished { completed: usize, total: usize, bytes: u64 },
    /// Back to the idle screen, dropping the post and any progress. Front
    /// ends with a reset control send this; the one-shot CLI never needs to.
    Reset,
}

impl Event {
    pub fn finished(report: &BulkReport) -> Self {
        Self::DownloadFinished {
            completed: report.completed,
            total: report.total,
            bytes: report.bytes,
        }
    }
}

impl Snapshot {
    pub fn apply(&self, event: Event) -> Snapshot {
        match event {
            Event::Submitted(url) => Snapshot {
                url,
                phase: Phase::Loading,
                ..Snapshot::default()
            },
            Event::Resolved(post) => Snapshot {
                post_id: Some(post.post_id),
                items: post.medias.into(),
                phase: Phase::Ready,
                error: None,
                ..self.clone()
            },
            Event::Failed(message) => Snapshot {
                phase: Phase::Failed,
                error: Some(message),
                ..self.clone()
            },
            Event::DownloadStarted => Snapshot {
                phase: Phase::Downloading,
                progress: Some(DownloadProgress {
                    total: self.items.len(),
                    ..DownloadProgress::default()
                }),
                ..self.clone()
            },
            Event::ItemFinished(p) => {
                let previous = self.progress.clone().unwrap_or_default();
                let (bytes, last) = match &p.outcome {
                    ItemOutcome::Saved { bytes } => {
                        (previous.bytes + bytes, format!("saved {}", p.filename))
                    }
                    ItemOutcome::Failed { reason } => {
                        (previous.bytes, format!("item {} failed: {}", p.position, reason))
                    }
                };
                Snapshot {
                    progress: Some(DownloadProgress {
                        completed: p.completed,
                        finished: p.finished,
                        total: p.total,
                        bytes,
                        last: Some(last),
                    }),
                    ..self.clone()
                }
            }
            Event::DownloadFinished {
                completed,
                total,
                bytes,
            } => Snapshot {
                phase: Phase::Done,
                progress: Some(DownloadProgress {
                    completed,
                    finished: total,
                    total,
                    bytes,
                    last: None,
                }),
                ..self.clone()
            },
            Event::Reset => Snapshot::default(),
        }
    }
}

fn kind_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo",
        MediaKind::Video => "video",
        MediaKind::AnimatedGif => "gif",
    }
}

pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    match snapshot.phase {
        Phase::Idle => out.push_str("Paste a post URL to begin."),
        Phase::Loading => {
            let _ = write!(out, "Looking up {} ...", snapshot.url);
        }
        Phase::Failed => {
            let _ = write!(
                out,
                "Error: {}",
                snapshot.error.as_deref().unwrap_or("unknown error")
            );
        }
        Phase::Ready | Phase::Downloading | Phase::Done => {
            let _ = writeln!(
                out,
                "Post {}: {} media item(s)",
                snapshot.post_id.as_deref().unwrap_or("?"),
                snapshot.items.len()
            );
            for (index, item) in snapshot.items.iter().enumerate() {
                let _ = writeln!(out, "  {}. [{}] {}", index + 1, kind_label(item.kind), item.url);
            }
            if let Some(p) = &snapshot.progress {
                let verb = if snapshot.phase == Phase::Done {
                    "Done"
                } else {
                    "Downloading"
                };
                let _ = write!(
                    out,
                    "{}: {}/{} saved ({} bytes)",
                    verb,
                    p.completed,
                    p.total,
                    format_number(p.bytes)
                );
                let failed = p.finished.saturating_sub(p.completed);
                if failed > 0 {
                    let _ = write!(out, ", {failed} failed");
                }
                if let Some(last) = &p.last {
                    let _ = write!(out, ", {last}");
                }
            }
        }
    }

    out.trim_end().to_string()
}
