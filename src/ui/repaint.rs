// Which screen areas need repainting after a monitor tick

use crate::library::Playlist;
use std::rc::Rc;

/// The bits of player state the repaint decision looks at.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub queue: Option<Rc<Playlist>>,
    pub index: Option<usize>,
    pub playing: bool,
    pub volume: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repaint {
    pub player: bool,
    pub library: bool,
    pub playlist: bool,
    pub message: Option<String>,
}

fn same_playlist(a: &Option<Rc<Playlist>>, b: &Option<Rc<Playlist>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn is_viewing(queue: &Option<Rc<Playlist>>, viewing: &Rc<Playlist>) -> bool {
    queue.as_ref().is_some_and(|q| Rc::ptr_eq(q, viewing))
}

/// Remembers the last snapshot so each tick only repaints what moved.
#[derive(Debug, Default)]
pub struct RepaintTracker {
    previous: Snapshot,
}

impl RepaintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, now: Snapshot, viewing: &Rc<Playlist>) -> Repaint {
        let prev = &self.previous;
        let mut repaint = Repaint {
            player: prev.playing || now.playing,
            ..Repaint::default()
        };

        if prev.playing != now.playing {
            repaint.library = true;
            repaint.playlist = true;
        } else if !same_playlist(&prev.queue, &now.queue) {
            repaint.library = true;
            if is_viewing(&prev.queue, viewing) {
                repaint.playlist = true;
            }
        }

        if is_viewing(&now.queue, viewing) && prev.index != now.index {
            repaint.playlist = true;
        }

        if prev.volume != now.volume {
            if let Some(volume) = now.volume {
                repaint.message = Some(format!("volume: {:3.0}%", volume));
            }
        }

        self.previous = now;
        repaint
    }
}
