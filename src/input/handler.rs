use crate::{
    core::{constants, geo::Point},
    input::events::{InputEvent, MapEvent},
    prelude::HashMap,
};
use std::collections::VecDeque;

/// Camera action produced from user input
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Pan by a pixel delta
    Pan { delta: Point },
    /// Zoom to a level, keeping `focus_point` stationary when given
    Zoom {
        level: f64,
        focus_point: Option<Point>,
    },
    /// Start dragging mode
    StartDrag,
    /// End dragging mode; the camera has settled
    EndDrag,
    /// Click at a container pixel
    Click { position: Point },
    /// Container resized
    Resize { size: Point },
}

/// Event listener callback type
pub type EventCallback = Box<dyn Fn(&MapEvent) + Send + Sync>;

/// Handle returned by [`EventManager::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event management system for the map
#[derive(Default)]
pub struct EventManager {
    /// Event listeners by event kind
    listeners: HashMap<&'static str, Vec<(ListenerId, EventCallback)>>,
    /// Event queue for processing
    event_queue: VecDeque<MapEvent>,
    next_id: u64,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event listener
    pub fn on<F>(&mut self, kind: &'static str, callback: F) -> ListenerId
    where
        F: Fn(&MapEvent) + Send + Sync + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Unregister a listener; returns false when it was already gone
    pub fn off(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        for callbacks in self.listeners.values_mut() {
            let before = callbacks.len();
            callbacks.retain(|(listener_id, _)| *listener_id != id);
            removed |= callbacks.len() != before;
        }
        removed
    }

    /// Emit an event to the queue
    pub fn emit(&mut self, event: MapEvent) {
        self.event_queue.push_back(event);
    }

    /// Dispatch all queued events to listeners and return them
    pub fn process_events(&mut self) -> Vec<MapEvent> {
        let events: Vec<_> = self.event_queue.drain(..).collect();

        for event in &events {
            if let Some(callbacks) = self.listeners.get(event.kind()) {
                for (_, callback) in callbacks {
                    callback(event);
                }
            }
        }

        events
    }

    /// Clear all events from the queue
    pub fn clear_events(&mut self) {
        self.event_queue.clear();
    }

    /// Get number of pending events
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}

/// Turns user input into camera actions (like Leaflet's drag and wheel handlers)
#[derive(Debug, Clone)]
pub struct InputHandler {
    pub enabled: bool,
    pub zoom_on_wheel: bool,
    pub zoom_on_double_click: bool,
    pub pan_on_drag: bool,
    pub wheel_px_per_zoom_level: f64,
    pub zoom_delta: f64,
    dragging: bool,
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            enabled: true,
            zoom_on_wheel: true,
            zoom_on_double_click: true,
            pan_on_drag: true,
            wheel_px_per_zoom_level: constants::WHEEL_PX_PER_ZOOM_LEVEL,
            zoom_delta: constants::DEFAULT_ZOOM_DELTA,
            dragging: false,
        }
    }

    /// Handle one input event and generate actions
    pub fn handle_event(&mut self, event: InputEvent, current_zoom: f64) -> Vec<Action> {
        if !self.enabled {
            return vec![];
        }

        match event {
            InputEvent::Click { position } => vec![Action::Click { position }],
            InputEvent::DragStart { .. } if self.pan_on_drag => {
                self.dragging = true;
                vec![Action::StartDrag]
            }
            InputEvent::Drag { delta } if self.pan_on_drag && self.dragging => {
                vec![Action::Pan { delta }]
            }
            InputEvent::DragEnd if self.dragging => {
                self.dragging = false;
                vec![Action::EndDrag]
            }
            InputEvent::Scroll { delta, position } if self.zoom_on_wheel => {
                let zoom_change = -delta / self.wheel_px_per_zoom_level;
                vec![Action::Zoom {
                    level: current_zoom + zoom_change,
                    focus_point: Some(position),
                }]
            }
            InputEvent::DoubleClick { position } if self.zoom_on_double_click => {
                vec![Action::Zoom {
                    level: current_zoom + 1.0,
                    focus_point: Some(position),
                }]
            }
            InputEvent::Resize { size } => vec![Action::Resize { size }],
            _ => vec![],
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LatLng;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_listener_dispatch_and_off() {
        let mut manager = EventManager::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = manager.on("moveend", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.emit(MapEvent::MoveEnd {
            center: LatLng::default(),
        });
        manager.emit(MapEvent::ZoomEnd { zoom: 1.0 });
        assert_eq!(manager.process_events().len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(manager.off(id));
        assert!(!manager.off(id));
        assert_eq!(manager.listener_count(), 0);

        manager.emit(MapEvent::MoveEnd {
            center: LatLng::default(),
        });
        manager.process_events();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drag_sequence() {
        let mut handler = InputHandler::new();
        // a drag without a start is ignored
        assert!(handler
            .handle_event(InputEvent::Drag { delta: Point::new(5.0, 0.0) }, 1.0)
            .is_empty());

        handler.handle_event(
            InputEvent::DragStart {
                position: Point::new(0.0, 0.0),
            },
            1.0,
        );
        assert_eq!(
            handler.handle_event(InputEvent::Drag { delta: Point::new(5.0, 0.0) }, 1.0),
            vec![Action::Pan {
                delta: Point::new(5.0, 0.0)
            }]
        );
        assert_eq!(handler.handle_event(InputEvent::DragEnd, 1.0), vec![Action::EndDrag]);
        assert!(!handler.is_dragging());
    }

    #[test]
    fn test_wheel_zoom() {
        let mut handler = InputHandler::new();
        let actions = handler.handle_event(
            InputEvent::Scroll {
                delta: -25.0,
                position: Point::new(10.0, 10.0),
            },
            2.0,
        );
        assert_eq!(
            actions,
            vec![Action::Zoom {
                level: 2.5,
                focus_point: Some(Point::new(10.0, 10.0))
            }]
        );
    }
}
