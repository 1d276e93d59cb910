use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKey {
    Escape,
    Tab,
    ShiftTab,
}

/// Dialog lifecycle with focus management.
///
/// `open`/`close` only start a transition; the host completes it with
/// `finish_transition` once the CSS transition time has elapsed.
#[derive(Debug, Clone)]
pub struct Modal {
    id: String,
    state: ModalState,
    focusables: Vec<String>,
    focused: Option<usize>,
    restore_focus: Option<String>,
}

impl Modal {
    pub fn new(id: impl Into<String>, focusables: Vec<String>) -> Self {
        Self {
            id: id.into(),
            state: ModalState::Closed,
            focusables,
            focused: None,
            restore_focus: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ModalState {
        self.state
    }

    /// True while opening or open. A closing modal no longer takes keys.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ModalState::Opening | ModalState::Open)
    }

    pub fn aria_hidden(&self) -> bool {
        self.state == ModalState::Closed
    }

    pub fn scroll_locked(&self) -> bool {
        self.state != ModalState::Closed
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.map(|i| self.focusables[i].as_str())
    }

    /// Starts opening. Returns false when already opening or open.
    pub fn open(&mut self, previously_focused: Option<String>) -> bool {
        match self.state {
            ModalState::Opening | ModalState::Open => false,
            ModalState::Closing => {
                debug!("Modal {} reopened while closing", self.id);
                self.state = ModalState::Opening;
                true
            }
            ModalState::Closed => {
                self.restore_focus = previously_focused;
                self.state = ModalState::Opening;
                true
            }
        }
    }

    /// Starts closing. Returns false when already closing or closed.
    pub fn close(&mut self) -> bool {
        match self.state {
            ModalState::Closing | ModalState::Closed => false,
            ModalState::Opening | ModalState::Open => {
                self.state = ModalState::Closing;
                true
            }
        }
    }

    /// Completes the pending transition and returns the element that should
    /// receive focus: the first field after opening, the previously focused
    /// element after closing.
    pub fn finish_transition(&mut self) -> Option<String> {
        match self.state {
            ModalState::Opening => {
                self.state = ModalState::Open;
                self.focused = if self.focusables.is_empty() { None } else { Some(0) };
                self.focused().map(str::to_string)
            }
            ModalState::Closing => {
                self.state = ModalState::Closed;
                self.focused = None;
                self.restore_focus.take()
            }
            ModalState::Open | ModalState::Closed => None,
        }
    }

    /// Moves focus to the named field if it belongs to this modal.
    pub fn focus(&mut self, element: &str) -> bool {
        match self.focusables.iter().position(|f| f == element) {
            Some(i) => {
                self.focused = Some(i);
                true
            }
            None => false,
        }
    }

    /// Keyboard handling while active: Escape closes, Tab/Shift-Tab cycle
    /// focus without leaving the modal. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: ModalKey) -> bool {
        if !self.is_active() {
            return false;
        }
        match key {
            ModalKey::Escape => self.close(),
            ModalKey::Tab | ModalKey::ShiftTab => {
                let count = self.focusables.len();
                if count == 0 {
                    return true;
                }
                let forward = key == ModalKey::Tab;
                self.focused = Some(match (self.focused, forward) {
                    (None, true) => 0,
                    (None, false) => count - 1,
                    (Some(i), true) => (i + 1) % count,
                    (Some(0), false) => count - 1,
                    (Some(i), false) => i - 1,
                });
                true
            }
        }
    }
}
