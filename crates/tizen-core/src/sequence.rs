//! Key sequences: ordered scripts of key commands with per-step delays.
//!
//! A sequence is built fluently and then played back by the remote crate,
//! which sends each command over the control channel and sleeps for the
//! command's post-delay before moving on.
//!
//! ```rust
//! use std::time::Duration;
//! use tizen_core::{Key, KeySequence};
//!
//! let mut seq = KeySequence::new();
//! seq.click(Key::Home)
//!     .wait(Duration::from_secs(2))
//!     .click(Key::Right)
//!     .repeat(2)
//!     .click(Key::Enter);
//! assert_eq!(seq.len(), 5);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Delay applied after each command unless overridden with [`KeySequence::wait`].
pub const DEFAULT_POST_DELAY: Duration = Duration::from_millis(500);

/// What the TV should do with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    /// Press and release in one step.
    Click,
    /// Hold the key down until a matching [`KeyAction::Release`].
    Press,
    /// Release a previously pressed key.
    Release,
}

impl KeyAction {
    /// The `Cmd` verb used on the wire.
    pub fn verb(self) -> &'static str {
        match self {
            KeyAction::Click => "Click",
            KeyAction::Press => "Press",
            KeyAction::Release => "Release",
        }
    }
}

/// One step of a [`KeySequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCommand {
    pub key: Key,
    pub action: KeyAction,
    /// Time to wait after the command is sent, before the next one.
    pub post_delay: Duration,
}

/// An ordered list of key commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence {
    commands: Vec<KeyCommand>,
}

impl KeySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a click of `key`.
    pub fn click(&mut self, key: Key) -> &mut Self {
        self.push(key, KeyAction::Click)
    }

    /// Appends a press of `key`.
    pub fn press(&mut self, key: Key) -> &mut Self {
        self.push(key, KeyAction::Press)
    }

    /// Appends a release of `key`.
    pub fn release(&mut self, key: Key) -> &mut Self {
        self.push(key, KeyAction::Release)
    }

    /// Overrides the post-delay of the most recently added command.
    ///
    /// Does nothing on an empty sequence.
    pub fn wait(&mut self, delay: Duration) -> &mut Self {
        if let Some(last) = self.commands.last_mut() {
            last.post_delay = delay;
        }
        self
    }

    /// Appends `n` copies of the most recently added command.
    ///
    /// Does nothing on an empty sequence.
    pub fn repeat(&mut self, n: usize) -> &mut Self {
        if let Some(last) = self.commands.last().copied() {
            self.commands.extend(std::iter::repeat(last).take(n));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyCommand> {
        self.commands.iter()
    }

    fn push(&mut self, key: Key, action: KeyAction) -> &mut Self {
        self.commands.push(KeyCommand {
            key,
            action,
            post_delay: DEFAULT_POST_DELAY,
        });
        self
    }
}

impl<'a> IntoIterator for &'a KeySequence {
    type Item = &'a KeyCommand;
    type IntoIter = std::slice::Iter<'a, KeyCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl FromIterator<KeyCommand> for KeySequence {
    fn from_iter<I: IntoIterator<Item = KeyCommand>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_action_verbs_match_wire_protocol() {
        assert_eq!(KeyAction::Click.verb(), "Click");
        assert_eq!(KeyAction::Press.verb(), "Press");
        assert_eq!(KeyAction::Release.verb(), "Release");
    }

    #[test]
    fn test_builder_appends_in_order_with_default_delay() {
        // Arrange
        let mut seq = KeySequence::new();

        // Act
        seq.press(Key::VolUp).release(Key::VolUp).click(Key::Mute);

        // Assert
        let actions: Vec<_> = seq.iter().map(|c| (c.key, c.action)).collect();
        assert_eq!(
            actions,
            vec![
                (Key::VolUp, KeyAction::Press),
                (Key::VolUp, KeyAction::Release),
                (Key::Mute, KeyAction::Click),
            ]
        );
        assert!(seq.iter().all(|c| c.post_delay == DEFAULT_POST_DELAY));
    }

    #[test]
    fn test_wait_overrides_only_last_command() {
        let mut seq = KeySequence::new();
        seq.click(Key::Home).click(Key::Right).wait(Duration::from_secs(2));

        let delays: Vec<_> = seq.iter().map(|c| c.post_delay).collect();
        assert_eq!(delays, vec![DEFAULT_POST_DELAY, Duration::from_secs(2)]);
    }

    #[test]
    fn test_wait_on_empty_sequence_is_noop() {
        let mut seq = KeySequence::new();
        seq.wait(Duration::from_secs(1));
        assert!(seq.is_empty());
    }

    #[test]
    fn test_repeat_copies_last_command_including_delay() {
        // Arrange
        let mut seq = KeySequence::new();
        seq.click(Key::Down).wait(Duration::from_millis(100));

        // Act
        seq.repeat(3);

        // Assert
        assert_eq!(seq.len(), 4);
        assert!(seq
            .iter()
            .all(|c| c.key == Key::Down && c.post_delay == Duration::from_millis(100)));
    }

    #[test]
    fn test_repeat_on_empty_sequence_is_noop() {
        let mut seq = KeySequence::new();
        seq.repeat(5);
        assert_eq!(seq.len(), 0);
    }

    #[test]
    fn test_repeat_zero_adds_nothing() {
        let mut seq = KeySequence::new();
        seq.click(Key::Enter).repeat(0);
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn test_collect_from_commands() {
        let seq: KeySequence = [Key::Num1, Key::Num2]
            .into_iter()
            .map(|key| KeyCommand {
                key,
                action: KeyAction::Click,
                post_delay: Duration::ZERO,
            })
            .collect();
        assert_eq!(seq.len(), 2);
    }
}
