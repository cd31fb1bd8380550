//! Describes optional keyboard input for a Operating System

use crate::error::Result;

/// Optional keyboard capability of an OS.
///
/// The keyboard either borrows the OS, or takes ownership of it.
pub trait OsKeyboardInner: Send {
    type KeyboardType<'a>: Keyboard + 'a
    where
        Self: 'a;
    type IntoKeyboardType: Keyboard + Clone + 'static;

    fn keyboard(&mut self) -> Result<Self::KeyboardType<'_>>;
    fn into_keyboard(self) -> Result<Self::IntoKeyboardType>
    where
        Self: Sized;
}

pub trait Keyboard: Send {
    type KeyboardStateType: KeyboardState + 'static;

    /// Checks whether the virtual key `vk` is currently pressed.
    fn is_down(&mut self, vk: i32) -> bool;
    /// Overrides the pressed state of `vk`.
    ///
    /// Only the issuing keyboard object observes the change.
    fn set_down(&mut self, vk: i32, down: bool);

    /// Takes a snapshot of the entire keyboard.
    fn state(&mut self) -> Result<Self::KeyboardStateType>;
}

/// Snapshot of all key states at the time it was taken.
pub trait KeyboardState: Send {
    fn is_down(&self, vk: i32) -> bool;
}
