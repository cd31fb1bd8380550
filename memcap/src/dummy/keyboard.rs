use crate::error::Result;
use crate::os::{Keyboard, KeyboardState};

const KEY_COUNT: usize = 256;

/// Keyboard of the dummy os.
///
/// Every keyboard object carries its own copy of the key states.
#[derive(Clone)]
pub struct DummyKeyboard {
    keys: [bool; KEY_COUNT],
}

impl DummyKeyboard {
    pub(crate) fn with_keys(down: &[i32]) -> Self {
        let mut keys = [false; KEY_COUNT];
        down.iter()
            .filter_map(|vk| key_index(*vk))
            .for_each(|idx| keys[idx] = true);
        Self { keys }
    }
}

fn key_index(vk: i32) -> Option<usize> {
    usize::try_from(vk).ok().filter(|idx| *idx < KEY_COUNT)
}

impl Keyboard for DummyKeyboard {
    type KeyboardStateType = DummyKeyboardState;

    fn is_down(&mut self, vk: i32) -> bool {
        key_index(vk).map(|idx| self.keys[idx]).unwrap_or(false)
    }

    fn set_down(&mut self, vk: i32, down: bool) {
        if let Some(idx) = key_index(vk) {
            self.keys[idx] = down;
        }
    }

    fn state(&mut self) -> Result<Self::KeyboardStateType> {
        Ok(DummyKeyboardState { keys: self.keys })
    }
}

#[derive(Clone)]
pub struct DummyKeyboardState {
    keys: [bool; KEY_COUNT],
}

impl KeyboardState for DummyKeyboardState {
    fn is_down(&self, vk: i32) -> bool {
        key_index(vk).map(|idx| self.keys[idx]).unwrap_or(false)
    }
}
