//! Keyboard and touch translation to engine key codes.

use crate::engine::DoomEngine;

// --- Engine key codes (doomkeys.h) ---
pub const KEY_RIGHTARROW: u8 = 0xae;
pub const KEY_LEFTARROW: u8 = 0xac;
pub const KEY_UPARROW: u8 = 0xad;
pub const KEY_DOWNARROW: u8 = 0xaf;
pub const KEY_USE: u8 = 0xa2;
pub const KEY_FIRE: u8 = 0xa3;
pub const KEY_ESCAPE: u8 = 27;
pub const KEY_ENTER: u8 = 13;
pub const KEY_TAB: u8 = 9;
pub const KEY_BACKSPACE: u8 = 0x7f;
pub const KEY_RSHIFT: u8 = 0x80 + 0x36;
pub const KEY_RCTRL: u8 = 0x80 + 0x1d;

/// A physical key as reported by the windowing layer, already decoded to
/// either a named key or the character it types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Tab,
    Space,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Shift,
    Control,
    Char(char),
}

/// Translate a key to its engine code.
///
/// Space and `E` are fire and use during play, but type themselves while
/// a menu text field is active.
pub fn doom_key(key: Key, text_input_active: bool) -> Option<u8> {
    match key {
        Key::Enter => Some(KEY_ENTER),
        Key::Escape => Some(KEY_ESCAPE),
        Key::Tab => Some(KEY_TAB),
        Key::Backspace => Some(KEY_BACKSPACE),
        Key::Left => Some(KEY_LEFTARROW),
        Key::Right => Some(KEY_RIGHTARROW),
        Key::Up => Some(KEY_UPARROW),
        Key::Down => Some(KEY_DOWNARROW),
        Key::Shift => Some(KEY_RSHIFT),
        Key::Control => Some(KEY_RCTRL),
        Key::Space | Key::Char(' ') => Some(if text_input_active { b' ' } else { KEY_FIRE }),
        Key::Char('e' | 'E') if !text_input_active => Some(KEY_USE),
        Key::Char(c) => printable_ascii(c),
    }
}

fn printable_ascii(c: char) -> Option<u8> {
    if !c.is_ascii() {
        return None;
    }
    let c = c.to_ascii_lowercase() as u8;
    (32..=126).contains(&c).then_some(c)
}

/// Forwards key transitions to the engine, resolving the text-input
/// dependent keys at the moment of the event.
pub struct KeyRouter<'a> {
    engine: &'a dyn DoomEngine,
}

impl<'a> KeyRouter<'a> {
    pub fn new(engine: &'a dyn DoomEngine) -> Self {
        Self { engine }
    }

    /// Push a press or release. Returns the engine code, if the key maps.
    pub fn key(&self, key: Key, pressed: bool) -> Option<u8> {
        let code = doom_key(key, self.engine.is_text_input_active())?;
        self.engine.push_key(pressed, code);
        Some(code)
    }
}

/// One cell group of the 3×3 touch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenRegion {
    Left,
    Right,
    Up,
    Down,
    Action,
    Fire,
}

impl ScreenRegion {
    /// Region under `(x, y)` in a view of `width` × `height`, with `y`
    /// growing downward. The top two rows steer, the bottom row acts.
    pub fn at(x: f64, y: f64, width: f64, height: f64) -> Self {
        let row = band(y, height / 3.0);
        let column = band(x, width / 3.0);

        match (row, column) {
            (0 | 1, 0) => Self::Left,
            (0 | 1, 1) => Self::Up,
            (0 | 1, _) => Self::Right,
            (_, 0) => Self::Action,
            (_, 1) => Self::Down,
            _ => Self::Fire,
        }
    }

    /// Engine key for this region. Action and fire fall back to menu
    /// navigation outside of a game.
    pub fn doom_key(self, in_game: bool) -> u8 {
        match self {
            Self::Left => KEY_LEFTARROW,
            Self::Right => KEY_RIGHTARROW,
            Self::Up => KEY_UPARROW,
            Self::Down => KEY_DOWNARROW,
            Self::Action if in_game => KEY_USE,
            Self::Action => KEY_ENTER,
            Self::Fire if in_game => KEY_FIRE,
            Self::Fire => KEY_ESCAPE,
        }
    }
}

fn band(v: f64, third: f64) -> u8 {
    if v < third {
        0
    } else if v < 2.0 * third {
        1
    } else {
        2
    }
}

/// Tracks the region held by a single drag gesture.
///
/// Moving into a new region releases the old key before pressing the new
/// one; lifting the finger releases whatever is held.
#[derive(Debug, Default)]
pub struct TouchTracker {
    active: Option<(ScreenRegion, u8)>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<ScreenRegion> {
        self.active.map(|(region, _)| region)
    }

    pub fn moved(&mut self, engine: &dyn DoomEngine, x: f64, y: f64, width: f64, height: f64) {
        let region = ScreenRegion::at(x, y, width, height);
        if self.active() == Some(region) {
            return;
        }
        self.release(engine);
        let key = region.doom_key(engine.is_in_game());
        engine.push_key(true, key);
        self.active = Some((region, key));
    }

    pub fn ended(&mut self, engine: &dyn DoomEngine) {
        self.release(engine);
    }

    // Releases the key that was pressed, even if the in-game flag flipped
    // since, so the engine never sees a stuck key.
    fn release(&mut self, engine: &dyn DoomEngine) {
        if let Some((_, key)) = self.active.take() {
            engine.push_key(false, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExpressionSink;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeEngine {
        keys: Mutex<Vec<(bool, u8)>>,
        text_input: bool,
        in_game: AtomicBool,
    }

    impl FakeEngine {
        fn new(text_input: bool, in_game: bool) -> Self {
            Self {
                keys: Mutex::new(Vec::new()),
                text_input,
                in_game: AtomicBool::new(in_game),
            }
        }

        fn keys(&self) -> Vec<(bool, u8)> {
            self.keys.lock().unwrap().clone()
        }
    }

    impl ExpressionSink for FakeEngine {
        fn set_face_expression(&self, _code: i32) {}
    }

    impl DoomEngine for FakeEngine {
        fn push_key(&self, pressed: bool, key: u8) {
            self.keys.lock().unwrap().push((pressed, key));
        }

        fn is_text_input_active(&self) -> bool {
            self.text_input
        }

        fn is_in_game(&self) -> bool {
            self.in_game.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(doom_key(Key::Enter, false), Some(KEY_ENTER));
        assert_eq!(doom_key(Key::Escape, false), Some(KEY_ESCAPE));
        assert_eq!(doom_key(Key::Tab, false), Some(KEY_TAB));
        assert_eq!(doom_key(Key::Backspace, false), Some(KEY_BACKSPACE));
        assert_eq!(doom_key(Key::Left, false), Some(KEY_LEFTARROW));
        assert_eq!(doom_key(Key::Shift, true), Some(KEY_RSHIFT));
        assert_eq!(doom_key(Key::Control, false), Some(KEY_RCTRL));
    }

    #[test]
    fn test_space_and_e_depend_on_text_input() {
        assert_eq!(doom_key(Key::Space, false), Some(KEY_FIRE));
        assert_eq!(doom_key(Key::Space, true), Some(b' '));
        assert_eq!(doom_key(Key::Char('e'), false), Some(KEY_USE));
        assert_eq!(doom_key(Key::Char('E'), false), Some(KEY_USE));
        assert_eq!(doom_key(Key::Char('e'), true), Some(b'e'));
    }

    #[test]
    fn test_characters_map_to_ascii() {
        assert_eq!(doom_key(Key::Char('a'), false), Some(b'a'));
        assert_eq!(doom_key(Key::Char('Z'), false), Some(b'z'));
        assert_eq!(doom_key(Key::Char('7'), false), Some(b'7'));
        assert_eq!(doom_key(Key::Char('-'), false), Some(b'-'));
        assert_eq!(doom_key(Key::Char('\u{7}'), false), None);
        assert_eq!(doom_key(Key::Char('é'), false), None);
    }

    #[test]
    fn test_router_pushes_press_and_release() {
        let engine = FakeEngine::new(true, true);
        let router = KeyRouter::new(&engine);
        assert_eq!(router.key(Key::Space, true), Some(b' '));
        assert_eq!(router.key(Key::Space, false), Some(b' '));
        assert_eq!(router.key(Key::Char('\u{1}'), true), None);
        assert_eq!(engine.keys(), vec![(true, b' '), (false, b' ')]);
    }

    #[test]
    fn test_grid_regions() {
        let (w, h) = (300.0, 300.0);
        assert_eq!(ScreenRegion::at(10.0, 10.0, w, h), ScreenRegion::Left);
        assert_eq!(ScreenRegion::at(10.0, 150.0, w, h), ScreenRegion::Left);
        assert_eq!(ScreenRegion::at(150.0, 10.0, w, h), ScreenRegion::Up);
        assert_eq!(ScreenRegion::at(290.0, 150.0, w, h), ScreenRegion::Right);
        assert_eq!(ScreenRegion::at(10.0, 290.0, w, h), ScreenRegion::Action);
        assert_eq!(ScreenRegion::at(150.0, 290.0, w, h), ScreenRegion::Down);
        assert_eq!(ScreenRegion::at(290.0, 290.0, w, h), ScreenRegion::Fire);
    }

    #[test]
    fn test_region_keys_depend_on_game_state() {
        assert_eq!(ScreenRegion::Action.doom_key(true), KEY_USE);
        assert_eq!(ScreenRegion::Action.doom_key(false), KEY_ENTER);
        assert_eq!(ScreenRegion::Fire.doom_key(true), KEY_FIRE);
        assert_eq!(ScreenRegion::Fire.doom_key(false), KEY_ESCAPE);
        assert_eq!(ScreenRegion::Up.doom_key(false), KEY_UPARROW);
    }

    #[test]
    fn test_touch_drag_across_regions() {
        let engine = FakeEngine::new(false, true);
        let mut touch = TouchTracker::new();
        let (w, h) = (300.0, 300.0);

        touch.moved(&engine, 10.0, 10.0, w, h);
        touch.moved(&engine, 20.0, 20.0, w, h);
        touch.moved(&engine, 150.0, 10.0, w, h);
        touch.ended(&engine);
        touch.ended(&engine);

        assert_eq!(
            engine.keys(),
            vec![
                (true, KEY_LEFTARROW),
                (false, KEY_LEFTARROW),
                (true, KEY_UPARROW),
                (false, KEY_UPARROW),
            ]
        );
        assert_eq!(touch.active(), None);
    }

    #[test]
    fn test_touch_release_matches_press() {
        let engine = FakeEngine::new(false, true);
        let mut touch = TouchTracker::new();
        touch.moved(&engine, 290.0, 290.0, 300.0, 300.0);
        engine.in_game.store(false, Ordering::SeqCst);
        touch.ended(&engine);
        assert_eq!(engine.keys(), vec![(true, KEY_FIRE), (false, KEY_FIRE)]);
    }
}
