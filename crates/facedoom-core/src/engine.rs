//! Boundary with the external DOOM engine core.
//!
//! The engine owns simulation and rendering. The shell only pushes key
//! events and face expressions into it and asks it a couple of questions.

/// Fixed render resolution of the engine framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// `DOOMGENERIC_RESX` × `DOOMGENERIC_RESY`.
    pub const DOOMGENERIC: Self = Self {
        width: 640,
        height: 400,
    };

    /// Size in bytes of one RGBA frame at this resolution.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Receiver of face expression codes (`DG_SetFaceExpression`).
///
/// Called from the classification queue; implementations must be cheap
/// and must not block.
pub trait ExpressionSink: Send + Sync {
    fn set_face_expression(&self, code: i32);
}

/// Key input and state queries (`DG_PushKey`, `DG_IsTextInputActive`, `usergame`).
pub trait DoomEngine: ExpressionSink {
    fn push_key(&self, pressed: bool, key: u8);

    /// True while a menu text field (e.g. save-game name) has focus.
    fn is_text_input_active(&self) -> bool;

    /// True while a game is in progress rather than the title/menu loop.
    fn is_in_game(&self) -> bool;

    fn resolution(&self) -> Resolution {
        Resolution::DOOMGENERIC
    }
}
