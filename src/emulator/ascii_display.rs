use super::{
    basics::{FrameBuffer, SCREEN_HEIGHT, SCREEN_WIDTH},
    executor::Frontend,
};
use std::io::{self, Write};

const ON: char = '@';
const OFF: char = ' ';
const CLEAR_AND_HOME: &str = "\x1B[2J\x1B[H";

/// Renders a frame as text, one line per pixel row.
pub fn render_frame(frame: &FrameBuffer) -> String {
    let mut text = String::with_capacity((SCREEN_WIDTH as usize + 1) * SCREEN_HEIGHT as usize);
    for y in 0..SCREEN_HEIGHT as usize {
        for x in 0..SCREEN_WIDTH as usize {
            text.push(if frame[x][y] { ON } else { OFF });
        }
        text.push('\n');
    }
    text
}

/// A [`Frontend`] that prints every changed frame to a text sink. It has no
/// input of its own, so programs waiting on a key will spin.
pub struct AsciiDisplay<W: Write> {
    out: W,
    clear_screen: bool,
    last_frame: Option<FrameBuffer>,
    last_sound: bool,
}

impl<W: Write> AsciiDisplay<W> {
    /// With `clear_screen` set, each frame is drawn over the previous one
    /// using ANSI escapes instead of being appended.
    pub fn new(out: W, clear_screen: bool) -> AsciiDisplay<W> {
        AsciiDisplay {
            out,
            clear_screen,
            last_frame: None,
            last_sound: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Frontend for AsciiDisplay<W> {
    fn present(&mut self, frame: &FrameBuffer, sound_active: bool) -> io::Result<()> {
        if self.last_frame.as_ref() == Some(frame) && self.last_sound == sound_active {
            return Ok(());
        }
        if self.clear_screen {
            write!(self.out, "{}", CLEAR_AND_HOME)?;
        }
        write!(self.out, "{}", render_frame(frame))?;
        writeln!(self.out, "{}", if sound_active { "[beep]" } else { "" })?;
        self.out.flush()?;
        self.last_frame = Some(*frame);
        self.last_sound = sound_active;
        Ok(())
    }
}
