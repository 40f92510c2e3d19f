//! Terminal key encoding.
//!
//! Interactive prompts read raw keystrokes, so driving them means sending the
//! exact bytes a terminal would: control codes and escape sequences rather
//! than printable text. [`Key`] maps logical keys to those bytes.

/// A key that can be sent to a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable character, UTF-8 encoded.
    Char(char),
    /// Enter/Return (carriage return, as a terminal sends it).
    Enter,
    /// Escape.
    Escape,
    /// Tab.
    Tab,
    /// Space.
    Space,
    /// Backspace (DEL, as most terminals send it).
    Backspace,
    /// Forward delete.
    Delete,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Home.
    Home,
    /// End.
    End,
    /// Ctrl + a key, e.g. `Ctrl('c')`.
    Ctrl(char),
}

impl Key {
    /// Encode this key as the bytes a terminal sends for it.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            Key::Char(c) => c.to_string().into_bytes(),
            Key::Enter => vec![b'\r'],
            Key::Escape => vec![0x1b],
            Key::Tab => vec![b'\t'],
            Key::Space => vec![b' '],
            Key::Backspace => vec![0x7f],
            Key::Delete => b"\x1b[3~".to_vec(),
            Key::Up => b"\x1b[A".to_vec(),
            Key::Down => b"\x1b[B".to_vec(),
            Key::Right => b"\x1b[C".to_vec(),
            Key::Left => b"\x1b[D".to_vec(),
            Key::Home => b"\x1b[H".to_vec(),
            Key::End => b"\x1b[F".to_vec(),
            Key::Ctrl(c) => ctrl_bytes(c),
        }
    }
}

/// Control code for Ctrl + `c`.
///
/// Letters and `@[\]^_` map into 0x00-0x1F, `?` maps to DEL. Anything else
/// has no control form and is sent as itself.
fn ctrl_bytes(c: char) -> Vec<u8> {
    let upper = c.to_ascii_uppercase();
    match upper {
        '@'..='_' => vec![upper as u8 & 0x1f],
        '?' => vec![0x7f],
        _ => c.to_string().into_bytes(),
    }
}
